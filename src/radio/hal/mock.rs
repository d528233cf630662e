//! Simulated CC110x for testing
//!
//! `MockChip` implements [`Hal`] by decoding the SPI header bytes the driver
//! sends and applying them to a small register level model of the chip: the
//! configuration registers, PATABLE, both FIFOs, the main state machine and
//! the status registers the driver polls. Over-the-air traffic is injected
//! and drained from the test through a cloned handle.
//!
//! Only what the driver relies on is modelled; timing is expressed in bus
//! transfers ("ready after N polls") rather than wall-clock time.

use crate::constants::*;
use crate::radio::bus::{ChipStatus, HwState};
use crate::radio::hal::{Hal, HalError};
use log::trace;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug)]
struct ChipModel {
    registers: [u8; CONFIG_REGISTER_COUNT],
    patable: [u8; PATABLE_SIZE],
    state: HwState,
    powered_down: bool,
    wor: bool,
    partnum: u8,
    version: u8,

    rx_fifo: VecDeque<u8>,
    rx_overflow: bool,
    tx_fifo: VecDeque<u8>,
    tx_underflow: bool,
    tx_current: Vec<u8>,
    on_air: Vec<Vec<u8>>,

    strobes: Vec<u8>,
    strobe_counts: HashMap<u8, usize>,
    cca_arms: u32,
    transfers: usize,

    channel_clear: bool,
    rssi_settle_polls: u32,
    calibration_polls: u32,
    wake_polls: u32,
    settle_countdown: u32,
    cal_countdown: u32,
    wake_countdown: u32,
    rssi: u8,
    lqi: u8,
    crc_ok: bool,
    racy_reads: u32,
    fail_skip: u32,
    fail_transfers: u32,
}

impl Default for ChipModel {
    fn default() -> Self {
        Self {
            registers: [0; CONFIG_REGISTER_COUNT],
            patable: [0xC6, 0, 0, 0, 0, 0, 0, 0],
            state: HwState::Idle,
            powered_down: false,
            wor: false,
            partnum: CHIP_PARTNUM,
            version: 0x14,
            rx_fifo: VecDeque::new(),
            rx_overflow: false,
            tx_fifo: VecDeque::new(),
            tx_underflow: false,
            tx_current: Vec::new(),
            on_air: Vec::new(),
            strobes: Vec::new(),
            strobe_counts: HashMap::new(),
            cca_arms: 0,
            transfers: 0,
            channel_clear: true,
            rssi_settle_polls: 0,
            calibration_polls: 0,
            wake_polls: 0,
            settle_countdown: 0,
            cal_countdown: 0,
            wake_countdown: 0,
            rssi: 0x80,
            lqi: 0x20,
            crc_ok: true,
            racy_reads: 0,
            fail_skip: 0,
            fail_transfers: 0,
        }
    }
}

impl ChipModel {
    fn status(&self, read: bool) -> ChipStatus {
        let fifo = if read {
            self.rx_fifo.len()
        } else {
            FIFO_SIZE.saturating_sub(self.tx_fifo.len())
        };
        ChipStatus::new(self.wake_countdown == 0, self.state, fifo.min(15) as u8)
    }

    // Time passes one transfer at a time. Calibration only advances with
    // status polls: the driver sleeps through it between strobes.
    fn tick(&mut self, status_poll: bool) {
        if self.wake_countdown > 0 {
            self.wake_countdown -= 1;
        }
        match self.state {
            HwState::Settling => {
                if self.settle_countdown == 0 {
                    self.state = HwState::Rx;
                } else {
                    self.settle_countdown -= 1;
                }
            }
            HwState::Calibrate if status_poll => {
                if self.cal_countdown == 0 {
                    self.finish_calibration();
                } else {
                    self.cal_countdown -= 1;
                }
            }
            _ => {}
        }
    }

    fn finish_calibration(&mut self) {
        let channel = self.registers[REG_CHANNR as usize];
        self.registers[REG_FSCAL3 as usize] = 0xE9;
        self.registers[REG_FSCAL2 as usize] = 0x2A;
        self.registers[REG_FSCAL1 as usize] = 0x20u8.wrapping_add(channel) & 0x3F;
        self.state = HwState::Idle;
    }

    fn strobe(&mut self, strobe: u8) {
        self.strobes.push(strobe);
        *self.strobe_counts.entry(strobe).or_insert(0) += 1;
        match strobe {
            STROBE_SRES => {
                let (partnum, version) = (self.partnum, self.version);
                let log = (std::mem::take(&mut self.strobes), std::mem::take(&mut self.strobe_counts));
                let knobs = (
                    self.channel_clear,
                    self.rssi_settle_polls,
                    self.calibration_polls,
                    self.wake_polls,
                    self.transfers,
                    self.cca_arms,
                );
                *self = ChipModel::default();
                self.partnum = partnum;
                self.version = version;
                self.strobes = log.0;
                self.strobe_counts = log.1;
                self.channel_clear = knobs.0;
                self.rssi_settle_polls = knobs.1;
                self.calibration_polls = knobs.2;
                self.wake_polls = knobs.3;
                self.transfers = knobs.4;
                self.cca_arms = knobs.5;
            }
            STROBE_SFSTXON => {
                if self.state == HwState::Idle {
                    self.state = HwState::FastTxOn;
                }
            }
            STROBE_SCAL => {
                if self.state == HwState::Idle {
                    if self.calibration_polls == 0 {
                        self.finish_calibration();
                    } else {
                        self.state = HwState::Calibrate;
                        self.cal_countdown = self.calibration_polls;
                    }
                }
            }
            STROBE_SRX => {
                if matches!(self.state, HwState::Idle | HwState::FastTxOn) {
                    if self.rssi_settle_polls == 0 {
                        self.state = HwState::Rx;
                    } else {
                        self.state = HwState::Settling;
                        self.settle_countdown = self.rssi_settle_polls;
                    }
                }
            }
            STROBE_STX => {
                if matches!(self.state, HwState::Idle | HwState::FastTxOn | HwState::Rx) {
                    self.state = HwState::Tx;
                    self.tx_current.clear();
                }
            }
            STROBE_SIDLE => {
                self.state = HwState::Idle;
                self.wor = false;
            }
            STROBE_SWOR => {
                if self.state == HwState::Idle {
                    self.wor = true;
                    // Only the first PATABLE entry is kept while sleeping
                    self.patable[1..].fill(0);
                }
            }
            STROBE_SPWD => {
                if self.state == HwState::Idle {
                    self.powered_down = true;
                    // PATABLE content is lost in power down
                    self.patable = [0; PATABLE_SIZE];
                }
            }
            STROBE_SFRX => {
                self.rx_fifo.clear();
                self.rx_overflow = false;
                if self.state == HwState::RxFifoOverflow {
                    self.state = HwState::Idle;
                }
            }
            STROBE_SFTX => {
                self.tx_fifo.clear();
                self.tx_underflow = false;
                self.tx_current.clear();
                if self.state == HwState::TxFifoUnderflow {
                    self.state = HwState::Idle;
                }
            }
            _ => {}
        }
    }

    fn racy(&mut self, value: u8) -> u8 {
        if self.racy_reads > 0 {
            self.racy_reads -= 1;
            // Consecutive corrupted reads must not agree with each other
            value ^ 0x55u8.rotate_left(self.racy_reads)
        } else {
            value
        }
    }

    fn marcstate(&self) -> u8 {
        if self.powered_down {
            return 0x00;
        }
        match self.state {
            HwState::Idle => 0x01,
            HwState::Rx => 0x0D,
            HwState::Tx => 0x13,
            HwState::FastTxOn => 0x12,
            HwState::Calibrate => 0x08,
            HwState::Settling => 0x09,
            HwState::RxFifoOverflow => 0x11,
            HwState::TxFifoUnderflow => 0x16,
        }
    }

    fn status_register(&mut self, addr: u8) -> u8 {
        match addr {
            REG_PARTNUM => self.partnum,
            REG_VERSION => self.version,
            REG_LQI => {
                let crc = if self.crc_ok { LQI_CRC_OK } else { 0 };
                let value = crc | (self.lqi & LQI_ESTIMATE_MASK);
                self.racy(value)
            }
            REG_RSSI => {
                let value = self.rssi;
                self.racy(value)
            }
            REG_MARCSTATE => self.marcstate(),
            REG_PKTSTATUS => {
                let mut value = 0;
                if self.crc_ok {
                    value |= 0x80;
                }
                if self.state == HwState::Rx {
                    value |= if self.channel_clear { 0x10 } else { 0x40 };
                }
                value
            }
            REG_TXBYTES => {
                let flag = if self.tx_underflow { FIFO_ERROR_FLAG } else { 0 };
                let value = flag | (self.tx_fifo.len().min(127) as u8);
                self.racy(value)
            }
            REG_RXBYTES => {
                let flag = if self.rx_overflow { FIFO_ERROR_FLAG } else { 0 };
                let value = flag | (self.rx_fifo.len().min(127) as u8);
                self.racy(value)
            }
            _ => 0,
        }
    }

    fn write_register(&mut self, addr: u8, value: u8) {
        if let Some(slot) = self.registers.get_mut(addr as usize) {
            *slot = value;
        }
        if addr == REG_IOCFG2 && value == GDO_CCA {
            self.cca_arms += 1;
        }
    }

    fn transfer(&mut self, buf: &mut [u8]) -> Result<(), HalError> {
        if buf.is_empty() {
            return Ok(());
        }
        if self.fail_skip > 0 {
            self.fail_skip -= 1;
        } else if self.fail_transfers > 0 {
            self.fail_transfers -= 1;
            return Err(HalError::Spi);
        }
        if self.powered_down {
            return Err(HalError::Spi);
        }
        let header = buf[0];
        let read = header & ACCESS_READ != 0;
        let burst = header & ACCESS_BURST != 0;
        let addr = header & ADDRESS_MASK;

        self.transfers += 1;
        self.tick(addr == STROBE_SNOP && !burst);
        buf[0] = self.status(read).raw();

        match addr {
            REG_FIFO => {
                for byte in buf.iter_mut().skip(1) {
                    if read {
                        *byte = self.rx_fifo.pop_front().unwrap_or(0);
                    } else if self.tx_fifo.len() < FIFO_SIZE {
                        self.tx_fifo.push_back(*byte);
                    }
                }
            }
            REG_PATABLE => {
                for (index, byte) in buf.iter_mut().skip(1).enumerate().take(PATABLE_SIZE) {
                    if read {
                        *byte = self.patable[index];
                    } else {
                        self.patable[index] = *byte;
                    }
                }
            }
            STROBE_SRES..=STROBE_SNOP if read && burst => {
                let value = self.status_register(addr);
                if let Some(byte) = buf.get_mut(1) {
                    *byte = value;
                }
            }
            STROBE_SRES..=STROBE_SNOP => {
                self.strobe(addr);
                buf[0] = self.status(read).raw();
            }
            _ => {
                for (offset, byte) in buf.iter_mut().skip(1).enumerate() {
                    let reg = addr as usize + offset;
                    if read {
                        *byte = self.registers.get(reg).copied().unwrap_or(0);
                    } else {
                        self.write_register(reg as u8, *byte);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Register level simulation of a CC1101 attached to the driver
#[derive(Clone, Default)]
pub struct MockChip {
    model: Arc<Mutex<ChipModel>>,
}

impl MockChip {
    pub fn new() -> Self {
        Self::default()
    }

    fn model(&self) -> MutexGuard<'_, ChipModel> {
        // A panicking test must not poison the other handles
        self.model.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Configuration register content
    pub fn register(&self, addr: u8) -> u8 {
        self.model().registers.get(addr as usize).copied().unwrap_or(0)
    }

    pub fn set_register(&self, addr: u8, value: u8) {
        self.model().write_register(addr, value);
    }

    pub fn patable(&self) -> [u8; PATABLE_SIZE] {
        self.model().patable
    }

    pub fn hw_state(&self) -> HwState {
        self.model().state
    }

    pub fn is_powered_down(&self) -> bool {
        self.model().powered_down
    }

    /// Polling on the wake-on-radio timer
    pub fn is_wor(&self) -> bool {
        self.model().wor
    }

    /// How often `strobe` was issued
    pub fn strobe_count(&self, strobe: u8) -> usize {
        self.model().strobe_counts.get(&strobe).copied().unwrap_or(0)
    }

    /// All strobes issued so far, oldest first
    pub fn strobes(&self) -> Vec<u8> {
        self.model().strobes.clone()
    }

    /// Forget the strobe log and counters
    pub fn clear_log(&self) {
        let mut model = self.model();
        model.strobes.clear();
        model.strobe_counts.clear();
        model.cca_arms = 0;
    }

    /// Number of times the CCA signal was routed to GDO2
    pub fn cca_arms(&self) -> u32 {
        self.model().cca_arms
    }

    /// Number of bus transfers seen
    pub fn transfer_count(&self) -> usize {
        self.model().transfers
    }

    pub fn set_channel_clear(&self, clear: bool) {
        self.model().channel_clear = clear;
    }

    /// Transfers the chip spends settling after SRX before it reports RX
    pub fn set_rssi_settle_polls(&self, polls: u32) {
        self.model().rssi_settle_polls = polls;
    }

    /// Transfers a calibration takes
    pub fn set_calibration_polls(&self, polls: u32) {
        self.model().calibration_polls = polls;
    }

    /// Transfers the crystal needs to become stable after wake up
    pub fn set_wake_polls(&self, polls: u32) {
        self.model().wake_polls = polls;
    }

    /// Raw RSSI register value and link quality estimate of the next frame
    pub fn set_link_quality(&self, rssi: u8, lqi: u8) {
        let mut model = self.model();
        model.rssi = rssi;
        model.lqi = lqi & LQI_ESTIMATE_MASK;
    }

    /// Corrupt the next `count` reads of the racy status registers
    pub fn inject_racy_reads(&self, count: u32) {
        self.model().racy_reads = count;
    }

    /// Fail the next `count` transfers with a bus error
    pub fn fail_next_transfers(&self, count: u32) {
        self.fail_transfers_after(0, count);
    }

    /// Let `skip` transfers pass, then fail `count` with a bus error
    pub fn fail_transfers_after(&self, skip: u32, count: u32) {
        let mut model = self.model();
        model.fail_skip = skip;
        model.fail_transfers = count;
    }

    pub fn set_chip_id(&self, partnum: u8, version: u8) {
        let mut model = self.model();
        model.partnum = partnum;
        model.version = version;
    }

    /// Bytes arriving over the air into the RX FIFO. Ignored unless the chip
    /// is receiving or polling in wake-on-radio; more than the FIFO holds
    /// overflows it.
    pub fn receive(&self, bytes: &[u8]) -> bool {
        let mut model = self.model();
        if model.wor && model.state == HwState::Idle {
            // Woke up on the timer and caught the sync word
            model.wor = false;
            model.state = HwState::Rx;
        }
        if model.state != HwState::Rx {
            trace!("MockChip: not receiving, {} bytes lost", bytes.len());
            return false;
        }
        for &byte in bytes {
            if model.rx_fifo.len() >= FIFO_SIZE {
                model.rx_overflow = true;
                model.state = HwState::RxFifoOverflow;
                break;
            }
            model.rx_fifo.push_back(byte);
        }
        true
    }

    /// End of packet: the chip leaves RX and latches the CRC result
    pub fn end_rx(&self, crc_ok: bool) {
        let mut model = self.model();
        model.crc_ok = crc_ok;
        if model.state == HwState::Rx {
            model.state = HwState::Idle;
        }
    }

    pub fn force_rx_overflow(&self) {
        let mut model = self.model();
        model.rx_overflow = true;
        model.state = HwState::RxFifoOverflow;
    }

    pub fn rx_fifo_len(&self) -> usize {
        self.model().rx_fifo.len()
    }

    pub fn tx_fifo_len(&self) -> usize {
        self.model().tx_fifo.len()
    }

    /// Put up to `count` bytes from the TX FIFO on the air. Running dry in
    /// the middle of a frame underflows the FIFO. Returns the bytes sent.
    pub fn drain_tx(&self, count: usize) -> usize {
        let mut model = self.model();
        if model.state != HwState::Tx {
            return 0;
        }
        let mut sent = 0;
        for _ in 0..count {
            let Some(byte) = model.tx_fifo.pop_front() else {
                model.tx_underflow = true;
                model.state = HwState::TxFifoUnderflow;
                return sent;
            };
            model.tx_current.push(byte);
            sent += 1;
            let expected = model.tx_current[0] as usize + 1;
            if model.tx_current.len() == expected {
                let frame = std::mem::take(&mut model.tx_current);
                model.on_air.push(frame);
                // TXOFF_MODE = IDLE
                model.state = HwState::Idle;
                return sent;
            }
        }
        sent
    }

    /// Send everything still queued in the TX FIFO
    pub fn finish_tx(&self) -> usize {
        let queued = self.tx_fifo_len();
        self.drain_tx(queued)
    }

    /// Underflow the TX FIFO as if the driver had not refilled it in time
    pub fn force_tx_underflow(&self) {
        let mut model = self.model();
        model.tx_fifo.clear();
        model.tx_underflow = true;
        model.state = HwState::TxFifoUnderflow;
    }

    /// Complete frames sent so far, each starting with its length byte
    pub fn transmitted(&self) -> Vec<Vec<u8>> {
        self.model().on_air.clone()
    }
}

impl Hal for MockChip {
    fn transfer(&mut self, buf: &mut [u8]) -> Result<(), HalError> {
        self.model().transfer(buf)
    }

    fn wake(&mut self) -> Result<(), HalError> {
        let mut model = self.model();
        if model.powered_down {
            model.powered_down = false;
            model.state = HwState::Idle;
            model.wake_countdown = model.wake_polls;
        }
        Ok(())
    }
}
