//! # Bus Primitives
//!
//! Register, FIFO and strobe access on top of a [`Hal`]. Every transfer
//! returns the chip status byte, decoded here into [`ChipStatus`]; the driver
//! uses it as ground truth for the hardware state.
//!
//! The byte count registers (RXBYTES/TXBYTES) and the LQI/RSSI registers can be
//! read while the chip updates them, in which case a single read returns a
//! corrupted value. [`Bus::read_reliable`] re-reads until two consecutive
//! reads agree.
//!
//! A `Bus` is only ever used through the device's bus lock.

use crate::constants::*;
use crate::radio::hal::{Hal, HalError};
use bitflags::bitflags;
use log::trace;

/// Main state field of the chip status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwState {
    Idle,
    Rx,
    Tx,
    FastTxOn,
    Calibrate,
    Settling,
    RxFifoOverflow,
    TxFifoUnderflow,
}

impl HwState {
    /// Decode the 3-bit state field (already shifted down)
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => HwState::Idle,
            1 => HwState::Rx,
            2 => HwState::Tx,
            3 => HwState::FastTxOn,
            4 => HwState::Calibrate,
            5 => HwState::Settling,
            6 => HwState::RxFifoOverflow,
            _ => HwState::TxFifoUnderflow,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            HwState::Idle => 0,
            HwState::Rx => 1,
            HwState::Tx => 2,
            HwState::FastTxOn => 3,
            HwState::Calibrate => 4,
            HwState::Settling => 5,
            HwState::RxFifoOverflow => 6,
            HwState::TxFifoUnderflow => 7,
        }
    }
}

/// Status byte returned by the chip on every transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipStatus(pub u8);

impl ChipStatus {
    /// Compose a status byte (used by simulated chips)
    pub fn new(ready: bool, state: HwState, fifo_bytes: u8) -> Self {
        let rdyn = if ready { 0 } else { STATUS_CHIP_RDYN };
        ChipStatus(
            rdyn | (state.bits() << STATUS_STATE_SHIFT) | (fifo_bytes.min(15) & STATUS_FIFO_MASK),
        )
    }

    pub fn raw(self) -> u8 {
        self.0
    }

    /// CHIP_RDYn is low once the crystal runs
    pub fn chip_ready(self) -> bool {
        self.0 & STATUS_CHIP_RDYN == 0
    }

    pub fn state(self) -> HwState {
        HwState::from_bits((self.0 & STATUS_STATE_MASK) >> STATUS_STATE_SHIFT)
    }

    /// Bytes available in the RX FIFO (read access) or free in the TX FIFO
    /// (write access), saturated at 15
    pub fn fifo_bytes(self) -> u8 {
        self.0 & STATUS_FIFO_MASK
    }
}

bitflags! {
    /// PKTSTATUS register
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PktStatus: u8 {
        const CRC_OK = 0x80;
        const CARRIER_SENSE = 0x40;
        const PQT_REACHED = 0x20;
        const CLEAR_CHANNEL = 0x10;
        const SYNC_FOUND = 0x08;
        const GDO2 = 0x04;
        const GDO0 = 0x01;
    }
}

/// MARCSTATE readout: the main radio control state machine, finer grained than
/// the status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarcState(pub u8);

impl MarcState {
    pub fn name(self) -> &'static str {
        match self.0 & MARCSTATE_MASK {
            0x00 => "SLEEP",
            0x01 => "IDLE",
            0x02 => "XOFF",
            0x03 => "VCOON_MC",
            0x04 => "REGON_MC",
            0x05 => "MANCAL",
            0x06 => "VCOON",
            0x07 => "REGON",
            0x08 => "STARTCAL",
            0x09 => "BWBOOST",
            0x0A => "FS_LOCK",
            0x0B => "IFADCON",
            0x0C => "ENDCAL",
            0x0D => "RX",
            0x0E => "RX_END",
            0x0F => "RX_RST",
            0x10 => "TXRX_SWITCH",
            0x11 => "RXFIFO_OVERFLOW",
            0x12 => "FSTXON",
            0x13 => "TX",
            0x14 => "TX_END",
            0x15 => "RXTX_SWITCH",
            0x16 => "TXFIFO_UNDERFLOW",
            _ => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for MarcState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (0x{:02X})", self.name(), self.0 & MARCSTATE_MASK)
    }
}

/// Register level access to the chip
pub struct Bus<H> {
    hal: H,
}

impl<H: Hal> Bus<H> {
    pub fn new(hal: H) -> Self {
        Self { hal }
    }

    pub fn hal_mut(&mut self) -> &mut H {
        &mut self.hal
    }

    // Status registers share their addresses with the strobes and are only
    // reachable with the burst bit set.
    fn read_header(addr: u8, burst: bool) -> u8 {
        let addr = addr & ADDRESS_MASK;
        let mut header = ACCESS_READ | addr;
        if burst || (STROBE_SRES..=STROBE_SNOP).contains(&addr) {
            header |= ACCESS_BURST;
        }
        header
    }

    /// Read a single register
    pub fn read(&mut self, addr: u8) -> Result<(ChipStatus, u8), HalError> {
        let mut buf = [Self::read_header(addr, false), 0];
        self.hal.transfer(&mut buf)?;
        Ok((ChipStatus(buf[0]), buf[1]))
    }

    /// Read a register until two consecutive reads return the same value
    pub fn read_reliable(&mut self, addr: u8) -> Result<(ChipStatus, u8), HalError> {
        let (_, mut previous) = self.read(addr)?;
        loop {
            let (status, value) = self.read(addr)?;
            if value == previous {
                return Ok((status, value));
            }
            trace!("CC110x: racy read of 0x{:02X}: 0x{:02X} != 0x{:02X}", addr, value, previous);
            previous = value;
        }
    }

    /// Write a single register
    pub fn write(&mut self, addr: u8, value: u8) -> Result<ChipStatus, HalError> {
        let mut buf = [addr & ADDRESS_MASK, value];
        self.hal.transfer(&mut buf)?;
        Ok(ChipStatus(buf[0]))
    }

    /// Read `out.len()` bytes starting at `addr` (FIFO reads stay on the FIFO)
    pub fn burst_read(&mut self, addr: u8, out: &mut [u8]) -> Result<ChipStatus, HalError> {
        let mut buf = vec![0u8; out.len() + 1];
        buf[0] = Self::read_header(addr, true);
        self.hal.transfer(&mut buf)?;
        out.copy_from_slice(&buf[1..]);
        trace!("CC110x: burst read 0x{:02X}: {}", addr & ADDRESS_MASK, hex::encode(out));
        Ok(ChipStatus(buf[0]))
    }

    /// Write `data` starting at `addr`
    pub fn burst_write(&mut self, addr: u8, data: &[u8]) -> Result<ChipStatus, HalError> {
        let mut buf = Vec::with_capacity(data.len() + 1);
        buf.push(ACCESS_BURST | (addr & ADDRESS_MASK));
        buf.extend_from_slice(data);
        trace!("CC110x: burst write 0x{:02X}: {}", addr & ADDRESS_MASK, hex::encode(data));
        self.hal.transfer(&mut buf)?;
        Ok(ChipStatus(buf[0]))
    }

    /// Issue a command strobe
    pub fn command(&mut self, strobe: u8) -> Result<ChipStatus, HalError> {
        let mut buf = [strobe & ADDRESS_MASK];
        self.hal.transfer(&mut buf)?;
        Ok(ChipStatus(buf[0]))
    }

    /// Current status byte (SNOP, repeated until two consecutive reads agree)
    pub fn status(&mut self) -> Result<ChipStatus, HalError> {
        let mut previous = self.command(STROBE_SNOP)?;
        loop {
            let status = self.command(STROBE_SNOP)?;
            if status == previous {
                return Ok(status);
            }
            previous = status;
        }
    }

    /// Bring the chip out of power down
    pub fn wake(&mut self) -> Result<(), HalError> {
        self.hal.wake()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        sent: Vec<Vec<u8>>,
        replies: std::collections::VecDeque<u8>,
    }

    impl Hal for Recorder {
        fn transfer(&mut self, buf: &mut [u8]) -> Result<(), HalError> {
            self.sent.push(buf.to_vec());
            for b in buf.iter_mut().skip(1) {
                *b = self.replies.pop_front().unwrap_or(0);
            }
            buf[0] = 0x0F;
            Ok(())
        }

        fn wake(&mut self) -> Result<(), HalError> {
            Ok(())
        }
    }

    #[test]
    fn test_status_decode() {
        let status = ChipStatus(0x1F);
        assert!(status.chip_ready());
        assert_eq!(status.state(), HwState::Rx);
        assert_eq!(status.fifo_bytes(), 15);

        let status = ChipStatus(0xE0);
        assert!(!status.chip_ready());
        assert_eq!(status.state(), HwState::RxFifoOverflow);

        assert_eq!(ChipStatus::new(true, HwState::Tx, 40).raw(), 0x2F);
        assert_eq!(ChipStatus::new(true, HwState::TxFifoUnderflow, 0).state(), HwState::TxFifoUnderflow);
    }

    #[test]
    fn test_header_bits() {
        let mut bus = Bus::new(Recorder::default());
        bus.read(REG_CHANNR).unwrap();
        bus.read(REG_RXBYTES).unwrap();
        bus.write(REG_ADDR, 0x42).unwrap();
        bus.command(STROBE_SIDLE).unwrap();
        bus.burst_write(REG_PATABLE, &[1, 2, 3]).unwrap();
        let mut out = [0u8; 2];
        bus.burst_read(REG_FIFO, &mut out).unwrap();

        let sent = &bus.hal_mut().sent;
        assert_eq!(sent[0], vec![0x8A, 0x00]);
        assert_eq!(sent[1], vec![0xFB, 0x00]);
        assert_eq!(sent[2], vec![0x09, 0x42]);
        assert_eq!(sent[3], vec![0x36]);
        assert_eq!(sent[4], vec![0x7E, 1, 2, 3]);
        assert_eq!(sent[5], vec![0xFF, 0, 0]);
    }

    #[test]
    fn test_read_reliable_waits_for_agreement() {
        let mut hal = Recorder::default();
        hal.replies.extend([5, 7, 9, 9]);
        let mut bus = Bus::new(hal);
        let (_, value) = bus.read_reliable(REG_RXBYTES).unwrap();
        assert_eq!(value, 9);
        assert_eq!(bus.hal_mut().sent.len(), 4);
    }

    #[test]
    fn test_marcstate_names() {
        assert_eq!(MarcState(0x0D).name(), "RX");
        assert_eq!(MarcState(0x16).name(), "TXFIFO_UNDERFLOW");
        assert_eq!(MarcState(0x01).to_string(), "IDLE (0x01)");
    }
}
