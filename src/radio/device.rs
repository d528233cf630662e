//! # CC110x Device Coordinator
//!
//! [`Cc110x`] owns one transceiver. All mutable device data lives in [`Core`]
//! behind a `tokio::sync::Mutex`, which doubles as the bus lock: whoever holds
//! the guard owns the SPI bus and the chip. Waits (calibration settle time,
//! wake up, CCA backoff) always happen with the guard dropped.
//!
//! The driver state is mirrored in an atomic so [`Cc110x::state`] never
//! waits for the bus. Events produced while the bus is held are returned out
//! of the locked section and only sent once the guard is gone, so an
//! application reacting to an event can call straight back into the driver.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cc110x_rs::{Cc110x, Cc110xParams, Frame, IrqWorker, MockChip, RadioEvent};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), cc110x_rs::Cc110xError> {
//! let radio = Arc::new(Cc110x::setup(MockChip::new(), Cc110xParams::default())?);
//! let mut events = radio.take_events().expect("first call");
//! radio.init().await?;
//! let _worker = IrqWorker::spawn(radio.clone());
//!
//! radio.send(&Frame::broadcast(0x01, &b"hello"[..])).await?;
//! while let Some(event) = events.recv().await {
//!     if let RadioEvent::FrameReady { len } = event {
//!         let mut buf = vec![0u8; len];
//!         radio.recv(&mut buf).await?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use crate::constants::*;
use crate::error::Cc110xError;
use crate::logging::LogThrottle;
use crate::radio::bus::{Bus, HwState, MarcState};
use crate::radio::calibration::CalibrationCache;
use crate::radio::channel::{BandConfig, ChannelMap};
use crate::radio::frame::{FrameBuffer, RxInfo};
use crate::radio::hal::Hal;
use crate::radio::irq::{GdoLine, IrqGate, IrqHandle, IRQ_QUEUE_DEPTH};
use crate::radio::params::Cc110xParams;
use crate::radio::power::{PaTable, TxPower};
use crate::radio::retry::{Attempt, Retry};
use crate::radio::state::State;
use log::{debug, error, info, trace, warn};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, MutexGuard};

/// Why a received frame was thrown away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// RX FIFO overflow
    Overflow,
    /// CRC check failed
    Crc,
    /// Length byte and received bytes disagree
    Framing,
}

/// Why a transmission failed after it was started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxFailure {
    /// TX FIFO ran dry before the frame was complete
    Underflow,
    /// Chip left TX in an unexpected state
    Aborted,
}

/// Notifications from the driver to the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioEvent {
    /// A frame with `len` payload bytes waits for [`Cc110x::recv`]
    FrameReady { len: usize },
    TxComplete,
    TxFailed(TxFailure),
    FrameDropped(DropReason),
    ChannelChanged(u8),
}

/// Link statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RadioStats {
    pub frames_received: u32,
    pub crc_failures: u32,
    pub framing_errors: u32,
    pub rx_overflows: u32,
    pub tx_underflows: u32,
    pub frames_sent: u32,
    pub tx_failures: u32,
    pub cca_busy: u32,
}

/// Mutable device data, only reachable through the bus lock
pub(crate) struct Core<H> {
    pub(crate) bus: Bus<H>,
    state: State,
    state_mirror: Arc<AtomicU8>,
    pub(crate) channel: u8,
    pub(crate) tx_power: TxPower,
    pub(crate) pa_table: PaTable,
    pub(crate) address: u8,
    pub(crate) chanmap: Arc<ChannelMap>,
    pub(crate) config: Option<BandConfig>,
    pub(crate) buf: FrameBuffer,
    pub(crate) rx_info: RxInfo,
    pub(crate) rssi_offset: i16,
    pub(crate) cal: CalibrationCache,
    pub(crate) stats: RadioStats,
    pub(crate) irq: Arc<IrqGate>,
}

impl<H> Core<H> {
    pub(crate) fn state(&self) -> State {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: State) {
        if self.state != state {
            trace!("CC110x: {} -> {}", self.state, state);
        }
        self.state = state;
        self.state_mirror.store(state as u8, Ordering::Release);
    }
}

/// A CC1100/CC1101 transceiver
pub struct Cc110x<H> {
    core: Mutex<Core<H>>,
    state: Arc<AtomicU8>,
    address: AtomicU8,
    params: Cc110xParams,
    irq: Arc<IrqGate>,
    events_tx: mpsc::Sender<RadioEvent>,
    events_rx: std::sync::Mutex<Option<mpsc::Receiver<RadioEvent>>>,
    irq_rx: std::sync::Mutex<Option<mpsc::Receiver<GdoLine>>>,
    throttle: std::sync::Mutex<LogThrottle>,
}

impl<H: Hal> Cc110x<H> {
    /// Bind parameters to a HAL. The chip is not touched; the device starts
    /// out `Off` until [`init`](Self::init).
    pub fn setup(hal: H, params: Cc110xParams) -> Result<Self, Cc110xError> {
        params.validate()?;

        let (irq_tx, irq_rx) = mpsc::channel(IRQ_QUEUE_DEPTH);
        let (events_tx, events_rx) = mpsc::channel(params.event_queue_depth);
        let irq = Arc::new(IrqGate::new(irq_tx));
        let state = Arc::new(AtomicU8::new(State::Off as u8));

        let core = Core {
            bus: Bus::new(hal),
            state: State::Off,
            state_mirror: state.clone(),
            channel: params.channel,
            tx_power: params.tx_power,
            pa_table: params.pa_table,
            address: params.address,
            chanmap: Arc::new(params.channel_map),
            config: params.config,
            buf: FrameBuffer::new(),
            rx_info: RxInfo::default(),
            rssi_offset: params.rssi_offset,
            cal: CalibrationCache::default(),
            stats: RadioStats::default(),
            irq: irq.clone(),
        };

        debug!(
            "CC110x: set up address 0x{:02X}, channel {}",
            params.address, params.channel
        );

        Ok(Self {
            core: Mutex::new(core),
            state,
            address: AtomicU8::new(params.address),
            params,
            irq,
            events_tx,
            events_rx: std::sync::Mutex::new(Some(events_rx)),
            irq_rx: std::sync::Mutex::new(Some(irq_rx)),
            throttle: std::sync::Mutex::new(LogThrottle::new(1000, 5)),
        })
    }

    /// Acquire the bus
    pub(crate) async fn lock(&self) -> MutexGuard<'_, Core<H>> {
        self.core.lock().await
    }

    /// Best effort event delivery; never called with the bus held
    pub(crate) fn emit(&self, event: RadioEvent) {
        trace!("CC110x: event {:?}", event);
        if self.events_tx.try_send(event).is_err() {
            let allow = self
                .throttle
                .lock()
                .map(|mut throttle| throttle.allow())
                .unwrap_or(true);
            if allow {
                warn!("CC110x: event queue full or closed, {:?} dropped", event);
            }
        }
    }

    /// Event receiver; `None` after the first call
    pub fn take_events(&self) -> Option<mpsc::Receiver<RadioEvent>> {
        self.events_rx.lock().ok().and_then(|mut rx| rx.take())
    }

    pub(crate) fn take_irq_receiver(&self) -> Option<mpsc::Receiver<GdoLine>> {
        self.irq_rx.lock().ok().and_then(|mut rx| rx.take())
    }

    /// Handle for the interrupt callbacks of GDO0/GDO2
    pub fn irq_handle(&self) -> IrqHandle {
        IrqHandle::new(self.irq.clone())
    }

    pub fn params(&self) -> &Cc110xParams {
        &self.params
    }

    /// Current driver state, readable without the bus
    pub fn state(&self) -> State {
        State::from_u8(self.state.load(Ordering::Acquire)).unwrap_or(State::Off)
    }

    /// Layer 2 address
    pub fn address(&self) -> u8 {
        self.address.load(Ordering::Acquire)
    }

    /// Reset the chip, upload the register set and start listening on the
    /// configured channel.
    pub async fn init(&self) -> Result<(), Cc110xError> {
        {
            let mut core = self.lock().await;
            core.irq.disable();
            if core.state() == State::Off {
                core.bus.wake()?;
            }
            core.bus.command(STROBE_SRES)?;
        }
        tokio::time::sleep(RESET_SETTLE).await;
        self.wait_ready("reset").await?;

        let chanmap = {
            let mut core = self.lock().await;
            Self::check_chip(&mut core)?;
            Self::upload_base(&mut core)?;
            core.cal = CalibrationCache::default();
            core.buf.reset();
            core.set_state(State::Idle);
            core.chanmap.clone()
        };

        self.apply_config(self.params.config, chanmap, self.params.channel)
            .await?;
        info!(
            "CC110x: initialised, address 0x{:02X}, listening on channel {}",
            self.address(),
            self.params.channel
        );
        Ok(())
    }

    fn check_chip(core: &mut Core<H>) -> Result<(), Cc110xError> {
        let (_, partnum) = core.bus.read(REG_PARTNUM)?;
        let (_, version) = core.bus.read(REG_VERSION)?;
        if partnum != CHIP_PARTNUM || !CHIP_VERSIONS.contains(&version) {
            error!(
                "CC110x: unexpected chip, PARTNUM 0x{:02X} VERSION 0x{:02X}",
                partnum, version
            );
            return Err(Cc110xError::Io(format!(
                "unsupported chip (PARTNUM 0x{:02X}, VERSION 0x{:02X})",
                partnum, version
            )));
        }
        debug!("CC110x: found CC1101 version 0x{:02X}", version);
        Ok(())
    }

    fn upload_base(core: &mut Core<H>) -> Result<(), Cc110xError> {
        core.bus.burst_write(REG_IOCFG2, &BASE_CONFIG)?;
        let mut readback = [0u8; CONFIG_REGISTER_COUNT];
        core.bus.burst_read(REG_IOCFG2, &mut readback)?;
        if readback != BASE_CONFIG {
            return Err(Cc110xError::Io("base configuration read back mismatch".into()));
        }

        let address = core.address;
        core.bus.write(REG_ADDR, address)?;
        core.upload_pa()
    }

    /// Poll until the crystal runs and the chip idles
    pub(crate) async fn wait_ready(&self, what: &'static str) -> Result<(), Cc110xError> {
        Retry::bounded(what, READY_POLLS, READY_POLL_DELAY)
            .run(move |_| async move {
                let status = self.lock().await.bus.status()?;
                let ready = status.chip_ready() && status.state() == HwState::Idle;
                Ok::<_, Cc110xError>(if ready { Attempt::Done(()) } else { Attempt::Again })
            })
            .await
    }

    /// Change the hardware address filter. 0x00 is the broadcast address.
    pub async fn set_address(&self, address: u8) -> Result<(), Cc110xError> {
        if address == BROADCAST_ADDRESS {
            return Err(Cc110xError::InvalidArgument(
                "address 0x00 is reserved for broadcast".into(),
            ));
        }
        let mut core = self.lock().await;
        let state = core.state();
        if !matches!(state, State::Idle | State::Listening) {
            return Err(Cc110xError::TryAgain(format!(
                "cannot change address in state {}",
                state
            )));
        }
        core.bus.write(REG_ADDR, address)?;
        core.address = address;
        self.address.store(address, Ordering::Release);
        debug!("CC110x: address 0x{:02X}", address);
        Ok(())
    }

    /// Signal quality of the last received frame
    pub async fn rx_info(&self) -> RxInfo {
        self.lock().await.rx_info
    }

    pub async fn stats(&self) -> RadioStats {
        self.lock().await.stats
    }

    pub async fn reset_stats(&self) {
        self.lock().await.stats = RadioStats::default();
    }

    /// Copy of the frame buffer
    pub async fn frame_snapshot(&self) -> FrameBuffer {
        self.lock().await.buf.clone()
    }

    /// MARCSTATE readout
    pub async fn marc_state(&self) -> Result<MarcState, Cc110xError> {
        let (_, raw) = self.lock().await.bus.read(REG_MARCSTATE)?;
        Ok(MarcState(raw & MARCSTATE_MASK))
    }

    /// Run `f` on the HAL with the bus held
    pub async fn with_hal<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        f(self.lock().await.bus.hal_mut())
    }
}
