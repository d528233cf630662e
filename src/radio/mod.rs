//! # CC110x Radio Driver
//!
//! Layered leaves first:
//!
//! - [`hal`]: SPI transfer and wake up, simulated chip, Raspberry Pi backend
//! - [`bus`]: register, FIFO and strobe access, status byte decoding
//! - [`calibration`], [`channel`]: synthesizer calibration cache, channel map
//!   and band configuration
//! - [`rx_tx`]: the packet state machine, CCA and FIFO streaming
//! - [`power`], [`wor`]: sleep, wake up, TX power, wake-on-radio polling
//! - [`device`], [`irq`]: the device coordinator, bus lock and interrupt
//!   handoff

pub mod bus;
pub mod calibration;
pub mod channel;
pub mod device;
pub mod frame;
pub mod hal;
pub mod irq;
pub mod params;
pub mod power;
pub mod retry;
pub mod rx_tx;
pub mod state;
pub mod transceiver;
pub mod wor;

pub use bus::{ChipStatus, HwState, MarcState, PktStatus};
pub use calibration::CalibrationCache;
pub use channel::{BandConfig, ChannelMap};
pub use device::{Cc110x, DropReason, RadioEvent, RadioStats, TxFailure};
pub use frame::{Frame, FrameBuffer, RxFrame, RxInfo};
pub use irq::{GdoLine, IrqHandle, IrqWorker};
pub use params::{CcaConfig, Cc110xParams};
pub use power::{PaTable, TxPower};
pub use state::State;
pub use transceiver::Transceiver;
pub use wor::WorSettings;
