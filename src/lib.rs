//! # cc110x-rs - Async Driver for TI CC1100/CC1101 Sub-GHz Transceivers
//!
//! The cc110x-rs crate drives CC110x packet radios over SPI: it streams frames
//! larger than the 64 byte hardware FIFOs, hops between channels using cached
//! synthesizer calibration, performs clear channel assessment with randomized
//! backoff before sending and manages sleep, wake up and TX power.
//!
//! ## Features
//!
//! - Register level bus primitives with the racy status register work-around
//! - Virtual channel maps with per-channel calibration caching
//! - Interrupt driven RX/TX engine with FIFO threshold streaming
//! - CCA with bounded retries and jittered backoff
//! - Wake-on-radio low power polling
//! - Event channel towards the application, delivered outside the bus lock
//! - Simulated chip (`MockChip`) for tests, Raspberry Pi backend behind the
//!   `raspberry-pi` feature
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! cc110x-rs = "0.1.0"
//! ```
//!
//! ```rust
//! use cc110x_rs::{
//!     init_logger, Cc110x, Cc110xError, Cc110xParams, ChannelMap, Frame, MockChip,
//!     RadioEvent, State,
//! };
//! ```

pub mod constants;
pub mod device_manager;
pub mod error;
pub mod logging;
pub mod radio;

pub use crate::device_manager::Cc110xManager;
pub use crate::error::Cc110xError;
pub use crate::logging::{init_logger, init_logger_with_level, LogThrottle};

pub use radio::hal::{Hal, HalError, MockChip};
pub use radio::{
    BandConfig, Cc110x, Cc110xParams, CcaConfig, ChannelMap, DropReason, Frame, GdoLine,
    IrqHandle, IrqWorker, PaTable, RadioEvent, RadioStats, RxFrame, RxInfo, State, Transceiver,
    TxFailure, TxPower, WorSettings,
};
