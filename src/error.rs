//! # CC110x Error Handling
//!
//! This module defines the `Cc110xError` enum, which represents the error
//! conditions the driver reports to its caller.
//!
//! Hardware-transient link-layer conditions (FIFO overflow/underflow, CRC
//! failures, framing errors) never show up here: the engine recovers from them
//! locally and at most emits a `RadioEvent`.

use crate::radio::hal::HalError;
use crate::radio::retry::Exhausted;
use thiserror::Error;

/// Represents the different error types that can occur in the CC110x driver.
#[derive(Debug, Error)]
pub enum Cc110xError {
    /// A parameter was malformed; detected before touching hardware.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A channel or power level is outside the supported bounds, or the
    /// channel is marked unsupported in the active channel map.
    #[error("Out of range: {0}")]
    Range(String),

    /// The current device state does not permit the operation right now.
    #[error("Try again: {0}")]
    TryAgain(String),

    /// A frame is being received or transmitted.
    #[error("Device busy with a transfer")]
    Busy,

    /// The frame does not fit the length field.
    #[error("Frame too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    /// The caller's buffer cannot hold the pending frame.
    #[error("Buffer too small: frame has {needed} bytes, buffer holds {available}")]
    NoSpace { needed: usize, available: usize },

    /// A bus transaction sequence did not reach the expected hardware state.
    #[error("Communication error: {0}")]
    Io(String),

    /// One-shot bus fault reported by the HAL.
    #[error("HAL error: {0}")]
    Hal(#[from] HalError),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Cc110xError {
    /// True for conditions the caller is expected to retry later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Cc110xError::TryAgain(_) | Cc110xError::Busy)
    }
}

impl From<Exhausted> for Cc110xError {
    fn from(err: Exhausted) -> Self {
        Cc110xError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Cc110xError {
    fn from(err: serde_json::Error) -> Self {
        Cc110xError::Config(err.to_string())
    }
}

impl From<std::io::Error> for Cc110xError {
    fn from(err: std::io::Error) -> Self {
        Cc110xError::Config(err.to_string())
    }
}
