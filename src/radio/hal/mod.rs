//! # Hardware Abstraction Layer for the CC110x
//!
//! The CC110x is driven entirely over SPI: every transfer starts with a header
//! byte (read/burst flags plus a 6-bit address) and the chip answers each
//! clocked byte, the first one being its status byte. The HAL therefore only
//! needs a full-duplex transfer and a way to wake the chip from power down.
//!
//! Interrupt lines (GDO0/GDO2) are not part of this trait: platform code
//! forwards their edges through an [`IrqHandle`](crate::radio::irq::IrqHandle).

use thiserror::Error;

/// Errors that can occur during HAL operations
#[derive(Debug, Error)]
pub enum HalError {
    #[error("SPI communication error")]
    Spi,

    #[error("GPIO operation error")]
    Gpio,

    #[error("Timeout waiting for operation")]
    Timeout,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Hardware Abstraction Layer trait for CC110x radio control
pub trait Hal: Send {
    /// Clock `buf` out with chip select asserted, replacing it in place with
    /// the bytes clocked in. `buf[0]` is the header byte on the way out and
    /// the chip status byte on the way back.
    fn transfer(&mut self, buf: &mut [u8]) -> Result<(), HalError>;

    /// Assert chip select and wait until the chip pulls SO low, which brings
    /// it out of power down.
    fn wake(&mut self) -> Result<(), HalError>;
}

impl<T: Hal + ?Sized> Hal for Box<T> {
    fn transfer(&mut self, buf: &mut [u8]) -> Result<(), HalError> {
        (**self).transfer(buf)
    }

    fn wake(&mut self) -> Result<(), HalError> {
        (**self).wake()
    }
}

// Simulated chip for tests and host-side development
pub mod mock;

// Platform implementations
#[cfg(feature = "raspberry-pi")]
pub mod raspberry_pi;

pub use mock::MockChip;

#[cfg(feature = "raspberry-pi")]
pub use raspberry_pi::{RaspberryPiHal, RpiHalConfig};
