//! # Transceiver Trait
//!
//! The operations generic network glue needs from a packet radio, so code
//! above the driver does not depend on the concrete chip or its HAL.

use crate::error::Cc110xError;
use crate::radio::device::Cc110x;
use crate::radio::frame::Frame;
use crate::radio::hal::Hal;
use crate::radio::irq::GdoLine;
use crate::radio::state::State;
use async_trait::async_trait;

#[async_trait]
pub trait Transceiver: Send + Sync {
    /// Layer 2 address of this station
    fn address(&self) -> u8;

    /// Current state machine state
    fn state(&self) -> State;

    /// Transmit a frame, returning its size
    async fn send(&self, frame: &Frame) -> Result<usize, Cc110xError>;

    /// Copy a pending frame's payload into `buf`; 0 if none is pending
    async fn recv(&self, buf: &mut [u8]) -> Result<usize, Cc110xError>;

    async fn set_channel(&self, channel: u8) -> Result<(), Cc110xError>;

    async fn sleep(&self) -> Result<(), Cc110xError>;

    async fn wakeup(&self) -> Result<(), Cc110xError>;

    /// Interrupt worker entry point
    async fn handle_irq(&self, line: GdoLine) -> Result<(), Cc110xError>;
}

#[async_trait]
impl<H: Hal + 'static> Transceiver for Cc110x<H> {
    fn address(&self) -> u8 {
        Cc110x::address(self)
    }

    fn state(&self) -> State {
        Cc110x::state(self)
    }

    async fn send(&self, frame: &Frame) -> Result<usize, Cc110xError> {
        Cc110x::send(self, frame).await
    }

    async fn recv(&self, buf: &mut [u8]) -> Result<usize, Cc110xError> {
        Cc110x::recv(self, buf).await
    }

    async fn set_channel(&self, channel: u8) -> Result<(), Cc110xError> {
        Cc110x::set_channel(self, channel).await
    }

    async fn sleep(&self) -> Result<(), Cc110xError> {
        Cc110x::sleep(self).await
    }

    async fn wakeup(&self) -> Result<(), Cc110xError> {
        Cc110x::wakeup(self).await
    }

    async fn handle_irq(&self, line: GdoLine) -> Result<(), Cc110xError> {
        Cc110x::handle_irq(self, line).await
    }
}
