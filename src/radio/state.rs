//! Driver state machine states
//!
//! The low nibble of the discriminant matches the main state field of the chip
//! status byte where a driver state corresponds to a hardware state, which
//! keeps the mapping visible in logs. States without a hardware counterpart
//! (frame ready, receiving, TX completing, wake-on-radio) use the remaining
//! values.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum State {
    Idle = 0x00,
    Listening = 0x01,
    Transmitting = 0x02,
    FastTxReady = 0x03,
    Calibrating = 0x04,
    Settling = 0x05,
    RxOverflow = 0x06,
    TxUnderflow = 0x07,
    FrameReady = 0x08,
    Receiving = 0x09,
    TxCompleting = 0x0A,
    /// Chip sleeps and polls RX on its own timer
    Wor = 0x0B,
    Off = 0x10,
}

impl State {
    pub fn from_u8(raw: u8) -> Option<Self> {
        Some(match raw {
            0x00 => State::Idle,
            0x01 => State::Listening,
            0x02 => State::Transmitting,
            0x03 => State::FastTxReady,
            0x04 => State::Calibrating,
            0x05 => State::Settling,
            0x06 => State::RxOverflow,
            0x07 => State::TxUnderflow,
            0x08 => State::FrameReady,
            0x09 => State::Receiving,
            0x0A => State::TxCompleting,
            0x0B => State::Wor,
            0x10 => State::Off,
            _ => return None,
        })
    }

    /// Calibration may be started deliberately
    pub fn can_calibrate(self) -> bool {
        matches!(self, State::Idle | State::Listening | State::FastTxReady)
    }

    /// Channel hops are allowed
    pub fn can_hop(self) -> bool {
        matches!(self, State::Idle | State::Listening | State::FastTxReady)
    }

    /// A frame is streaming to or from the FIFO, or waits for the consumer
    pub fn is_transferring(self) -> bool {
        matches!(
            self,
            State::Receiving | State::FrameReady | State::Transmitting | State::TxCompleting
        )
    }

    /// The signal lines carry edges the driver must handle in this state
    pub fn wants_irq(self) -> bool {
        matches!(
            self,
            State::Listening
                | State::Receiving
                | State::Transmitting
                | State::TxCompleting
                | State::Wor
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            State::Idle => "IDLE",
            State::Listening => "LISTENING",
            State::Transmitting => "TRANSMITTING",
            State::FastTxReady => "FAST_TX_READY",
            State::Calibrating => "CALIBRATING",
            State::Settling => "SETTLING",
            State::RxOverflow => "RX_OVERFLOW",
            State::TxUnderflow => "TX_UNDERFLOW",
            State::FrameReady => "FRAME_READY",
            State::Receiving => "RECEIVING",
            State::TxCompleting => "TX_COMPLETING",
            State::Wor => "WOR",
            State::Off => "OFF",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
