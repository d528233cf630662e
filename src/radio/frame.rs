//! # Link Layer Frames
//!
//! Over-the-air layout (preamble, sync word and CRC are handled by the chip):
//!
//! ```text
//! byte 0     : length = payload length + 2
//! byte 1     : destination address (0x00 = broadcast)
//! byte 2     : source address
//! bytes 3..N : payload
//! ```
//!
//! [`FrameBuffer`] holds the frame currently streaming through the 64 byte
//! hardware FIFO. `len` is the value of the length byte, `pos` counts the
//! bytes after the length byte already moved; `pos == len` means the
//! transfer is complete.

use crate::constants::{BROADCAST_ADDRESS, L2_HEADER_SIZE, MAX_FRAME_SIZE};
use crate::error::Cc110xError;
use bytes::Bytes;

/// A link layer frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub dest: u8,
    pub src: u8,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(dest: u8, src: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            dest,
            src,
            payload: payload.into(),
        }
    }

    pub fn broadcast(src: u8, payload: impl Into<Bytes>) -> Self {
        Self::new(BROADCAST_ADDRESS, src, payload)
    }

    pub fn is_broadcast(&self) -> bool {
        self.dest == BROADCAST_ADDRESS
    }

    /// Header plus payload, i.e. the value of the length byte
    pub fn size(&self) -> usize {
        L2_HEADER_SIZE + self.payload.len()
    }

    /// Serialize including the length byte
    pub fn encode(&self) -> Result<Vec<u8>, Cc110xError> {
        let size = self.size();
        if size > MAX_FRAME_SIZE {
            return Err(Cc110xError::TooLarge {
                size,
                max: MAX_FRAME_SIZE,
            });
        }
        let mut out = Vec::with_capacity(size + 1);
        out.push(size as u8);
        out.push(self.dest);
        out.push(self.src);
        out.extend_from_slice(&self.payload);
        Ok(out)
    }

    /// Parse a frame starting with its length byte
    pub fn decode(raw: &[u8]) -> Result<Self, Cc110xError> {
        let (&len, rest) = raw
            .split_first()
            .ok_or_else(|| Cc110xError::InvalidArgument("empty frame".into()))?;
        let len = len as usize;
        if len < L2_HEADER_SIZE {
            return Err(Cc110xError::InvalidArgument(format!(
                "length byte {len} shorter than the header"
            )));
        }
        if rest.len() != len {
            return Err(Cc110xError::InvalidArgument(format!(
                "length byte says {len}, got {} bytes",
                rest.len()
            )));
        }
        Ok(Self::new(
            rest[0],
            rest[1],
            Bytes::copy_from_slice(&rest[L2_HEADER_SIZE..]),
        ))
    }
}

/// Frame currently moving between driver and FIFO
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    pub len: u8,
    pub pos: u8,
    pub data: [u8; MAX_FRAME_SIZE],
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self {
            len: 0,
            pos: 0,
            data: [0; MAX_FRAME_SIZE],
        }
    }
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.len = 0;
        self.pos = 0;
    }

    /// Load an outgoing frame; the caller checked the size
    pub fn load(&mut self, frame: &Frame) {
        let size = frame.size().min(MAX_FRAME_SIZE);
        self.data[0] = frame.dest;
        self.data[1] = frame.src;
        self.data[L2_HEADER_SIZE..size].copy_from_slice(&frame.payload[..size - L2_HEADER_SIZE]);
        self.len = size as u8;
        self.pos = 0;
    }

    pub fn remaining(&self) -> usize {
        (self.len - self.pos) as usize
    }

    pub fn is_complete(&self) -> bool {
        self.pos == self.len
    }

    /// Bytes moved so far
    pub fn filled(&self) -> &[u8] {
        &self.data[..self.pos as usize]
    }

    /// Next `count` bytes to be written to the FIFO
    pub fn pending(&self, count: usize) -> &[u8] {
        let start = self.pos as usize;
        let end = (start + count).min(self.len as usize);
        &self.data[start..end]
    }

    /// Slot for the next `count` bytes read from the FIFO
    pub fn slot(&mut self, count: usize) -> &mut [u8] {
        let start = self.pos as usize;
        let end = (start + count).min(self.len as usize);
        &mut self.data[start..end]
    }

    /// Mark `count` more bytes as transferred
    pub fn advance(&mut self, count: usize) {
        self.pos = (self.pos as usize + count).min(self.len as usize) as u8;
    }

    pub fn dest(&self) -> u8 {
        self.data[0]
    }

    pub fn src(&self) -> u8 {
        self.data[1]
    }

    /// Payload of a complete frame
    pub fn payload(&self) -> &[u8] {
        let len = self.len as usize;
        if len < L2_HEADER_SIZE {
            return &[];
        }
        &self.data[L2_HEADER_SIZE..len]
    }

    pub fn to_frame(&self) -> Frame {
        Frame::new(self.dest(), self.src(), Bytes::copy_from_slice(self.payload()))
    }
}

/// Signal quality of the last received frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RxInfo {
    /// Received signal strength in half dBm (raw register value minus the
    /// device RSSI offset)
    pub rssi: i16,
    /// Link quality estimate (lower is better)
    pub lqi: u8,
}

impl RxInfo {
    pub fn from_raw(rssi_raw: u8, lqi_raw: u8, rssi_offset: i16) -> Self {
        Self {
            rssi: rssi_raw as i8 as i16 - rssi_offset,
            lqi: lqi_raw & crate::constants::LQI_ESTIMATE_MASK,
        }
    }

    pub fn rssi_dbm(&self) -> i16 {
        self.rssi / 2
    }
}

/// A received frame together with its signal quality
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RxFrame {
    pub frame: Frame,
    pub info: RxInfo,
}
