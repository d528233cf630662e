//! # RX/TX Engine
//!
//! Frames are up to 256 bytes on air while the FIFOs hold 64, so both
//! directions stream: the FIFO threshold signal on GDO2 and the sync word
//! signal on GDO0 raise edges, each edge advances the state machine by one
//! step.
//!
//! ```text
//!  LISTENING --edge--> RECEIVING --complete, CRC ok--> FRAME_READY --recv--> LISTENING
//!                          |  \--overflow / CRC / framing error--------------> LISTENING
//!  send: CCA --clear--> TRANSMITTING --all queued--> TX_COMPLETING --idle--> LISTENING
//!                          \--underflow------------------------------------> LISTENING
//! ```
//!
//! While receiving, one byte is always left in the RX FIFO until the final
//! chunk: reading the FIFO empty while the chip still writes to it corrupts
//! the transfer.

use crate::constants::*;
use crate::error::Cc110xError;
use crate::radio::bus::{HwState, PktStatus};
use crate::radio::device::{Cc110x, Core, DropReason, RadioEvent, TxFailure};
use crate::radio::frame::{Frame, RxFrame, RxInfo};
use crate::radio::hal::Hal;
use crate::radio::irq::GdoLine;
use crate::radio::params::CcaConfig;
use crate::radio::retry::{Attempt, Retry};
use crate::radio::state::State;
use log::{debug, error, trace, warn};
use rand::Rng;
use std::time::Duration;

impl<H: Hal> Core<H> {
    /// Idle, flush RX, route the RX signals to the GDO lines and enter RX
    pub(crate) fn enter_listening(&mut self) -> Result<(), Cc110xError> {
        self.bus.command(STROBE_SIDLE)?;
        self.bus.command(STROBE_SFRX)?;
        self.bus.write(REG_IOCFG2, GDO_RX_THRESHOLD_OR_EOP)?;
        self.bus.write(REG_IOCFG0, GDO_SYNC_WORD)?;
        self.bus.command(STROBE_SRX)?;
        self.buf.reset();
        self.set_state(State::Listening);
        self.irq.enable();
        Ok(())
    }

    /// Best effort return to listening after a failed bus sequence
    pub(crate) fn recover(&mut self) {
        if let Err(err) = self.enter_listening() {
            error!("CC110x: recovery to listening failed: {}", err);
            self.irq.disable();
            self.set_state(State::Idle);
        }
    }

    fn drop_frame(&mut self, reason: DropReason) -> Result<Option<RadioEvent>, Cc110xError> {
        match reason {
            DropReason::Overflow => self.stats.rx_overflows += 1,
            DropReason::Crc => self.stats.crc_failures += 1,
            DropReason::Framing => self.stats.framing_errors += 1,
        }
        warn!("CC110x: frame dropped ({:?})", reason);
        self.enter_listening()?;
        Ok(Some(RadioEvent::FrameDropped(reason)))
    }

    /// One RX step: drain what the FIFO holds
    fn rx_continue(&mut self) -> Result<Option<RadioEvent>, Cc110xError> {
        let (_, rxbytes) = self.bus.read_reliable(REG_RXBYTES)?;
        if rxbytes & FIFO_ERROR_FLAG != 0 {
            self.set_state(State::RxOverflow);
            return self.drop_frame(DropReason::Overflow);
        }
        let mut in_fifo = (rxbytes & FIFO_COUNT_MASK) as usize;

        if self.buf.len == 0 {
            if in_fifo == 0 {
                trace!("CC110x: RX edge without data");
                self.set_state(State::Listening);
                return Ok(None);
            }
            let (_, len) = self.bus.read(REG_FIFO)?;
            in_fifo -= 1;
            if (len as usize) < L2_HEADER_SIZE {
                debug!("CC110x: length byte {} shorter than the header", len);
                return self.drop_frame(DropReason::Framing);
            }
            self.buf.len = len;
            self.buf.pos = 0;
        }

        let remaining = self.buf.remaining();
        if remaining > 0 && in_fifo > 0 {
            // Keep one byte in the FIFO unless this is the final chunk
            let count = if in_fifo >= remaining { remaining } else { in_fifo - 1 };
            if count > 0 {
                self.bus.burst_read(REG_FIFO, self.buf.slot(count))?;
                self.buf.advance(count);
            }
        }
        if !self.buf.is_complete() {
            return Ok(None);
        }

        if self.bus.status()?.state() == HwState::Rx {
            trace!("CC110x: frame read, chip still in RX");
            return Ok(None);
        }
        let (_, leftover) = self.bus.read_reliable(REG_RXBYTES)?;
        if leftover != 0 {
            debug!(
                "CC110x: {} bytes beyond the declared length {}",
                leftover & FIFO_COUNT_MASK,
                self.buf.len
            );
            return self.drop_frame(DropReason::Framing);
        }

        let (_, lqi) = self.bus.read_reliable(REG_LQI)?;
        let (_, rssi) = self.bus.read_reliable(REG_RSSI)?;
        self.set_state(State::FrameReady);
        if lqi & LQI_CRC_OK == 0 {
            return self.drop_frame(DropReason::Crc);
        }

        self.rx_info = RxInfo::from_raw(rssi, lqi, self.rssi_offset);
        self.stats.frames_received += 1;
        trace!(
            "CC110x: RX {} (RSSI {} half-dBm, LQI {})",
            hex::encode(&self.buf.data[..self.buf.len as usize]),
            self.rx_info.rssi,
            self.rx_info.lqi
        );
        Ok(Some(RadioEvent::FrameReady {
            len: self.buf.payload().len(),
        }))
    }

    fn tx_abort(&mut self, reason: TxFailure) -> Result<Option<RadioEvent>, Cc110xError> {
        if reason == TxFailure::Underflow {
            self.set_state(State::TxUnderflow);
            self.stats.tx_underflows += 1;
        }
        self.stats.tx_failures += 1;
        warn!("CC110x: transmission failed ({:?})", reason);
        self.bus.command(STROBE_SIDLE)?;
        self.bus.command(STROBE_SFTX)?;
        self.enter_listening()?;
        Ok(Some(RadioEvent::TxFailed(reason)))
    }

    /// One TX step: refill the FIFO
    fn tx_continue(&mut self) -> Result<Option<RadioEvent>, Cc110xError> {
        let (_, txbytes) = self.bus.read_reliable(REG_TXBYTES)?;
        if txbytes & FIFO_ERROR_FLAG != 0 {
            return self.tx_abort(TxFailure::Underflow);
        }
        let room = FIFO_SIZE.saturating_sub((txbytes & FIFO_COUNT_MASK) as usize);
        let count = room.min(self.buf.remaining());
        if count > 0 {
            self.bus.burst_write(REG_FIFO, self.buf.pending(count))?;
            self.buf.advance(count);
        }
        if self.buf.is_complete() {
            self.bus.write(REG_IOCFG2, GDO_SYNC_WORD)?;
            self.set_state(State::TxCompleting);
        }
        Ok(None)
    }

    /// Last bytes are queued; wait for the chip to finish
    fn tx_complete(&mut self) -> Result<Option<RadioEvent>, Cc110xError> {
        match self.bus.status()?.state() {
            HwState::Settling | HwState::Calibrate | HwState::Tx => Ok(None),
            HwState::Idle => {
                self.stats.frames_sent += 1;
                debug!("CC110x: frame of {} bytes sent", self.buf.len);
                self.enter_listening()?;
                Ok(Some(RadioEvent::TxComplete))
            }
            HwState::TxFifoUnderflow => self.tx_abort(TxFailure::Underflow),
            other => {
                debug!("CC110x: chip in {:?} while completing TX", other);
                self.tx_abort(TxFailure::Aborted)
            }
        }
    }

    fn step(&mut self, line: GdoLine) -> Result<Option<RadioEvent>, Cc110xError> {
        match self.state() {
            State::Listening => {
                self.set_state(State::Receiving);
                self.buf.reset();
                self.rx_continue()
            }
            State::Wor => {
                // The chip woke up and caught a sync word
                self.leave_wor()?;
                self.set_state(State::Receiving);
                self.buf.reset();
                let event = self.rx_continue()?;
                if self.state() == State::Listening {
                    self.enter_listening()?;
                }
                Ok(event)
            }
            State::Receiving => self.rx_continue(),
            State::Transmitting => self.tx_continue(),
            State::TxCompleting => self.tx_complete(),
            state => {
                trace!("CC110x: {:?} edge ignored in state {}", line, state);
                Ok(None)
            }
        }
    }

    /// Clear channel assessment with a fresh RSSI measurement
    fn channel_clear(&mut self, cca: &CcaConfig) -> Result<bool, Cc110xError> {
        // From FSTXON the synthesizer already runs and RX starts directly
        if self.state() != State::FastTxReady {
            self.bus.command(STROBE_SIDLE)?;
        }
        self.bus.command(STROBE_SRX)?;
        self.bus.write(REG_IOCFG2, GDO_CCA)?;
        Retry::bounded("RSSI valid", cca.rssi_valid_polls, Duration::ZERO).spin(|_| {
            let status = self.bus.status()?;
            Ok::<_, Cc110xError>(if status.state() == HwState::Rx {
                Attempt::Done(())
            } else {
                Attempt::Again
            })
        })?;
        let (_, pktstatus) = self.bus.read(REG_PKTSTATUS)?;
        Ok(PktStatus::from_bits_truncate(pktstatus).contains(PktStatus::CLEAR_CHANNEL))
    }

    fn enter_fast_tx(&mut self) -> Result<(), Cc110xError> {
        self.bus.command(STROBE_SIDLE)?;
        self.bus.command(STROBE_SFRX)?;
        self.bus.command(STROBE_SFSTXON)?;
        self.buf.reset();
        self.set_state(State::FastTxReady);
        Ok(())
    }

    /// Queue the first chunk of `frame` and strobe TX
    fn start_tx(&mut self, frame: &Frame) -> Result<(), Cc110xError> {
        self.bus.command(STROBE_SIDLE)?;
        self.bus.command(STROBE_SFTX)?;
        self.bus.command(STROBE_SFRX)?;
        self.buf.load(frame);

        let first = (FIFO_SIZE - 1).min(self.buf.len as usize);
        let mut chunk = Vec::with_capacity(first + 1);
        chunk.push(self.buf.len);
        chunk.extend_from_slice(self.buf.pending(first));
        self.bus.burst_write(REG_FIFO, &chunk)?;
        self.buf.advance(first);

        if self.buf.is_complete() {
            self.bus.write(REG_IOCFG2, GDO_SYNC_WORD)?;
            self.set_state(State::TxCompleting);
        } else {
            self.bus.write(REG_IOCFG2, GDO_TX_THRESHOLD)?;
            self.set_state(State::Transmitting);
        }
        self.bus.command(STROBE_STX)?;
        self.irq.enable();
        trace!("CC110x: TX {}", hex::encode(&self.buf.data[..self.buf.len as usize]));
        Ok(())
    }
}

impl<H: Hal> Cc110x<H> {
    /// Advance the state machine after an edge on `line`. Resulting events
    /// are delivered after the bus is released.
    pub async fn handle_irq(&self, line: GdoLine) -> Result<(), Cc110xError> {
        let event = {
            let mut core = self.lock().await;
            match core.step(line) {
                Ok(event) => {
                    if core.state().wants_irq() {
                        core.irq.enable();
                    }
                    event
                }
                Err(err) => {
                    core.recover();
                    return Err(err);
                }
            }
        };
        if let Some(event) = event {
            self.emit(event);
        }
        Ok(())
    }

    /// Transmit `frame` after a clear channel assessment. Returns the frame
    /// size (header plus payload); completion is reported by
    /// [`RadioEvent::TxComplete`].
    pub async fn send(&self, frame: &Frame) -> Result<usize, Cc110xError> {
        let size = frame.size();
        if size > MAX_FRAME_SIZE {
            return Err(Cc110xError::TooLarge {
                size,
                max: MAX_FRAME_SIZE,
            });
        }

        let cca = self.params().cca;
        for attempt in 1..=cca.max_attempts {
            {
                let mut core = self.lock().await;
                match core.state() {
                    State::Listening | State::Idle | State::FastTxReady => {}
                    state if state.is_transferring() => return Err(Cc110xError::Busy),
                    state => {
                        return Err(Cc110xError::TryAgain(format!(
                            "cannot send in state {}",
                            state
                        )))
                    }
                }
                core.irq.disable();

                let clear = match core.channel_clear(&cca) {
                    Ok(clear) => clear,
                    Err(err) => {
                        core.recover();
                        return Err(err);
                    }
                };
                if clear {
                    if let Err(err) = core.start_tx(frame) {
                        core.recover();
                        return Err(err);
                    }
                    debug!("CC110x: sending {} bytes to 0x{:02X}", size, frame.dest);
                    return Ok(size);
                }

                core.stats.cca_busy += 1;
                trace!("CC110x: channel busy (attempt {}/{})", attempt, cca.max_attempts);
                if let Err(err) = core.enter_listening() {
                    core.recover();
                    return Err(err);
                }
            }
            if attempt < cca.max_attempts {
                let jitter = rand::thread_rng().gen_range(Duration::ZERO..=cca.retry_delay());
                tokio::time::sleep(jitter).await;
            }
        }

        warn!(
            "CC110x: channel busy after {} CCA attempts",
            cca.max_attempts
        );
        Err(Cc110xError::TryAgain("channel busy".into()))
    }

    /// Start the synthesizer ahead of a transmission so the next
    /// [`send`](Self::send) goes on air sooner. The chip does not receive
    /// while prepared; `send`, [`set_channel`](Self::set_channel) and
    /// [`full_calibration`](Self::full_calibration) return it to listening.
    pub async fn prepare_tx(&self) -> Result<(), Cc110xError> {
        let mut core = self.lock().await;
        let state = core.state();
        match state {
            State::FastTxReady => return Ok(()),
            State::Idle | State::Listening => {}
            state if state.is_transferring() => return Err(Cc110xError::Busy),
            state => {
                return Err(Cc110xError::TryAgain(format!(
                    "cannot prepare TX in state {}",
                    state
                )))
            }
        }
        core.irq.disable();
        if let Err(err) = core.enter_fast_tx() {
            core.recover();
            return Err(err);
        }
        debug!("CC110x: synthesizer running, ready to send");
        Ok(())
    }

    /// Copy the payload of a pending frame into `buf` and resume listening.
    /// Returns 0 when no frame is pending. A buffer too small for the payload
    /// drops the frame.
    pub async fn recv(&self, buf: &mut [u8]) -> Result<usize, Cc110xError> {
        let mut core = self.lock().await;
        if core.state() != State::FrameReady {
            return Ok(0);
        }
        let len = core.buf.payload().len();
        if buf.len() < len {
            warn!("CC110x: receive buffer of {} bytes too small for {}", buf.len(), len);
            core.enter_listening()?;
            return Err(Cc110xError::NoSpace {
                needed: len,
                available: buf.len(),
            });
        }
        buf[..len].copy_from_slice(core.buf.payload());
        core.enter_listening()?;
        Ok(len)
    }

    /// Take the pending frame with its header and signal quality
    pub async fn recv_frame(&self) -> Result<Option<RxFrame>, Cc110xError> {
        let mut core = self.lock().await;
        if core.state() != State::FrameReady {
            return Ok(None);
        }
        let frame = core.buf.to_frame();
        let info = core.rx_info;
        core.enter_listening()?;
        Ok(Some(RxFrame { frame, info }))
    }
}
