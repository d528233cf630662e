//! # Frequency Synthesizer Calibration
//!
//! The chip runs without automatic calibration. Every channel of the active
//! map is calibrated once after a configuration change and the results are
//! kept in a [`CalibrationCache`]: FSCAL1 depends on the channel, FSCAL2 and
//! FSCAL3 do not. Hops upload the cached bytes instead of calibrating again.
//!
//! Calibration is not visible on the signal lines, so completion is polled
//! through the status byte with the bus released during the settle time.

use crate::constants::*;
use crate::error::Cc110xError;
use crate::radio::bus::HwState;
use crate::radio::channel::ChannelMap;
use crate::radio::device::{Cc110x, Core};
use crate::radio::hal::Hal;
use crate::radio::retry::{Attempt, Retry};
use crate::radio::state::State;
use log::{debug, error, trace};
use std::sync::Arc;
use std::time::Duration;

/// Cached synthesizer calibration results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CalibrationCache {
    /// FSCAL1 per virtual channel
    pub fscal1: [u8; MAX_CHANNELS],
    pub fscal2: u8,
    pub fscal3: u8,
}

impl CalibrationCache {
    /// Store a FSCAL3, FSCAL2, FSCAL1 readout taken on `channel`
    pub fn store(&mut self, channel: u8, fscal: [u8; 3]) {
        self.fscal3 = fscal[0];
        self.fscal2 = fscal[1];
        if let Some(slot) = self.fscal1.get_mut(channel as usize) {
            *slot = fscal[2];
        }
    }

    /// FSCAL3, FSCAL2, FSCAL1 for `channel`, in register order
    pub fn registers(&self, channel: u8) -> [u8; 3] {
        let fscal1 = self.fscal1.get(channel as usize).copied().unwrap_or(0);
        [self.fscal3, self.fscal2, fscal1]
    }
}

impl<H> Core<H> {
    /// Fall back to idle after a failed calibration. Only a device still
    /// marked as calibrating is touched: the state may have moved on while
    /// the bus was released.
    pub(crate) fn abandon_calibration(&mut self) {
        if self.state() == State::Calibrating {
            self.set_state(State::Idle);
        }
    }
}

impl<H: Hal> Cc110x<H> {
    /// Calibrate the channel currently in CHANNR and cache the result for
    /// virtual channel `channel`. Loops until the chip reports idle again.
    pub(crate) async fn recalibrate(&self, channel: u8) -> Result<(), Cc110xError> {
        Retry::unbounded("calibration", Duration::ZERO)
            .run(move |attempt| async move {
                if attempt > 0 {
                    debug!("CC110x: calibration of channel {} still running, retrying", channel);
                }
                self.lock().await.bus.command(STROBE_SCAL)?;
                tokio::time::sleep(CALIBRATION_SETTLE).await;

                let mut core = self.lock().await;
                if core.bus.status()?.state() != HwState::Idle {
                    return Ok(Attempt::Again);
                }
                let mut fscal = [0u8; 3];
                core.bus.burst_read(REG_FSCAL3, &mut fscal)?;
                core.cal.store(channel, fscal);
                trace!("CC110x: channel {} calibrated: {}", channel, hex::encode(fscal));
                Ok::<_, Cc110xError>(Attempt::Done(()))
            })
            .await
    }

    /// Calibrate every channel of the active map, then return to the
    /// previous channel and listen.
    pub async fn full_calibration(&self) -> Result<(), Cc110xError> {
        let (channel, chanmap) = {
            let mut core = self.lock().await;
            let state = core.state();
            if !state.can_calibrate() {
                return Err(Cc110xError::TryAgain(format!(
                    "cannot calibrate in state {}",
                    state
                )));
            }
            core.irq.disable();
            core.set_state(State::Calibrating);
            (core.channel, core.chanmap.clone())
        };
        self.calibrate_and_restore(channel, chanmap).await
    }

    /// Body of a full calibration; the caller already moved the device to
    /// `Calibrating` with the signal lines masked.
    pub(crate) async fn calibrate_and_restore(
        &self,
        channel: u8,
        chanmap: Arc<ChannelMap>,
    ) -> Result<(), Cc110xError> {
        if let Err(err) = self.calibrate_channels(&chanmap).await {
            error!("CC110x: calibration failed: {}", err);
            self.lock().await.abandon_calibration();
            return Err(err);
        }

        let mut core = self.lock().await;
        if let Err(err) = core.tune(channel) {
            core.abandon_calibration();
            return Err(err);
        }
        debug!("CC110x: {} channels calibrated", chanmap.len());
        Ok(())
    }

    async fn calibrate_channels(&self, chanmap: &ChannelMap) -> Result<(), Cc110xError> {
        for (channel, physical) in chanmap.channels() {
            {
                let mut core = self.lock().await;
                core.bus.command(STROBE_SIDLE)?;
                core.bus.write(REG_CHANNR, physical)?;
            }
            self.recalibrate(channel).await?;
        }
        Ok(())
    }

    /// Cached calibration values
    pub async fn calibration(&self) -> CalibrationCache {
        self.lock().await.cal
    }
}
