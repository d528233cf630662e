//! # Power and Lifecycle
//!
//! Sleep, wake up and TX power selection. The PATABLE is volatile: it is lost
//! in power down and uploaded again on wake up together with the selected
//! power level (FREND0.PA_POWER indexes the table).

use crate::constants::*;
use crate::error::Cc110xError;
use crate::radio::device::{Cc110x, Core, RadioEvent, TxFailure};
use crate::radio::hal::Hal;
use crate::radio::state::State;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Output power table, one PA setting per [`TxPower`] level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaTable(pub [u8; PATABLE_SIZE]);

impl PaTable {
    /// CC1101 868 MHz settings for -30, -20, -15, -10, 0, +5, +7 and +10 dBm
    pub const EU_868MHZ: PaTable = PaTable([0x03, 0x0F, 0x1E, 0x27, 0x50, 0x81, 0xCB, 0xC2]);

    /// CC1101 433 MHz settings for -30, -20, -15, -10, 0, +5, +7 and +10 dBm
    pub const ISM_433MHZ: PaTable = PaTable([0x12, 0x0E, 0x1D, 0x34, 0x60, 0x84, 0xC8, 0xC0]);

    pub fn entry(&self, power: TxPower) -> u8 {
        self.0[power.index()]
    }
}

impl Default for PaTable {
    fn default() -> Self {
        Self::EU_868MHZ
    }
}

/// TX power levels, in PATABLE order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum TxPower {
    Minus30Dbm = 0,
    Minus20Dbm = 1,
    Minus15Dbm = 2,
    Minus10Dbm = 3,
    Dbm0 = 4,
    Plus5Dbm = 5,
    Plus7Dbm = 6,
    Plus10Dbm = 7,
}

impl TxPower {
    pub const LEVELS: usize = PATABLE_SIZE;

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn dbm(self) -> i8 {
        match self {
            TxPower::Minus30Dbm => -30,
            TxPower::Minus20Dbm => -20,
            TxPower::Minus15Dbm => -15,
            TxPower::Minus10Dbm => -10,
            TxPower::Dbm0 => 0,
            TxPower::Plus5Dbm => 5,
            TxPower::Plus7Dbm => 7,
            TxPower::Plus10Dbm => 10,
        }
    }

    /// FREND0 value selecting this level
    pub fn frend0(self) -> u8 {
        FREND0_BASE | self as u8
    }
}

impl Default for TxPower {
    fn default() -> Self {
        TxPower::Dbm0
    }
}

impl TryFrom<u8> for TxPower {
    type Error = Cc110xError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        Ok(match level {
            0 => TxPower::Minus30Dbm,
            1 => TxPower::Minus20Dbm,
            2 => TxPower::Minus15Dbm,
            3 => TxPower::Minus10Dbm,
            4 => TxPower::Dbm0,
            5 => TxPower::Plus5Dbm,
            6 => TxPower::Plus7Dbm,
            7 => TxPower::Plus10Dbm,
            _ => {
                return Err(Cc110xError::Range(format!(
                    "TX power level {} outside 0..{}",
                    level,
                    TxPower::LEVELS
                )))
            }
        })
    }
}

impl From<TxPower> for u8 {
    fn from(power: TxPower) -> u8 {
        power as u8
    }
}

impl std::fmt::Display for TxPower {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:+} dBm", self.dbm())
    }
}

impl<H: Hal> Core<H> {
    /// Upload the PATABLE and select the configured level
    pub(crate) fn upload_pa(&mut self) -> Result<(), Cc110xError> {
        let pa_table = self.pa_table;
        self.bus.burst_write(REG_PATABLE, &pa_table.0)?;
        let power = self.tx_power;
        self.bus.write(REG_FREND0, power.frend0())?;
        Ok(())
    }
}

impl<H: Hal> Cc110x<H> {
    /// Put the chip into power down. Does nothing when already off; refused
    /// with `TryAgain` during a calibration. A transmission in progress is
    /// abandoned and reported as [`TxFailure::Aborted`].
    pub async fn sleep(&self) -> Result<(), Cc110xError> {
        let aborted = {
            let mut core = self.lock().await;
            let state = core.state();
            match state {
                State::Off => return Ok(()),
                State::Calibrating => {
                    return Err(Cc110xError::TryAgain(format!(
                        "cannot power down in state {}",
                        state
                    )))
                }
                _ => {}
            }
            core.irq.disable();
            if state == State::Wor {
                core.bus.wake()?;
                core.leave_wor()?;
            }
            // Floating GDO outputs draw current in power down
            core.bus.write(REG_IOCFG2, GDO_CONSTANT_LOW)?;
            core.bus.write(REG_IOCFG0, GDO_CONSTANT_LOW)?;
            core.bus.command(STROBE_SIDLE)?;
            core.bus.command(STROBE_SPWD)?;
            core.buf.reset();
            core.set_state(State::Off);

            let aborted = matches!(state, State::Transmitting | State::TxCompleting);
            if aborted {
                core.stats.tx_failures += 1;
                warn!("CC110x: transmission abandoned by power down");
            }
            info!("CC110x: powered down");
            aborted
        };
        if aborted {
            self.emit(RadioEvent::TxFailed(TxFailure::Aborted));
        }
        Ok(())
    }

    /// Bring a powered down chip back and listen on the previous channel.
    /// Also ends wake-on-radio polling. Does nothing in any other state.
    pub async fn wakeup(&self) -> Result<(), Cc110xError> {
        {
            let mut core = self.lock().await;
            match core.state() {
                State::Off => core.bus.wake()?,
                State::Wor => {
                    if let Err(err) = core.stop_wor() {
                        core.recover();
                        return Err(err);
                    }
                    info!("CC110x: wake-on-radio stopped");
                    return Ok(());
                }
                _ => return Ok(()),
            }
        }
        tokio::time::sleep(WAKEUP_SETTLE).await;
        self.wait_ready("wake up").await?;

        let mut core = self.lock().await;
        core.upload_pa()?;
        let channel = core.channel;
        core.tune(channel)?;
        info!("CC110x: woke up on channel {} at {}", channel, core.tx_power);
        Ok(())
    }

    /// Select a TX power level (index into the PATABLE)
    pub async fn set_tx_power(&self, level: impl Into<u8>) -> Result<(), Cc110xError> {
        let power = TxPower::try_from(level.into())?;
        let mut core = self.lock().await;
        let state = core.state();
        if !matches!(state, State::Idle | State::Listening) {
            return Err(Cc110xError::TryAgain(format!(
                "cannot change TX power in state {}",
                state
            )));
        }
        core.bus.write(REG_FREND0, power.frend0())?;
        core.tx_power = power;
        debug!("CC110x: TX power {}", power);
        Ok(())
    }

    pub async fn tx_power(&self) -> TxPower {
        self.lock().await.tx_power
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_levels() {
        assert_eq!(TxPower::try_from(7).unwrap(), TxPower::Plus10Dbm);
        assert!(matches!(TxPower::try_from(8), Err(Cc110xError::Range(_))));
        assert_eq!(TxPower::Dbm0.frend0(), 0x14);
        assert_eq!(PaTable::EU_868MHZ.entry(TxPower::Dbm0), 0x50);
        assert_eq!(TxPower::Minus15Dbm.to_string(), "-15 dBm");
        assert_eq!(TxPower::Plus7Dbm.to_string(), "+7 dBm");
    }

    #[test]
    fn test_power_serde_as_index() {
        assert_eq!(serde_json::to_string(&TxPower::Plus5Dbm).unwrap(), "5");
        let power: TxPower = serde_json::from_str("2").unwrap();
        assert_eq!(power, TxPower::Minus15Dbm);
        assert!(serde_json::from_str::<TxPower>("12").is_err());
    }
}
