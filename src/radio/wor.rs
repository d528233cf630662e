//! # Wake-on-Radio
//!
//! In wake-on-radio the chip sleeps and wakes up on its own timer (EVENT0)
//! to listen for a short RX window. A sync word inside the window keeps the
//! chip in RX until the end of the packet and raises the usual sync edge; the
//! driver then leaves wake-on-radio, receives the frame and listens
//! continuously afterwards. [`Cc110x::wakeup`] leaves it without a frame.
//!
//! The RX window is a fixed fraction of the polling interval; the smallest
//! fraction that still covers the air time of a full frame is chosen.

use crate::constants::*;
use crate::error::Cc110xError;
use crate::radio::device::{Cc110x, Core};
use crate::radio::hal::Hal;
use crate::radio::state::State;
use log::{debug, info};
use std::time::Duration;

/// RX window in percent of EVENT0, indexed by WOR_RES and MCSM2.RX_TIME
const RX_DUTY_CYCLE: [[f64; 7]; 2] = [
    [12.5, 6.25, 3.125, 1.563, 0.781, 0.391, 0.195],
    [1.95, 0.9765, 0.4883, 0.2441, 0.1221, 0.061035, 0.030518],
];

/// Intervals from here on need the coarser EVENT0 resolution
const WOR_RES_SWITCH_MS: u64 = 1891;

/// Register values for one wake-on-radio polling interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorSettings {
    interval: Duration,
    event0: u16,
    wor_res: u8,
    rx_time: u8,
    rx_window: Duration,
}

impl WorSettings {
    /// Settings polling every `interval` (millisecond resolution)
    pub fn for_interval(interval: Duration) -> Result<Self, Cc110xError> {
        if interval < WOR_INTERVAL_MIN || interval > WOR_INTERVAL_MAX {
            return Err(Cc110xError::Range(format!(
                "wake-on-radio interval {:?} outside {:?}..={:?}",
                interval, WOR_INTERVAL_MIN, WOR_INTERVAL_MAX
            )));
        }
        let millis = interval.as_millis() as u64;
        let wor_res: u8 = if millis < WOR_RES_SWITCH_MS { 0 } else { 1 };

        // t_event0 = 750 / f_xosc * EVENT0 * 2^(5 * WOR_RES), f_xosc = 26 MHz
        let divisor = 750 * if wor_res == 0 { 1 } else { 32 };
        let event0 = (millis * 26_000 + divisor / 2) / divisor;
        let event0 = u16::try_from(event0).map_err(|_| {
            Cc110xError::Range(format!("EVENT0 {} for {:?} overflows", event0, interval))
        })?;

        let interval_us = millis as f64 * 1000.0;
        let (rx_time, window_us) = RX_DUTY_CYCLE[wor_res as usize]
            .iter()
            .enumerate()
            .rev()
            .map(|(index, percent)| (index, interval_us * percent / 100.0))
            .find(|(_, window_us)| *window_us > WOR_FRAME_AIR_TIME.as_micros() as f64)
            .ok_or_else(|| {
                Cc110xError::Range(format!("no RX window for interval {:?}", interval))
            })?;

        Ok(Self {
            interval: Duration::from_millis(millis),
            event0,
            wor_res,
            rx_time: rx_time as u8,
            rx_window: Duration::from_micros(window_us as u64),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// EVENT0 timeout, WOREVT1:WOREVT0
    pub fn event0(&self) -> u16 {
        self.event0
    }

    pub fn worctrl(&self) -> u8 {
        WORCTRL_BASE | self.wor_res
    }

    /// MCSM2 with the RX_TIME selecting the window
    pub fn mcsm2(&self) -> u8 {
        self.rx_time
    }

    /// How long the chip listens after each wake up
    pub fn rx_window(&self) -> Duration {
        self.rx_window
    }
}

impl<H: Hal> Core<H> {
    fn enter_wor(&mut self, settings: &WorSettings) -> Result<(), Cc110xError> {
        self.bus.command(STROBE_SIDLE)?;
        self.bus.command(STROBE_SFRX)?;
        self.bus.write(REG_WORCTRL, settings.worctrl())?;
        self.bus
            .burst_write(REG_WOREVT1, &settings.event0().to_be_bytes())?;
        self.bus.write(REG_MCSM2, settings.mcsm2())?;
        // The synthesizer is not calibrated by hand between polls
        self.bus.write(REG_MCSM0, MCSM0_AUTOCAL)?;
        self.bus.write(REG_IOCFG2, GDO_RX_THRESHOLD_OR_EOP)?;
        self.bus.write(REG_IOCFG0, GDO_SYNC_WORD)?;
        self.bus.command(STROBE_SWORRST)?;
        self.bus.command(STROBE_SWOR)?;
        self.buf.reset();
        self.set_state(State::Wor);
        self.irq.enable();
        Ok(())
    }

    /// Undo the register changes of [`Cc110x::set_wor`]. MCSM2 goes first so
    /// a frame already being received is not cut off by the RX window.
    pub(crate) fn leave_wor(&mut self) -> Result<(), Cc110xError> {
        self.bus
            .write(REG_MCSM2, BASE_CONFIG[REG_MCSM2 as usize])?;
        self.bus
            .write(REG_MCSM0, BASE_CONFIG[REG_MCSM0 as usize])?;
        self.bus
            .write(REG_WORCTRL, BASE_CONFIG[REG_WORCTRL as usize])?;
        // Only the first PATABLE entry survives the sleep phases
        self.upload_pa()
    }

    /// Stop polling and listen continuously on the current channel
    pub(crate) fn stop_wor(&mut self) -> Result<(), Cc110xError> {
        self.irq.disable();
        self.bus.wake()?;
        self.bus.command(STROBE_SIDLE)?;
        self.leave_wor()?;
        let channel = self.channel;
        self.tune(channel)
    }
}

impl<H: Hal> Cc110x<H> {
    /// Enter wake-on-radio, polling for frames every `interval`. The device
    /// leaves it on its own when a frame arrives, or through
    /// [`wakeup`](Self::wakeup). Calling it again while polling changes the
    /// interval.
    pub async fn set_wor(&self, interval: Duration) -> Result<WorSettings, Cc110xError> {
        let settings = WorSettings::for_interval(interval)?;
        let mut core = self.lock().await;
        let state = core.state();
        if !matches!(state, State::Idle | State::Listening | State::Wor) {
            return Err(Cc110xError::TryAgain(format!(
                "cannot enter wake-on-radio in state {}",
                state
            )));
        }
        core.irq.disable();
        if let Err(err) = core.enter_wor(&settings) {
            core.recover();
            return Err(err);
        }
        debug!(
            "CC110x: EVENT0 0x{:04X}, WORCTRL 0x{:02X}, MCSM2 0x{:02X}",
            settings.event0(),
            settings.worctrl(),
            settings.mcsm2()
        );
        info!(
            "CC110x: wake-on-radio every {:?}, listening {:?}",
            settings.interval(),
            settings.rx_window()
        );
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_interval_settings() {
        let settings = WorSettings::for_interval(Duration::from_millis(100)).unwrap();
        assert_eq!(settings.event0(), 3467);
        assert_eq!(settings.worctrl(), 0x78);
        // 12.5 % would do as well, 6.25 % is the shortest window above 3.8 ms
        assert_eq!(settings.mcsm2(), 1);
        assert_eq!(settings.rx_window(), Duration::from_micros(6250));
    }

    #[test]
    fn test_long_interval_uses_coarse_resolution() {
        let settings = WorSettings::for_interval(Duration::from_secs(2)).unwrap();
        assert_eq!(settings.worctrl(), 0x79);
        assert_eq!(settings.event0(), 2167);
        assert_eq!(settings.mcsm2(), 3);
        assert!(settings.rx_window() > WOR_FRAME_AIR_TIME);

        let longest = WorSettings::for_interval(WOR_INTERVAL_MAX).unwrap();
        assert_eq!(longest.event0(), 65534);
    }

    #[test]
    fn test_interval_limits() {
        assert!(WorSettings::for_interval(WOR_INTERVAL_MIN).is_ok());
        assert!(matches!(
            WorSettings::for_interval(Duration::from_millis(40)),
            Err(Cc110xError::Range(_))
        ));
        assert!(matches!(
            WorSettings::for_interval(Duration::from_secs(61)),
            Err(Cc110xError::Range(_))
        ));
    }
}
