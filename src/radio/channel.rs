//! # Channel and Frequency Management
//!
//! Callers pick a *virtual* channel (0..8); the active [`ChannelMap`] turns it
//! into the CHANNR register value. A [`BandConfig`] carries the band specific
//! registers (base frequency, IF, bandwidth/data rate, deviation). The map is
//! paired with a compatible band configuration by the caller; the driver only
//! checks channel indices and unsupported entries.
//!
//! Hopping reuses the calibration values cached per channel, so only
//! [`Cc110x::apply_config`] pays for calibrating every channel.

use crate::constants::*;
use crate::error::Cc110xError;
use crate::radio::bus::Bus;
use crate::radio::device::{Cc110x, Core, RadioEvent};
use crate::radio::hal::Hal;
use crate::radio::state::State;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Virtual to physical channel translation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelMap(pub [u8; MAX_CHANNELS]);

impl ChannelMap {
    /// 868 MHz SRD band, 8 channels 10 CHANNR steps apart
    pub const EU_868MHZ: ChannelMap = ChannelMap([0, 10, 20, 30, 40, 50, 60, 70]);

    /// 433 MHz ISM band (1.7 MHz wide), 7 channels 1 CHANNR step apart
    pub const ISM_433MHZ: ChannelMap =
        ChannelMap([0, 1, 2, 3, 4, 5, 6, CHANNEL_UNSUPPORTED]);

    /// CHANNR value for a virtual channel, `None` when out of bounds or
    /// unsupported
    pub fn physical(&self, channel: u8) -> Option<u8> {
        match self.0.get(channel as usize) {
            Some(&CHANNEL_UNSUPPORTED) | None => None,
            Some(&physical) => Some(physical),
        }
    }

    pub fn is_supported(&self, channel: u8) -> bool {
        self.physical(channel).is_some()
    }

    /// Supported `(virtual, physical)` pairs in ascending virtual order
    pub fn channels(&self) -> impl Iterator<Item = (u8, u8)> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, &physical)| physical != CHANNEL_UNSUPPORTED)
            .map(|(virt, &physical)| (virt as u8, physical))
    }

    /// Number of supported channels
    pub fn len(&self) -> usize {
        self.channels().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn check(&self, channel: u8) -> Result<u8, Cc110xError> {
        if channel as usize >= MAX_CHANNELS {
            return Err(Cc110xError::Range(format!(
                "channel {} outside 0..{}",
                channel, MAX_CHANNELS
            )));
        }
        self.physical(channel).ok_or_else(|| {
            Cc110xError::Range(format!("channel {} unsupported by the channel map", channel))
        })
    }
}

impl Default for ChannelMap {
    fn default() -> Self {
        Self::EU_868MHZ
    }
}

/// Band specific register set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandConfig {
    /// FREQ2, FREQ1, FREQ0
    pub base_freq: [u8; 3],
    /// Intermediate frequency (FSCTRL1)
    pub fsctrl1: u8,
    /// Channel filter bandwidth and data rate exponent (MDMCFG4)
    pub mdmcfg4: u8,
    /// Data rate mantissa (MDMCFG3)
    pub mdmcfg3: u8,
    /// Frequency deviation (DEVIATN)
    pub deviatn: u8,
}

impl BandConfig {
    /// 865.2 MHz base, 250 kbit/s GFSK, 541 kHz RX bandwidth
    pub const EU_868MHZ_250KBPS: BandConfig = BandConfig {
        base_freq: [0x21, 0x46, 0xE4],
        fsctrl1: 0x0C,
        mdmcfg4: 0x2D,
        mdmcfg3: 0x3B,
        deviatn: 0x62,
    };

    /// 433.1 MHz base, 250 kbit/s GFSK, 541 kHz RX bandwidth
    pub const ISM_433MHZ_250KBPS: BandConfig = BandConfig {
        base_freq: [0x10, 0xA8, 0x5E],
        fsctrl1: 0x0C,
        mdmcfg4: 0x2D,
        mdmcfg3: 0x3B,
        deviatn: 0x62,
    };

    /// Base frequency in Hz for the 26 MHz reference crystal
    pub fn base_freq_hz(&self) -> u64 {
        let word = u64::from(self.base_freq[0]) << 16
            | u64::from(self.base_freq[1]) << 8
            | u64::from(self.base_freq[2]);
        (word * 26_000_000) >> 16
    }

    /// Upload and read back; a mismatch means the chip did not take the
    /// configuration
    pub(crate) fn upload<H: Hal>(&self, bus: &mut Bus<H>) -> Result<(), Cc110xError> {
        bus.write(REG_FSCTRL1, self.fsctrl1)?;
        bus.burst_write(REG_FREQ2, &self.base_freq)?;
        bus.burst_write(REG_MDMCFG4, &[self.mdmcfg4, self.mdmcfg3])?;
        bus.write(REG_DEVIATN, self.deviatn)?;

        let mut freq = [0u8; 3];
        bus.burst_read(REG_FREQ2, &mut freq)?;
        let mut mdmcfg = [0u8; 2];
        bus.burst_read(REG_MDMCFG4, &mut mdmcfg)?;
        let (_, fsctrl1) = bus.read(REG_FSCTRL1)?;
        let (_, deviatn) = bus.read(REG_DEVIATN)?;

        if freq != self.base_freq
            || mdmcfg != [self.mdmcfg4, self.mdmcfg3]
            || fsctrl1 != self.fsctrl1
            || deviatn != self.deviatn
        {
            return Err(Cc110xError::Io("band configuration read back mismatch".into()));
        }
        Ok(())
    }
}

impl Default for BandConfig {
    fn default() -> Self {
        Self::EU_868MHZ_250KBPS
    }
}

impl<H: Hal> Core<H> {
    /// Hop to `channel` using cached calibration data, then listen
    pub(crate) fn tune(&mut self, channel: u8) -> Result<(), Cc110xError> {
        let physical = self.chanmap.check(channel)?;
        self.irq.disable();
        self.bus.command(STROBE_SIDLE)?;
        self.bus.write(REG_CHANNR, physical)?;
        self.bus.burst_write(REG_FSCAL3, &self.cal.registers(channel))?;
        self.channel = channel;
        debug!("CC110x: tuned to channel {} (CHANNR {})", channel, physical);
        self.enter_listening()
    }
}

impl<H: Hal> Cc110x<H> {
    /// Apply a band configuration and channel map, then calibrate every
    /// channel of the map and listen on `channel`.
    ///
    /// With `config == None` the band registers are left as they are.
    pub async fn apply_config(
        &self,
        config: Option<BandConfig>,
        chanmap: Arc<ChannelMap>,
        channel: u8,
    ) -> Result<(), Cc110xError> {
        chanmap.check(channel)?;
        {
            let mut core = self.lock().await;
            let state = core.state();
            if !state.can_calibrate() {
                return Err(Cc110xError::TryAgain(format!(
                    "cannot apply configuration in state {}",
                    state
                )));
            }
            core.irq.disable();
            if let Err(err) = Self::upload_config(&mut core, config) {
                core.set_state(State::Idle);
                return Err(err);
            }
            core.chanmap = chanmap.clone();
            core.channel = channel;
            core.set_state(State::Calibrating);
        }
        info!(
            "CC110x: configuration applied, calibrating {} channels",
            chanmap.len()
        );
        self.calibrate_and_restore(channel, chanmap).await
    }

    fn upload_config(core: &mut Core<H>, config: Option<BandConfig>) -> Result<(), Cc110xError> {
        core.bus.command(STROBE_SIDLE)?;
        if let Some(config) = config {
            config.upload(&mut core.bus)?;
            debug!("CC110x: band configuration at {} Hz", config.base_freq_hz());
            core.config = Some(config);
        }
        Ok(())
    }

    /// Switch to another virtual channel without recalibrating
    pub async fn set_channel(&self, channel: u8) -> Result<(), Cc110xError> {
        {
            let mut core = self.lock().await;
            let state = core.state();
            if !state.can_hop() {
                return Err(Cc110xError::TryAgain(format!(
                    "cannot change channel in state {}",
                    state
                )));
            }
            core.chanmap.check(channel)?;
            if let Err(err) = core.tune(channel) {
                core.recover();
                return Err(err);
            }
        }
        self.emit(RadioEvent::ChannelChanged(channel));
        Ok(())
    }

    /// Active virtual channel
    pub async fn channel(&self) -> u8 {
        self.lock().await.channel
    }

    pub async fn channel_map(&self) -> Arc<ChannelMap> {
        self.lock().await.chanmap.clone()
    }

    pub async fn band_config(&self) -> Option<BandConfig> {
        self.lock().await.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::hal::MockChip;

    #[test]
    fn test_map_lookup() {
        let map = ChannelMap([0, 5, CHANNEL_UNSUPPORTED, 15, 20, 25, 30, CHANNEL_UNSUPPORTED]);
        assert_eq!(map.physical(1), Some(5));
        assert_eq!(map.physical(2), None);
        assert_eq!(map.physical(8), None);
        assert_eq!(map.len(), 6);
        assert_eq!(
            map.channels().map(|(v, _)| v).collect::<Vec<_>>(),
            vec![0, 1, 3, 4, 5, 6]
        );
        assert!(matches!(map.check(2), Err(Cc110xError::Range(_))));
        assert!(matches!(map.check(9), Err(Cc110xError::Range(_))));
        assert_eq!(map.check(3).unwrap(), 15);
    }

    #[test]
    fn test_base_frequency() {
        let hz = BandConfig::EU_868MHZ_250KBPS.base_freq_hz();
        assert!((865_000_000..865_400_000).contains(&hz), "{hz}");
        let hz = BandConfig::ISM_433MHZ_250KBPS.base_freq_hz();
        assert!((433_000_000..433_200_000).contains(&hz), "{hz}");
    }

    #[test]
    fn test_upload_verifies() {
        let chip = MockChip::new();
        let mut bus = Bus::new(chip.clone());
        BandConfig::ISM_433MHZ_250KBPS.upload(&mut bus).unwrap();
        assert_eq!(chip.register(REG_FREQ2), 0x10);
        assert_eq!(chip.register(REG_DEVIATN), 0x62);
    }

    #[test]
    fn test_map_serde_is_plain_array() {
        let json = serde_json::to_string(&ChannelMap::EU_868MHZ).unwrap();
        assert_eq!(json, "[0,10,20,30,40,50,60,70]");
        let map: ChannelMap = serde_json::from_str("[0,255,1,2,3,4,5,6]").unwrap();
        assert!(!map.is_supported(1));
    }
}
