//! # Device Parameters
//!
//! Everything a CC110x instance needs besides its HAL. Parameters are plain
//! serde structs so deployments can keep them in JSON files:
//!
//! ```json
//! {
//!   "address": 23,
//!   "channel": 2,
//!   "channel_map": [0, 10, 20, 30, 40, 50, 60, 255],
//!   "tx_power": 7,
//!   "cca": { "max_attempts": 5 }
//! }
//! ```
//!
//! Missing fields fall back to the 868 MHz defaults.

use crate::constants::{BROADCAST_ADDRESS, MAX_CHANNELS};
use crate::error::Cc110xError;
use crate::radio::channel::{BandConfig, ChannelMap};
use crate::radio::power::{PaTable, TxPower};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Clear channel assessment policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CcaConfig {
    /// CCA attempts before `send` gives up with `TryAgain`
    pub max_attempts: u32,
    /// Upper bound of the random backoff between attempts (microseconds)
    pub retry_delay_us: u64,
    /// Status polls to wait for a valid RSSI after entering RX
    pub rssi_valid_polls: u32,
}

impl Default for CcaConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_us: 1500,
            rssi_valid_polls: 64,
        }
    }
}

impl CcaConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_micros(self.retry_delay_us)
    }
}

/// Configuration of one transceiver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cc110xParams {
    /// Layer 2 address of this station, used by the hardware address filter
    pub address: u8,
    /// Virtual channel to listen on after initialisation
    pub channel: u8,
    pub channel_map: ChannelMap,
    /// Band registers uploaded on initialisation; `None` keeps the base
    /// register set
    pub config: Option<BandConfig>,
    pub pa_table: PaTable,
    pub tx_power: TxPower,
    /// RSSI offset in half dBm subtracted from the raw RSSI readout
    pub rssi_offset: i16,
    pub cca: CcaConfig,
    /// Capacity of the event channel towards the application
    pub event_queue_depth: usize,
}

impl Default for Cc110xParams {
    fn default() -> Self {
        Self {
            address: 0x01,
            channel: 0,
            channel_map: ChannelMap::EU_868MHZ,
            config: Some(BandConfig::EU_868MHZ_250KBPS),
            pa_table: PaTable::EU_868MHZ,
            tx_power: TxPower::Dbm0,
            rssi_offset: 148,
            cca: CcaConfig::default(),
            event_queue_depth: 16,
        }
    }
}

impl Cc110xParams {
    /// 433 MHz defaults
    pub fn ism_433mhz() -> Self {
        Self {
            channel_map: ChannelMap::ISM_433MHZ,
            config: Some(BandConfig::ISM_433MHZ_250KBPS),
            pa_table: PaTable::ISM_433MHZ,
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, Cc110xError> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, Cc110xError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Cc110xError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    pub fn to_json(&self) -> Result<String, Cc110xError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject parameters no device could be set up with
    pub fn validate(&self) -> Result<(), Cc110xError> {
        if self.address == BROADCAST_ADDRESS {
            return Err(Cc110xError::InvalidArgument(
                "address 0x00 is reserved for broadcast".into(),
            ));
        }
        if self.channel_map.is_empty() {
            return Err(Cc110xError::InvalidArgument(
                "channel map has no supported channel".into(),
            ));
        }
        if self.channel as usize >= MAX_CHANNELS || !self.channel_map.is_supported(self.channel) {
            return Err(Cc110xError::InvalidArgument(format!(
                "initial channel {} unsupported by the channel map",
                self.channel
            )));
        }
        if self.cca.max_attempts == 0 {
            return Err(Cc110xError::InvalidArgument(
                "cca.max_attempts must be at least 1".into(),
            ));
        }
        if self.cca.rssi_valid_polls == 0 {
            return Err(Cc110xError::InvalidArgument(
                "cca.rssi_valid_polls must be at least 1".into(),
            ));
        }
        if self.event_queue_depth == 0 {
            return Err(Cc110xError::InvalidArgument(
                "event_queue_depth must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::CHANNEL_UNSUPPORTED;

    #[test]
    fn test_defaults_validate() {
        assert!(Cc110xParams::default().validate().is_ok());
        assert!(Cc110xParams::ism_433mhz().validate().is_ok());
    }

    #[test]
    fn test_invalid_params() {
        let params = Cc110xParams {
            address: 0,
            ..Default::default()
        };
        assert!(matches!(params.validate(), Err(Cc110xError::InvalidArgument(_))));

        let params = Cc110xParams {
            channel: 7,
            channel_map: ChannelMap::ISM_433MHZ,
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let params = Cc110xParams {
            channel_map: ChannelMap([CHANNEL_UNSUPPORTED; MAX_CHANNELS]),
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let mut params = Cc110xParams::default();
        params.cca.max_attempts = 0;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_partial_json() {
        let params = Cc110xParams::from_json_str(
            r#"{ "address": 23, "channel": 2, "tx_power": 7, "cca": { "max_attempts": 5 } }"#,
        )
        .unwrap();
        assert_eq!(params.address, 23);
        assert_eq!(params.channel, 2);
        assert_eq!(params.tx_power, TxPower::Plus10Dbm);
        assert_eq!(params.cca.max_attempts, 5);
        assert_eq!(params.cca.retry_delay_us, 1500);
        assert_eq!(params.channel_map, ChannelMap::EU_868MHZ);
    }

    #[test]
    fn test_json_errors() {
        assert!(matches!(
            Cc110xParams::from_json_str("{ \"address\": "),
            Err(Cc110xError::Config(_))
        ));
        assert!(matches!(
            Cc110xParams::from_json_str(r#"{ "tx_power": 9 }"#),
            Err(Cc110xError::Config(_))
        ));
        assert!(matches!(
            Cc110xParams::from_json_str(r#"{ "address": 0 }"#),
            Err(Cc110xError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_json_roundtrip_null_config() {
        let params = Cc110xParams {
            config: None,
            ..Cc110xParams::ism_433mhz()
        };
        let json = params.to_json().unwrap();
        assert_eq!(Cc110xParams::from_json_str(&json).unwrap(), params);
    }
}
