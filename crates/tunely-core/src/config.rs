// ── Runtime configuration ──
//
// Describes the integration at runtime. No disk I/O happens here;
// tunely-config builds these from TOML, env and the keyring.

use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tunely_api::TlsMode;

use crate::schedule::{DEFAULT_EXTRA_DATA_INTERVAL, ThrottlePolicy, Tier};

/// Device kinds the integration can drive.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeviceKind {
    /// Controller installation: target temperature and control values.
    Tune,
    /// Room sensor: temperature, humidity, active-control flag.
    Sensor,
    /// Outdoor temperature reported by the controller.
    OutdoorSensor,
    /// Track optical pulse reader.
    TrackOpto,
    /// Track HAN port reader.
    TrackHan,
}

impl DeviceKind {
    /// The round-robin tier this kind polls on; `None` for kinds that run
    /// their own timer.
    pub fn tier(self) -> Option<Tier> {
        match self {
            Self::Tune | Self::Sensor => Some(Tier::Device),
            Self::TrackOpto | Self::TrackHan => Some(Tier::Track),
            Self::OutdoorSensor => None,
        }
    }
}

/// A paired device as the host remembers it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub kind: DeviceKind,
    /// Host-visible device id. For sensors and track readers this is the
    /// node UUID; for tunes the installation UUID.
    pub id: String,
    pub tune_id: String,
    #[serde(default)]
    pub name: String,
    /// Controller node UUID, resolved on first use when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_id: Option<String>,
}

/// Polling cadences and throttling.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Tick period of the device tier (tunes, room sensors).
    pub device_tick: Duration,
    /// Tick period of the track tier (energy meters).
    pub track_tick: Duration,
    pub extra_data_interval: u64,
    pub throttle_policy: ThrottlePolicy,
    /// Period of self-timed devices.
    pub independent_period: Duration,
    /// Upper bound of the random start delay of self-timed devices.
    pub max_initial_delay: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            device_tick: Duration::from_secs(60),
            track_tick: Duration::from_secs(45),
            extra_data_interval: DEFAULT_EXTRA_DATA_INTERVAL,
            throttle_policy: ThrottlePolicy::default(),
            independent_period: Duration::from_secs(300),
            max_initial_delay: Duration::from_secs(300),
        }
    }
}

/// Everything needed to start an `Integration`.
#[derive(Debug, Clone)]
pub struct IntegrationConfig {
    pub api_url: String,
    pub access_token: Option<SecretString>,
    pub tls: TlsMode,
    pub timeout: Duration,
    pub schedule: ScheduleConfig,
    /// Fixed UTC offset for day/month/year boundaries; system local time
    /// when `None`.
    pub timezone_offset_minutes: Option<i32>,
    pub devices: Vec<DeviceDescriptor>,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            api_url: tunely_api::DEFAULT_API_URL.to_owned(),
            access_token: None,
            tls: TlsMode::default(),
            timeout: Duration::from_secs(30),
            schedule: ScheduleConfig::default(),
            timezone_offset_minutes: None,
            devices: Vec::new(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_tiers() {
        assert_eq!(DeviceKind::Sensor.tier(), Some(Tier::Device));
        assert_eq!(DeviceKind::TrackHan.tier(), Some(Tier::Track));
        assert_eq!(DeviceKind::OutdoorSensor.tier(), None);
    }

    #[test]
    fn kind_names_are_snake_case() {
        assert_eq!(DeviceKind::OutdoorSensor.to_string(), "outdoor_sensor");
        assert_eq!("track_opto".parse::<DeviceKind>().unwrap(), DeviceKind::TrackOpto);

        let d: DeviceDescriptor = serde_json::from_value(serde_json::json!({
            "kind": "track_han", "id": "h1", "tune_id": "t1"
        }))
        .unwrap();
        assert_eq!(d.kind, DeviceKind::TrackHan);
        assert!(d.controller_id.is_none());
    }
}
