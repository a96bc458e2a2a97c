// ── Host-facing state ──
//
// What the integration publishes (capability values, device settings) and
// what it reads from the host (process-wide settings with change
// notification). `DeviceStateStore` and `SettingsStore` are the in-process
// implementations the CLI uses.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use serde::Serialize;
use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumString};
use tokio::sync::{broadcast, watch};
use tracing::trace;

/// Settings key holding the API access token.
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Sensor setting: whether this room's sensor drives heating control.
pub const ACTIVE_CONTROL_SETTING: &str = "active_control";
/// Tune setting: follow the spot price.
pub const SPOT_PRICE_CONTROL_SETTING: &str = "control_on_spot_price";
/// Tune setting: spot price aggressiveness.
pub const SPOT_PRICE_FACTOR_SETTING: &str = "spot_price_factor_index";

/// Device settings map, as written with `set_settings`.
pub type DeviceSettings = Map<String, Value>;

const SETTINGS_CHANNEL_SIZE: usize = 64;

// ── Capabilities ─────────────────────────────────────────────────────

/// Externally visible values a device publishes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Display, AsRefStr, EnumString,
)]
pub enum Capability {
    #[strum(serialize = "measure_temperature")]
    #[serde(rename = "measure_temperature")]
    MeasureTemperature,
    #[strum(serialize = "measure_temperature.setpoint")]
    #[serde(rename = "measure_temperature.setpoint")]
    MeasureTemperatureSetpoint,
    #[strum(serialize = "measure_temperature.outside")]
    #[serde(rename = "measure_temperature.outside")]
    MeasureTemperatureOutside,
    #[strum(serialize = "measure_temperature.control")]
    #[serde(rename = "measure_temperature.control")]
    MeasureTemperatureControl,
    #[strum(serialize = "measure_humidity")]
    #[serde(rename = "measure_humidity")]
    MeasureHumidity,
    #[strum(serialize = "measure_battery")]
    #[serde(rename = "measure_battery")]
    MeasureBattery,
    #[strum(serialize = "measure_signal_strength")]
    #[serde(rename = "measure_signal_strength")]
    MeasureSignalStrength,
    #[strum(serialize = "measure_power")]
    #[serde(rename = "measure_power")]
    MeasurePower,
    #[strum(serialize = "measure_current.L1")]
    #[serde(rename = "measure_current.L1")]
    MeasureCurrentL1,
    #[strum(serialize = "measure_current.L2")]
    #[serde(rename = "measure_current.L2")]
    MeasureCurrentL2,
    #[strum(serialize = "measure_current.L3")]
    #[serde(rename = "measure_current.L3")]
    MeasureCurrentL3,
    #[strum(serialize = "target_temperature")]
    #[serde(rename = "target_temperature")]
    TargetTemperature,
    #[strum(serialize = "meter_power.imported_today")]
    #[serde(rename = "meter_power.imported_today")]
    ImportedToday,
    #[strum(serialize = "meter_power.imported_month")]
    #[serde(rename = "meter_power.imported_month")]
    ImportedMonth,
    #[strum(serialize = "meter_power.imported_year")]
    #[serde(rename = "meter_power.imported_year")]
    ImportedYear,
    #[strum(serialize = "meter_power.exported_today")]
    #[serde(rename = "meter_power.exported_today")]
    ExportedToday,
    #[strum(serialize = "meter_power.exported_month")]
    #[serde(rename = "meter_power.exported_month")]
    ExportedMonth,
    #[strum(serialize = "meter_power.exported_year")]
    #[serde(rename = "meter_power.exported_year")]
    ExportedYear,
}

// ── Sinks ────────────────────────────────────────────────────────────

/// Where devices publish their state.
pub trait StateSink: Send + Sync {
    fn set_value(&self, device_id: &str, capability: Capability, value: f64);
    fn set_settings(&self, device_id: &str, settings: DeviceSettings);
}

/// One device's view of the sink.
///
/// Once the device is marked deleted every write is dropped, so a refresh
/// that was in flight during deletion cannot resurrect its state.
#[derive(Clone)]
pub struct DeviceState {
    id: Arc<str>,
    sink: Arc<dyn StateSink>,
    deleted: Arc<AtomicBool>,
}

impl DeviceState {
    pub fn new(id: &str, sink: Arc<dyn StateSink>) -> Self {
        Self {
            id: Arc::from(id),
            sink,
            deleted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_value(&self, capability: Capability, value: f64) {
        if self.is_deleted() {
            trace!(device = %self.id, %capability, "dropping write for deleted device");
            return;
        }
        self.sink.set_value(&self.id, capability, value);
    }

    pub fn set_settings(&self, settings: DeviceSettings) {
        if self.is_deleted() {
            trace!(device = %self.id, "dropping settings for deleted device");
            return;
        }
        self.sink.set_settings(&self.id, settings);
    }

    pub fn mark_deleted(&self) {
        self.deleted.store(true, Ordering::Release);
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for DeviceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceState")
            .field("id", &self.id)
            .field("deleted", &self.is_deleted())
            .finish_non_exhaustive()
    }
}

// ── In-process device state store ────────────────────────────────────

/// Everything published by one device.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceSnapshot {
    pub values: BTreeMap<Capability, f64>,
    pub settings: DeviceSettings,
}

/// Concurrent store of published device state.
///
/// Every write bumps a version on a `watch` channel so observers can wait
/// for changes instead of polling.
pub struct DeviceStateStore {
    devices: DashMap<String, DeviceSnapshot>,
    version: watch::Sender<u64>,
}

impl Default for DeviceStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceStateStore {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        Self {
            devices: DashMap::new(),
            version,
        }
    }

    pub fn snapshot(&self, device_id: &str) -> Option<DeviceSnapshot> {
        self.devices.get(device_id).map(|d| d.clone())
    }

    pub fn value(&self, device_id: &str, capability: Capability) -> Option<f64> {
        self.devices
            .get(device_id)
            .and_then(|d| d.values.get(&capability).copied())
    }

    pub fn setting(&self, device_id: &str, key: &str) -> Option<Value> {
        self.devices
            .get(device_id)
            .and_then(|d| d.settings.get(key).cloned())
    }

    /// All device ids with published state, sorted.
    pub fn device_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.devices.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn remove(&self, device_id: &str) -> Option<DeviceSnapshot> {
        let removed = self.devices.remove(device_id).map(|(_, v)| v);
        if removed.is_some() {
            self.bump_version();
        }
        removed
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    fn bump_version(&self) {
        self.version.send_modify(|v| *v = v.wrapping_add(1));
    }
}

impl StateSink for DeviceStateStore {
    fn set_value(&self, device_id: &str, capability: Capability, value: f64) {
        trace!(device = device_id, %capability, value, "set value");
        self.devices
            .entry(device_id.to_owned())
            .or_default()
            .values
            .insert(capability, value);
        self.bump_version();
    }

    fn set_settings(&self, device_id: &str, settings: DeviceSettings) {
        self.devices
            .entry(device_id.to_owned())
            .or_default()
            .settings
            .extend(settings);
        self.bump_version();
    }
}

// ── Process-wide settings ────────────────────────────────────────────

/// Key/value settings with change notification.
///
/// Subscribers receive the key of every changed setting and read the new
/// value back from the store.
pub struct SettingsStore {
    values: DashMap<String, Value>,
    changes: broadcast::Sender<String>,
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(SETTINGS_CHANNEL_SIZE);
        Self {
            values: DashMap::new(),
            changes,
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).map(|v| v.clone())
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        self.values
            .get(key)
            .and_then(|v| v.as_str().map(str::to_owned))
    }

    /// Store `value` and notify subscribers, even if it is unchanged.
    pub fn set(&self, key: &str, value: Value) {
        self.values.insert(key.to_owned(), value);
        // No subscribers is fine.
        let _ = self.changes.send(key.to_owned());
    }

    pub fn unset(&self, key: &str) {
        if self.values.remove(key).is_some() {
            let _ = self.changes.send(key.to_owned());
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.changes.subscribe()
    }
}
