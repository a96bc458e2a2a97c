// tunely-core: Scheduling and device logic for the Ngenic Tunes integration
//
// Sits between `tunely-api` (HTTP transport) and the host (the CLI). Owns
// the round-robin update tiers, the per-device refresh routines, and the
// room-control rules.

pub mod config;
pub mod control;
pub mod devices;
pub mod error;
pub mod host;
pub mod integration;
pub mod pairing;
pub mod schedule;
pub mod time;

// ── Primary re-exports ──────────────────────────────────────────
pub use config::{DeviceDescriptor, DeviceKind, IntegrationConfig, ScheduleConfig};
pub use control::{RoomControl, RoomLocks, active_room, apply_active_control};
pub use error::CoreError;
pub use host::{
    ACCESS_TOKEN_KEY, ACTIVE_CONTROL_SETTING, Capability, DeviceSettings, DeviceSnapshot,
    DeviceState, DeviceStateStore, SPOT_PRICE_CONTROL_SETTING, SPOT_PRICE_FACTOR_SETTING,
    SettingsStore, StateSink,
};
pub use integration::Integration;
pub use pairing::{PairingCandidate, discover};
pub use schedule::{
    IndependentTimer, Refreshable, RoundRobin, Scheduler, Throttle, ThrottlePolicy, Tier,
    UpdateRegistry, should_refresh_extra,
};
pub use time::{Calendar, TimeSupport};

// Re-export the API crate so consumers need not depend on it directly.
pub use tunely_api;
