//! Configuration for the tunely CLI.
//!
//! One TOML file, environment overrides, access-token resolution
//! (env var + keyring + plaintext), and translation to
//! `tunely_core::IntegrationConfig`. Core never reads this file itself.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tunely_core::tunely_api::{DEFAULT_API_URL, TlsMode};
use tunely_core::{DeviceDescriptor, IntegrationConfig, ScheduleConfig, ThrottlePolicy};

/// Keyring service name.
pub const KEYRING_SERVICE: &str = "tunely";
/// Keyring entry holding the access token.
pub const KEYRING_TOKEN_ENTRY: &str = "access-token";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no access token configured")]
    NoCredentials,

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Tunes API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Access token (plaintext; prefer keyring or env var).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Environment variable name containing the access token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_env: Option<String>,

    /// Extra CA certificate (PEM) to trust.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,

    /// Fixed UTC offset used for day/month/year boundaries. System local
    /// time when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone_offset_minutes: Option<i32>,

    #[serde(default)]
    pub schedule: Schedule,

    /// Paired devices.
    #[serde(default)]
    pub devices: Vec<DeviceDescriptor>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            timeout: default_timeout(),
            access_token: None,
            access_token_env: None,
            ca_cert: None,
            timezone_offset_minutes: None,
            schedule: Schedule::default(),
            devices: Vec::new(),
        }
    }
}

/// `[schedule]` table.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Schedule {
    pub device_tick_secs: u64,
    pub track_tick_secs: u64,
    /// Every n-th refresh of a device also fetches its extra data.
    pub extra_data_interval: u64,
    pub throttle_policy: ThrottlePolicy,
    pub independent_period_secs: u64,
    pub max_initial_delay_secs: u64,
}

impl Default for Schedule {
    fn default() -> Self {
        let d = ScheduleConfig::default();
        Self {
            device_tick_secs: d.device_tick.as_secs(),
            track_tick_secs: d.track_tick.as_secs(),
            extra_data_interval: d.extra_data_interval,
            throttle_policy: d.throttle_policy,
            independent_period_secs: d.independent_period.as_secs(),
            max_initial_delay_secs: d.max_initial_delay.as_secs(),
        }
    }
}

impl From<&Schedule> for ScheduleConfig {
    fn from(s: &Schedule) -> Self {
        Self {
            device_tick: Duration::from_secs(s.device_tick_secs),
            track_tick: Duration::from_secs(s.track_tick_secs),
            extra_data_interval: s.extra_data_interval,
            throttle_policy: s.throttle_policy,
            independent_period: Duration::from_secs(s.independent_period_secs),
            max_initial_delay: Duration::from_secs(s.max_initial_delay_secs),
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.into()
}
fn default_timeout() -> u64 {
    30
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("se", "tunely", "tunely").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("tunely");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the config from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the config from `path` + environment. A missing file yields the
/// defaults. Nested keys use a double underscore:
/// `TUNELY_SCHEDULE__DEVICE_TICK_SECS=30`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("TUNELY_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the access token: `access_token_env` variable, then the system
/// keyring, then plaintext in the config.
pub fn resolve_access_token(cfg: &Config) -> Result<SecretString, ConfigError> {
    resolve_access_token_with(cfg, |name| std::env::var(name).ok(), keyring_token)
}

fn keyring_token() -> Option<String> {
    keyring::Entry::new(KEYRING_SERVICE, KEYRING_TOKEN_ENTRY)
        .ok()?
        .get_password()
        .ok()
}

fn resolve_access_token_with(
    cfg: &Config,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl FnOnce() -> Option<String>,
) -> Result<SecretString, ConfigError> {
    // 1. Configured env var
    if let Some(token) = cfg.access_token_env.as_deref().and_then(env) {
        return Ok(SecretString::from(token));
    }

    // 2. System keyring
    if let Some(token) = keyring() {
        return Ok(SecretString::from(token));
    }

    // 3. Plaintext in config
    if let Some(ref token) = cfg.access_token {
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoCredentials)
}

// ── Translation ─────────────────────────────────────────────────────

/// Build the runtime config. A missing access token is not an error here:
/// the integration can start without one and pick it up later.
pub fn to_integration_config(cfg: &Config) -> Result<IntegrationConfig, ConfigError> {
    let token = match resolve_access_token(cfg) {
        Ok(token) => Some(token),
        Err(ConfigError::NoCredentials) => None,
        Err(e) => return Err(e),
    };
    build_integration_config(cfg, token)
}

fn build_integration_config(
    cfg: &Config,
    access_token: Option<SecretString>,
) -> Result<IntegrationConfig, ConfigError> {
    validate(cfg)?;

    let tls = cfg
        .ca_cert
        .as_ref()
        .map_or(TlsMode::System, |path| TlsMode::CustomCa(path.clone()));

    Ok(IntegrationConfig {
        api_url: cfg.api_url.clone(),
        access_token,
        tls,
        timeout: Duration::from_secs(cfg.timeout),
        schedule: ScheduleConfig::from(&cfg.schedule),
        timezone_offset_minutes: cfg.timezone_offset_minutes,
        devices: cfg.devices.clone(),
    })
}

fn validate(cfg: &Config) -> Result<(), ConfigError> {
    let url: url::Url = cfg.api_url.parse().map_err(|_| ConfigError::Validation {
        field: "api_url".into(),
        reason: format!("invalid URL: {}", cfg.api_url),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation {
            field: "api_url".into(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }

    if cfg.timeout == 0 {
        return Err(ConfigError::Validation {
            field: "timeout".into(),
            reason: "must be at least 1 second".into(),
        });
    }

    if let Some(minutes) = cfg.timezone_offset_minutes {
        if minutes.abs() >= 24 * 60 {
            return Err(ConfigError::Validation {
                field: "timezone_offset_minutes".into(),
                reason: format!("{minutes} is outside ±1439"),
            });
        }
    }

    let mut seen = HashSet::new();
    for device in &cfg.devices {
        if !seen.insert(device.id.as_str()) {
            return Err(ConfigError::Validation {
                field: "devices".into(),
                reason: format!("duplicate device id '{}'", device.id),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;
    use tunely_core::DeviceKind;

    fn write(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.api_url, DEFAULT_API_URL);
        assert_eq!(cfg.timeout, 30);
        assert_eq!(cfg.schedule, Schedule::default());
        assert!(cfg.devices.is_empty());
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            r#"
timeout = 10
timezone_offset_minutes = 60

[schedule]
device_tick_secs = 30
throttle_policy = "saturating"

[[devices]]
kind = "sensor"
id = "n1"
tune_id = "t1"
name = "Hall"

[[devices]]
kind = "tune"
id = "t1"
tune_id = "t1"
controller_id = "c1"
"#,
        );

        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.timeout, 10);
        assert_eq!(cfg.schedule.device_tick_secs, 30);
        assert_eq!(cfg.schedule.track_tick_secs, 45);
        assert_eq!(cfg.schedule.throttle_policy, ThrottlePolicy::Saturating);
        assert_eq!(cfg.devices.len(), 2);
        assert_eq!(cfg.devices[0].kind, DeviceKind::Sensor);
        assert_eq!(cfg.devices[1].controller_id.as_deref(), Some("c1"));

        let runtime = build_integration_config(&cfg, None).unwrap();
        assert_eq!(runtime.timeout, Duration::from_secs(10));
        assert_eq!(runtime.schedule.device_tick, Duration::from_secs(30));
        assert_eq!(runtime.timezone_offset_minutes, Some(60));
        assert!(runtime.access_token.is_none());
    }

    #[test]
    fn save_then_load_keeps_devices() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.devices.push(DeviceDescriptor {
            kind: DeviceKind::TrackHan,
            id: "h1".into(),
            tune_id: "t1".into(),
            name: "Meter".into(),
            controller_id: None,
        });

        save_config_to(&cfg, &path).unwrap();
        assert_eq!(load_config_from(&path).unwrap(), cfg);
    }

    #[test]
    fn token_chain_order() {
        let mut cfg = Config {
            access_token: Some("plain".into()),
            access_token_env: Some("MY_TOKEN".into()),
            ..Config::default()
        };
        let env = |name: &str| (name == "MY_TOKEN").then(|| "from-env".to_string());

        let token = resolve_access_token_with(&cfg, env, || Some("from-keyring".into())).unwrap();
        assert_eq!(token.expose_secret(), "from-env");

        let token = resolve_access_token_with(&cfg, |_| None, || Some("from-keyring".into())).unwrap();
        assert_eq!(token.expose_secret(), "from-keyring");

        let token = resolve_access_token_with(&cfg, |_| None, || None).unwrap();
        assert_eq!(token.expose_secret(), "plain");

        cfg.access_token = None;
        assert!(matches!(
            resolve_access_token_with(&cfg, |_| None, || None),
            Err(ConfigError::NoCredentials)
        ));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let bad_url = Config {
            api_url: "ftp://example.com".into(),
            ..Config::default()
        };
        assert!(matches!(
            build_integration_config(&bad_url, None),
            Err(ConfigError::Validation { field, .. }) if field == "api_url"
        ));

        let bad_offset = Config {
            timezone_offset_minutes: Some(1440),
            ..Config::default()
        };
        assert!(build_integration_config(&bad_offset, None).is_err());

        let device = DeviceDescriptor {
            kind: DeviceKind::Sensor,
            id: "n1".into(),
            tune_id: "t1".into(),
            name: String::new(),
            controller_id: None,
        };
        let dupes = Config {
            devices: vec![device.clone(), device],
            ..Config::default()
        };
        assert!(matches!(
            build_integration_config(&dupes, None),
            Err(ConfigError::Validation { field, .. }) if field == "devices"
        ));
    }

    #[test]
    fn ca_cert_selects_custom_tls() {
        let cfg = Config {
            ca_cert: Some(PathBuf::from("/etc/ca.pem")),
            ..Config::default()
        };
        let runtime = build_integration_config(&cfg, None).unwrap();
        assert!(matches!(runtime.tls, TlsMode::CustomCa(p) if p == Path::new("/etc/ca.pem")));
    }
}
