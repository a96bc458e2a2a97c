//! `tunely run`: host the integration until interrupted.
//!
//! The process plays the host platform: it owns the state store the
//! devices publish into and the settings store the access token lives in.
//! SIGHUP re-reads the config and pushes the token through the settings
//! store, which rotates the credential of the running client.

use std::sync::Arc;

use secrecy::ExposeSecret;
use serde::Serialize;
use serde_json::Value;
use tabled::Tabled;
use tracing::{debug, info, warn};
use tunely_config::ConfigError;
use tunely_core::{
    ACCESS_TOKEN_KEY, DeviceDescriptor, DeviceSnapshot, DeviceStateStore, Integration,
    SettingsStore, StateSink,
};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::Context;

// ── Report ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct DeviceReport {
    #[serde(flatten)]
    descriptor: DeviceDescriptor,
    state: DeviceSnapshot,
}

#[derive(Tabled)]
struct ReportRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Values")]
    values: String,
}

impl From<&DeviceReport> for ReportRow {
    fn from(r: &DeviceReport) -> Self {
        let values = r
            .state
            .values
            .iter()
            .map(|(cap, v)| format!("{cap}={v:.2}"))
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            id: r.descriptor.id.clone(),
            kind: r.descriptor.kind.to_string(),
            name: r.descriptor.name.clone(),
            values,
        }
    }
}

fn report(integration: &Integration, store: &DeviceStateStore) -> Vec<DeviceReport> {
    integration
        .devices()
        .into_iter()
        .map(|descriptor| DeviceReport {
            state: store.snapshot(&descriptor.id).unwrap_or_default(),
            descriptor,
        })
        .collect()
}

// ── Signals ─────────────────────────────────────────────────────────

#[cfg(unix)]
struct Hangup(tokio::signal::unix::Signal);

#[cfg(unix)]
impl Hangup {
    fn new() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};
        Ok(Self(signal(SignalKind::hangup())?))
    }

    async fn recv(&mut self) {
        if self.0.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
struct Hangup;

#[cfg(not(unix))]
impl Hangup {
    #[allow(clippy::unnecessary_wraps)]
    fn new() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) {
        std::future::pending::<()>().await;
    }
}

/// Re-read the config file and publish the resolved token.
fn reload_token(ctx: &Context, settings: &SettingsStore) {
    let config = match tunely_config::load_config_from(&ctx.path) {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "config reload failed, keeping current token");
            return;
        }
    };
    match tunely_config::resolve_access_token(&config) {
        Ok(token) => settings.set(
            ACCESS_TOKEN_KEY,
            Value::String(token.expose_secret().to_owned()),
        ),
        Err(ConfigError::NoCredentials) => {
            warn!("no access token configured after reload");
            settings.unset(ACCESS_TOKEN_KEY);
        }
        Err(e) => warn!(error = %e, "token resolution failed"),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    let runtime = ctx.integration_config(global)?;
    if runtime.access_token.is_none() {
        warn!("no access token configured; requests will fail until SIGHUP supplies one");
    }
    if runtime.devices.is_empty() {
        warn!("no devices configured; add some with `tunely pair <kind> --add`");
    }

    let store = Arc::new(DeviceStateStore::new());
    let sink: Arc<dyn StateSink> = Arc::clone(&store) as Arc<dyn StateSink>;
    let integration = Integration::new(&runtime, sink)?;
    let settings = Arc::new(SettingsStore::new());
    let watcher = integration.watch_settings(Arc::clone(&settings));
    let mut hangup = Hangup::new()?;
    let mut versions = store.subscribe();

    integration.start();
    for descriptor in runtime.devices {
        let id = descriptor.id.clone();
        if let Err(e) = integration.add_device(descriptor).await {
            warn!(device = %id, error = %e, "could not add device");
        }
    }
    info!(devices = integration.devices().len(), "polling; Ctrl-C to stop");

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "Ctrl-C handler failed");
                }
                break;
            }
            () = hangup.recv() => {
                info!("SIGHUP received, reloading access token");
                reload_token(ctx, &settings);
            }
            Ok(()) = versions.changed() => {
                debug!(version = *versions.borrow_and_update(), "device state updated");
            }
        }
    }

    integration.shutdown().await;
    if let Err(e) = watcher.await {
        warn!(error = %e, "settings watcher ended abnormally");
    }

    let reports = report(&integration, &store);
    let out = output::render_list(global.output, &reports, |r| ReportRow::from(r))?;
    output::print_output(&out, global.quiet);
    Ok(())
}
