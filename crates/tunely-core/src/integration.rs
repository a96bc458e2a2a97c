// ── Integration facade ──
//
// Owns the API client, the scheduler and the set of live devices. The host
// drives it through lifecycle hooks (add, settings changed, renamed,
// deleted) and user actions (activate/deactivate sensor, set target
// temperature).

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use secrecy::SecretString;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tunely_api::{Credential, TransportConfig, TunesClient};

use crate::config::{DeviceDescriptor, DeviceKind, IntegrationConfig, ScheduleConfig};
use crate::control::RoomControl;
use crate::devices::{self, DeviceContext};
use crate::error::CoreError;
use crate::host::{
    ACCESS_TOKEN_KEY, ACTIVE_CONTROL_SETTING, Capability, DeviceSettings, DeviceState,
    SPOT_PRICE_CONTROL_SETTING, SPOT_PRICE_FACTOR_SETTING, SettingsStore, StateSink,
};
use crate::schedule::{IndependentTimer, Refreshable, Scheduler, Tier, staggered_delay};
use crate::time::{Calendar, TimeSupport};

/// The running integration. Cheaply cloneable.
#[derive(Clone)]
pub struct Integration {
    inner: Arc<IntegrationInner>,
}

struct IntegrationInner {
    schedule: ScheduleConfig,
    ctx: DeviceContext,
    scheduler: Scheduler,
    rooms: RoomControl,
    sink: Arc<dyn StateSink>,
    devices: DashMap<String, ManagedDevice>,
}

struct ManagedDevice {
    descriptor: DeviceDescriptor,
    state: DeviceState,
    routine: Arc<dyn Refreshable>,
    /// `None` while the first refresh is still running.
    driver: Option<Driver>,
}

/// What keeps a device polling.
enum Driver {
    Tier(Tier),
    Timer(IndependentTimer),
}

impl Integration {
    /// Build the client and calendar from `config`. Does not start polling;
    /// call [`start`](Self::start) and add devices.
    pub fn new(config: &IntegrationConfig, sink: Arc<dyn StateSink>) -> Result<Self, CoreError> {
        let credential = Credential::new(config.access_token.clone());
        let transport = TransportConfig {
            tls: config.tls.clone(),
            timeout: config.timeout,
        };
        let client = TunesClient::new(&config.api_url, credential, &transport)?;
        let calendar: Arc<dyn Calendar> = match config.timezone_offset_minutes {
            Some(minutes) => Arc::new(TimeSupport::fixed(minutes)?),
            None => Arc::new(TimeSupport::local()),
        };
        Ok(Self::with_client(
            client,
            config.schedule.clone(),
            calendar,
            sink,
        ))
    }

    /// Assemble from pre-built parts.
    pub fn with_client(
        client: TunesClient,
        schedule: ScheduleConfig,
        calendar: Arc<dyn Calendar>,
        sink: Arc<dyn StateSink>,
    ) -> Self {
        let scheduler = Scheduler::new(&schedule);
        let rooms = RoomControl::new(client.clone());
        Self {
            inner: Arc::new(IntegrationInner {
                schedule,
                ctx: DeviceContext { client, calendar },
                scheduler,
                rooms,
                sink,
                devices: DashMap::new(),
            }),
        }
    }

    pub fn client(&self) -> &TunesClient {
        &self.inner.ctx.client
    }

    pub fn credential(&self) -> &Credential {
        self.inner.ctx.client.credential()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    pub fn rooms(&self) -> &RoomControl {
        &self.inner.rooms
    }

    /// Replace the access token used by every subsequent request.
    pub fn update_credential(&self, token: Option<SecretString>) {
        self.credential().update_credential(token);
    }

    /// Start the tier tasks.
    pub fn start(&self) {
        self.inner.scheduler.start();
    }

    /// Stop polling. Devices stay registered; in-flight refreshes finish.
    pub async fn shutdown(&self) {
        for device in &self.inner.devices {
            if let Some(Driver::Timer(timer)) = &device.driver {
                timer.cancel();
            }
        }
        self.inner.scheduler.shutdown().await;
        info!("integration stopped");
    }

    /// Descriptors of all live devices, sorted by id.
    pub fn devices(&self) -> Vec<DeviceDescriptor> {
        let mut out: Vec<_> = self
            .inner
            .devices
            .iter()
            .map(|d| d.descriptor.clone())
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    // ── Lifecycle hooks ──────────────────────────────────────────

    /// Add a device: refresh it once, then schedule it.
    ///
    /// The device is visible to the other hooks while its first refresh
    /// runs. If it is deleted meanwhile, its driver is torn down as soon as
    /// that refresh finishes and [`CoreError::DeviceDeleted`] is returned.
    pub async fn add_device(&self, descriptor: DeviceDescriptor) -> Result<(), CoreError> {
        let id = descriptor.id.clone();
        let state = DeviceState::new(&id, Arc::clone(&self.inner.sink));
        let routine = devices::build(
            &descriptor,
            &self.inner.ctx,
            state.clone(),
            &self.inner.schedule,
        );

        match self.inner.devices.entry(id.clone()) {
            Entry::Occupied(_) => {
                return Err(CoreError::Config {
                    message: format!("device {id} is already added"),
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(ManagedDevice {
                    descriptor: descriptor.clone(),
                    state,
                    routine: Arc::clone(&routine),
                    driver: None,
                });
            }
        }

        let driver = self.on_init(&descriptor, &routine).await;

        // The entry may have been deleted, or deleted and re-added, while
        // the first refresh ran.
        let orphaned = match self.inner.devices.get_mut(&id) {
            Some(mut device) if Arc::ptr_eq(&device.routine, &routine) => {
                device.driver = Some(driver);
                None
            }
            _ => Some(driver),
        };
        if let Some(driver) = orphaned {
            self.detach(&routine, &driver);
            info!(device = %id, "device deleted during initialization");
            return Err(CoreError::DeviceDeleted { id });
        }

        self.on_added(&id);
        Ok(())
    }

    async fn on_init(&self, descriptor: &DeviceDescriptor, routine: &Arc<dyn Refreshable>) -> Driver {
        info!(device = %descriptor.id, kind = %descriptor.kind, "initializing device");
        if let Err(e) = routine.refresh().await {
            warn!(device = %descriptor.id, error = %e, "initial refresh failed");
        }

        match descriptor.kind.tier() {
            Some(tier) => {
                self.inner.scheduler.register(tier, Arc::clone(routine));
                Driver::Tier(tier)
            }
            None => {
                let delay = staggered_delay(self.inner.schedule.max_initial_delay);
                debug!(device = %descriptor.id, ?delay, "starting independent timer");
                Driver::Timer(IndependentTimer::spawn(
                    Arc::clone(routine),
                    delay,
                    self.inner.schedule.independent_period,
                    self.inner.scheduler.cancel_token(),
                ))
            }
        }
    }

    fn on_added(&self, id: &str) {
        info!(device = id, total = self.inner.devices.len(), "device added");
    }

    /// Apply settings the user changed on a device, then record them.
    pub async fn on_settings_changed(
        &self,
        id: &str,
        changed: &DeviceSettings,
    ) -> Result<(), CoreError> {
        let (descriptor, state) = self.lookup(id)?;

        match descriptor.kind {
            DeviceKind::Sensor => {
                if let Some(value) = changed.get(ACTIVE_CONTROL_SETTING) {
                    let active = value.as_bool().ok_or_else(|| CoreError::Config {
                        message: format!("{ACTIVE_CONTROL_SETTING} must be a boolean"),
                    })?;
                    self.inner
                        .rooms
                        .set_active_control(&descriptor.tune_id, &descriptor.id, active)
                        .await?;
                }
            }
            DeviceKind::Tune => {
                self.update_control_settings(&descriptor.tune_id, changed)
                    .await?;
            }
            DeviceKind::OutdoorSensor | DeviceKind::TrackOpto | DeviceKind::TrackHan => {}
        }

        state.set_settings(changed.clone());
        debug!(device = id, keys = ?changed.keys().collect::<Vec<_>>(), "settings applied");
        Ok(())
    }

    async fn update_control_settings(
        &self,
        tune_id: &str,
        changed: &DeviceSettings,
    ) -> Result<(), CoreError> {
        let spot = changed.get(SPOT_PRICE_CONTROL_SETTING);
        let factor = changed.get(SPOT_PRICE_FACTOR_SETTING);
        if spot.is_none() && factor.is_none() {
            return Ok(());
        }

        let client = &self.inner.ctx.client;
        let mut settings = client.get_control_settings(tune_id).await?;
        if let Some(v) = spot {
            settings.control_on_spot_price = v.as_bool().ok_or_else(|| CoreError::Config {
                message: format!("{SPOT_PRICE_CONTROL_SETTING} must be a boolean"),
            })?;
        }
        if let Some(v) = factor {
            settings.spot_price_factor_index = v.as_i64().ok_or_else(|| CoreError::Config {
                message: format!("{SPOT_PRICE_FACTOR_SETTING} must be an integer"),
            })?;
        }
        client.set_control_settings(tune_id, &settings).await?;
        info!(tune_id, "control settings updated");
        Ok(())
    }

    /// A capability written by the user. Only a tune's target temperature
    /// is settable.
    pub async fn on_capability_set(
        &self,
        id: &str,
        capability: Capability,
        value: f64,
    ) -> Result<(), CoreError> {
        let (descriptor, state) = self.lookup(id)?;
        if descriptor.kind != DeviceKind::Tune || capability != Capability::TargetTemperature {
            return Err(CoreError::Unsupported {
                operation: format!("set {capability} on {}", descriptor.kind),
            });
        }

        self.inner
            .rooms
            .set_target_temperature(&descriptor.tune_id, value)
            .await?;
        state.set_value(Capability::TargetTemperature, value);
        Ok(())
    }

    pub fn on_renamed(&self, id: &str, name: &str) -> Result<(), CoreError> {
        let mut device = self
            .inner
            .devices
            .get_mut(id)
            .ok_or_else(|| CoreError::DeviceNotFound { id: id.to_owned() })?;
        info!(device = id, from = %device.descriptor.name, to = name, "device renamed");
        device.descriptor.name = name.to_owned();
        Ok(())
    }

    /// Stop polling a device. A refresh already running finishes but its
    /// results are discarded. A device still in its first refresh is
    /// detached by [`add_device`](Self::add_device) once that refresh ends.
    pub fn on_deleted(&self, id: &str) -> Result<(), CoreError> {
        let (_, device) = self
            .inner
            .devices
            .remove(id)
            .ok_or_else(|| CoreError::DeviceNotFound { id: id.to_owned() })?;
        device.state.mark_deleted();
        if let Some(driver) = &device.driver {
            self.detach(&device.routine, driver);
        }
        info!(device = id, "device deleted");
        Ok(())
    }

    fn detach(&self, routine: &Arc<dyn Refreshable>, driver: &Driver) {
        match driver {
            Driver::Tier(tier) => {
                self.inner.scheduler.unregister(*tier, routine);
            }
            Driver::Timer(timer) => timer.cancel(),
        }
    }

    // ── User actions ─────────────────────────────────────────────

    pub async fn activate_sensor(&self, id: &str) -> Result<(), CoreError> {
        self.set_sensor_active(id, true).await
    }

    /// Fails with [`CoreError::InvariantViolation`] when this is the last
    /// active room of its installation.
    pub async fn deactivate_sensor(&self, id: &str) -> Result<(), CoreError> {
        self.set_sensor_active(id, false).await
    }

    async fn set_sensor_active(&self, id: &str, active: bool) -> Result<(), CoreError> {
        let (descriptor, state) = self.lookup(id)?;
        if descriptor.kind != DeviceKind::Sensor {
            return Err(CoreError::Unsupported {
                operation: format!("active control on {}", descriptor.kind),
            });
        }

        self.inner
            .rooms
            .set_active_control(&descriptor.tune_id, &descriptor.id, active)
            .await?;

        let mut settings = DeviceSettings::new();
        settings.insert(ACTIVE_CONTROL_SETTING.into(), Value::Bool(active));
        state.set_settings(settings);
        Ok(())
    }

    // ── Settings subscription ────────────────────────────────────

    /// Follow `access_token` changes in `settings` until shutdown.
    pub fn watch_settings(&self, settings: Arc<SettingsStore>) -> JoinHandle<()> {
        let mut rx = settings.subscribe();
        let credential = self.credential().clone();
        let cancel = self.inner.scheduler.cancel_token().child_token();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(key) if key == ACCESS_TOKEN_KEY => apply_token(&settings, &credential),
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "settings receiver lagged");
                            apply_token(&settings, &credential);
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
            debug!("settings watcher exited");
        })
    }

    fn lookup(&self, id: &str) -> Result<(DeviceDescriptor, DeviceState), CoreError> {
        self.inner
            .devices
            .get(id)
            .map(|d| (d.descriptor.clone(), d.state.clone()))
            .ok_or_else(|| CoreError::DeviceNotFound { id: id.to_owned() })
    }
}

fn apply_token(settings: &SettingsStore, credential: &Credential) {
    let token = settings.get_str(ACCESS_TOKEN_KEY).map(SecretString::from);
    credential.update_credential(token);
    info!("access token reloaded from settings");
}

impl std::fmt::Debug for Integration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Integration")
            .field("client", &self.inner.ctx.client)
            .field("scheduler", &self.inner.scheduler)
            .field("devices", &self.inner.devices.len())
            .finish_non_exhaustive()
    }
}
