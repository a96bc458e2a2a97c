// ── Device refresh routines ──
//
// One `Refreshable` per device kind. Every routine fetches its fields
// independently: a failed field is logged and skipped, the others are
// still published. The throttle is consulted before any fetch so the
// counter advances even when the upstream is down.

mod outdoor_sensor;
mod sensor;
mod track_han;
mod track_opto;
mod tune;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use tunely_api::TunesClient;
use tunely_api::models::{MeasurementType, NodeStatus};

use crate::config::{DeviceDescriptor, DeviceKind, ScheduleConfig};
use crate::error::CoreError;
use crate::host::{Capability, DeviceState};
use crate::schedule::{Refreshable, Throttle};
use crate::time::Calendar;

use outdoor_sensor::OutdoorSensor;
use sensor::Sensor;
use track_han::TrackHan;
use track_opto::TrackOpto;
use tune::Tune;

/// Shared collaborators handed to every device routine.
#[derive(Clone)]
pub struct DeviceContext {
    pub client: TunesClient,
    pub calendar: Arc<dyn Calendar>,
}

/// Build the refresh routine for `descriptor`.
pub fn build(
    descriptor: &DeviceDescriptor,
    ctx: &DeviceContext,
    state: DeviceState,
    schedule: &ScheduleConfig,
) -> Arc<dyn Refreshable> {
    let throttle = Throttle::new(schedule.extra_data_interval, schedule.throttle_policy);
    let common = Common {
        client: ctx.client.clone(),
        tune_id: descriptor.tune_id.clone(),
        state,
        throttle,
    };
    match descriptor.kind {
        DeviceKind::Tune => Arc::new(Tune::new(common, descriptor.controller_id.clone())),
        DeviceKind::Sensor => Arc::new(Sensor::new(common, descriptor.id.clone())),
        DeviceKind::OutdoorSensor => {
            Arc::new(OutdoorSensor::new(common, descriptor.controller_id.clone()))
        }
        DeviceKind::TrackOpto => Arc::new(TrackOpto::new(
            common,
            descriptor.id.clone(),
            Arc::clone(&ctx.calendar),
        )),
        DeviceKind::TrackHan => Arc::new(TrackHan::new(
            common,
            descriptor.id.clone(),
            Arc::clone(&ctx.calendar),
        )),
    }
}

// ── Shared plumbing ──────────────────────────────────────────────────

/// State every routine carries.
pub(crate) struct Common {
    pub(crate) client: TunesClient,
    pub(crate) tune_id: String,
    pub(crate) state: DeviceState,
    pub(crate) throttle: Throttle,
}

impl Common {
    fn label(&self) -> &str {
        self.state.id()
    }

    /// Latest value of `kind` for `node_id`, or `None` on any failure.
    async fn latest(&self, node_id: &str, kind: MeasurementType) -> Option<f64> {
        match self
            .client
            .latest_measurement(&self.tune_id, node_id, kind)
            .await
        {
            Ok(Some(m)) => Some(m.value),
            Ok(None) => {
                debug!(device = self.label(), measurement = %kind, "no data yet");
                None
            }
            Err(e) => {
                self.fetch_failed(kind.as_ref(), &e);
                None
            }
        }
    }

    /// Fetch `kind` and publish it unchanged under `capability`.
    async fn publish_latest(&self, node_id: &str, kind: MeasurementType, capability: Capability) {
        if let Some(v) = self.latest(node_id, kind).await {
            self.state.set_value(capability, v);
        }
    }

    /// Sum of `kind` over `[from, now)`, or `None` on any failure.
    async fn total_since(
        &self,
        node_id: &str,
        kind: MeasurementType,
        from: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<f64> {
        match self
            .client
            .measurement_series(&self.tune_id, node_id, kind, from, now)
            .await
        {
            Ok(series) => Some(series.map_or(0.0, |s| s.total())),
            Err(e) => {
                self.fetch_failed(kind.as_ref(), &e);
                None
            }
        }
    }

    /// Publish battery and signal strength for `node_id`.
    async fn publish_node_status(&self, node_id: &str) {
        match self.client.node_status(&self.tune_id, node_id).await {
            Ok(Some(status)) => self.apply_node_status(&status),
            Ok(None) => debug!(device = self.label(), "no node status reported"),
            Err(e) => self.fetch_failed("nodestatus", &e),
        }
    }

    /// Log a failed field fetch at a level matching its cause.
    fn fetch_failed(&self, what: &str, err: &tunely_api::Error) {
        if err.is_not_found() {
            debug!(device = self.label(), what, "not reported by this node");
        } else if err.is_auth() {
            warn!(device = self.label(), what, error = %err, "access token missing or rejected");
        } else if err.is_transient() {
            info!(device = self.label(), what, error = %err, "fetch failed, retrying next refresh");
        } else {
            warn!(device = self.label(), what, error = %err, "fetch failed");
        }
    }

    fn apply_node_status(&self, status: &NodeStatus) {
        self.state
            .set_value(Capability::MeasureBattery, status.battery_percent());
        if let Some(signal) = status.signal_percent() {
            self.state.set_value(Capability::MeasureSignalStrength, signal);
        }
    }
}

/// Lazily resolved controller node UUID.
pub(crate) struct ControllerId {
    cell: OnceCell<String>,
}

impl ControllerId {
    pub(crate) fn new(known: Option<String>) -> Self {
        Self {
            cell: OnceCell::new_with(known),
        }
    }

    pub(crate) async fn get(&self, client: &TunesClient, tune_id: &str) -> Result<&str, CoreError> {
        let id = self
            .cell
            .get_or_try_init(|| async {
                client
                    .controller_uuid(tune_id)
                    .await?
                    .ok_or_else(|| CoreError::ControllerNotFound {
                        tune_id: tune_id.to_owned(),
                    })
            })
            .await?;
        Ok(id.as_str())
    }
}

/// kW to W.
pub(crate) fn kilowatts_to_watts(kw: f64) -> f64 {
    kw * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_conversion() {
        assert!((kilowatts_to_watts(1.234) - 1234.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn known_controller_id_needs_no_lookup() {
        let Ok(client) = TunesClient::new(
            "http://127.0.0.1:9/",
            tunely_api::Credential::default(),
            &tunely_api::TransportConfig::default(),
        ) else {
            panic!("client construction failed");
        };
        let id = ControllerId::new(Some("c1".into()));
        let Ok(resolved) = id.get(&client, "t1").await else {
            panic!("lookup should not hit the network");
        };
        assert_eq!(resolved, "c1");
    }
}
