// Room sensor: temperature and humidity every refresh; battery, signal and
// the room's active-control flag on throttled refreshes.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use tunely_api::models::MeasurementType;

use super::Common;
use crate::error::CoreError;
use crate::host::{ACTIVE_CONTROL_SETTING, Capability, DeviceSettings};
use crate::schedule::Refreshable;

pub(crate) struct Sensor {
    common: Common,
    node_id: String,
}

impl Sensor {
    pub(crate) fn new(common: Common, node_id: String) -> Self {
        Self { common, node_id }
    }

    /// Mirror the room's `activeControl` flag into the device settings.
    async fn sync_active_control(&self) {
        let rooms = match self.common.client.get_rooms(&self.common.tune_id).await {
            Ok(rooms) => rooms,
            Err(e) => {
                self.common.fetch_failed("rooms", &e);
                return;
            }
        };
        let Some(room) = rooms.iter().find(|r| r.node_uuid == self.node_id) else {
            debug!(device = self.label(), "sensor is not assigned to a room");
            return;
        };

        let mut settings = DeviceSettings::new();
        settings.insert(
            ACTIVE_CONTROL_SETTING.into(),
            Value::Bool(room.active_control),
        );
        self.common.state.set_settings(settings);
    }
}

#[async_trait]
impl Refreshable for Sensor {
    fn label(&self) -> &str {
        self.common.label()
    }

    async fn refresh(&self) -> Result<(), CoreError> {
        let extra = self.common.throttle.tick();

        self.common
            .publish_latest(&self.node_id, MeasurementType::Temperature, Capability::MeasureTemperature)
            .await;
        self.common
            .publish_latest(&self.node_id, MeasurementType::Humidity, Capability::MeasureHumidity)
            .await;

        if extra {
            self.common.publish_node_status(&self.node_id).await;
            self.sync_active_control().await;
        }
        Ok(())
    }
}
