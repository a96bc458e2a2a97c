// Controller installation.
//
// Target temperature comes from the active room; setpoint, process value,
// outdoor and control temperatures from the controller node. Throttled
// refreshes add the controller's node status and the spot-price settings.

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;
use tunely_api::models::MeasurementType;

use super::{Common, ControllerId};
use crate::control::active_room;
use crate::error::CoreError;
use crate::host::{
    Capability, DeviceSettings, SPOT_PRICE_CONTROL_SETTING, SPOT_PRICE_FACTOR_SETTING,
};
use crate::schedule::Refreshable;

pub(crate) struct Tune {
    common: Common,
    controller: ControllerId,
}

impl Tune {
    pub(crate) fn new(common: Common, controller_id: Option<String>) -> Self {
        Self {
            common,
            controller: ControllerId::new(controller_id),
        }
    }

    async fn publish_target_temperature(&self) {
        let tune_id = &self.common.tune_id;
        let rooms = match self.common.client.get_rooms(tune_id).await {
            Ok(rooms) => rooms,
            Err(e) => {
                warn!(device = self.label(), error = %e, "room fetch failed");
                return;
            }
        };
        match active_room(&rooms, tune_id) {
            Ok(room) => self
                .common
                .state
                .set_value(Capability::TargetTemperature, room.target_temperature),
            Err(e) => warn!(device = self.label(), error = %e, "no target temperature"),
        }
    }

    async fn sync_control_settings(&self) {
        match self
            .common
            .client
            .get_control_settings(&self.common.tune_id)
            .await
        {
            Ok(cs) => {
                let mut settings = DeviceSettings::new();
                settings.insert(
                    SPOT_PRICE_CONTROL_SETTING.into(),
                    Value::Bool(cs.control_on_spot_price),
                );
                settings.insert(
                    SPOT_PRICE_FACTOR_SETTING.into(),
                    Value::from(cs.spot_price_factor_index),
                );
                self.common.state.set_settings(settings);
            }
            Err(e) => warn!(device = self.label(), error = %e, "control settings fetch failed"),
        }
    }
}

#[async_trait]
impl Refreshable for Tune {
    fn label(&self) -> &str {
        self.common.label()
    }

    async fn refresh(&self) -> Result<(), CoreError> {
        let extra = self.common.throttle.tick();

        self.publish_target_temperature().await;

        let controller = self
            .controller
            .get(&self.common.client, &self.common.tune_id)
            .await?;

        for (kind, capability) in [
            (MeasurementType::Setpoint, Capability::MeasureTemperatureSetpoint),
            (MeasurementType::ProcessValue, Capability::MeasureTemperature),
            (MeasurementType::Temperature, Capability::MeasureTemperatureOutside),
            (MeasurementType::ControlValue, Capability::MeasureTemperatureControl),
        ] {
            self.common.publish_latest(controller, kind, capability).await;
        }

        if extra {
            self.common.publish_node_status(controller).await;
            self.sync_control_settings().await;
        }
        Ok(())
    }
}
