// Outdoor temperature as measured by the controller node. Runs on its own
// timer, so there is no throttled part.

use async_trait::async_trait;
use tracing::debug;
use tunely_api::models::MeasurementType;

use super::{Common, ControllerId};
use crate::error::CoreError;
use crate::host::Capability;
use crate::schedule::Refreshable;

pub(crate) struct OutdoorSensor {
    common: Common,
    controller: ControllerId,
}

impl OutdoorSensor {
    pub(crate) fn new(common: Common, controller_id: Option<String>) -> Self {
        Self {
            common,
            controller: ControllerId::new(controller_id),
        }
    }
}

#[async_trait]
impl Refreshable for OutdoorSensor {
    fn label(&self) -> &str {
        self.common.label()
    }

    async fn refresh(&self) -> Result<(), CoreError> {
        let client = &self.common.client;
        let tune_id = &self.common.tune_id;
        let controller = self.controller.get(client, tune_id).await?;

        match client
            .latest_measurement(tune_id, controller, MeasurementType::Temperature)
            .await?
        {
            Some(m) => self
                .common
                .state
                .set_value(Capability::MeasureTemperature, m.value),
            None => debug!(device = self.label(), "no outdoor temperature yet"),
        }
        Ok(())
    }
}
