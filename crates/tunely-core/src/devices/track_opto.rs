// Track optical pulse reader: instantaneous power every refresh, node
// status and today's imported energy on throttled refreshes.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tunely_api::models::MeasurementType;

use super::{Common, kilowatts_to_watts};
use crate::error::CoreError;
use crate::host::Capability;
use crate::schedule::Refreshable;
use crate::time::Calendar;

pub(crate) struct TrackOpto {
    common: Common,
    node_id: String,
    calendar: Arc<dyn Calendar>,
}

impl TrackOpto {
    pub(crate) fn new(common: Common, node_id: String, calendar: Arc<dyn Calendar>) -> Self {
        Self {
            common,
            node_id,
            calendar,
        }
    }
}

#[async_trait]
impl Refreshable for TrackOpto {
    fn label(&self) -> &str {
        self.common.label()
    }

    async fn refresh(&self) -> Result<(), CoreError> {
        let extra = self.common.throttle.tick();

        if let Some(kw) = self.common.latest(&self.node_id, MeasurementType::Power).await {
            self.common
                .state
                .set_value(Capability::MeasurePower, kilowatts_to_watts(kw));
        }

        if extra {
            self.common.publish_node_status(&self.node_id).await;

            let now = Utc::now();
            let from = self.calendar.start_of_day(now);
            if let Some(kwh) = self
                .common
                .total_since(&self.node_id, MeasurementType::Energy, from, now)
                .await
            {
                self.common.state.set_value(Capability::ImportedToday, kwh);
            }
        }
        Ok(())
    }
}
