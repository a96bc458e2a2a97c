// Track HAN port reader.
//
// Every refresh: net power (consumption minus production) and the three
// phase currents. Throttled refreshes: imported and exported energy since
// the start of the local day, month and year.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tunely_api::models::MeasurementType;

use super::{Common, kilowatts_to_watts};
use crate::error::CoreError;
use crate::host::Capability;
use crate::schedule::Refreshable;
use crate::time::Calendar;

pub(crate) struct TrackHan {
    common: Common,
    node_id: String,
    calendar: Arc<dyn Calendar>,
}

impl TrackHan {
    pub(crate) fn new(common: Common, node_id: String, calendar: Arc<dyn Calendar>) -> Self {
        Self {
            common,
            node_id,
            calendar,
        }
    }

    async fn publish_power(&self) {
        let node = &self.node_id;
        let Some(power) = self.common.latest(node, MeasurementType::Power).await else {
            return;
        };
        // Installations without production never report it.
        let produced = self
            .common
            .latest(node, MeasurementType::ProducedPower)
            .await
            .unwrap_or(0.0);
        self.common
            .state
            .set_value(Capability::MeasurePower, kilowatts_to_watts(power - produced));
    }

    async fn publish_energy(&self) {
        let now = Utc::now();
        let periods = [
            (
                self.calendar.start_of_day(now),
                Capability::ImportedToday,
                Capability::ExportedToday,
            ),
            (
                self.calendar.start_of_month(now),
                Capability::ImportedMonth,
                Capability::ExportedMonth,
            ),
            (
                self.calendar.start_of_year(now),
                Capability::ImportedYear,
                Capability::ExportedYear,
            ),
        ];

        for (from, imported, exported) in periods {
            for (kind, capability) in [
                (MeasurementType::Energy, imported),
                (MeasurementType::ProducedEnergy, exported),
            ] {
                if let Some(kwh) = self
                    .common
                    .total_since(&self.node_id, kind, from, now)
                    .await
                {
                    self.common.state.set_value(capability, kwh);
                }
            }
        }
    }
}

#[async_trait]
impl Refreshable for TrackHan {
    fn label(&self) -> &str {
        self.common.label()
    }

    async fn refresh(&self) -> Result<(), CoreError> {
        let extra = self.common.throttle.tick();

        self.publish_power().await;
        for (kind, capability) in [
            (MeasurementType::CurrentL1, Capability::MeasureCurrentL1),
            (MeasurementType::CurrentL2, Capability::MeasureCurrentL2),
            (MeasurementType::CurrentL3, Capability::MeasureCurrentL3),
        ] {
            self.common.publish_latest(&self.node_id, kind, capability).await;
        }

        if extra {
            self.publish_energy().await;
        }
        Ok(())
    }
}
