// Measurement and node-status endpoints

use chrono::{DateTime, SecondsFormat, Utc};

use crate::client::TunesClient;
use crate::error::Error;
use crate::models::{Measurement, MeasurementSeries, MeasurementType, NodeStatus};

impl TunesClient {
    /// Latest scalar measurement of `kind` for a node.
    ///
    /// `GET tunes/{tune_id}/measurements/{node_id}/latest?type=...`
    ///
    /// Returns `None` when the node has not reported this type yet (204).
    pub async fn latest_measurement(
        &self,
        tune_id: &str,
        node_id: &str,
        kind: MeasurementType,
    ) -> Result<Option<Measurement>, Error> {
        self.get_optional(
            &format!("tunes/{tune_id}/measurements/{node_id}/latest"),
            &[("type", kind.to_string())],
        )
        .await
    }

    /// Aggregated measurement of `kind` over `[from, to)`.
    ///
    /// `GET tunes/{tune_id}/measurements/{node_id}?from=...&to=...&type=...`
    pub async fn measurement_series(
        &self,
        tune_id: &str,
        node_id: &str,
        kind: MeasurementType,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<MeasurementSeries>, Error> {
        self.get_optional(
            &format!("tunes/{tune_id}/measurements/{node_id}"),
            &[
                ("from", from.to_rfc3339_opts(SecondsFormat::Millis, true)),
                ("to", to.to_rfc3339_opts(SecondsFormat::Millis, true)),
                ("type", kind.to_string()),
            ],
        )
        .await
    }

    /// Measurement types a node reports.
    ///
    /// `GET tunes/{tune_id}/measurements/{node_id}/types`
    pub async fn measurement_types(
        &self,
        tune_id: &str,
        node_id: &str,
    ) -> Result<Vec<String>, Error> {
        self.get(&format!("tunes/{tune_id}/measurements/{node_id}/types"))
            .await
    }

    /// Battery and radio status of one node.
    ///
    /// `GET tunes/{tune_id}/nodestatus`, filtered client-side. `None` if the
    /// installation reports no status for this node.
    pub async fn node_status(
        &self,
        tune_id: &str,
        node_id: &str,
    ) -> Result<Option<NodeStatus>, Error> {
        let all: Vec<NodeStatus> = self.get(&format!("tunes/{tune_id}/nodestatus")).await?;
        Ok(all.into_iter().find(|s| s.node_uuid == node_id))
    }
}
