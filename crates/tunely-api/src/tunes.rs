// Installation-level endpoints
//
// Topology, rooms, control settings and setpoint schedules. Rooms and
// control settings are read-modify-write resources: callers fetch, mutate,
// and PUT the whole document back.

use tracing::debug;

use crate::client::TunesClient;
use crate::error::Error;
use crate::models::{ControlSettings, Room, Tune, TuneSummary};

impl TunesClient {
    /// List the installations visible to the current access token.
    ///
    /// `GET tunes`
    pub async fn list_tunes(&self) -> Result<Vec<TuneSummary>, Error> {
        self.get("tunes").await
    }

    /// Fetch one installation's topology: gateway, child nodes and rooms.
    ///
    /// `GET tunes/{tune_id}`
    pub async fn get_tune(&self, tune_id: &str) -> Result<Tune, Error> {
        self.get(&format!("tunes/{tune_id}")).await
    }

    /// UUID of the installation's controller node, if it has one.
    pub async fn controller_uuid(&self, tune_id: &str) -> Result<Option<String>, Error> {
        let tune = self.get_tune(tune_id).await?;
        Ok(tune.controller_uuid().map(str::to_owned))
    }

    /// `GET tunes/{tune_id}/controlsettings`
    pub async fn get_control_settings(&self, tune_id: &str) -> Result<ControlSettings, Error> {
        self.get(&format!("tunes/{tune_id}/controlsettings")).await
    }

    /// `PUT tunes/{tune_id}/controlsettings`
    pub async fn set_control_settings(
        &self,
        tune_id: &str,
        settings: &ControlSettings,
    ) -> Result<(), Error> {
        debug!(tune_id, ?settings, "updating control settings");
        self.put(&format!("tunes/{tune_id}/controlsettings"), settings)
            .await
    }

    /// `GET tunes/{tune_id}/rooms`
    pub async fn get_rooms(&self, tune_id: &str) -> Result<Vec<Room>, Error> {
        self.get(&format!("tunes/{tune_id}/rooms")).await
    }

    /// Replace the full room list.
    ///
    /// `PUT tunes/{tune_id}/rooms`
    pub async fn set_rooms(&self, tune_id: &str, rooms: &[Room]) -> Result<(), Error> {
        debug!(tune_id, count = rooms.len(), "writing room list");
        self.put(&format!("tunes/{tune_id}/rooms"), &rooms).await
    }

    /// `GET tunes/{tune_id}/setpointschedules`
    ///
    /// Loosely typed: the schedule format is not consumed by the scheduler.
    pub async fn setpoint_schedules(&self, tune_id: &str) -> Result<serde_json::Value, Error> {
        self.get(&format!("tunes/{tune_id}/setpointschedules"))
            .await
    }
}
