// ── Room control ──
//
// Read-modify-write of an installation's room list. Every installation
// must keep at least one room with active control; a change that would
// leave none is rejected before anything is written upstream.
//
// Writes made by this process are serialized per installation, so two
// local toggles cannot interleave their fetch and PUT. Changes made by
// other API clients between our GET and PUT are not detected.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use tunely_api::TunesClient;
use tunely_api::models::Room;

use crate::error::CoreError;

/// Per-installation async locks for room-list writes.
#[derive(Debug, Clone, Default)]
pub struct RoomLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl RoomLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `tune_id`'s room list.
    pub async fn lock(&self, tune_id: &str) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(self.locks.entry(tune_id.to_owned()).or_default().value());
        lock.lock_owned().await
    }
}

/// Set `active` on the room driven by `node_id`, refusing to leave the
/// installation without an active room.
///
/// On error `rooms` is left untouched.
pub fn apply_active_control(
    rooms: &mut [Room],
    node_id: &str,
    active: bool,
) -> Result<(), CoreError> {
    let idx = rooms
        .iter()
        .position(|r| r.node_uuid == node_id)
        .ok_or_else(|| CoreError::RoomNotFound {
            node_id: node_id.to_owned(),
        })?;

    let active_after = rooms
        .iter()
        .enumerate()
        .filter(|&(i, r)| if i == idx { active } else { r.active_control })
        .count();
    if active_after == 0 {
        return Err(CoreError::InvariantViolation {
            message: "at least one room must keep active control".into(),
        });
    }

    if let Some(room) = rooms.get_mut(idx) {
        room.active_control = active;
    }
    Ok(())
}

/// The room whose target temperature the installation currently follows.
pub fn active_room<'a>(rooms: &'a [Room], tune_id: &str) -> Result<&'a Room, CoreError> {
    rooms
        .iter()
        .find(|r| r.active_control)
        .ok_or_else(|| CoreError::NoActiveRoom {
            tune_id: tune_id.to_owned(),
        })
}

/// Room-list operations against the API, serialized per installation.
#[derive(Debug, Clone)]
pub struct RoomControl {
    client: TunesClient,
    locks: RoomLocks,
}

impl RoomControl {
    pub fn new(client: TunesClient) -> Self {
        Self {
            client,
            locks: RoomLocks::new(),
        }
    }

    /// Toggle active control for the room driven by `node_id`.
    ///
    /// The full room list is written back even when the flag already has
    /// the requested value. Deactivating the last active room fails with
    /// [`CoreError::InvariantViolation`] and writes nothing.
    pub async fn set_active_control(
        &self,
        tune_id: &str,
        node_id: &str,
        active: bool,
    ) -> Result<(), CoreError> {
        let _guard = self.locks.lock(tune_id).await;

        let mut rooms = self.client.get_rooms(tune_id).await?;
        if let Err(e) = apply_active_control(&mut rooms, node_id, active) {
            warn!(tune_id, node_id, active, error = %e, "active control change rejected");
            return Err(e);
        }

        self.client.set_rooms(tune_id, &rooms).await?;
        info!(tune_id, node_id, active, "active control updated");
        Ok(())
    }

    /// Set the same target temperature on every room of the installation.
    pub async fn set_target_temperature(
        &self,
        tune_id: &str,
        celsius: f64,
    ) -> Result<(), CoreError> {
        if !celsius.is_finite() {
            return Err(CoreError::Config {
                message: format!("invalid target temperature: {celsius}"),
            });
        }
        let _guard = self.locks.lock(tune_id).await;

        let mut rooms = self.client.get_rooms(tune_id).await?;
        for room in &mut rooms {
            room.target_temperature = celsius;
        }
        debug!(tune_id, celsius, rooms = rooms.len(), "writing target temperature");

        self.client.set_rooms(tune_id, &rooms).await?;
        info!(tune_id, celsius, "target temperature updated");
        Ok(())
    }

    /// Current room list (no lock; read-only).
    pub async fn rooms(&self, tune_id: &str) -> Result<Vec<Room>, CoreError> {
        Ok(self.client.get_rooms(tune_id).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::Map;

    fn room(node: &str, active: bool) -> Room {
        Room {
            uuid: Some(format!("room-{node}")),
            name: node.to_uppercase(),
            node_uuid: node.to_owned(),
            active_control: active,
            target_temperature: 21.0,
            extra: Map::new(),
        }
    }

    fn flags(rooms: &[Room]) -> Vec<bool> {
        rooms.iter().map(|r| r.active_control).collect()
    }

    #[test]
    fn deactivating_last_active_room_is_rejected() {
        let mut rooms = vec![room("a", true), room("b", false), room("c", false)];
        let err = apply_active_control(&mut rooms, "a", false).unwrap_err();
        assert!(matches!(err, CoreError::InvariantViolation { .. }));
        assert_eq!(flags(&rooms), [true, false, false]);
    }

    #[test]
    fn activating_second_room_succeeds() {
        let mut rooms = vec![room("a", true), room("b", false), room("c", false)];
        apply_active_control(&mut rooms, "b", true).unwrap();
        assert_eq!(flags(&rooms), [true, true, false]);

        // now either can be turned off
        apply_active_control(&mut rooms, "a", false).unwrap();
        assert_eq!(flags(&rooms), [false, true, false]);
    }

    #[test]
    fn activation_counts_toward_the_invariant() {
        // nothing active yet: activating one room restores the invariant
        let mut rooms = vec![room("a", false), room("b", false)];
        apply_active_control(&mut rooms, "b", true).unwrap();
        assert_eq!(flags(&rooms), [false, true]);
    }

    #[test]
    fn no_op_deactivation_of_inactive_room_needs_another_active() {
        let mut rooms = vec![room("a", false), room("b", false)];
        let err = apply_active_control(&mut rooms, "a", false).unwrap_err();
        assert!(matches!(err, CoreError::InvariantViolation { .. }));
    }

    #[test]
    fn unknown_node_is_reported() {
        let mut rooms = vec![room("a", true)];
        let err = apply_active_control(&mut rooms, "zzz", true).unwrap_err();
        assert!(matches!(err, CoreError::RoomNotFound { ref node_id } if node_id == "zzz"));
    }

    #[test]
    fn active_room_picks_first_active() {
        let rooms = vec![room("a", false), room("b", true), room("c", true)];
        assert_eq!(active_room(&rooms, "t").unwrap().node_uuid, "b");
        assert!(matches!(
            active_room(&[room("a", false)], "t"),
            Err(CoreError::NoActiveRoom { .. })
        ));
    }

    #[tokio::test]
    async fn locks_are_per_installation() {
        let locks = RoomLocks::new();
        let held = locks.lock("t1").await;

        // a different installation is not blocked
        let other = tokio::time::timeout(std::time::Duration::from_millis(50), locks.lock("t2")).await;
        assert!(other.is_ok());

        // the same installation is
        let same = tokio::time::timeout(std::time::Duration::from_millis(50), locks.lock("t1")).await;
        assert!(same.is_err());

        drop(held);
        let again = tokio::time::timeout(std::time::Duration::from_millis(50), locks.lock("t1")).await;
        assert!(again.is_ok());
    }
}
