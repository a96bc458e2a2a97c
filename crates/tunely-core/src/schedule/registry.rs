// ── Refreshable registry ──
//
// One `UpdateRegistry` per tier. Devices register a `Refreshable` handle
// on init and remove the same handle on delete; the tier task pulls one
// handle per tick.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use super::round_robin::RoundRobin;
use crate::error::CoreError;

/// Anything the scheduler can ask to refresh its state now.
#[async_trait]
pub trait Refreshable: Send + Sync {
    /// Short identifier used in log fields.
    fn label(&self) -> &str;

    /// Fetch fresh upstream data and publish it.
    ///
    /// Errors are logged by the caller; they never stop the schedule.
    async fn refresh(&self) -> Result<(), CoreError>;
}

/// Thread-safe round-robin over registered refreshables.
pub struct UpdateRegistry {
    name: &'static str,
    rotation: Mutex<RoundRobin<dyn Refreshable>>,
}

impl UpdateRegistry {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            rotation: Mutex::new(RoundRobin::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn rotation(&self) -> MutexGuard<'_, RoundRobin<dyn Refreshable>> {
        self.rotation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, target: Arc<dyn Refreshable>) {
        debug!(registry = self.name, device = target.label(), "registering");
        self.rotation().add(target);
    }

    /// Returns `false` if `target` was not registered here.
    pub fn unregister(&self, target: &Arc<dyn Refreshable>) -> bool {
        debug!(registry = self.name, device = target.label(), "unregistering");
        self.rotation().remove(target)
    }

    /// Next refreshable in rotation, or `None` when nothing is registered.
    pub fn next(&self) -> Option<Arc<dyn Refreshable>> {
        self.rotation().next()
    }

    pub fn len(&self) -> usize {
        self.rotation().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rotation().is_empty()
    }

    /// Labels of the registered refreshables in rotation order.
    pub fn labels(&self) -> Vec<String> {
        self.rotation()
            .to_vec()
            .iter()
            .map(|r| r.label().to_owned())
            .collect()
    }
}

impl std::fmt::Debug for UpdateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateRegistry")
            .field("name", &self.name)
            .field("len", &self.len())
            .finish()
    }
}
