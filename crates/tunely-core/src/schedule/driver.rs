// ── Scheduler driver ──
//
// Two tier tasks, each an interval loop that pulls one refreshable from
// its registry per tick. The refresh itself runs on its own task so a slow
// upstream call never delays the next tick, and its error is logged there.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;
use strum::Display;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::registry::{Refreshable, UpdateRegistry};
use crate::config::ScheduleConfig;
use crate::error::CoreError;

/// Polling tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Tier {
    /// Heating devices (tunes and room sensors).
    Device,
    /// Energy meters.
    Track,
}

/// Drives both tiers. Cheaply cloneable.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    device: UpdateRegistry,
    track: UpdateRegistry,
    device_tick: Duration,
    track_tick: Duration,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(config: &ScheduleConfig) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                device: UpdateRegistry::new("device"),
                track: UpdateRegistry::new("track"),
                device_tick: config.device_tick,
                track_tick: config.track_tick,
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    // ── Registration entry points ────────────────────────────────

    pub fn register_update_callback(&self, target: Arc<dyn Refreshable>) {
        self.inner.device.register(target);
    }

    pub fn unregister_update_callback(&self, target: &Arc<dyn Refreshable>) -> bool {
        self.inner.device.unregister(target)
    }

    pub fn register_track_update_callback(&self, target: Arc<dyn Refreshable>) {
        self.inner.track.register(target);
    }

    pub fn unregister_track_update_callback(&self, target: &Arc<dyn Refreshable>) -> bool {
        self.inner.track.unregister(target)
    }

    /// Register on the given tier.
    pub fn register(&self, tier: Tier, target: Arc<dyn Refreshable>) {
        match tier {
            Tier::Device => self.register_update_callback(target),
            Tier::Track => self.register_track_update_callback(target),
        }
    }

    /// Unregister from the given tier. Returns `false` if absent.
    pub fn unregister(&self, tier: Tier, target: &Arc<dyn Refreshable>) -> bool {
        match tier {
            Tier::Device => self.unregister_update_callback(target),
            Tier::Track => self.unregister_track_update_callback(target),
        }
    }

    pub fn registry(&self, tier: Tier) -> &UpdateRegistry {
        match tier {
            Tier::Device => &self.inner.device,
            Tier::Track => &self.inner.track,
        }
    }

    fn period(&self, tier: Tier) -> Duration {
        match tier {
            Tier::Device => self.inner.device_tick,
            Tier::Track => self.inner.track_tick,
        }
    }

    /// Token cancelled on [`shutdown`](Self::shutdown). Self-timed devices
    /// derive their timers from it.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.inner.cancel
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Spawn the tier tasks. Must be called from within a tokio runtime.
    /// A scheduler runs once: after [`shutdown`](Self::shutdown) this is a
    /// no-op.
    pub fn start(&self) {
        if self.inner.cancel.is_cancelled() {
            warn!("scheduler was shut down and cannot be restarted");
            return;
        }
        let mut handles = self
            .inner
            .task_handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !handles.is_empty() {
            debug!("scheduler already started");
            return;
        }

        for tier in [Tier::Device, Tier::Track] {
            let period = self.period(tier);
            if period.is_zero() {
                warn!(%tier, "tick period is zero, tier disabled");
                continue;
            }
            let scheduler = self.clone();
            let cancel = self.inner.cancel.child_token();
            handles.push(tokio::spawn(tier_task(scheduler, tier, period, cancel)));
        }
        info!(
            device_tick = ?self.inner.device_tick,
            track_tick = ?self.inner.track_tick,
            "scheduler started"
        );
    }

    /// Cancel the tier tasks and wait for them to exit. In-flight refreshes
    /// are left to finish on their own.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let handles: Vec<_> = self
            .inner
            .task_handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for result in join_all(handles).await {
            if let Err(e) = result {
                warn!(error = %e, "tier task ended abnormally");
            }
        }
        debug!("scheduler stopped");
    }

    /// Run one tick of `tier` now: pick the next refreshable and spawn its
    /// refresh. Returns the refresh task, or `None` if the tier is empty.
    pub fn tick(&self, tier: Tier) -> Option<JoinHandle<()>> {
        let Some(target) = self.registry(tier).next() else {
            trace!(%tier, "tick with nothing registered");
            return None;
        };
        Some(tokio::spawn(dispatch(tier, target)))
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("device", &self.inner.device)
            .field("track", &self.inner.track)
            .finish_non_exhaustive()
    }
}

/// Refresh one target, absorbing its error.
async fn dispatch(tier: Tier, target: Arc<dyn Refreshable>) {
    debug!(%tier, device = target.label(), "refreshing");
    if let Err(e) = target.refresh().await {
        log_refresh_error(target.label(), &e);
    }
}

/// Failures a later tick may clear are logged below warning level.
pub(super) fn log_refresh_error(device: &str, err: &CoreError) {
    if err.is_retryable() {
        info!(device, error = %err, "refresh failed, retrying on a later tick");
    } else {
        warn!(device, error = %err, "refresh failed");
    }
}

async fn tier_task(scheduler: Scheduler, tier: Tier, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                scheduler.tick(tier);
            }
        }
    }
    debug!(%tier, "tier task exited");
}
