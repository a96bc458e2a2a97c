// ── Self-timed refresh ──
//
// For devices that poll on their own fixed period instead of a tier. The
// first run waits a random delay so a restart does not fire every such
// device at once.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::driver::log_refresh_error;
use super::registry::Refreshable;

const MIN_PERIOD: Duration = Duration::from_secs(1);

/// Uniform random delay in `[0, max)`.
pub fn staggered_delay(max: Duration) -> Duration {
    if max.is_zero() {
        return Duration::ZERO;
    }
    rand::thread_rng().gen_range(Duration::ZERO..max)
}

/// A running independent timer. Dropping it cancels the timer; a refresh
/// that is already running is allowed to finish.
#[derive(Debug)]
pub struct IndependentTimer {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl IndependentTimer {
    /// Wait `initial_delay`, then refresh `target` every `period`.
    pub fn spawn(
        target: Arc<dyn Refreshable>,
        initial_delay: Duration,
        period: Duration,
        parent: &CancellationToken,
    ) -> Self {
        let cancel = parent.child_token();
        let handle = tokio::spawn(timer_task(target, initial_delay, period, cancel.clone()));
        Self { cancel, handle }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for IndependentTimer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn timer_task(
    target: Arc<dyn Refreshable>,
    initial_delay: Duration,
    period: Duration,
    cancel: CancellationToken,
) {
    debug!(device = target.label(), ?initial_delay, ?period, "independent timer armed");
    tokio::select! {
        biased;
        () = cancel.cancelled() => return,
        () = tokio::time::sleep(initial_delay) => {}
    }

    let mut interval = tokio::time::interval(period.max(MIN_PERIOD));
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = target.refresh().await {
                    log_refresh_error(target.label(), &e);
                }
            }
        }
    }
    debug!(device = target.label(), "independent timer stopped");
}
