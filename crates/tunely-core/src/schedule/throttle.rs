// ── Tiered update throttle ──
//
// Decides per refresh whether a device also fetches its expensive fields
// (energy aggregates, battery, signal). One in every `interval` refreshes
// does, starting with the first.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Refreshes between two expensive-field fetches.
pub const DEFAULT_EXTRA_DATA_INTERVAL: u64 = 20;

/// How the per-device counter evolves.
///
/// Both policies fetch extra fields once every `interval` refreshes and
/// both fetch on the first refresh after start.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ThrottlePolicy {
    /// Counter grows without bound; extra when `counter % interval == 0`.
    #[default]
    Modulo,
    /// Counter resets to 0 on reaching `interval`; extra when it is 0.
    Saturating,
}

/// `true` when refresh number `counter` (0-based) should include the
/// expensive fields. An `interval` of 0 or 1 includes them every time.
pub fn should_refresh_extra(counter: u64, interval: u64) -> bool {
    interval <= 1 || counter % interval == 0
}

/// Per-device throttle state.
#[derive(Debug)]
pub struct Throttle {
    counter: AtomicU64,
    interval: u64,
    policy: ThrottlePolicy,
}

impl Throttle {
    pub fn new(interval: u64, policy: ThrottlePolicy) -> Self {
        Self {
            counter: AtomicU64::new(0),
            interval,
            policy,
        }
    }

    /// Decide for this refresh and advance the counter.
    ///
    /// The counter advances whether or not the caller's fetches succeed.
    pub fn tick(&self) -> bool {
        match self.policy {
            ThrottlePolicy::Modulo => {
                let n = self.counter.fetch_add(1, Ordering::Relaxed);
                should_refresh_extra(n, self.interval)
            }
            ThrottlePolicy::Saturating => {
                let interval = self.interval;
                let prev = self
                    .counter
                    .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
                        let next = c + 1;
                        Some(if next >= interval { 0 } else { next })
                    })
                    .unwrap_or_else(|c| c);
                prev == 0
            }
        }
    }

    pub fn policy(&self) -> ThrottlePolicy {
        self.policy
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(DEFAULT_EXTRA_DATA_INTERVAL, ThrottlePolicy::default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn decision_indices(throttle: &Throttle, n: u64) -> Vec<u64> {
        (0..n).filter(|_| throttle.tick()).collect()
    }

    #[test]
    fn pure_decision_is_periodic() {
        let hits: Vec<u64> = (0..40).filter(|&c| should_refresh_extra(c, 20)).collect();
        assert_eq!(hits, [0, 20]);
    }

    #[test]
    fn degenerate_intervals_always_refresh() {
        assert!(should_refresh_extra(7, 0));
        assert!(should_refresh_extra(7, 1));
    }

    #[test]
    fn modulo_policy_first_of_every_twenty() {
        let throttle = Throttle::new(20, ThrottlePolicy::Modulo);
        assert_eq!(decision_indices(&throttle, 40), [0, 20]);
    }

    #[test]
    fn saturating_policy_has_same_frequency() {
        let throttle = Throttle::new(20, ThrottlePolicy::Saturating);
        let found = decision_indices(&throttle, 100);
        assert_eq!(found.len(), 5);
        for pair in found.windows(2) {
            assert_eq!(pair[1] - pair[0], 20);
        }
    }

    #[test]
    fn policy_parses_from_config_strings() {
        assert_eq!("modulo".parse::<ThrottlePolicy>().unwrap(), ThrottlePolicy::Modulo);
        assert_eq!(
            "saturating".parse::<ThrottlePolicy>().unwrap(),
            ThrottlePolicy::Saturating
        );
    }
}
