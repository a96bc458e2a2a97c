// ── Update scheduling ──
//
// `round_robin` is the rotation primitive, `registry` wraps it for
// refreshable devices, `driver` runs the two tiers on tokio intervals,
// `timer` covers self-timed devices and `throttle` decides the per-refresh
// field scope.

mod driver;
mod registry;
mod round_robin;
mod throttle;
mod timer;

pub use driver::{Scheduler, Tier};
pub use registry::{Refreshable, UpdateRegistry};
pub use round_robin::RoundRobin;
pub use throttle::{DEFAULT_EXTRA_DATA_INTERVAL, Throttle, ThrottlePolicy, should_refresh_extra};
pub use timer::{IndependentTimer, staggered_delay};
