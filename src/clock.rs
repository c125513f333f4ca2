//! Injectable clock — every comparison to "now" routes through here so
//! tests can drive expiry and timestamp-freshness checks deterministically.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// A source of the current Unix time, in whole seconds.
pub trait Clock: Send + Sync {
    /// Current Unix epoch time, in seconds.
    fn now(&self) -> u64;
}

/// The real wall clock, backed by [`SystemTime::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

/// A fixed clock for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        self.0
    }
}

/// Shared handle to a clock, cheap to clone across stores and clients.
pub type SharedClock = Arc<dyn Clock>;

/// The default clock: the real wall clock.
#[must_use]
pub fn system() -> SharedClock {
    Arc::new(SystemClock)
}
