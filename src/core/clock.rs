//! Wall clock abstraction
//!
//! Rate windows, cooldowns and budget periods all read time through [`Clock`] so
//! tests can move time forward without sleeping.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::fmt::Debug;

/// Source of the current time
pub trait Clock: Send + Sync + Debug {
    /// Current UTC time
    fn now(&self) -> DateTime<Utc>;

    /// Current time as unix seconds
    fn now_epoch_seconds(&self) -> i64 {
        self.now().timestamp()
    }
}

/// Clock backed by the system time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and simulations
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    /// Create a clock frozen at the given unix timestamp
    pub fn at_epoch_seconds(secs: i64) -> Self {
        Self::new(DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_default())
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write();
        *now += by;
    }

    /// Jump to an absolute time
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.write() = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}
