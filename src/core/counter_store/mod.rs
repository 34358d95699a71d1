//! Shared counter primitives
//!
//! Rate windows, budget spend and round-robin cursors all live behind the narrow
//! [`AtomicCounterStore`] interface. Every operation is an atomic read-modify-write
//! on a single key, so implementations may be in-process or backed by a shared
//! external store without touching the routing logic.

mod memory;


pub use memory::InMemoryCounterStore;

use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};

/// Kind of entity a counter belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    /// A single upstream deployment
    Deployment,
    /// An API key
    Key,
    /// A team
    Team,
    /// An organization
    Org,
    /// A model group (used for round-robin cursors)
    ModelGroup,
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScopeKind::Deployment => "deployment",
            ScopeKind::Key => "key",
            ScopeKind::Team => "team",
            ScopeKind::Org => "org",
            ScopeKind::ModelGroup => "model_group",
        };
        f.write_str(name)
    }
}

/// Quantity being counted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterMetric {
    /// Requests per minute
    Rpm,
    /// Tokens per minute
    Tpm,
    /// Spend in nano-dollars
    Spend,
    /// Rotating selection cursor
    Cursor,
}

impl fmt::Display for CounterMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CounterMetric::Rpm => "rpm",
            CounterMetric::Tpm => "tpm",
            CounterMetric::Spend => "spend",
            CounterMetric::Cursor => "cursor",
        };
        f.write_str(name)
    }
}

/// Identity of one counter; the window is passed separately per call
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey {
    pub scope: ScopeKind,
    pub scope_id: String,
    pub metric: CounterMetric,
}

impl CounterKey {
    pub fn new(scope: ScopeKind, scope_id: impl Into<String>, metric: CounterMetric) -> Self {
        Self {
            scope,
            scope_id: scope_id.into(),
            metric,
        }
    }
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.scope, self.scope_id, self.metric)
    }
}

/// Result of an atomic check-and-add
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterOutcome {
    /// The amount was added; carries the new value
    Admitted(i64),
    /// The limit would have been exceeded; carries the unchanged value
    Rejected(i64),
}

impl CounterOutcome {
    pub fn is_admitted(&self) -> bool {
        matches!(self, CounterOutcome::Admitted(_))
    }

    pub fn value(&self) -> i64 {
        match self {
            CounterOutcome::Admitted(v) | CounterOutcome::Rejected(v) => *v,
        }
    }
}

/// Atomic per-key counters with a single active window per key
///
/// A key holds exactly one window at a time. Any operation naming a newer
/// `window_start` than the stored one rotates the counter to zero first.
/// Operations naming an older window never rotate backwards.
pub trait AtomicCounterStore: Send + Sync + Debug {
    /// Read the value for `window_start`, rotating if the stored window is older
    fn current(&self, key: &CounterKey, window_start: i64) -> i64;

    /// Add `amount` unless `current + amount > limit`; `None` limit always admits
    fn try_add(
        &self,
        key: &CounterKey,
        window_start: i64,
        amount: i64,
        limit: Option<i64>,
    ) -> CounterOutcome;

    /// Add a signed delta clamped at zero; ignored if `window_start` is no longer active
    fn adjust(&self, key: &CounterKey, window_start: i64, delta: i64) -> i64;

    /// Unwindowed increment returning the previous value
    fn fetch_add(&self, key: &CounterKey, amount: i64) -> i64;

    /// Drop the counter entirely
    fn reset(&self, key: &CounterKey);
}
