//! Rate limiter types and data structures

use crate::core::counter_store::{CounterKey, CounterMetric, ScopeKind};
use serde::{Deserialize, Serialize};

/// Rate limit result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    /// Whether the amount was admitted
    pub allowed: bool,
    /// Counter value after the call (unchanged when rejected)
    pub current_count: u64,
    /// Configured limit (None = unlimited)
    pub limit: Option<u64>,
    /// Remaining headroom in the window
    pub remaining: Option<u64>,
    /// Time until the window resets (in seconds)
    pub reset_after_secs: u64,
    /// Retry after (in seconds, only set when not allowed)
    pub retry_after_secs: Option<u64>,
}

/// Limits configured for one level of the admission chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeLimit {
    pub kind: ScopeKind,
    pub id: String,
    pub rpm_limit: Option<u64>,
    pub tpm_limit: Option<u64>,
}

impl ScopeLimit {
    pub fn new(
        kind: ScopeKind,
        id: impl Into<String>,
        rpm_limit: Option<u64>,
        tpm_limit: Option<u64>,
    ) -> Self {
        Self {
            kind,
            id: id.into(),
            rpm_limit,
            tpm_limit,
        }
    }

    /// Whether any limit is configured at this level
    pub fn is_limited(&self) -> bool {
        self.rpm_limit.is_some() || self.tpm_limit.is_some()
    }
}

/// Why an admission chain stopped
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Rate limit exceeded for {scope} '{scope_id}' ({metric}): {current}/{limit}")]
pub struct RateLimitRejection {
    pub scope: ScopeKind,
    pub scope_id: String,
    pub metric: CounterMetric,
    pub current: u64,
    pub limit: u64,
    pub retry_after_secs: u64,
}

/// One counter increment made by an admission chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Charge {
    pub(super) key: CounterKey,
    pub(super) window_start: i64,
    pub(super) amount: i64,
}

/// Increments made by a successful admission chain
///
/// Kept by the caller so TPM estimates can be reconciled to actual usage, or
/// the whole chain rolled back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdmissionTicket {
    pub(super) charges: Vec<Charge>,
    /// Tokens charged to every TPM counter in the chain
    pub estimated_tokens: u64,
}

impl AdmissionTicket {
    /// Number of counters this ticket touched
    pub fn len(&self) -> usize {
        self.charges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.charges.is_empty()
    }
}
