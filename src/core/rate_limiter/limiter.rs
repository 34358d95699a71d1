//! Core rate limiter implementation

use super::types::{AdmissionTicket, Charge, RateLimitRejection, RateLimitResult, ScopeLimit};
use super::utils::{reset_after, to_amount, to_count, window_start};
use crate::core::clock::Clock;
use crate::core::counter_store::{
    AtomicCounterStore, CounterKey, CounterMetric, CounterOutcome, ScopeKind,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Fixed-window RPM/TPM limiter over a shared counter store
#[derive(Debug, Clone)]
pub struct RateLimiter {
    store: Arc<dyn AtomicCounterStore>,
    clock: Arc<dyn Clock>,
    /// Window duration in seconds
    window_secs: i64,
}

impl RateLimiter {
    /// Create a limiter with one-minute windows
    pub fn new(store: Arc<dyn AtomicCounterStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_window(store, clock, Duration::from_secs(60))
    }

    /// Create a rate limiter with custom window
    pub fn with_window(
        store: Arc<dyn AtomicCounterStore>,
        clock: Arc<dyn Clock>,
        window: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            window_secs: i64::try_from(window.as_secs()).unwrap_or(60).max(1),
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(to_count(self.window_secs))
    }

    /// Start of the active window
    pub fn current_window(&self) -> i64 {
        window_start(self.clock.now_epoch_seconds(), self.window_secs)
    }

    /// Atomically admit `amount` against `limit` in the current window
    ///
    /// A `None` limit always admits and leaves the counter alone.
    pub fn try_admit(
        &self,
        scope: ScopeKind,
        scope_id: &str,
        metric: CounterMetric,
        amount: u64,
        limit: Option<u64>,
    ) -> RateLimitResult {
        let now = self.clock.now_epoch_seconds();
        let window = window_start(now, self.window_secs);
        let reset_after_secs = reset_after(now, self.window_secs);

        let Some(limit) = limit else {
            return RateLimitResult {
                allowed: true,
                current_count: 0,
                limit: None,
                remaining: None,
                reset_after_secs,
                retry_after_secs: None,
            };
        };

        let key = CounterKey::new(scope, scope_id, metric);
        let outcome = self
            .store
            .try_add(&key, window, to_amount(amount), Some(to_amount(limit)));
        let current_count = to_count(outcome.value());

        if !outcome.is_admitted() {
            debug!(
                "Rate limit exceeded for {}: {}+{} > {}",
                key, current_count, amount, limit
            );
        }

        RateLimitResult {
            allowed: outcome.is_admitted(),
            current_count,
            limit: Some(limit),
            remaining: Some(limit.saturating_sub(current_count)),
            reset_after_secs,
            retry_after_secs: (!outcome.is_admitted()).then_some(reset_after_secs.max(1)),
        }
    }

    /// Current window value of a counter
    pub fn current(&self, scope: ScopeKind, scope_id: &str, metric: CounterMetric) -> u64 {
        let key = CounterKey::new(scope, scope_id, metric);
        to_count(self.store.current(&key, self.current_window()))
    }

    /// Run the admission chain over `levels` in order
    ///
    /// For each level RPM is charged one request and TPM `estimated_tokens`.
    /// Levels without a limit for a metric are skipped. The first rejection
    /// rolls back every increment this chain already made.
    pub fn admit_chain(
        &self,
        levels: &[ScopeLimit],
        estimated_tokens: u64,
    ) -> Result<AdmissionTicket, RateLimitRejection> {
        let now = self.clock.now_epoch_seconds();
        let window = window_start(now, self.window_secs);
        let mut ticket = AdmissionTicket {
            charges: Vec::new(),
            estimated_tokens,
        };

        for level in levels {
            let checks = [
                (CounterMetric::Rpm, 1u64, level.rpm_limit),
                (CounterMetric::Tpm, estimated_tokens, level.tpm_limit),
            ];

            for (metric, amount, limit) in checks {
                let Some(limit) = limit else {
                    continue;
                };
                let key = CounterKey::new(level.kind, level.id.as_str(), metric);
                let amount = to_amount(amount);

                match self.store.try_add(&key, window, amount, Some(to_amount(limit))) {
                    CounterOutcome::Admitted(_) => ticket.charges.push(Charge {
                        key,
                        window_start: window,
                        amount,
                    }),
                    CounterOutcome::Rejected(current) => {
                        self.rollback(&ticket);
                        debug!(
                            scope = %level.kind,
                            scope_id = %level.id,
                            %metric,
                            current,
                            limit,
                            "Admission chain rejected"
                        );
                        return Err(RateLimitRejection {
                            scope: level.kind,
                            scope_id: level.id.clone(),
                            metric,
                            current: to_count(current),
                            limit,
                            retry_after_secs: reset_after(now, self.window_secs).max(1),
                        });
                    }
                }
            }
        }

        Ok(ticket)
    }

    /// Undo every increment recorded in `ticket`
    pub fn rollback(&self, ticket: &AdmissionTicket) {
        for charge in ticket.charges.iter().rev() {
            self.store
                .adjust(&charge.key, charge.window_start, -charge.amount);
        }
    }

    /// Move TPM charges from the estimate to the observed token count
    ///
    /// Counters are clamped at zero; a window that already rolled over is left alone.
    pub fn reconcile(&self, ticket: &AdmissionTicket, actual_tokens: u64) {
        let delta = to_amount(actual_tokens) - to_amount(ticket.estimated_tokens);
        if delta == 0 {
            return;
        }
        for charge in ticket
            .charges
            .iter()
            .filter(|c| c.key.metric == CounterMetric::Tpm)
        {
            self.store.adjust(&charge.key, charge.window_start, delta);
        }
    }
}
