//! Per-deployment health tracking
//!
//! The tracker owns the runtime half of every deployment: consecutive failures,
//! cooldown deadline, latency EWMA and in-flight count. All fields are atomics
//! updated per deployment, so unrelated deployments never contend.
//!
//! Cooldown rules:
//! - a retryable failure bumps `consecutive_failures`; at or above the threshold the
//!   deployment is cooled down for `base * 2^(failures - threshold)`, capped at the maximum
//! - a success clears failures and cooldown and feeds the latency EWMA
//! - terminal failures (auth, validation) leave health untouched

use super::config::RouterConfig;
use super::deployment::DeploymentId;
use crate::core::clock::Clock;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, Ordering::Relaxed};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of one provider attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Pending,
    Success,
    RetryableError,
    TerminalError,
}

/// Cooldown and latency parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CooldownPolicy {
    /// Consecutive retryable failures before cooldown
    pub failure_threshold: u32,
    /// First cooldown length
    pub base: Duration,
    /// Cooldown cap
    pub max: Duration,
    /// EWMA weight of the newest latency sample
    pub latency_alpha: f64,
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self::from(&RouterConfig::default())
    }
}

impl From<&RouterConfig> for CooldownPolicy {
    fn from(config: &RouterConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold.max(1),
            base: Duration::from_secs(config.cooldown_base_seconds),
            max: Duration::from_secs(config.cooldown_max_seconds),
            latency_alpha: config.latency_ewma_alpha.clamp(0.0, 1.0),
        }
    }
}

impl CooldownPolicy {
    /// Cooldown length after `consecutive_failures` failures
    pub fn backoff(&self, consecutive_failures: u32) -> Duration {
        let exponent = consecutive_failures.saturating_sub(self.failure_threshold);
        let factor = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }
}

/// Lock-free runtime state of one deployment
#[derive(Debug)]
struct DeploymentState {
    consecutive_failures: AtomicU32,
    /// Unix millis; 0 means no cooldown
    cooldown_until_ms: AtomicI64,
    /// f64 bits; NaN until the first sample
    latency_ewma_bits: AtomicU64,
    in_flight: AtomicU32,
    total_requests: AtomicU64,
    success_requests: AtomicU64,
    fail_requests: AtomicU64,
}

impl Default for DeploymentState {
    fn default() -> Self {
        Self {
            consecutive_failures: AtomicU32::new(0),
            cooldown_until_ms: AtomicI64::new(0),
            latency_ewma_bits: AtomicU64::new(f64::NAN.to_bits()),
            in_flight: AtomicU32::new(0),
            total_requests: AtomicU64::new(0),
            success_requests: AtomicU64::new(0),
            fail_requests: AtomicU64::new(0),
        }
    }
}

impl DeploymentState {
    fn latency_ewma(&self) -> Option<f64> {
        let value = f64::from_bits(self.latency_ewma_bits.load(Relaxed));
        (!value.is_nan()).then_some(value)
    }

    fn observe_latency(&self, latency_ms: f64, alpha: f64) {
        let _ = self
            .latency_ewma_bits
            .fetch_update(Relaxed, Relaxed, |bits| {
                let prev = f64::from_bits(bits);
                let next = if prev.is_nan() {
                    latency_ms
                } else {
                    alpha * latency_ms + (1.0 - alpha) * prev
                };
                Some(next.to_bits())
            });
    }
}

/// Point-in-time view of a deployment's health
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthState {
    pub consecutive_failures: u32,
    pub cooldown_until: Option<DateTime<Utc>>,
    /// Milliseconds; `None` until the first successful call
    pub latency_ewma: Option<f64>,
    pub in_flight_count: u32,
    pub total_requests: u64,
    pub success_requests: u64,
    pub fail_requests: u64,
}

/// Health tracker shared by the selector and the dispatcher
#[derive(Debug)]
pub struct HealthTracker {
    states: DashMap<DeploymentId, Arc<DeploymentState>>,
    policy: CooldownPolicy,
    clock: Arc<dyn Clock>,
}

impl HealthTracker {
    pub fn new(policy: CooldownPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            states: DashMap::new(),
            policy,
            clock,
        }
    }

    pub fn policy(&self) -> &CooldownPolicy {
        &self.policy
    }

    /// Start tracking a deployment; existing state is kept
    pub fn register(&self, deployment_id: &str) {
        self.states
            .entry(deployment_id.to_string())
            .or_default();
    }

    pub fn remove(&self, deployment_id: &str) {
        self.states.remove(deployment_id);
    }

    /// State of a registered deployment; removed ids are never recreated
    fn state(&self, deployment_id: &str) -> Option<Arc<DeploymentState>> {
        self.states
            .get(deployment_id)
            .map(|state| Arc::clone(state.value()))
    }

    /// Record the outcome of a finished attempt
    ///
    /// Outcomes for deployments that are not registered (e.g. removed while the
    /// attempt was in flight) are dropped.
    pub fn record_outcome(&self, deployment_id: &str, outcome: AttemptOutcome, latency_ms: f64) {
        let Some(state) = self.state(deployment_id) else {
            debug!(deployment_id, "Ignoring outcome for unregistered deployment");
            return;
        };

        match outcome {
            AttemptOutcome::Pending => {}
            AttemptOutcome::Success => {
                state.total_requests.fetch_add(1, Relaxed);
                state.success_requests.fetch_add(1, Relaxed);
                let previous_failures = state.consecutive_failures.swap(0, Relaxed);
                let previous_cooldown = state.cooldown_until_ms.swap(0, Relaxed);
                if previous_cooldown != 0 {
                    info!(
                        deployment_id,
                        previous_failures, "Deployment recovered, cooldown cleared"
                    );
                }
                state.observe_latency(latency_ms.max(0.0), self.policy.latency_alpha);
            }
            AttemptOutcome::RetryableError => {
                state.total_requests.fetch_add(1, Relaxed);
                state.fail_requests.fetch_add(1, Relaxed);
                let failures = state.consecutive_failures.fetch_add(1, Relaxed) + 1;
                if failures >= self.policy.failure_threshold {
                    let backoff = self.policy.backoff(failures);
                    let until = self.clock.now()
                        + chrono::Duration::from_std(backoff).unwrap_or(chrono::Duration::zero());
                    state
                        .cooldown_until_ms
                        .store(until.timestamp_millis(), Relaxed);
                    warn!(
                        deployment_id,
                        failures,
                        cooldown_secs = backoff.as_secs(),
                        "Deployment entering cooldown"
                    );
                } else {
                    debug!(deployment_id, failures, "Recorded retryable failure");
                }
            }
            AttemptOutcome::TerminalError => {
                state.total_requests.fetch_add(1, Relaxed);
                state.fail_requests.fetch_add(1, Relaxed);
                debug!(deployment_id, "Terminal failure does not affect cooldown");
            }
        }
    }

    /// Whether the deployment is excluded by an active cooldown
    pub fn is_cooled_down(&self, deployment_id: &str) -> bool {
        self.cooldown_until(deployment_id).is_some()
    }

    /// Active cooldown deadline, if any
    pub fn cooldown_until(&self, deployment_id: &str) -> Option<DateTime<Utc>> {
        let until_ms = self
            .states
            .get(deployment_id)
            .map(|s| s.cooldown_until_ms.load(Relaxed))
            .unwrap_or(0);
        self.active_cooldown(until_ms)
    }

    fn active_cooldown(&self, until_ms: i64) -> Option<DateTime<Utc>> {
        if until_ms == 0 || until_ms <= self.clock.now().timestamp_millis() {
            return None;
        }
        DateTime::<Utc>::from_timestamp_millis(until_ms)
    }

    pub fn in_flight(&self, deployment_id: &str) -> u32 {
        self.states
            .get(deployment_id)
            .map(|s| s.in_flight.load(Relaxed))
            .unwrap_or(0)
    }

    pub fn latency_ewma(&self, deployment_id: &str) -> Option<f64> {
        self.states
            .get(deployment_id)
            .and_then(|s| s.latency_ewma())
    }

    /// Mark the start of a provider call
    ///
    /// The returned guard decrements the in-flight count when dropped, which
    /// covers success, error, timeout and cancellation alike. An unregistered
    /// deployment gets a detached counter that nothing reads.
    pub fn begin_call(&self, deployment_id: &str) -> InFlightGuard {
        let state = self.state(deployment_id).unwrap_or_default();
        state.in_flight.fetch_add(1, Relaxed);
        InFlightGuard { state }
    }

    pub fn snapshot(&self, deployment_id: &str) -> Option<HealthState> {
        let state = self.states.get(deployment_id)?;
        Some(HealthState {
            consecutive_failures: state.consecutive_failures.load(Relaxed),
            cooldown_until: self.active_cooldown(state.cooldown_until_ms.load(Relaxed)),
            latency_ewma: state.latency_ewma(),
            in_flight_count: state.in_flight.load(Relaxed),
            total_requests: state.total_requests.load(Relaxed),
            success_requests: state.success_requests.load(Relaxed),
            fail_requests: state.fail_requests.load(Relaxed),
        })
    }
}

/// Decrements a deployment's in-flight count on drop
#[derive(Debug)]
pub struct InFlightGuard {
    state: Arc<DeploymentState>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let _ = self
            .state
            .in_flight
            .fetch_update(Relaxed, Relaxed, |n| Some(n.saturating_sub(1)));
    }
}
