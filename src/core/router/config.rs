//! Router configuration types
//!
//! This module defines the routing strategies and the settings that drive
//! selection, cooldown, retry and timeout behaviour.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Routing strategy enumeration
///
/// Closed set of selection algorithms. Every variant is dispatched through
/// [`super::strategy_impl::select_for`].
///
/// ## Strategies
///
/// - **RoundRobin**: rotating cursor per model group (`simple-shuffle` is accepted as an alias)
/// - **Weighted**: cumulative-weight random draw
/// - **LeastBusy**: fewest in-flight requests
/// - **LatencyBased**: lowest latency EWMA, unseen deployments first
/// - **CostBased**: lowest input + output token price
/// - **RateLimitAware**: drop deployments close to their limits, then apply a tiebreak strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoutingStrategy {
    #[default]
    #[serde(alias = "simple-shuffle")]
    RoundRobin,
    Weighted,
    LeastBusy,
    LatencyBased,
    CostBased,
    RateLimitAware,
}

impl RoutingStrategy {
    /// All strategies, in declaration order
    pub const ALL: [RoutingStrategy; 6] = [
        RoutingStrategy::RoundRobin,
        RoutingStrategy::Weighted,
        RoutingStrategy::LeastBusy,
        RoutingStrategy::LatencyBased,
        RoutingStrategy::CostBased,
        RoutingStrategy::RateLimitAware,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingStrategy::RoundRobin => "round-robin",
            RoutingStrategy::Weighted => "weighted",
            RoutingStrategy::LeastBusy => "least-busy",
            RoutingStrategy::LatencyBased => "latency-based",
            RoutingStrategy::CostBased => "cost-based",
            RoutingStrategy::RateLimitAware => "rate-limit-aware",
        }
    }
}

impl fmt::Display for RoutingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoutingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "round-robin" | "simple-shuffle" => Ok(RoutingStrategy::RoundRobin),
            "weighted" => Ok(RoutingStrategy::Weighted),
            "least-busy" => Ok(RoutingStrategy::LeastBusy),
            "latency-based" => Ok(RoutingStrategy::LatencyBased),
            "cost-based" => Ok(RoutingStrategy::CostBased),
            "rate-limit-aware" => Ok(RoutingStrategy::RateLimitAware),
            other => Err(format!("unknown routing strategy: {}", other)),
        }
    }
}

/// Router configuration
///
/// ## Defaults
///
/// - `routing_strategy`: round-robin
/// - `rate_limit_aware_tiebreak`: least-busy
/// - `rate_limit_headroom`: 0.9
/// - `num_retries`: 3
/// - `retry_backoff_ms`: 0 (no delay between retries)
/// - `request_timeout`: 60s, `stream_timeout`: 120s
/// - `failure_threshold`: 3, `cooldown_base_seconds`: 30, `cooldown_max_seconds`: 300
/// - `latency_ewma_alpha`: 0.2
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Routing strategy to use for deployment selection
    pub routing_strategy: RoutingStrategy,

    /// Strategy applied after the rate-limit-aware filter
    pub rate_limit_aware_tiebreak: RoutingStrategy,

    /// Usage ratio (0..=1) at which rate-limit-aware selection skips a deployment
    pub rate_limit_headroom: f64,

    /// Number of retries after the first attempt
    pub num_retries: u32,

    /// Base delay between retries in milliseconds, doubled per attempt
    pub retry_backoff_ms: u64,

    /// Provider call deadline in seconds
    pub request_timeout: u64,

    /// Provider call deadline in seconds for streamed requests
    pub stream_timeout: u64,

    /// First cooldown length in seconds
    pub cooldown_base_seconds: u64,

    /// Upper bound on cooldown length in seconds
    pub cooldown_max_seconds: u64,

    /// Consecutive retryable failures before a deployment is cooled down
    pub failure_threshold: u32,

    /// Weight of the newest latency sample
    pub latency_ewma_alpha: f64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            routing_strategy: RoutingStrategy::RoundRobin,
            rate_limit_aware_tiebreak: RoutingStrategy::LeastBusy,
            rate_limit_headroom: 0.9,
            num_retries: 3,
            retry_backoff_ms: 0,
            request_timeout: 60,
            stream_timeout: 120,
            cooldown_base_seconds: 30,
            cooldown_max_seconds: 300,
            failure_threshold: 3,
            latency_ewma_alpha: 0.2,
        }
    }
}

impl RouterConfig {
    /// Maximum number of provider calls per request
    pub fn max_attempts(&self) -> u32 {
        self.num_retries.saturating_add(1)
    }

    pub fn request_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn stream_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.stream_timeout)
    }
}
