//! Execution helpers
//!
//! Error classification, retry delays and call deadlines used by the
//! dispatcher's retry loop.

use super::config::RouterConfig;
use super::deployment::Deployment;
use super::health::AttemptOutcome;
use crate::core::providers::error::ProviderError;
use std::time::Duration;

/// Upper bound on the delay between two attempts
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Check if an error is retryable
///
/// Capacity problems (timeouts, network, 5xx, upstream rate limits and broken
/// streams) are retryable on another deployment. Auth and validation errors
/// are not.
pub fn is_retryable_error(error: &ProviderError) -> bool {
    error.is_retryable()
}

/// Map a provider error to the attempt outcome recorded in health
pub fn classify_error(error: &ProviderError) -> AttemptOutcome {
    if is_retryable_error(error) {
        AttemptOutcome::RetryableError
    } else {
        AttemptOutcome::TerminalError
    }
}

/// Calculate retry delay using exponential backoff
///
/// The formula is `retry_backoff_ms * 2^(attempt - 1)`, capped at 30 seconds.
/// A zero base disables the delay.
pub fn calculate_retry_delay(config: &RouterConfig, attempt: u32) -> Duration {
    if config.retry_backoff_ms == 0 {
        return Duration::ZERO;
    }
    let factor = 1u64
        .checked_shl(attempt.saturating_sub(1))
        .unwrap_or(u64::MAX);
    Duration::from_millis(config.retry_backoff_ms.saturating_mul(factor)).min(MAX_RETRY_DELAY)
}

/// Deadline for one provider call
///
/// A deployment-level `timeout_secs` wins; otherwise the stream or request
/// timeout from the router settings applies.
pub fn attempt_deadline(config: &RouterConfig, deployment: &Deployment, stream: bool) -> Duration {
    match deployment.timeout_secs {
        Some(secs) => Duration::from_secs(secs),
        None if stream => config.stream_timeout_duration(),
        None => config.request_timeout_duration(),
    }
}
