//! Dispatch error taxonomy
//!
//! Only terminal outcomes cross the engine boundary. Each variant carries the
//! offending scope or deployment so the caller can choose a status code.

use crate::core::budget::{BudgetExceeded, BudgetLevel};
use crate::core::providers::ProviderError;
use crate::core::rate_limiter::RateLimitRejection;
use crate::core::router::DeploymentId;
use std::fmt;

/// Hook that vetoed a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardrailStage {
    /// Before admission
    Request,
    /// After a successful provider call
    Response,
}

impl fmt::Display for GuardrailStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GuardrailStage::Request => "request",
            GuardrailStage::Response => "response",
        })
    }
}

/// Terminal outcome of a failed dispatch
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    BudgetExceeded(#[from] BudgetExceeded),

    #[error(transparent)]
    RateLimited(#[from] RateLimitRejection),

    #[error("No eligible deployment for model: {model}")]
    NoEligibleDeployment { model: String },

    /// Every deployment of the group and its fallbacks failed or was skipped
    #[error("All deployments unavailable for model {model}: {last_error}")]
    AllDeploymentsUnavailable {
        model: String,
        last_error: ProviderError,
    },

    #[error("Retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        last_error: ProviderError,
    },

    /// Non-retryable provider failure (auth, validation)
    #[error("Deployment {deployment_id} failed: {source}")]
    Provider {
        deployment_id: DeploymentId,
        #[source]
        source: ProviderError,
    },

    #[error("Guardrail rejected {stage}: {reason}")]
    GuardrailRejected { stage: GuardrailStage, reason: String },
}

impl DispatchError {
    /// Stable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::BudgetExceeded(_) => "budget_exceeded",
            DispatchError::RateLimited(_) => "rate_limited",
            DispatchError::NoEligibleDeployment { .. } => "no_eligible_deployment",
            DispatchError::AllDeploymentsUnavailable { .. } => "all_deployments_unavailable",
            DispatchError::RetriesExhausted { .. } => "retries_exhausted",
            DispatchError::Provider { .. } => "provider_error",
            DispatchError::GuardrailRejected { .. } => "guardrail_rejected",
        }
    }

    /// Budget level that rejected the request
    pub fn budget_level(&self) -> Option<BudgetLevel> {
        match self {
            DispatchError::BudgetExceeded(err) => Some(err.level),
            _ => None,
        }
    }

    /// Last provider error seen before giving up
    pub fn last_provider_error(&self) -> Option<&ProviderError> {
        match self {
            DispatchError::AllDeploymentsUnavailable { last_error, .. }
            | DispatchError::RetriesExhausted { last_error, .. } => Some(last_error),
            DispatchError::Provider { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Whether the same request may succeed later without any change
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DispatchError::RateLimited(_)
                | DispatchError::NoEligibleDeployment { .. }
                | DispatchError::AllDeploymentsUnavailable { .. }
                | DispatchError::RetriesExhausted { .. }
        )
    }
}
