//! Router error types

/// Router error types
///
/// Defines errors that can occur while resolving and selecting deployments.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    /// No deployment is registered under the model group
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Every deployment of the group was filtered out
    #[error("No eligible deployment for model: {0}")]
    NoEligibleDeployment(String),

    /// Deployment not found by ID
    #[error("Deployment not found: {0}")]
    DeploymentNotFound(String),
}

impl RouterError {
    /// Model group or deployment id the error refers to
    pub fn subject(&self) -> &str {
        match self {
            RouterError::ModelNotFound(s)
            | RouterError::NoEligibleDeployment(s)
            | RouterError::DeploymentNotFound(s) => s,
        }
    }
}
