//! Deployment data structures
//!
//! A [`Deployment`] binds one upstream provider model to a public model alias.
//! Several deployments sharing an alias form a model group. Deployments are
//! static configuration; their runtime state lives in the
//! [`HealthTracker`](super::health::HealthTracker).

use serde::{Deserialize, Serialize};

/// Deployment identifier (unique within router)
pub type DeploymentId = String;

/// Deployment - a concrete provider deployment
///
/// ## Example
///
/// ```rust
/// use litellm_router::core::router::Deployment;
///
/// let deployment = Deployment::new("openai-gpt4-primary", "gpt-4", "openai/gpt-4-turbo")
///     .with_limits(Some(500), Some(100_000))
///     .with_weight(2)
///     .with_tags(vec!["production".to_string()]);
///
/// assert_eq!(deployment.model_alias, "gpt-4");
/// assert_eq!(deployment.rpm_limit, Some(500));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    /// Unique deployment ID
    pub id: DeploymentId,

    /// User-facing model name / model group (e.g., "gpt-4")
    pub model_alias: String,

    /// Provider-specific model name (e.g., "azure/gpt-4-turbo")
    pub provider_model_id: String,

    /// Higher value is preferred on ties
    #[serde(default)]
    pub priority: i32,

    /// Weight for weighted selection
    #[serde(default = "default_weight")]
    pub weight: u32,

    /// Requests per minute limit (None = unlimited)
    #[serde(default)]
    pub rpm_limit: Option<u64>,

    /// Tokens per minute limit (None = unlimited)
    #[serde(default)]
    pub tpm_limit: Option<u64>,

    #[serde(default = "default_active")]
    pub is_active: bool,

    /// USD per prompt token
    #[serde(default)]
    pub cost_per_input_token: f64,

    /// USD per completion token
    #[serde(default)]
    pub cost_per_output_token: f64,

    /// Maximum concurrent calls (None = unlimited)
    #[serde(default)]
    pub max_parallel_requests: Option<u32>,

    /// Per-deployment call deadline override in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Tags for filtering (e.g., ["production", "fast"])
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_weight() -> u32 {
    1
}

fn default_active() -> bool {
    true
}

impl Deployment {
    /// Create a new active deployment with weight 1, no limits and zero cost
    pub fn new(
        id: impl Into<DeploymentId>,
        model_alias: impl Into<String>,
        provider_model_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            model_alias: model_alias.into(),
            provider_model_id: provider_model_id.into(),
            priority: 0,
            weight: default_weight(),
            rpm_limit: None,
            tpm_limit: None,
            is_active: true,
            cost_per_input_token: 0.0,
            cost_per_output_token: 0.0,
            max_parallel_requests: None,
            timeout_secs: None,
            tags: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    /// Set RPM/TPM limits (builder pattern)
    pub fn with_limits(mut self, rpm_limit: Option<u64>, tpm_limit: Option<u64>) -> Self {
        self.rpm_limit = rpm_limit;
        self.tpm_limit = tpm_limit;
        self
    }

    /// Set per-token costs (builder pattern)
    pub fn with_costs(mut self, input: f64, output: f64) -> Self {
        self.cost_per_input_token = input;
        self.cost_per_output_token = output;
        self
    }

    pub fn with_max_parallel_requests(mut self, limit: u32) -> Self {
        self.max_parallel_requests = Some(limit);
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    /// Combined per-token price used by cost-based routing
    pub fn unit_cost(&self) -> f64 {
        self.cost_per_input_token + self.cost_per_output_token
    }

    /// Whether a caller restricted to `allowed_models` may use this deployment
    ///
    /// An empty set allows everything. Either the public alias or the provider
    /// model id may be listed.
    pub fn is_allowed_for<'a, I>(&self, allowed_models: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut any = false;
        for model in allowed_models {
            any = true;
            if *model == self.model_alias || *model == self.provider_model_id {
                return true;
            }
        }
        !any
    }
}
