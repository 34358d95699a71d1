//! Deployment entries of the `model_list` section

use crate::core::cost::PricingTable;
use crate::core::router::Deployment;
use serde::{Deserialize, Serialize};

/// One entry of `model_list`
///
/// Costs and limits left out fall back to the pricing table entry of `model`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeploymentEntry {
    /// Unique id; defaults to `<model_name>-<position>`
    #[serde(default)]
    pub id: Option<String>,
    /// Public model group name
    pub model_name: String,
    /// Upstream model id, e.g. `azure/gpt-4-turbo`
    pub model: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "super::default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub rpm: Option<u64>,
    #[serde(default)]
    pub tpm: Option<u64>,
    #[serde(default)]
    pub input_cost_per_token: Option<f64>,
    #[serde(default)]
    pub output_cost_per_token: Option<f64>,
    #[serde(default)]
    pub max_parallel_requests: Option<u32>,
    /// Call deadline in seconds
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "super::default_true")]
    pub is_active: bool,
}

impl DeploymentEntry {
    pub fn new(model_name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            model: model.into(),
            weight: super::default_weight(),
            is_active: true,
            ..Default::default()
        }
    }

    /// Id of the entry at `position` in the model list
    pub fn resolved_id(&self, position: usize) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => format!("{}-{}", self.model_name, position),
        }
    }

    /// Build the runtime deployment, filling gaps from `pricing`
    pub fn to_deployment(&self, position: usize, pricing: &PricingTable) -> Deployment {
        let defaults = pricing.get(&self.model).cloned().unwrap_or_default();

        let mut deployment =
            Deployment::new(self.resolved_id(position), &self.model_name, &self.model)
                .with_priority(self.priority)
                .with_weight(self.weight)
                .with_limits(
                    self.rpm.or(defaults.default_rpm),
                    self.tpm.or(defaults.default_tpm),
                )
                .with_costs(
                    self.input_cost_per_token
                        .unwrap_or(defaults.input_cost_per_token),
                    self.output_cost_per_token
                        .unwrap_or(defaults.output_cost_per_token),
                )
                .with_tags(self.tags.clone())
                .with_active(self.is_active);
        if let Some(limit) = self.max_parallel_requests {
            deployment = deployment.with_max_parallel_requests(limit);
        }
        if let Some(secs) = self.timeout {
            deployment = deployment.with_timeout_secs(secs);
        }
        deployment
    }
}
