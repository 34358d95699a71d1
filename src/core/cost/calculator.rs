//! Pricing table and cost calculation

use super::types::{ModelPricing, UsageTokens};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Cost of a single call split by direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
}

/// Price `usage` at the given per-token rates
pub fn generic_cost_per_token(
    input_cost_per_token: f64,
    output_cost_per_token: f64,
    usage: &UsageTokens,
) -> CostBreakdown {
    let input_cost = usage.prompt_tokens as f64 * input_cost_per_token;
    let output_cost = usage.completion_tokens as f64 * output_cost_per_token;
    CostBreakdown {
        input_cost,
        output_cost,
        total_cost: input_cost + output_cost,
    }
}

/// Static lookup of model pricing and default limits, keyed by provider model id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PricingTable {
    models: HashMap<String, ModelPricing>,
}

impl PricingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a model's pricing (builder pattern)
    pub fn with_model(mut self, model: impl Into<String>, pricing: ModelPricing) -> Self {
        self.models.insert(model.into(), pricing);
        self
    }

    pub fn insert(&mut self, model: impl Into<String>, pricing: ModelPricing) {
        self.models.insert(model.into(), pricing);
    }

    pub fn get(&self, model: &str) -> Option<&ModelPricing> {
        self.models.get(model)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModelPricing)> {
        self.models.iter().map(|(model, pricing)| (model.as_str(), pricing))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Price `usage` for `model`; unknown models cost nothing
    pub fn cost_for(&self, model: &str, usage: &UsageTokens) -> f64 {
        self.get(model)
            .map(|p| {
                generic_cost_per_token(p.input_cost_per_token, p.output_cost_per_token, usage)
                    .total_cost
            })
            .unwrap_or(0.0)
    }
}
