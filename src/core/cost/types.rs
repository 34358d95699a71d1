//! Cost calculation types

use serde::{Deserialize, Serialize};

/// Token usage reported by a provider call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageTokens {
    /// Input/prompt tokens
    pub prompt_tokens: u64,
    /// Output/completion tokens
    pub completion_tokens: u64,
    /// Total tokens (prompt + completion)
    pub total_tokens: u64,
}

impl UsageTokens {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Sum two usage records
    pub fn combine(&self, other: &UsageTokens) -> Self {
        Self::new(
            self.prompt_tokens + other.prompt_tokens,
            self.completion_tokens + other.completion_tokens,
        )
    }

    pub fn is_empty(&self) -> bool {
        self.total_tokens == 0
    }
}

/// Pricing and default limits for one upstream model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Input cost per token (USD)
    #[serde(default)]
    pub input_cost_per_token: f64,
    /// Output cost per token (USD)
    #[serde(default)]
    pub output_cost_per_token: f64,
    /// Requests per minute a deployment of this model gets when it sets none
    #[serde(default)]
    pub default_rpm: Option<u64>,
    /// Tokens per minute a deployment of this model gets when it sets none
    #[serde(default)]
    pub default_tpm: Option<u64>,
}

impl ModelPricing {
    pub fn new(input_cost_per_token: f64, output_cost_per_token: f64) -> Self {
        Self {
            input_cost_per_token,
            output_cost_per_token,
            ..Default::default()
        }
    }

    /// Set default rate limits (builder pattern)
    pub fn with_default_limits(mut self, rpm: Option<u64>, tpm: Option<u64>) -> Self {
        self.default_rpm = rpm;
        self.default_tpm = tpm;
        self
    }
}
