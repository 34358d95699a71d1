//! Dispatch request and result types

use crate::core::cost::UsageTokens;
use crate::core::providers::ProviderResponse;
use crate::core::router::{AttemptOutcome, DeploymentId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Resolved identity of one inbound request
///
/// Authentication has already happened; the engine only reads these ids to
/// find budgets and rate limits.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequestScope {
    pub key_id: String,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub org_id: Option<String>,
    /// Models this key may use (empty = all)
    #[serde(default)]
    pub allowed_models: HashSet<String>,
    pub requested_model_alias: String,
    /// Pre-call token estimate; derived from the prompt when absent
    #[serde(default)]
    pub estimated_tokens: Option<u64>,
}

impl RequestScope {
    pub fn new(key_id: impl Into<String>, requested_model_alias: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            requested_model_alias: requested_model_alias.into(),
            ..Default::default()
        }
    }

    pub fn with_team(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = Some(team_id.into());
        self
    }

    pub fn with_org(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }

    pub fn with_allowed_models<I>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        self.allowed_models = models.into_iter().collect();
        self
    }

    pub fn with_estimated_tokens(mut self, tokens: u64) -> Self {
        self.estimated_tokens = Some(tokens);
        self
    }
}

/// Body of a dispatch call
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub prompt: String,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub stream: bool,
}

impl DispatchRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

/// Tokens and cost charged for a request, across all attempts
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageAndCost {
    pub usage: UsageTokens,
    /// USD
    pub cost: f64,
}

impl UsageAndCost {
    pub fn add(&mut self, usage: &UsageTokens, cost: f64) {
        self.usage = self.usage.combine(usage);
        self.cost += cost;
    }
}

/// One attempt against one deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub deployment_id: DeploymentId,
    pub model_group: String,
    /// 1-based
    pub attempt_number: u32,
    pub started_at: DateTime<Utc>,
    pub outcome: AttemptOutcome,
    #[serde(default)]
    pub latency_ms: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Successful dispatch result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchResponse {
    pub request_id: String,
    pub response: ProviderResponse,
    pub usage: UsageAndCost,
    /// Model group that produced the response (differs from the request after a fallback)
    pub model_group: String,
    pub cache_hit: bool,
    pub decisions: Vec<RoutingDecision>,
}

impl DispatchResponse {
    /// Deployment that served the response, if any was called
    pub fn deployment_id(&self) -> Option<&str> {
        self.decisions
            .iter()
            .rev()
            .find(|d| d.outcome == AttemptOutcome::Success)
            .map(|d| d.deployment_id.as_str())
    }

    pub fn attempts(&self) -> u32 {
        u32::try_from(self.decisions.len()).unwrap_or(u32::MAX)
    }
}
