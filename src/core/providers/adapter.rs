//! Provider adapter interface
//!
//! The dispatcher never talks to a vendor directly. It hands a
//! [`ProviderRequest`] to a [`ProviderAdapter`] together with the selected
//! deployment and a deadline, and classifies whatever comes back.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::ProviderError;
use crate::core::cost::UsageTokens;
use crate::core::router::Deployment;

/// Request forwarded to an upstream deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// Public model name the caller asked for
    pub model: String,
    /// Prompt text (already flattened by the request layer)
    pub prompt: String,
    /// Maximum output tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Whether the caller wants a streamed response
    #[serde(default)]
    pub stream: bool,
}

impl ProviderRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            max_tokens: None,
            stream: false,
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

/// Response returned by an upstream deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Generated text
    pub content: String,
    /// Upstream model that produced the response
    pub model: String,
    /// Token usage reported by the provider
    pub usage: UsageTokens,
}

impl ProviderResponse {
    pub fn new(content: impl Into<String>, model: impl Into<String>, usage: UsageTokens) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            usage,
        }
    }
}

/// Vendor-specific translation layer
///
/// Implementations translate the request into their wire format, call the
/// upstream and map failures into [`ProviderError`]. The deadline is advisory:
/// the dispatcher enforces it independently.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Adapter name used in logs
    fn name(&self) -> &'static str;

    /// Call the upstream model behind `deployment`
    async fn invoke(
        &self,
        deployment: &Deployment,
        request: &ProviderRequest,
        deadline: Duration,
    ) -> Result<ProviderResponse, ProviderError>;
}
