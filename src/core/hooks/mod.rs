//! Pre/post dispatch hooks
//!
//! Response caching and guardrails are opaque to the engine. The dispatcher
//! consults them through the traits below and never looks inside.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::core::dispatch::RequestScope;
use crate::core::providers::{ProviderRequest, ProviderResponse};

/// Response cache keyed by request fingerprint
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn get(&self, fingerprint: &str) -> Option<ProviderResponse>;

    async fn put(&self, fingerprint: &str, response: &ProviderResponse);
}

/// Outcome of a guardrail check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardrailVerdict {
    Allow,
    Deny { reason: String },
}

impl GuardrailVerdict {
    pub fn deny(reason: impl Into<String>) -> Self {
        Self::Deny {
            reason: reason.into(),
        }
    }
}

/// Content check run before admission and after a successful call
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Guardrail: Send + Sync {
    async fn check_request(
        &self,
        scope: &RequestScope,
        request: &ProviderRequest,
    ) -> GuardrailVerdict;

    async fn check_response(
        &self,
        scope: &RequestScope,
        response: &ProviderResponse,
    ) -> GuardrailVerdict;
}

/// Stable cache fingerprint for a request
///
/// Only fields that change the generated output participate.
pub fn request_fingerprint(request: &ProviderRequest) -> String {
    let mut hasher = Sha256::new();
    hasher.update(request.model.as_bytes());
    hasher.update([0u8]);
    hasher.update(request.prompt.as_bytes());
    hasher.update([0u8]);
    if let Some(max_tokens) = request.max_tokens {
        hasher.update(max_tokens.to_be_bytes());
    }
    hex::encode(hasher.finalize())
}
