//! Errors raised by provider adapters
//!
//! The dispatcher reads two things from a [`ProviderError`]: whether another
//! deployment may succeed ([`ProviderError::is_retryable`]) and how many tokens
//! were burnt before the failure ([`ProviderError::partial_usage`]).
//!
//! Capacity failures (rate limits, timeouts, network, 5xx, broken streams) are
//! retryable and count towards cooldown. Request and credential problems are
//! terminal: retrying them elsewhere cannot help.

use crate::core::cost::UsageTokens;

/// Error returned by [`ProviderAdapter::invoke`](super::ProviderAdapter::invoke)
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("{provider} rejected the credentials: {message}")]
    Authentication {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} rejected the request: {message}")]
    InvalidRequest {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} does not serve model '{model}'")]
    ModelNotFound {
        provider: &'static str,
        model: String,
    },

    /// Upstream 429 or quota signal
    #[error("{provider} is rate limiting this deployment")]
    RateLimit {
        provider: &'static str,
        retry_after: Option<u64>,
    },

    #[error("Network error talking to {provider}: {message}")]
    Network {
        provider: &'static str,
        message: String,
    },

    /// The per-attempt deadline elapsed
    #[error("{provider} timed out: {message}")]
    Timeout {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} is unavailable: {message}")]
    ProviderUnavailable {
        provider: &'static str,
        message: String,
    },

    /// Raw upstream status; only 408, 429 and 5xx are retryable
    #[error("{provider} returned status {status}: {message}")]
    ApiError {
        provider: &'static str,
        status: u16,
        message: String,
    },

    /// The stream broke after some tokens were already produced
    #[error("Stream from {provider} broke after {} tokens: {message}", usage.total_tokens)]
    Streaming {
        provider: &'static str,
        message: String,
        usage: UsageTokens,
    },

    #[error("{provider} error: {message}")]
    Other {
        provider: &'static str,
        message: String,
    },
}

impl ProviderError {
    pub fn authentication(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Authentication {
            provider,
            message: message.into(),
        }
    }

    pub fn invalid_request(provider: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            provider,
            message: message.into(),
        }
    }

    pub fn model_not_found(provider: &'static str, model: impl Into<String>) -> Self {
        Self::ModelNotFound {
            provider,
            model: model.into(),
        }
    }

    /// Upstream rate limit, with the `Retry-After` seconds when the provider sent one
    pub fn rate_limit(provider: &'static str, retry_after: Option<u64>) -> Self {
        Self::RateLimit {
            provider,
            retry_after,
        }
    }

    pub fn network(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Network {
            provider,
            message: message.into(),
        }
    }

    pub fn timeout(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Timeout {
            provider,
            message: message.into(),
        }
    }

    pub fn provider_unavailable(provider: &'static str, message: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            provider,
            message: message.into(),
        }
    }

    pub fn api_error(provider: &'static str, status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            provider,
            status,
            message: message.into(),
        }
    }

    /// Broken stream carrying the usage observed before the break
    pub fn streaming(
        provider: &'static str,
        message: impl Into<String>,
        usage: UsageTokens,
    ) -> Self {
        Self::Streaming {
            provider,
            message: message.into(),
            usage,
        }
    }

    pub fn other(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Other {
            provider,
            message: message.into(),
        }
    }

    /// Adapter that raised the error
    pub fn provider(&self) -> &'static str {
        match self {
            Self::Authentication { provider, .. }
            | Self::InvalidRequest { provider, .. }
            | Self::ModelNotFound { provider, .. }
            | Self::RateLimit { provider, .. }
            | Self::Network { provider, .. }
            | Self::Timeout { provider, .. }
            | Self::ProviderUnavailable { provider, .. }
            | Self::ApiError { provider, .. }
            | Self::Streaming { provider, .. }
            | Self::Other { provider, .. } => provider,
        }
    }

    /// Whether another deployment may succeed where this one failed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimit { .. }
            | Self::Network { .. }
            | Self::Timeout { .. }
            | Self::ProviderUnavailable { .. }
            | Self::Streaming { .. } => true,
            Self::ApiError { status, .. } => matches!(*status, 408 | 429 | 500..=599),
            Self::Authentication { .. }
            | Self::InvalidRequest { .. }
            | Self::ModelNotFound { .. }
            | Self::Other { .. } => false,
        }
    }

    /// Tokens consumed before the failure, if the provider reported any
    pub fn partial_usage(&self) -> Option<UsageTokens> {
        match self {
            Self::Streaming { usage, .. } if !usage.is_empty() => Some(*usage),
            _ => None,
        }
    }
}
