//! Hand-written provider fakes
//!
//! A scripted adapter whose behaviour is set per deployment, plus an in-memory
//! response cache and a keyword guardrail.

use async_trait::async_trait;
use litellm_router::core::cost::UsageTokens;
use litellm_router::core::dispatch::RequestScope;
use litellm_router::core::hooks::{Guardrail, GuardrailVerdict, ResponseCache};
use litellm_router::core::providers::{
    ProviderAdapter, ProviderError, ProviderRequest, ProviderResponse,
};
use litellm_router::core::router::Deployment;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// What the fake does when a deployment is called
#[derive(Debug, Clone)]
pub enum Behavior {
    Reply(UsageTokens),
    Fail(ProviderError),
    /// Sleep, then reply
    Slow(Duration, UsageTokens),
}

/// Adapter whose replies are scripted per deployment id
#[derive(Debug)]
pub struct ScriptedAdapter {
    default: Behavior,
    behaviors: Mutex<HashMap<String, Behavior>>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicU32,
    max_in_flight: AtomicU32,
}

struct CallGuard<'a>(&'a AtomicU32);

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScriptedAdapter {
    /// Every deployment replies with `usage`
    pub fn replying(usage: UsageTokens) -> Self {
        Self::with_default(Behavior::Reply(usage))
    }

    pub fn with_default(default: Behavior) -> Self {
        Self {
            default,
            behaviors: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicU32::new(0),
            max_in_flight: AtomicU32::new(0),
        }
    }

    pub fn on(self, deployment_id: &str, behavior: Behavior) -> Self {
        self.set(deployment_id, behavior);
        self
    }

    pub fn set(&self, deployment_id: &str, behavior: Behavior) {
        self.behaviors
            .lock()
            .insert(deployment_id.to_string(), behavior);
    }

    /// Deployment ids in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, deployment_id: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|id| id.as_str() == deployment_id)
            .count()
    }

    pub fn in_flight(&self) -> u32 {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> u32 {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn invoke(
        &self,
        deployment: &Deployment,
        _request: &ProviderRequest,
        _deadline: Duration,
    ) -> Result<ProviderResponse, ProviderError> {
        self.calls.lock().push(deployment.id.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = CallGuard(&self.in_flight);

        let behavior = self
            .behaviors
            .lock()
            .get(&deployment.id)
            .cloned()
            .unwrap_or_else(|| self.default.clone());

        let usage = match behavior {
            Behavior::Reply(usage) => usage,
            Behavior::Fail(error) => return Err(error),
            Behavior::Slow(delay, usage) => {
                tokio::time::sleep(delay).await;
                usage
            }
        };
        Ok(ProviderResponse::new(
            format!("reply from {}", deployment.id),
            deployment.provider_model_id.clone(),
            usage,
        ))
    }
}

/// Unbounded response cache
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, ProviderResponse>>,
}

impl InMemoryCache {
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[async_trait]
impl ResponseCache for InMemoryCache {
    async fn get(&self, fingerprint: &str) -> Option<ProviderResponse> {
        self.entries.lock().get(fingerprint).cloned()
    }

    async fn put(&self, fingerprint: &str, response: &ProviderResponse) {
        self.entries
            .lock()
            .insert(fingerprint.to_string(), response.clone());
    }
}

/// Denies prompts or responses containing a keyword
#[derive(Debug)]
pub struct KeywordGuardrail {
    pub blocked_prompt: String,
    pub blocked_response: String,
}

#[async_trait]
impl Guardrail for KeywordGuardrail {
    async fn check_request(
        &self,
        _scope: &RequestScope,
        request: &ProviderRequest,
    ) -> GuardrailVerdict {
        if request.prompt.contains(&self.blocked_prompt) {
            GuardrailVerdict::deny(format!("prompt mentions {}", self.blocked_prompt))
        } else {
            GuardrailVerdict::Allow
        }
    }

    async fn check_response(
        &self,
        _scope: &RequestScope,
        response: &ProviderResponse,
    ) -> GuardrailVerdict {
        if response.content.contains(&self.blocked_response) {
            GuardrailVerdict::deny("response blocked")
        } else {
            GuardrailVerdict::Allow
        }
    }
}
