//! Request dispatcher
//!
//! Drives one request through cache lookup, guardrails, budget admission,
//! deployment selection, rate limiting, the provider call with retries and
//! fallbacks, and finally spend reconciliation.

use super::error::{DispatchError, GuardrailStage};
use super::types::{
    DispatchRequest, DispatchResponse, RequestScope, RoutingDecision, UsageAndCost,
};
use crate::core::budget::{BudgetEnforcer, SpendReservation};
use crate::core::cost::{UsageTokens, estimate_tokens, format_cost, generic_cost_per_token};
use crate::core::counter_store::ScopeKind;
use crate::core::hooks::{Guardrail, GuardrailVerdict, ResponseCache, request_fingerprint};
use crate::core::providers::{ProviderAdapter, ProviderError, ProviderRequest};
use crate::core::rate_limiter::{AdmissionTicket, RateLimitRejection, ScopeLimit};
use crate::core::router::execution::{attempt_deadline, calculate_retry_delay, classify_error};
use crate::core::router::{AttemptOutcome, Deployment, DeploymentId, Router};
use crate::utils::generate_request_id;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, debug, info, info_span, warn};

/// Routing engine entry point
///
/// Cheap to share behind an `Arc`; every piece of mutable state lives in the
/// router, the budget enforcer or the counter store behind them.
pub struct Dispatcher {
    router: Arc<Router>,
    budgets: Arc<BudgetEnforcer>,
    adapter: Arc<dyn ProviderAdapter>,
    cache: Option<Arc<dyn ResponseCache>>,
    guardrail: Option<Arc<dyn Guardrail>>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("router", &self.router)
            .field("budgets", &self.budgets)
            .field("adapter", &self.adapter.name())
            .field("cache", &self.cache.is_some())
            .field("guardrail", &self.guardrail.is_some())
            .finish()
    }
}

impl Dispatcher {
    pub fn new(
        router: Arc<Router>,
        budgets: Arc<BudgetEnforcer>,
        adapter: Arc<dyn ProviderAdapter>,
    ) -> Self {
        Self {
            router,
            budgets,
            adapter,
            cache: None,
            guardrail: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_guardrail(mut self, guardrail: Arc<dyn Guardrail>) -> Self {
        self.guardrail = Some(guardrail);
        self
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn budgets(&self) -> &Arc<BudgetEnforcer> {
        &self.budgets
    }

    /// Route `request` to a deployment of `scope.requested_model_alias`
    ///
    /// Dropping the returned future before it resolves releases the budget
    /// reservation and the in-flight slot of the deployment being called.
    pub async fn dispatch(
        &self,
        scope: &RequestScope,
        request: DispatchRequest,
    ) -> Result<DispatchResponse, DispatchError> {
        let request_id = generate_request_id();
        let model = self.router.resolve_model_name(&scope.requested_model_alias);
        let span = info_span!(
            "dispatch",
            request_id = %request_id,
            model = %model,
            key_id = %scope.key_id
        );
        self.run(request_id, model, scope, request)
            .instrument(span)
            .await
    }

    async fn run(
        &self,
        request_id: String,
        model: String,
        scope: &RequestScope,
        request: DispatchRequest,
    ) -> Result<DispatchResponse, DispatchError> {
        let provider_request = ProviderRequest {
            model: model.clone(),
            prompt: request.prompt,
            max_tokens: request.max_tokens,
            stream: request.stream,
        };

        let fingerprint = self
            .cache
            .as_ref()
            .map(|_| request_fingerprint(&provider_request));
        if let (Some(cache), Some(fingerprint)) = (&self.cache, &fingerprint) {
            if let Some(response) = cache.get(fingerprint).await {
                info!("Cache hit");
                return Ok(DispatchResponse {
                    request_id,
                    response,
                    usage: UsageAndCost::default(),
                    model_group: model,
                    cache_hit: true,
                    decisions: Vec::new(),
                });
            }
        }

        if let Some(guardrail) = &self.guardrail {
            if let GuardrailVerdict::Deny { reason } =
                guardrail.check_request(scope, &provider_request).await
            {
                warn!(reason = %reason, "Request rejected by guardrail");
                return Err(DispatchError::GuardrailRejected {
                    stage: GuardrailStage::Request,
                    reason,
                });
            }
        }

        let groups = self.router.models_with_fallbacks(&model);
        let estimated_tokens = scope
            .estimated_tokens
            .unwrap_or_else(|| estimate_tokens(&provider_request.prompt));
        let estimated_cost =
            self.estimate_cost(&groups, estimated_tokens, provider_request.max_tokens);
        let reservation = self.budgets.check_admission(scope, estimated_cost)?;

        let config = self.router.config();
        let limiter = self.router.rate_limiter();
        let health = self.router.health();
        let scope_limits = self.budgets.limits_for(scope);
        let max_attempts = config.max_attempts();

        let mut excluded: HashSet<DeploymentId> = HashSet::new();
        let mut decisions: Vec<RoutingDecision> = Vec::new();
        let mut charged = UsageAndCost::default();
        let mut scope_ticket: Option<AdmissionTicket> = None;
        let mut last_error: Option<ProviderError> = None;
        let mut last_rejection: Option<RateLimitRejection> = None;
        let mut attempts: u32 = 0;
        let mut group_index = 0;

        loop {
            let Some(group) = groups.get(group_index) else {
                self.settle(reservation, scope_ticket.as_ref(), &charged);
                let err = match (last_error, last_rejection) {
                    (Some(last_error), _) => {
                        DispatchError::AllDeploymentsUnavailable { model, last_error }
                    }
                    (None, Some(rejection)) => DispatchError::RateLimited(rejection),
                    (None, None) => DispatchError::NoEligibleDeployment { model },
                };
                warn!(attempts, error = %err, "Dispatch failed");
                return Err(err);
            };

            let deployment = match self.router.select(group, scope, &excluded) {
                Ok(deployment) => deployment,
                Err(err) => {
                    debug!(group = %group, reason = %err, "Model group has no eligible deployment");
                    group_index += 1;
                    if let Some(next) = groups.get(group_index) {
                        info!(from = %group, to = %next, "Falling back to next model group");
                    }
                    continue;
                }
            };

            let deployment_limit = ScopeLimit::new(
                ScopeKind::Deployment,
                deployment.id.as_str(),
                deployment.rpm_limit,
                deployment.tpm_limit,
            );
            let deployment_ticket = match limiter
                .admit_chain(std::slice::from_ref(&deployment_limit), estimated_tokens)
            {
                Ok(ticket) => ticket,
                Err(rejection) => {
                    debug!(deployment_id = %deployment.id, reason = %rejection, "Deployment at rate limit, reselecting");
                    excluded.insert(deployment.id.clone());
                    last_rejection = Some(rejection);
                    continue;
                }
            };

            if scope_ticket.is_none() {
                match limiter.admit_chain(&scope_limits, estimated_tokens) {
                    Ok(ticket) => scope_ticket = Some(ticket),
                    Err(rejection) => {
                        limiter.rollback(&deployment_ticket);
                        warn!(reason = %rejection, "Request rate limited");
                        return Err(DispatchError::RateLimited(rejection));
                    }
                }
            }

            attempts += 1;
            let started_at = self.router.clock().now();
            let deadline = attempt_deadline(config, &deployment, provider_request.stream);
            let start = Instant::now();
            let result = {
                let _in_flight = health.begin_call(&deployment.id);
                match tokio::time::timeout(
                    deadline,
                    self.adapter.invoke(&deployment, &provider_request, deadline),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::timeout(
                        self.adapter.name(),
                        format!("no response within {}ms", deadline.as_millis()),
                    )),
                }
            };
            let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

            match result {
                Ok(response) => {
                    health.record_outcome(&deployment.id, AttemptOutcome::Success, latency_ms);
                    limiter.reconcile(&deployment_ticket, response.usage.total_tokens);
                    charged.add(&response.usage, attempt_cost(&deployment, &response.usage));
                    decisions.push(RoutingDecision {
                        deployment_id: deployment.id.clone(),
                        model_group: group.clone(),
                        attempt_number: attempts,
                        started_at,
                        outcome: AttemptOutcome::Success,
                        latency_ms: Some(latency_ms),
                        error: None,
                    });
                    self.settle(reservation, scope_ticket.as_ref(), &charged);

                    if let Some(guardrail) = &self.guardrail {
                        if let GuardrailVerdict::Deny { reason } =
                            guardrail.check_response(scope, &response).await
                        {
                            warn!(deployment_id = %deployment.id, reason = %reason, "Response rejected by guardrail");
                            return Err(DispatchError::GuardrailRejected {
                                stage: GuardrailStage::Response,
                                reason,
                            });
                        }
                    }

                    if let (Some(cache), Some(fingerprint)) = (&self.cache, &fingerprint) {
                        cache.put(fingerprint, &response).await;
                    }

                    info!(
                        deployment_id = %deployment.id,
                        model_group = %group,
                        attempts,
                        latency_ms,
                        cost = %format_cost(charged.cost),
                        "Request served"
                    );
                    return Ok(DispatchResponse {
                        request_id,
                        response,
                        usage: charged,
                        model_group: group.clone(),
                        cache_hit: false,
                        decisions,
                    });
                }
                Err(error) => {
                    let outcome = classify_error(&error);
                    health.record_outcome(&deployment.id, outcome, latency_ms);
                    let partial = error.partial_usage().unwrap_or_default();
                    limiter.reconcile(&deployment_ticket, partial.total_tokens);
                    charged.add(&partial, attempt_cost(&deployment, &partial));
                    decisions.push(RoutingDecision {
                        deployment_id: deployment.id.clone(),
                        model_group: group.clone(),
                        attempt_number: attempts,
                        started_at,
                        outcome,
                        latency_ms: Some(latency_ms),
                        error: Some(error.to_string()),
                    });

                    if outcome == AttemptOutcome::TerminalError {
                        self.settle(reservation, scope_ticket.as_ref(), &charged);
                        warn!(deployment_id = %deployment.id, error = %error, "Non-retryable provider error");
                        return Err(DispatchError::Provider {
                            deployment_id: deployment.id.clone(),
                            source: error,
                        });
                    }

                    if attempts >= max_attempts {
                        self.settle(reservation, scope_ticket.as_ref(), &charged);
                        warn!(attempts, error = %error, "Retries exhausted");
                        return Err(DispatchError::RetriesExhausted {
                            attempts,
                            last_error: error,
                        });
                    }

                    warn!(
                        deployment_id = %deployment.id,
                        attempt = attempts,
                        error = %error,
                        "Attempt failed, retrying on another deployment"
                    );
                    excluded.insert(deployment.id.clone());
                    last_error = Some(error);

                    let delay = calculate_retry_delay(config, attempts);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    /// Worst-case cost of the request over every deployment it may reach
    fn estimate_cost(&self, groups: &[String], estimated_tokens: u64, max_tokens: Option<u32>) -> f64 {
        let (input_rate, output_rate) = groups
            .iter()
            .flat_map(|group| self.router.deployments_for(group))
            .filter(|d| d.is_active)
            .fold((0.0f64, 0.0f64), |(input, output), d| {
                (
                    input.max(d.cost_per_input_token),
                    output.max(d.cost_per_output_token),
                )
            });
        estimated_tokens as f64 * input_rate + f64::from(max_tokens.unwrap_or(0)) * output_rate
    }

    /// Commit the charged spend and true up the scope-level TPM counters
    fn settle(
        &self,
        reservation: SpendReservation,
        scope_ticket: Option<&AdmissionTicket>,
        charged: &UsageAndCost,
    ) {
        if let Some(ticket) = scope_ticket {
            self.router
                .rate_limiter()
                .reconcile(ticket, charged.usage.total_tokens);
        }
        self.budgets.commit_spend(reservation, charged.cost);
    }
}

fn attempt_cost(deployment: &Deployment, usage: &UsageTokens) -> f64 {
    if usage.is_empty() {
        return 0.0;
    }
    generic_cost_per_token(
        deployment.cost_per_input_token,
        deployment.cost_per_output_token,
        usage,
    )
    .total_cost
}
