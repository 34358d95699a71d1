//! Deployment selection logic
//!
//! This module contains the core routing logic for selecting
//! the best deployment for a given model.

use super::config::RoutingStrategy;
use super::deployment::{Deployment, DeploymentId};
use super::error::RouterError;
use super::router::Router;
use super::strategy_impl::{self, Candidate, StrategyOptions};
use crate::core::counter_store::{CounterKey, CounterMetric, ScopeKind};
use crate::core::dispatch::RequestScope;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

impl Router {
    /// Check if deployment is within parallel request limit
    pub(crate) fn check_parallel_limit(&self, deployment: &Deployment) -> bool {
        match deployment.max_parallel_requests {
            Some(limit) => self.health.in_flight(&deployment.id) < limit,
            None => true,
        }
    }

    /// Whether a deployment passes the static and health filters
    fn is_eligible(
        &self,
        deployment: &Deployment,
        scope: &RequestScope,
        excluded: &HashSet<DeploymentId>,
    ) -> bool {
        deployment.is_active
            && !excluded.contains(&deployment.id)
            && !self.health.is_cooled_down(&deployment.id)
            && deployment.is_allowed_for(&scope.allowed_models)
            && self.check_parallel_limit(deployment)
    }

    /// Eligible candidates of a model group, sorted by id
    ///
    /// # Flow
    ///
    /// 1. Resolve model_name (handle aliases)
    /// 2. Get all deployments for this model group
    /// 3. Filter: active + not excluded + not in cooldown + allowed + under parallel limit
    pub fn eligible_candidates(
        &self,
        model_name: &str,
        scope: &RequestScope,
        excluded: &HashSet<DeploymentId>,
    ) -> Result<Vec<Candidate>, RouterError> {
        let resolved_name = self.resolve_model_name(model_name);
        let deployments = self.deployments_for(&resolved_name);
        if deployments.is_empty() {
            return Err(RouterError::ModelNotFound(resolved_name));
        }

        let needs_usage = self.config.routing_strategy == RoutingStrategy::RateLimitAware;
        let candidates: Vec<Candidate> = deployments
            .into_iter()
            .filter(|d| self.is_eligible(d, scope, excluded))
            .map(|deployment| self.candidate(deployment, needs_usage))
            .collect();

        if candidates.is_empty() {
            return Err(RouterError::NoEligibleDeployment(resolved_name));
        }
        Ok(candidates)
    }

    fn candidate(&self, deployment: Arc<Deployment>, with_usage: bool) -> Candidate {
        let (rpm_used, tpm_used) = if with_usage {
            (
                self.rate_limiter
                    .current(ScopeKind::Deployment, &deployment.id, CounterMetric::Rpm),
                self.rate_limiter
                    .current(ScopeKind::Deployment, &deployment.id, CounterMetric::Tpm),
            )
        } else {
            (0, 0)
        };
        Candidate {
            in_flight: self.health.in_flight(&deployment.id),
            latency_ewma: self.health.latency_ewma(&deployment.id),
            rpm_used,
            tpm_used,
            deployment,
        }
    }

    /// Select a deployment for `model_name`, skipping `excluded`
    pub fn select(
        &self,
        model_name: &str,
        scope: &RequestScope,
        excluded: &HashSet<DeploymentId>,
    ) -> Result<Arc<Deployment>, RouterError> {
        self.select_with_rng(model_name, scope, excluded, &mut rand::thread_rng())
    }

    /// [`Router::select`] with a caller-provided random source
    pub fn select_with_rng<R: Rng + ?Sized>(
        &self,
        model_name: &str,
        scope: &RequestScope,
        excluded: &HashSet<DeploymentId>,
        rng: &mut R,
    ) -> Result<Arc<Deployment>, RouterError> {
        let resolved_name = self.resolve_model_name(model_name);
        let candidates = self.eligible_candidates(&resolved_name, scope, excluded)?;

        let options = StrategyOptions {
            tiebreak: self.config.rate_limit_aware_tiebreak,
            headroom: self.config.rate_limit_headroom,
        };
        let cursor_key = CounterKey::new(
            ScopeKind::ModelGroup,
            resolved_name.as_str(),
            CounterMetric::Cursor,
        );
        let mut cursor = || self.store.fetch_add(&cursor_key, 1).rem_euclid(i64::MAX) as u64;

        let index = strategy_impl::select_for(
            self.config.routing_strategy,
            &candidates,
            options,
            &mut cursor,
            rng,
        )
        .ok_or_else(|| RouterError::NoEligibleDeployment(resolved_name.clone()))?;

        let selected = Arc::clone(&candidates[index].deployment);
        debug!(
            model = %resolved_name,
            deployment_id = %selected.id,
            strategy = %self.config.routing_strategy,
            candidates = candidates.len(),
            "Selected deployment"
        );
        Ok(selected)
    }
}
