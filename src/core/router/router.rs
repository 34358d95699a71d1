//! Router core structure
//!
//! The router owns the deployment registry (model groups, aliases, fallback
//! groups) together with the shared runtime components selection reads from:
//! the health tracker, the rate limiter and the counter store holding the
//! round-robin cursors.

use super::config::RouterConfig;
use super::deployment::{Deployment, DeploymentId};
use super::health::{CooldownPolicy, HealthTracker};
use crate::core::clock::{Clock, SystemClock};
use crate::core::counter_store::{AtomicCounterStore, InMemoryCounterStore};
use crate::core::rate_limiter::RateLimiter;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Deployment registry and selector
#[derive(Debug)]
pub struct Router {
    /// All deployments (DashMap for lock-free concurrent access)
    pub(crate) deployments: DashMap<DeploymentId, Arc<Deployment>>,

    /// Model group to deployment IDs index, kept sorted by id
    pub(crate) model_index: DashMap<String, Vec<DeploymentId>>,

    /// Model name aliases: "gpt4" -> "gpt-4"
    pub(crate) model_aliases: DashMap<String, String>,

    /// Ordered fallback groups per model group
    pub(crate) fallbacks: DashMap<String, Vec<String>>,

    /// Router configuration
    pub(crate) config: RouterConfig,

    pub(crate) health: Arc<HealthTracker>,
    pub(crate) rate_limiter: Arc<RateLimiter>,
    pub(crate) store: Arc<dyn AtomicCounterStore>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl Router {
    /// Create a router with an in-process counter store and the system clock
    pub fn new(config: RouterConfig) -> Self {
        Self::with_backends(
            config,
            Arc::new(InMemoryCounterStore::new()),
            Arc::new(SystemClock),
        )
    }

    /// Create a router over a specific counter store and clock
    pub fn with_backends(
        config: RouterConfig,
        store: Arc<dyn AtomicCounterStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let health = Arc::new(HealthTracker::new(
            CooldownPolicy::from(&config),
            Arc::clone(&clock),
        ));
        let rate_limiter = Arc::new(RateLimiter::new(Arc::clone(&store), Arc::clone(&clock)));
        Self {
            deployments: DashMap::new(),
            model_index: DashMap::new(),
            model_aliases: DashMap::new(),
            fallbacks: DashMap::new(),
            config,
            health,
            rate_limiter,
            store,
            clock,
        }
    }

    /// Get the router configuration
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn health(&self) -> &Arc<HealthTracker> {
        &self.health
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    pub fn store(&self) -> &Arc<dyn AtomicCounterStore> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // ========== Deployment Management ==========

    /// Add or replace a deployment
    ///
    /// Health state of a replaced deployment is kept.
    pub fn add_deployment(&self, deployment: Deployment) {
        let model_alias = deployment.model_alias.clone();
        let deployment_id = deployment.id.clone();

        if let Some(previous) = self
            .deployments
            .insert(deployment_id.clone(), Arc::new(deployment))
        {
            if previous.model_alias != model_alias {
                self.unindex(&previous.model_alias, &deployment_id);
            }
        }

        let mut ids = self.model_index.entry(model_alias.clone()).or_default();
        if let Err(pos) = ids.binary_search(&deployment_id) {
            ids.insert(pos, deployment_id.clone());
        }
        drop(ids);

        self.health.register(&deployment_id);
        debug!(deployment_id = %deployment_id, model = %model_alias, "Registered deployment");
    }

    /// Remove a deployment from the router
    pub fn remove_deployment(&self, id: &str) -> Option<Arc<Deployment>> {
        let removed = self.deployments.remove(id).map(|(_, v)| v);

        if let Some(ref deployment) = removed {
            self.unindex(&deployment.model_alias, id);
            self.health.remove(id);
        }

        removed
    }

    fn unindex(&self, model_alias: &str, id: &str) {
        let now_empty = match self.model_index.get_mut(model_alias) {
            Some(mut entry) => {
                entry.retain(|did| did != id);
                entry.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.model_index.remove_if(model_alias, |_, ids| ids.is_empty());
        }
    }

    /// Get a deployment by ID
    pub fn get_deployment(&self, id: &str) -> Option<Arc<Deployment>> {
        self.deployments.get(id).map(|d| Arc::clone(d.value()))
    }

    /// Replace the complete list of deployments
    ///
    /// Deployments that disappear lose their health state; the rest keep it.
    pub fn set_model_list(&self, deployments: Vec<Deployment>) {
        let incoming: std::collections::HashSet<&str> =
            deployments.iter().map(|d| d.id.as_str()).collect();
        let stale: Vec<DeploymentId> = self
            .deployments
            .iter()
            .filter(|entry| !incoming.contains(entry.key().as_str()))
            .map(|entry| entry.key().clone())
            .collect();
        for id in stale {
            self.remove_deployment(&id);
        }

        let count = deployments.len();
        for deployment in deployments {
            self.add_deployment(deployment);
        }
        info!(deployments = count, models = self.model_index.len(), "Model list updated");
    }

    // ========== Model Aliases ==========

    /// Add a model name alias
    pub fn add_model_alias(&self, alias: &str, model_name: &str) {
        self.model_aliases
            .insert(alias.to_string(), model_name.to_string());
    }

    /// Resolve a model name (handles aliases)
    pub fn resolve_model_name(&self, name: &str) -> String {
        self.model_aliases
            .get(name)
            .map(|v| v.clone())
            .unwrap_or_else(|| name.to_string())
    }

    // ========== Fallback Groups ==========

    /// Set the ordered fallback groups for a model group
    pub fn set_fallbacks(&self, model_name: &str, fallbacks: Vec<String>) {
        let resolved = self.resolve_model_name(model_name);
        if fallbacks.is_empty() {
            self.fallbacks.remove(&resolved);
        } else {
            self.fallbacks.insert(resolved, fallbacks);
        }
    }

    /// Fallback groups configured for a model group
    pub fn fallbacks_for(&self, model_name: &str) -> Vec<String> {
        let resolved = self.resolve_model_name(model_name);
        self.fallbacks
            .get(&resolved)
            .map(|v| v.iter().map(|m| self.resolve_model_name(m)).collect())
            .unwrap_or_default()
    }

    /// The resolved group followed by its fallbacks, without repeats
    pub fn models_with_fallbacks(&self, model_name: &str) -> Vec<String> {
        let mut models = vec![self.resolve_model_name(model_name)];
        for fallback in self.fallbacks_for(model_name) {
            if !models.contains(&fallback) {
                models.push(fallback);
            }
        }
        models
    }

    // ========== Query Methods ==========

    /// Deployment IDs of a model group, sorted by id
    pub fn get_deployments_for_model(&self, model_name: &str) -> Vec<DeploymentId> {
        let resolved_name = self.resolve_model_name(model_name);

        self.model_index
            .get(&resolved_name)
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    /// Deployments of a model group, sorted by id
    pub fn deployments_for(&self, model_name: &str) -> Vec<Arc<Deployment>> {
        self.get_deployments_for_model(model_name)
            .iter()
            .filter_map(|id| self.get_deployment(id))
            .collect()
    }

    /// List all model group names, sorted
    pub fn list_models(&self) -> Vec<String> {
        let mut models: Vec<String> = self
            .model_index
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        models.sort();
        models
    }

    /// List all deployment IDs, sorted
    pub fn list_deployments(&self) -> Vec<DeploymentId> {
        let mut ids: Vec<DeploymentId> = self
            .deployments
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        ids
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new(RouterConfig::default())
    }
}
