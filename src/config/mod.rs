//! Configuration management for the router
//!
//! This module handles loading, environment overrides and validation of the
//! YAML configuration, and turns it into a ready [`Router`] and
//! [`BudgetEnforcer`].

pub mod models;
pub mod validation;

pub use models::*;
pub use validation::Validate;

use crate::core::budget::BudgetEnforcer;
use crate::core::clock::Clock;
use crate::core::cost::PricingTable;
use crate::core::counter_store::AtomicCounterStore;
use crate::core::router::{Deployment, Router, RouterConfig, RoutingStrategy};
use crate::utils::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Environment variable overriding `router_settings.routing_strategy`
pub const ENV_ROUTING_STRATEGY: &str = "LITELLM_ROUTING_STRATEGY";
/// Environment variable overriding `router_settings.num_retries`
pub const ENV_NUM_RETRIES: &str = "LITELLM_NUM_RETRIES";
/// Environment variable overriding `router_settings.request_timeout`
pub const ENV_REQUEST_TIMEOUT: &str = "LITELLM_REQUEST_TIMEOUT";

/// Main configuration struct
///
/// ```yaml
/// router_settings:
///   routing_strategy: least-busy
///   num_retries: 2
/// model_list:
///   - model_name: gpt-4
///     model: azure/gpt-4-turbo
///     rpm: 500
/// fallbacks:
///   gpt-4: [claude-3]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub router_settings: RouterConfig,
    pub model_list: Vec<DeploymentEntry>,
    /// Requested name -> model group
    pub model_aliases: BTreeMap<String, String>,
    /// Model group -> ordered fallback groups
    pub fallbacks: BTreeMap<String, Vec<String>>,
    /// Provider model id -> pricing and default limits
    pub pricing: PricingTable,
    pub budgets: BudgetsConfig,
}

impl Config {
    /// Load configuration from file
    ///
    /// Environment overrides are applied before validation.
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {:?}", path);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GatewayError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config = Self::parse(&content)?;
        config.apply_env_overrides()?;
        config.validate()?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config = Self::parse(content)?;
        config.validate()?;
        Ok(config)
    }

    fn parse(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| GatewayError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Apply `LITELLM_*` environment overrides to the router settings
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides read through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings = &mut self.router_settings;

        if let Some(value) = lookup(ENV_ROUTING_STRATEGY) {
            settings.routing_strategy = value
                .parse::<RoutingStrategy>()
                .map_err(|e| GatewayError::Config(format!("{}: {}", ENV_ROUTING_STRATEGY, e)))?;
            debug!(strategy = %settings.routing_strategy, "Routing strategy overridden from environment");
        }
        if let Some(value) = lookup(ENV_NUM_RETRIES) {
            settings.num_retries = value.trim().parse().map_err(|_| {
                GatewayError::Config(format!("{}: invalid retry count '{}'", ENV_NUM_RETRIES, value))
            })?;
        }
        if let Some(value) = lookup(ENV_REQUEST_TIMEOUT) {
            settings.request_timeout = value.trim().parse().map_err(|_| {
                GatewayError::Config(format!("{}: invalid timeout '{}'", ENV_REQUEST_TIMEOUT, value))
            })?;
        }
        Ok(())
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        debug!("Validating configuration");

        self.router_settings
            .validate()
            .map_err(|e| GatewayError::Config(format!("router_settings: {}", e)))?;

        let mut ids = HashSet::new();
        for (position, entry) in self.model_list.iter().enumerate() {
            entry
                .validate()
                .map_err(|e| GatewayError::Config(format!("model_list[{}]: {}", position, e)))?;
            let id = entry.resolved_id(position);
            if !ids.insert(id.clone()) {
                return Err(GatewayError::Config(format!(
                    "model_list[{}]: duplicate deployment id {}",
                    position, id
                )));
            }
        }

        for (model, pricing) in self.pricing.iter() {
            pricing
                .validate()
                .map_err(|e| GatewayError::Config(format!("pricing.{}: {}", model, e)))?;
        }

        let groups: HashSet<&str> = self.model_list.iter().map(|e| e.model_name.as_str()).collect();
        for (alias, target) in &self.model_aliases {
            if !groups.contains(target.as_str()) {
                return Err(GatewayError::Config(format!(
                    "model_aliases.{}: unknown model group {}",
                    alias, target
                )));
            }
        }

        let resolve = |name: &str| -> String {
            self.model_aliases
                .get(name)
                .cloned()
                .unwrap_or_else(|| name.to_string())
        };
        for (model, targets) in &self.fallbacks {
            let source = resolve(model);
            for target in targets {
                let target = resolve(target);
                if !groups.contains(target.as_str()) {
                    return Err(GatewayError::Config(format!(
                        "fallbacks.{}: unknown model group {}",
                        model, target
                    )));
                }
                if target == source {
                    return Err(GatewayError::Config(format!(
                        "fallbacks.{}: a model group cannot fall back to itself",
                        model
                    )));
                }
            }
        }

        self.budgets
            .validate()
            .map_err(|e| GatewayError::Config(format!("budgets: {}", e)))?;

        debug!("Configuration validation completed");
        Ok(())
    }

    /// Runtime deployments with pricing defaults applied
    pub fn deployments(&self) -> Vec<Deployment> {
        self.model_list
            .iter()
            .enumerate()
            .map(|(position, entry)| entry.to_deployment(position, &self.pricing))
            .collect()
    }

    /// Build a router holding the model list, aliases and fallbacks
    pub fn build_router(
        &self,
        store: Arc<dyn AtomicCounterStore>,
        clock: Arc<dyn Clock>,
    ) -> Router {
        let router = Router::with_backends(self.router_settings.clone(), store, clock);
        router.set_model_list(self.deployments());
        for (alias, target) in &self.model_aliases {
            router.add_model_alias(alias, target);
        }
        for (model, targets) in &self.fallbacks {
            router.set_fallbacks(model, targets.clone());
        }
        info!(
            strategy = %self.router_settings.routing_strategy,
            models = router.list_models().len(),
            deployments = self.model_list.len(),
            "Router built from configuration"
        );
        router
    }

    /// Build a budget enforcer seeded with every configured entity
    pub fn build_budgets(
        &self,
        store: Arc<dyn AtomicCounterStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<BudgetEnforcer> {
        let budgets = BudgetEnforcer::new(store, clock);
        for (level, entity) in self.budgets.entries() {
            budgets.upsert_entity(level, entity.clone())?;
        }
        debug!(entities = budgets.len(), "Budget enforcer built from configuration");
        Ok(budgets)
    }

    /// Convert to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| GatewayError::Config(format!("Failed to serialize config to YAML: {}", e)))
    }
}
