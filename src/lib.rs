//! # litellm-router
//!
//! Routing and admission control engine for an OpenAI-compatible AI gateway.
//!
//! ## Features
//!
//! - **Deployment selection**: round-robin, weighted, least-busy, latency-based,
//!   cost-based and rate-limit-aware strategies over a model group
//! - **Health tracking**: consecutive-failure cooldowns with exponential backoff
//! - **Admission control**: fixed-window RPM/TPM limits per deployment, key, team
//!   and organization, plus hierarchical budgets with periodic resets
//! - **Retry and fallback**: bounded retries on distinct deployments, then
//!   fallback model groups
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use litellm_router::{Config, DispatchRequest, Dispatcher, RequestScope};
//! use litellm_router::core::clock::SystemClock;
//! use litellm_router::core::counter_store::InMemoryCounterStore;
//! use litellm_router::core::providers::ProviderAdapter;
//! use std::sync::Arc;
//!
//! async fn serve(adapter: Arc<dyn ProviderAdapter>) -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file("config/router.yaml").await?;
//!     let store = Arc::new(InMemoryCounterStore::new());
//!     let clock = Arc::new(SystemClock);
//!
//!     let router = Arc::new(config.build_router(store.clone(), clock.clone()));
//!     let budgets = Arc::new(config.build_budgets(store, clock)?);
//!     let dispatcher = Dispatcher::new(router, budgets, adapter);
//!
//!     let scope = RequestScope::new("key-1", "gpt-4").with_team("team-1");
//!     let result = dispatcher.dispatch(&scope, DispatchRequest::new("Hello")).await?;
//!     println!("{} (${:.6})", result.response.content, result.usage.cost);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod config;
pub mod core;
pub mod utils;

// Re-export main types
pub use config::Config;
pub use core::budget::{BudgetEnforcer, BudgetEntity, BudgetLevel};
pub use core::dispatch::{
    DispatchError, DispatchRequest, DispatchResponse, Dispatcher, RequestScope, RoutingDecision,
    UsageAndCost,
};
pub use core::providers::{ProviderAdapter, ProviderError, ProviderRequest, ProviderResponse};
pub use core::router::{Deployment, Router, RouterConfig, RoutingStrategy};
pub use utils::error::{GatewayError, Result};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
