//! Deployment registry, health tracking and selection
//!
//! ## Module Structure
//!
//! - `config` - Router configuration and routing strategy definitions
//! - `deployment` - Deployment definition
//! - `error` - Selection errors
//! - `health` - Per-deployment cooldown, latency and in-flight tracking
//! - `router` - Core Router struct, model groups, aliases and fallbacks
//! - `selection` - Eligibility filtering and deployment selection
//! - `strategy_impl` - Routing strategy implementations
//! - `execution` - Error classification, retry delays and call deadlines

pub mod config;
pub mod deployment;
pub mod error;
pub mod execution;
pub mod health;
pub mod router;
pub mod selection;
pub mod strategy_impl;


pub use config::{RouterConfig, RoutingStrategy};
pub use deployment::{Deployment, DeploymentId};
pub use error::RouterError;
pub use health::{AttemptOutcome, CooldownPolicy, HealthState, HealthTracker, InFlightGuard};
pub use router::Router;
pub use strategy_impl::{Candidate, StrategyOptions};
