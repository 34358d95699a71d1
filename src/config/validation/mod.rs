//! Configuration validation
//!
//! - `trait_def`: the [`Validate`] trait
//! - `router_validators`: router settings
//! - `config_validators`: model list, pricing and budgets
//!
//! Cross-section checks (unique ids, alias and fallback targets) live in
//! [`crate::config::Config::validate`].

mod config_validators;
mod router_validators;
mod trait_def;


pub use trait_def::Validate;
