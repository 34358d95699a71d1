//! Pricing, usage and cost calculation
//!
//! The pricing table is a read-only snapshot from the engine's perspective:
//! per-model token rates plus the default rate limits a deployment inherits when
//! it does not configure its own.

pub mod calculator;
pub mod types;
pub mod utils;

pub use calculator::{CostBreakdown, PricingTable, generic_cost_per_token};
pub use types::{ModelPricing, UsageTokens};
pub use utils::{estimate_tokens, format_cost};
