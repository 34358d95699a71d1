//! Budget enforcement for organizations, teams and API keys
//!
//! Any exceeded level blocks the request (strictest wins). Periods reset lazily
//! on first access after `budget_reset_at`.

mod duration;
mod enforcer;
mod types;


pub use duration::parse_budget_duration;
pub use enforcer::{BudgetEnforcer, SpendReservation};
pub use types::{BudgetEntity, BudgetExceeded, BudgetLevel};
