//! Core routing engine
//!
//! Bottom-up: the clock and counter store are shared by the rate limiter,
//! the budget enforcer and the router; the dispatcher ties them together.

pub mod budget;
pub mod clock;
pub mod cost;
pub mod counter_store;
pub mod dispatch;
pub mod hooks;
pub mod providers;
pub mod rate_limiter;
pub mod router;
