//! Integration tests for litellm-router
//!
//! These tests drive the dispatcher and its components through the public
//! API, with hand-written fakes at the provider boundary.

pub mod budget_tests;
pub mod config_tests;
pub mod dispatch_tests;
pub mod rate_limit_tests;
