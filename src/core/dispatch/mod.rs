//! Request dispatch
//!
//! The [`Dispatcher`] is the single entry point of the routing engine. It owns
//! no counters itself: selection state lives in the [`Router`](crate::core::router::Router),
//! spend in the [`BudgetEnforcer`](crate::core::budget::BudgetEnforcer), and both
//! share one counter store.

mod dispatcher;
mod error;
mod types;


pub use dispatcher::Dispatcher;
pub use error::{DispatchError, GuardrailStage};
pub use types::{
    DispatchRequest, DispatchResponse, RequestScope, RoutingDecision, UsageAndCost,
};
