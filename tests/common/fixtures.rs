//! Test fixtures and engine factories
//!
//! Every engine runs on a manual clock parked at the start of a rate window,
//! so window rollover and cooldown expiry are driven by the test.

use super::providers::ScriptedAdapter;
use litellm_router::core::budget::{BudgetEnforcer, BudgetEntity, BudgetLevel};
use litellm_router::core::clock::ManualClock;
use litellm_router::core::counter_store::InMemoryCounterStore;
use litellm_router::core::dispatch::{DispatchRequest, Dispatcher, RequestScope};
use litellm_router::core::router::{Deployment, Router, RouterConfig};
use std::sync::Arc;

/// 2023-11-14T22:14:00Z, a whole minute
pub const START: i64 = 1_700_000_040;

/// Deployment priced at 0.001 / 0.002 USD per input / output token
pub fn deployment(id: &str, model: &str) -> Deployment {
    Deployment::new(id, model, format!("openai/{}", id)).with_costs(0.001, 0.002)
}

pub fn scope(model: &str) -> RequestScope {
    RequestScope::new("key-1", model)
        .with_team("team-1")
        .with_org("org-1")
        .with_estimated_tokens(100)
}

pub fn prompt() -> DispatchRequest {
    DispatchRequest::new("Summarise the release notes")
}

/// Router, budgets and clock sharing one counter store
pub struct TestEngine {
    pub router: Arc<Router>,
    pub budgets: Arc<BudgetEnforcer>,
    pub clock: Arc<ManualClock>,
}

impl TestEngine {
    pub fn new(config: RouterConfig, deployments: Vec<Deployment>) -> Self {
        let clock = Arc::new(ManualClock::at_epoch_seconds(START));
        let store = Arc::new(InMemoryCounterStore::new());
        let router = Router::with_backends(config, store.clone(), clock.clone());
        router.set_model_list(deployments);
        Self {
            router: Arc::new(router),
            budgets: Arc::new(BudgetEnforcer::new(store, clock.clone())),
            clock,
        }
    }

    pub fn budget(&self, level: BudgetLevel, entity: BudgetEntity) {
        self.budgets.upsert_entity(level, entity).unwrap();
    }

    pub fn dispatcher(&self, adapter: Arc<ScriptedAdapter>) -> Dispatcher {
        Dispatcher::new(self.router.clone(), self.budgets.clone(), adapter)
    }

    pub fn advance_secs(&self, secs: i64) {
        self.clock.advance(chrono::Duration::seconds(secs));
    }

    pub fn assert_idle(&self) {
        for id in self.router.list_deployments() {
            assert_eq!(
                self.router.health().in_flight(&id),
                0,
                "deployment {} still has calls in flight",
                id
            );
        }
    }
}
