//! Budget enforcement integration tests

#[cfg(test)]
mod tests {
    use crate::common::{ScriptedAdapter, TestEngine, deployment, prompt, scope};
    use crate::{assert_approx_eq, assert_err, assert_ok};
    use futures::future::join_all;
    use litellm_router::core::budget::{BudgetEntity, BudgetLevel};
    use litellm_router::core::cost::UsageTokens;
    use litellm_router::core::dispatch::DispatchError;
    use litellm_router::core::router::RouterConfig;
    use std::sync::Arc;

    fn engine() -> TestEngine {
        TestEngine::new(
            RouterConfig::default(),
            vec![deployment("a", "gpt"), deployment("b", "gpt")],
        )
    }

    /// 100 prompt + 50 completion tokens = 0.2 USD per request
    fn adapter() -> Arc<ScriptedAdapter> {
        Arc::new(ScriptedAdapter::replying(UsageTokens::new(100, 50)))
    }

    #[tokio::test]
    async fn test_spend_matches_sum_of_actual_costs() {
        let engine = engine();
        engine.budget(BudgetLevel::Org, BudgetEntity::new("org-1"));
        engine.budget(BudgetLevel::Key, BudgetEntity::new("key-1").with_max_budget(100.0));
        let dispatcher = engine.dispatcher(adapter());

        let mut charged = 0.0;
        for _ in 0..20 {
            let response = assert_ok!(dispatcher.dispatch(&scope("gpt"), prompt()).await);
            charged += response.usage.cost;
        }

        assert_approx_eq!(charged, 4.0);
        assert_approx_eq!(engine.budgets.spend(BudgetLevel::Key, "key-1").unwrap(), 4.0);
        // unlimited levels still track spend
        assert_approx_eq!(engine.budgets.spend(BudgetLevel::Org, "org-1").unwrap(), 4.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_spend_is_exact() {
        let engine = engine();
        engine.budget(BudgetLevel::Team, BudgetEntity::new("team-1").with_max_budget(100.0));
        let dispatcher = Arc::new(engine.dispatcher(adapter()));

        let handles = (0..32).map(|_| {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.dispatch(&scope("gpt"), prompt()).await })
        });
        for result in join_all(handles).await {
            assert!(result.unwrap().is_ok());
        }

        assert_approx_eq!(engine.budgets.spend(BudgetLevel::Team, "team-1").unwrap(), 6.4);
    }

    #[tokio::test]
    async fn test_team_budget_blocks_its_keys() {
        let engine = engine();
        engine.budget(BudgetLevel::Org, BudgetEntity::new("org-1").with_max_budget(1000.0));
        engine.budget(BudgetLevel::Team, BudgetEntity::new("team-1").with_max_budget(0.5));
        engine.budget(BudgetLevel::Key, BudgetEntity::new("key-1").with_max_budget(1000.0));
        let adapter = adapter();
        let dispatcher = engine.dispatcher(adapter.clone());

        // admission uses the 0.1 estimate, so the third request still fits
        for _ in 0..3 {
            assert_ok!(dispatcher.dispatch(&scope("gpt"), prompt()).await);
        }
        let err = assert_err!(dispatcher.dispatch(&scope("gpt"), prompt()).await);

        match &err {
            DispatchError::BudgetExceeded(exceeded) => {
                assert_eq!(exceeded.level, BudgetLevel::Team);
                assert_eq!(exceeded.entity_id, "team-1");
                assert_approx_eq!(exceeded.spend, 0.6);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!err.is_transient());
        assert_eq!(adapter.calls().len(), 3);
        // the rejected request left nothing behind at the org level
        assert_approx_eq!(engine.budgets.spend(BudgetLevel::Org, "org-1").unwrap(), 0.6);

        // another team under the same org is unaffected
        let other = scope("gpt").with_team("team-2");
        assert_ok!(dispatcher.dispatch(&other, prompt()).await);
    }

    #[tokio::test]
    async fn test_budget_period_resets_lazily() {
        let engine = engine();
        engine.budget(
            BudgetLevel::Key,
            BudgetEntity::new("key-1")
                .with_max_budget(0.3)
                .with_budget_duration("1h"),
        );
        let dispatcher = engine.dispatcher(adapter());

        assert_ok!(dispatcher.dispatch(&scope("gpt"), prompt()).await);
        assert_ok!(dispatcher.dispatch(&scope("gpt"), prompt()).await);
        let err = assert_err!(dispatcher.dispatch(&scope("gpt"), prompt()).await);
        assert_eq!(err.budget_level(), Some(BudgetLevel::Key));

        let reset_at = engine
            .budgets
            .entity(BudgetLevel::Key, "key-1")
            .unwrap()
            .budget_reset_at
            .unwrap();

        engine.advance_secs(3600);
        assert_ok!(dispatcher.dispatch(&scope("gpt"), prompt()).await);
        assert_approx_eq!(engine.budgets.spend(BudgetLevel::Key, "key-1").unwrap(), 0.2);

        let next_reset = engine
            .budgets
            .entity(BudgetLevel::Key, "key-1")
            .unwrap()
            .budget_reset_at
            .unwrap();
        assert_eq!((next_reset - reset_at).num_seconds(), 3600);
    }

    #[tokio::test]
    async fn test_failed_request_releases_estimate() {
        let engine = TestEngine::new(RouterConfig::default(), vec![deployment("a", "gpt")]);
        engine.budget(BudgetLevel::Key, BudgetEntity::new("key-1").with_max_budget(1.0));
        let adapter = Arc::new(ScriptedAdapter::with_default(crate::common::Behavior::Fail(
            litellm_router::ProviderError::network("scripted", "refused"),
        )));

        assert_err!(
            engine
                .dispatcher(adapter)
                .dispatch(&scope("gpt"), prompt())
                .await
        );
        assert_eq!(engine.budgets.spend(BudgetLevel::Key, "key-1"), Some(0.0));
    }
}
