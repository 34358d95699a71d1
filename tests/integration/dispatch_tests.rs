//! Dispatch integration tests
//!
//! Retry, fallback, cache, guardrail and cancellation behaviour of the
//! dispatcher over real router, limiter and budget components.

#[cfg(test)]
mod tests {
    use crate::common::{
        Behavior, InMemoryCache, KeywordGuardrail, ScriptedAdapter, TestEngine, deployment,
        prompt, scope,
    };
    use crate::{assert_approx_eq, assert_err, assert_ok};
    use litellm_router::core::budget::{BudgetEntity, BudgetLevel};
    use litellm_router::core::cost::UsageTokens;
    use litellm_router::core::dispatch::{DispatchError, DispatchRequest, GuardrailStage};
    use litellm_router::core::providers::ProviderError;
    use litellm_router::core::router::{AttemptOutcome, RouterConfig};
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    fn usage() -> UsageTokens {
        UsageTokens::new(100, 50)
    }

    fn unavailable() -> Behavior {
        Behavior::Fail(ProviderError::provider_unavailable("scripted", "503 upstream"))
    }

    /// Three failing deployments and two retries: three distinct calls, then give up
    #[tokio::test]
    async fn test_retries_exhausted_after_three_distinct_deployments() {
        let config = RouterConfig {
            num_retries: 2,
            ..Default::default()
        };
        let engine = TestEngine::new(
            config,
            vec![
                deployment("a", "gpt"),
                deployment("b", "gpt"),
                deployment("c", "gpt"),
            ],
        );
        let adapter = Arc::new(ScriptedAdapter::with_default(unavailable()));

        let err = assert_err!(
            engine
                .dispatcher(adapter.clone())
                .dispatch(&scope("gpt"), prompt())
                .await
        );

        assert!(matches!(err, DispatchError::RetriesExhausted { attempts: 3, .. }));
        let calls = adapter.calls();
        assert_eq!(calls.len(), 3);
        let distinct: HashSet<&String> = calls.iter().collect();
        assert_eq!(distinct.len(), 3);
        engine.assert_idle();
    }

    #[tokio::test]
    async fn test_retry_recovers_on_next_deployment() {
        let engine = TestEngine::new(
            RouterConfig::default(),
            vec![deployment("a", "gpt"), deployment("b", "gpt")],
        );
        let adapter = Arc::new(ScriptedAdapter::replying(usage()).on("a", unavailable()));

        let response = assert_ok!(
            engine
                .dispatcher(adapter.clone())
                .dispatch(&scope("gpt"), prompt())
                .await
        );

        assert_eq!(adapter.calls(), vec!["a", "b"]);
        assert_eq!(response.deployment_id(), Some("b"));
        let outcomes: Vec<AttemptOutcome> =
            response.decisions.iter().map(|d| d.outcome).collect();
        assert_eq!(
            outcomes,
            vec![AttemptOutcome::RetryableError, AttemptOutcome::Success]
        );
        assert_eq!(response.decisions[1].attempt_number, 2);
    }

    #[tokio::test]
    async fn test_fallback_group_shares_retry_budget() {
        let config = RouterConfig {
            num_retries: 1,
            ..Default::default()
        };
        let engine = TestEngine::new(
            config,
            vec![
                deployment("gpt-a", "gpt"),
                deployment("claude-a", "claude"),
                deployment("mistral-a", "mistral"),
            ],
        );
        engine
            .router
            .set_fallbacks("gpt", vec!["claude".to_string(), "mistral".to_string()]);
        let adapter = Arc::new(
            ScriptedAdapter::replying(usage())
                .on("gpt-a", unavailable())
                .on("claude-a", unavailable()),
        );

        let err = assert_err!(
            engine
                .dispatcher(adapter.clone())
                .dispatch(&scope("gpt"), prompt())
                .await
        );

        // two attempts allowed in total; mistral is never reached
        assert!(matches!(err, DispatchError::RetriesExhausted { attempts: 2, .. }));
        assert_eq!(adapter.calls(), vec!["gpt-a", "claude-a"]);
    }

    #[tokio::test]
    async fn test_fallback_group_serves_request() {
        let engine = TestEngine::new(
            RouterConfig::default(),
            vec![deployment("gpt-a", "gpt"), deployment("claude-a", "claude")],
        );
        engine.router.set_fallbacks("gpt", vec!["claude".to_string()]);
        let adapter = Arc::new(ScriptedAdapter::replying(usage()).on("gpt-a", unavailable()));

        let response = assert_ok!(
            engine
                .dispatcher(adapter)
                .dispatch(&scope("gpt"), prompt())
                .await
        );
        assert_eq!(response.model_group, "claude");
        assert_eq!(response.response.content, "reply from claude-a");
    }

    #[tokio::test]
    async fn test_identical_request_is_served_from_cache() {
        let engine = TestEngine::new(RouterConfig::default(), vec![deployment("a", "gpt")]);
        engine.budget(BudgetLevel::Key, BudgetEntity::new("key-1").with_max_budget(10.0));
        let adapter = Arc::new(ScriptedAdapter::replying(usage()));
        let cache = Arc::new(InMemoryCache::default());
        let dispatcher = engine.dispatcher(adapter.clone()).with_cache(cache.clone());

        let first = assert_ok!(dispatcher.dispatch(&scope("gpt"), prompt()).await);
        let second = assert_ok!(dispatcher.dispatch(&scope("gpt"), prompt()).await);
        let other = assert_ok!(
            dispatcher
                .dispatch(&scope("gpt"), prompt().with_max_tokens(16))
                .await
        );

        assert!(!first.cache_hit);
        assert!(second.cache_hit);
        assert!(!other.cache_hit);
        assert_eq!(second.response, first.response);
        assert_eq!(adapter.calls().len(), 2);
        assert_eq!(cache.len(), 2);
        // cached responses are free
        assert_approx_eq!(
            engine.budgets.spend(BudgetLevel::Key, "key-1").unwrap(),
            first.usage.cost + other.usage.cost
        );
    }

    #[tokio::test]
    async fn test_guardrail_vetoes_before_admission() {
        let engine = TestEngine::new(RouterConfig::default(), vec![deployment("a", "gpt")]);
        engine.budget(BudgetLevel::Key, BudgetEntity::new("key-1").with_max_budget(10.0));
        let adapter = Arc::new(ScriptedAdapter::replying(usage()));
        let dispatcher = engine
            .dispatcher(adapter.clone())
            .with_guardrail(Arc::new(KeywordGuardrail {
                blocked_prompt: "password".to_string(),
                blocked_response: "reply from b".to_string(),
            }));

        let err = assert_err!(
            dispatcher
                .dispatch(&scope("gpt"), DispatchRequest::new("what is the admin password"))
                .await
        );

        assert!(matches!(
            err,
            DispatchError::GuardrailRejected {
                stage: GuardrailStage::Request,
                ..
            }
        ));
        assert!(adapter.calls().is_empty());
        assert_eq!(engine.budgets.spend(BudgetLevel::Key, "key-1"), Some(0.0));
    }

    #[tokio::test]
    async fn test_response_veto_charges_consumed_tokens() {
        let engine = TestEngine::new(RouterConfig::default(), vec![deployment("b", "gpt")]);
        engine.budget(BudgetLevel::Key, BudgetEntity::new("key-1").with_max_budget(10.0));
        let adapter = Arc::new(ScriptedAdapter::replying(usage()));
        let dispatcher = engine
            .dispatcher(adapter)
            .with_guardrail(Arc::new(KeywordGuardrail {
                blocked_prompt: "password".to_string(),
                blocked_response: "reply from b".to_string(),
            }));

        let err = assert_err!(dispatcher.dispatch(&scope("gpt"), prompt()).await);

        assert_eq!(err.kind(), "guardrail_rejected");
        // 100 * 0.001 + 50 * 0.002
        assert_approx_eq!(engine.budgets.spend(BudgetLevel::Key, "key-1").unwrap(), 0.2);
    }

    #[tokio::test]
    async fn test_partial_usage_of_broken_stream_is_charged() {
        let engine = TestEngine::new(
            RouterConfig::default(),
            vec![deployment("a", "gpt"), deployment("b", "gpt")],
        );
        engine.budget(BudgetLevel::Team, BudgetEntity::new("team-1").with_max_budget(10.0));
        let broken = ProviderError::streaming("scripted", "connection dropped", UsageTokens::new(100, 20));
        let adapter = Arc::new(ScriptedAdapter::replying(usage()).on("a", Behavior::Fail(broken)));

        let response = assert_ok!(
            engine
                .dispatcher(adapter)
                .dispatch(&scope("gpt"), prompt().with_stream(true))
                .await
        );

        // (100 * 0.001 + 20 * 0.002) + 0.2
        assert_approx_eq!(response.usage.cost, 0.34);
        assert_eq!(response.usage.usage.total_tokens, 270);
        assert_approx_eq!(engine.budgets.spend(BudgetLevel::Team, "team-1").unwrap(), 0.34);
    }

    #[tokio::test]
    async fn test_terminal_error_stops_immediately() {
        let engine = TestEngine::new(
            RouterConfig::default(),
            vec![deployment("a", "gpt"), deployment("b", "gpt")],
        );
        let adapter = Arc::new(ScriptedAdapter::with_default(Behavior::Fail(
            ProviderError::invalid_request("scripted", "messages must not be empty"),
        )));

        let err = assert_err!(
            engine
                .dispatcher(adapter.clone())
                .dispatch(&scope("gpt"), prompt())
                .await
        );

        match err {
            DispatchError::Provider { deployment_id, source } => {
                assert_eq!(deployment_id, "a");
                assert!(matches!(source, ProviderError::InvalidRequest { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(adapter.calls().len(), 1);
        assert!(!engine.router.health().is_cooled_down("a"));
    }

    #[tokio::test]
    async fn test_cancelled_request_leaves_no_trace() {
        let engine = TestEngine::new(RouterConfig::default(), vec![deployment("a", "gpt")]);
        engine.budget(BudgetLevel::Key, BudgetEntity::new("key-1").with_max_budget(10.0));
        let adapter = Arc::new(ScriptedAdapter::with_default(Behavior::Slow(
            Duration::from_secs(30),
            usage(),
        )));
        let dispatcher = Arc::new(engine.dispatcher(adapter.clone()));

        let handle = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.dispatch(&scope("gpt"), prompt()).await })
        };
        while adapter.in_flight() == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(engine.router.health().in_flight("a"), 1);
        assert_approx_eq!(engine.budgets.spend(BudgetLevel::Key, "key-1").unwrap(), 0.1);

        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());

        engine.assert_idle();
        assert_eq!(adapter.in_flight(), 0);
        assert_eq!(engine.budgets.spend(BudgetLevel::Key, "key-1"), Some(0.0));
    }

    /// Mixed successes, failures and slow calls from many tasks
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_in_flight_counts_never_leak() {
        let config = RouterConfig {
            num_retries: 1,
            failure_threshold: 1000,
            ..Default::default()
        };
        let engine = TestEngine::new(
            config,
            vec![
                deployment("a", "gpt"),
                deployment("b", "gpt"),
                deployment("c", "gpt"),
            ],
        );
        let adapter = Arc::new(
            ScriptedAdapter::replying(usage())
                .on("a", unavailable())
                .on("b", Behavior::Slow(Duration::from_millis(2), usage())),
        );
        let dispatcher = Arc::new(engine.dispatcher(adapter.clone()));

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move { dispatcher.dispatch(&scope("gpt"), prompt()).await })
            })
            .collect();

        let mut served = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                served += 1;
            }
        }

        // one retry always reaches a healthy deployment
        assert_eq!(served, 64);
        engine.assert_idle();
        assert_eq!(adapter.in_flight(), 0);
        let health = engine.router.health().snapshot("a").unwrap();
        assert_eq!(health.success_requests, 0);
        assert_eq!(health.in_flight_count, 0);
    }
}
