//! Rate limiting integration tests

#[cfg(test)]
mod tests {
    use crate::common::{ScriptedAdapter, TestEngine, deployment, prompt, scope};
    use crate::{assert_err, assert_ok};
    use litellm_router::core::budget::{BudgetEntity, BudgetLevel};
    use litellm_router::core::clock::ManualClock;
    use litellm_router::core::cost::UsageTokens;
    use litellm_router::core::counter_store::{CounterMetric, InMemoryCounterStore, ScopeKind};
    use litellm_router::core::dispatch::DispatchError;
    use litellm_router::core::rate_limiter::{RateLimiter, ScopeLimit};
    use litellm_router::core::router::RouterConfig;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn adapter() -> Arc<ScriptedAdapter> {
        Arc::new(ScriptedAdapter::replying(UsageTokens::new(20, 10)))
    }

    #[tokio::test]
    async fn test_deployment_rpm_window_rollover() {
        let engine = TestEngine::new(
            RouterConfig::default(),
            vec![deployment("a", "gpt").with_limits(Some(2), None)],
        );
        let dispatcher = engine.dispatcher(adapter());

        assert_ok!(dispatcher.dispatch(&scope("gpt"), prompt()).await);
        engine.advance_secs(30);
        assert_ok!(dispatcher.dispatch(&scope("gpt"), prompt()).await);

        engine.advance_secs(29);
        let err = assert_err!(dispatcher.dispatch(&scope("gpt"), prompt()).await);
        match &err {
            DispatchError::RateLimited(rejection) => {
                assert_eq!(rejection.scope, ScopeKind::Deployment);
                assert_eq!(rejection.scope_id, "a");
                assert_eq!(rejection.metric, CounterMetric::Rpm);
                assert_eq!(rejection.retry_after_secs, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_transient());

        // 60s after the first request a new window opens
        engine.advance_secs(1);
        assert_ok!(dispatcher.dispatch(&scope("gpt"), prompt()).await);
        let rpm = engine
            .router
            .rate_limiter()
            .current(ScopeKind::Deployment, "a", CounterMetric::Rpm);
        assert_eq!(rpm, 1);
    }

    #[tokio::test]
    async fn test_rate_limited_deployment_is_skipped() {
        let engine = TestEngine::new(
            RouterConfig::default(),
            vec![
                deployment("a", "gpt").with_limits(Some(1), None),
                deployment("b", "gpt"),
            ],
        );
        let adapter = adapter();
        let dispatcher = engine.dispatcher(adapter.clone());

        for _ in 0..4 {
            assert_ok!(dispatcher.dispatch(&scope("gpt"), prompt()).await);
        }
        assert_eq!(adapter.calls_to("a"), 1);
        assert_eq!(adapter.calls_to("b"), 3);
    }

    #[tokio::test]
    async fn test_tpm_is_reconciled_to_observed_tokens() {
        let engine = TestEngine::new(
            RouterConfig::default(),
            vec![deployment("a", "gpt").with_limits(None, Some(100))],
        );
        let dispatcher = engine.dispatcher(adapter());

        // estimate 40, actual 30: the window keeps 30 per request
        for _ in 0..3 {
            assert_ok!(
                dispatcher
                    .dispatch(&scope("gpt").with_estimated_tokens(40), prompt())
                    .await
            );
        }
        let tpm = engine
            .router
            .rate_limiter()
            .current(ScopeKind::Deployment, "a", CounterMetric::Tpm);
        assert_eq!(tpm, 90);

        let err = assert_err!(
            dispatcher
                .dispatch(&scope("gpt").with_estimated_tokens(40), prompt())
                .await
        );
        assert!(matches!(
            err,
            DispatchError::RateLimited(ref r) if r.metric == CounterMetric::Tpm
        ));
    }

    #[tokio::test]
    async fn test_key_limit_is_charged_once_per_request() {
        let engine = TestEngine::new(
            RouterConfig::default(),
            vec![deployment("a", "gpt"), deployment("b", "gpt")],
        );
        engine.budget(
            BudgetLevel::Key,
            BudgetEntity::new("key-1").with_rate_limits(Some(2), None),
        );
        let adapter = Arc::new(
            ScriptedAdapter::replying(UsageTokens::new(20, 10)).on(
                "a",
                crate::common::Behavior::Fail(litellm_router::ProviderError::timeout(
                    "scripted", "slow",
                )),
            ),
        );
        let dispatcher = engine.dispatcher(adapter.clone());

        // the first request retries once but counts once against the key
        assert_ok!(dispatcher.dispatch(&scope("gpt"), prompt()).await);
        assert_eq!(adapter.calls().len(), 2);
        let key_rpm = engine
            .router
            .rate_limiter()
            .current(ScopeKind::Key, "key-1", CounterMetric::Rpm);
        assert_eq!(key_rpm, 1);

        assert_ok!(dispatcher.dispatch(&scope("gpt"), prompt()).await);
        let err = assert_err!(dispatcher.dispatch(&scope("gpt"), prompt()).await);
        match err {
            DispatchError::RateLimited(rejection) => {
                assert_eq!(rejection.scope, ScopeKind::Key);
                assert_eq!(rejection.scope_id, "key-1");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_concurrent_admissions_never_exceed_limit() {
        let clock = Arc::new(ManualClock::at_epoch_seconds(crate::common::fixtures::START));
        let limiter = Arc::new(RateLimiter::new(Arc::new(InMemoryCounterStore::new()), clock));
        let admitted = Arc::new(AtomicU64::new(0));
        let levels = vec![
            ScopeLimit::new(ScopeKind::Key, "key-1", Some(1000), None),
            ScopeLimit::new(ScopeKind::Deployment, "a", Some(50), None),
        ];

        let threads: Vec<_> = (0..16)
            .map(|_| {
                let limiter = limiter.clone();
                let admitted = admitted.clone();
                let levels = levels.clone();
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        if limiter.admit_chain(&levels, 0).is_ok() {
                            admitted.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        assert_eq!(admitted.load(Ordering::SeqCst), 50);
        assert_eq!(limiter.current(ScopeKind::Deployment, "a", CounterMetric::Rpm), 50);
        // rejected chains rolled their key increments back
        assert_eq!(limiter.current(ScopeKind::Key, "key-1", CounterMetric::Rpm), 50);
    }
}
