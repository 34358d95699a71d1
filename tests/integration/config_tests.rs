//! Configuration loading integration tests

#[cfg(test)]
mod tests {
    use crate::common::{Behavior, ScriptedAdapter};
    use crate::{assert_approx_eq, assert_ok};
    use litellm_router::core::budget::BudgetLevel;
    use litellm_router::core::clock::ManualClock;
    use litellm_router::core::cost::UsageTokens;
    use litellm_router::core::counter_store::InMemoryCounterStore;
    use litellm_router::core::dispatch::{DispatchRequest, Dispatcher, RequestScope};
    use litellm_router::core::providers::ProviderError;
    use litellm_router::{Config, GatewayError, RoutingStrategy};
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    const CONFIG: &str = r#"
router_settings:
  routing_strategy: least-busy
  num_retries: 1

model_list:
  - id: primary
    model_name: gpt-4
    model: azure/gpt-4-turbo
  - id: backup
    model_name: claude-3
    model: anthropic/claude-3-sonnet
    input_cost_per_token: 0.000003
    output_cost_per_token: 0.000015

model_aliases:
  smart: gpt-4

fallbacks:
  gpt-4: [claude-3]

pricing:
  azure/gpt-4-turbo:
    input_cost_per_token: 0.00001
    output_cost_per_token: 0.00003

budgets:
  keys:
    - id: key-1
      max_budget: 5.0
"#;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_config_file_drives_the_engine() {
        let file = write_config(CONFIG);
        let config = assert_ok!(Config::from_file(file.path()).await);
        assert_eq!(config.router_settings.routing_strategy, RoutingStrategy::LeastBusy);

        let store = Arc::new(InMemoryCounterStore::new());
        let clock = Arc::new(ManualClock::at_epoch_seconds(1_700_000_040));
        let router = Arc::new(config.build_router(store.clone(), clock.clone()));
        let budgets = Arc::new(assert_ok!(config.build_budgets(store, clock)));

        let adapter = Arc::new(ScriptedAdapter::replying(UsageTokens::new(1000, 1000)).on(
            "primary",
            Behavior::Fail(ProviderError::rate_limit("scripted", Some(10))),
        ));
        let dispatcher = Dispatcher::new(router, budgets.clone(), adapter.clone());

        let response = assert_ok!(
            dispatcher
                .dispatch(&RequestScope::new("key-1", "smart"), DispatchRequest::new("hi"))
                .await
        );

        assert_eq!(adapter.calls(), vec!["primary", "backup"]);
        assert_eq!(response.model_group, "claude-3");
        // 1000 * 0.000003 + 1000 * 0.000015
        assert_approx_eq!(response.usage.cost, 0.018);
        assert_approx_eq!(budgets.spend(BudgetLevel::Key, "key-1").unwrap(), 0.018);
    }

    #[tokio::test]
    async fn test_bundled_sample_config_is_valid() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config/router.yaml");
        let config = assert_ok!(Config::from_file(&path).await);

        let store = Arc::new(InMemoryCounterStore::new());
        let clock = Arc::new(ManualClock::at_epoch_seconds(1_700_000_040));
        let router = config.build_router(store.clone(), clock.clone());
        let budgets = assert_ok!(config.build_budgets(store, clock));

        assert_eq!(router.list_models(), vec!["claude-3".to_string(), "gpt-4".to_string()]);
        assert_eq!(
            router.models_with_fallbacks("gpt4"),
            vec!["gpt-4".to_string(), "claude-3".to_string()]
        );
        let claude = router.get_deployment("claude-sonnet").unwrap();
        assert_eq!(claude.rpm_limit, Some(1000));
        assert_eq!(claude.timeout_secs, Some(90));
        assert_eq!(budgets.len(), 3);
    }

    #[tokio::test]
    async fn test_invalid_file_is_rejected() {
        let file = write_config(
            r#"
model_list:
  - model_name: gpt-4
    model: azure/gpt-4-turbo
fallbacks:
  gpt-4: [missing-group]
"#,
        );
        let err = Config::from_file(file.path()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
        assert!(err.to_string().contains("fallbacks.gpt-4"));
    }

    #[tokio::test]
    async fn test_malformed_yaml_is_rejected() {
        let file = write_config("model_list: [");
        let err = Config::from_file(file.path()).await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }
}
