//! gateway-router - configuration check tool
//!
//! Loads a router configuration, validates it and logs the resulting model
//! groups, deployments and budget entities.

use anyhow::Context;
use clap::Parser;
use litellm_router::Config;
use litellm_router::core::clock::SystemClock;
use litellm_router::core::counter_store::InMemoryCounterStore;
use litellm_router::utils::logging::{LogFormat, init_logging};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "gateway-router", version, about = "Validate a router configuration")]
struct Cli {
    /// Path to the YAML configuration
    #[arg(short, long, env = "LITELLM_CONFIG", default_value = "config/router.yaml")]
    config: PathBuf,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit JSON log lines
    #[arg(long)]
    json: bool,

    /// Print the effective configuration as YAML
    #[arg(long)]
    print: bool,
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::from_file(&cli.config)
        .await
        .with_context(|| format!("loading {}", cli.config.display()))?;

    let store = Arc::new(InMemoryCounterStore::new());
    let clock = Arc::new(SystemClock);
    let router = config.build_router(store.clone(), clock.clone());
    let budgets = config
        .build_budgets(store, clock)
        .context("seeding budget entities")?;

    for model in router.list_models() {
        let deployments = router.get_deployments_for_model(&model);
        let fallbacks = router.fallbacks_for(&model);
        info!(
            model = %model,
            deployments = ?deployments,
            fallbacks = ?fallbacks,
            "Model group"
        );
    }
    info!(
        strategy = %router.config().routing_strategy,
        num_retries = router.config().num_retries,
        budget_entities = budgets.len(),
        "Configuration OK"
    );

    if cli.print {
        println!("{}", config.to_yaml()?);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let format = if cli.json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    init_logging(&cli.log_level, format);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
