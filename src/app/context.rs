//! Component wiring
//!
//! Builds the state store, governor and runner from an [`AppConfig`].

use super::config::AppConfig;
use anyhow::{Context, Result};
use mastery_core::{PipelineRunner, ProcessExecutor};
use mastery_llm::{UsageGovernor, UsageLedger};
use mastery_state::StateStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Open the state database
pub async fn open_store(config: &AppConfig) -> Result<StateStore> {
    StateStore::from_path(&config.state_db_path)
        .await
        .with_context(|| format!("Failed to open {}", config.state_db_path.display()))
}

/// Open the cost ledger
pub fn open_ledger(config: &AppConfig) -> Result<UsageLedger> {
    UsageLedger::new(&config.ledger_path, config.pricing.clone())
        .with_context(|| format!("Failed to open {}", config.ledger_path.display()))
}

/// Build a pipeline runner whose waits end when `cancel` fires
pub async fn build_runner(config: &AppConfig, cancel: CancellationToken) -> Result<PipelineRunner> {
    for dir in [&config.data_dir, &config.artifacts_dir] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let store = open_store(config).await?;
    let governor = Arc::new(UsageGovernor::new(
        config.providers.clone(),
        open_ledger(config)?,
        cancel.clone(),
    ));

    let mut executor = ProcessExecutor::new(
        config.executor.program.clone(),
        config.executor.args.clone(),
        governor.clone(),
    )
    .with_artifacts_dir(&config.artifacts_dir);
    if let Some(dir) = &config.executor.working_dir {
        executor = executor.with_working_dir(dir);
    }

    info!(
        "Pipeline ready (executor: {}, state: {}, ledger: {})",
        config.executor.program,
        config.state_db_path.display(),
        config.ledger_path.display()
    );

    Ok(PipelineRunner::new(
        store,
        governor,
        Arc::new(executor),
        config.runner_settings()?,
        cancel,
    ))
}

/// Cancel `token` on Ctrl+C
pub fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received, stopping after current step");
                token.cancel();
            }
            Err(e) => warn!("Could not listen for Ctrl+C: {e}"),
        }
    });
}
