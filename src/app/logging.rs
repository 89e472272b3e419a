//! Logging setup
//!
//! Console output plus a plain-text file at `<logs_dir>/mastery.log`.
//! `RUST_LOG` takes precedence over the configured level.

use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Log file name inside the logs directory
pub const LOG_FILE: &str = "mastery.log";

/// Install the global subscriber
///
/// The returned guard flushes the file writer on drop and must live until
/// the process exits.
pub fn init(logs_dir: &Path, level: &str) -> Result<WorkerGuard> {
    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("Failed to create log directory {}", logs_dir.display()))?;

    let file_appender = tracing_appender::rolling::never(logs_dir, LOG_FILE);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_filter(filter(level)),
        )
        .with(
            fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(filter(level)),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "mastery={level},mastery_core={level},mastery_llm={level},mastery_state={level},sqlx=warn"
        ))
    })
}
