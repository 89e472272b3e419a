//! Mastery - resumable multi-phase crew pipeline
//!
//! CLI entry point.

#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use tracing::{debug, warn};

mod app;
mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv_loaded = dotenvy::dotenv().is_ok();

    let cli = cli::Cli::parse();
    let config = app::load_config()?;
    let _guard = app::logging::init(&config.logs_dir, &config.log_level)?;

    debug!("Mastery v{}", env!("CARGO_PKG_VERSION"));
    if !dotenv_loaded {
        warn!(".env file not found, using the process environment for API keys");
    }

    cli::run(cli, &config).await
}
