//! CLI module for Mastery
//!
//! Provides commands:
//! - `run`: Run every phase, resuming from recorded state
//! - `run-phase`: Run a single phase
//! - `status`: Phase and task progress
//! - `cost-report`: LLM cost report from the ledger
//! - `artifacts`: List generated artifacts
//! - `doctor`: System diagnostics

use crate::app::AppConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod artifacts;
pub mod cost;
pub mod doctor;
pub mod run;
pub mod status;

/// Mastery pipeline CLI
#[derive(Parser, Debug)]
#[command(name = "mastery")]
#[command(about = "Resumable multi-phase crew pipeline with LLM usage governance")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run all phases, skipping completed tasks
    Run,
    /// Run a single phase
    RunPhase {
        /// Phase number
        phase: u32,
    },
    /// Show pipeline progress
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Summarize LLM costs from the ledger
    CostReport {
        /// Also write the report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Output the aggregated summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// List generated artifacts
    Artifacts,
    /// Run system diagnostics
    Doctor,
}

/// Run the CLI command
pub async fn run(cli: Cli, config: &AppConfig) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Run) => run::run_all(config).await,
        Some(Commands::RunPhase { phase }) => run::run_phase(config, phase).await,
        Some(Commands::Status { json }) => status::run(config, json).await,
        Some(Commands::CostReport { output, json }) => cost::run(config, output.as_deref(), json),
        Some(Commands::Artifacts) => artifacts::run(config),
        Some(Commands::Doctor) => doctor::run(config).await,
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        let cli = Cli::try_parse_from(["mastery", "run-phase", "3"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::RunPhase { phase: 3 })));

        let cli = Cli::try_parse_from(["mastery", "cost-report", "-o", "out/report.txt"]).unwrap();
        match cli.command {
            Some(Commands::CostReport { output, json }) => {
                assert_eq!(output, Some(PathBuf::from("out/report.txt")));
                assert!(!json);
            }
            other => panic!("unexpected command: {other:?}"),
        }

        assert!(Cli::try_parse_from(["mastery", "run-phase", "three"]).is_err());
    }

    #[test]
    fn test_cli_definition_is_valid() {
        <Cli as clap::CommandFactory>::command().debug_assert();
    }
}
