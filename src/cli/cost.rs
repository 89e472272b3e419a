//! CLI command: `mastery cost-report`
//!
//! Aggregates the whole JSONL ledger by agent, model and day.

use crate::app::{context, AppConfig};
use mastery_llm::aggregate;
use std::path::Path;

/// Run the cost-report subcommand.
pub fn run(config: &AppConfig, output: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let ledger = context::open_ledger(config)?;

    if json {
        let summary = aggregate(&ledger.read_entries()?);
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let report = ledger.generate_cost_report(output)?;
    println!("{report}");
    if let Some(path) = output {
        println!("Report saved to {}", path.display());
    }
    Ok(())
}
