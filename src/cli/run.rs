//! CLI commands: `mastery run` and `mastery run-phase`

use crate::app::{context, AppConfig};
use anyhow::{bail, Result};
use mastery_core::{PhaseOutcome, PhaseResult, PipelineReport, PipelineRunner};
use tokio_util::sync::CancellationToken;
use tracing::error;

/// Run every phase in order
pub async fn run_all(config: &AppConfig) -> Result<()> {
    let cancel = CancellationToken::new();
    context::cancel_on_ctrl_c(cancel.clone());
    let runner = context::build_runner(config, cancel).await?;

    let result = runner.run_all(&config.phases()).await;
    let report = match result {
        Ok(report) => report,
        Err(e) => return interrupted(&runner, e),
    };

    print_report(&report);
    print_session(&runner);

    if let Some(phase) = report.halted_at {
        bail!("pipeline halted: phase {phase} failed");
    }
    let failed = report.outcomes.iter().filter(|o| o.is_failure()).count();
    if failed > 0 {
        bail!("{failed} phase(s) failed; rerun to retry failed tasks");
    }
    Ok(())
}

/// Run one phase by number
pub async fn run_phase(config: &AppConfig, number: u32) -> Result<()> {
    let phases = config.phases();
    let Some(phase) = phases.iter().find(|p| p.number == number) else {
        return Err(mastery_core::Error::UnknownPhase(number).into());
    };

    let cancel = CancellationToken::new();
    context::cancel_on_ctrl_c(cancel.clone());
    let runner = context::build_runner(config, cancel).await?;

    let outcome = match runner.run_phase(phase).await {
        Ok(outcome) => outcome,
        Err(e) => return interrupted(&runner, e),
    };

    print_report(&PipelineReport {
        outcomes: vec![outcome.clone()],
        halted_at: None,
    });
    print_session(&runner);

    if let PhaseResult::Failed { error } = outcome.result {
        bail!("phase {number} failed: {error}");
    }
    Ok(())
}

fn interrupted(runner: &PipelineRunner, e: mastery_core::Error) -> Result<()> {
    if e.is_cancellation() {
        println!("\n  Interrupted. Progress is saved; run again to resume.");
    } else {
        error!("Pipeline error: {e}");
    }
    print_session(runner);
    Err(e.into())
}

fn print_report(report: &PipelineReport) {
    println!();
    println!("  Pipeline Results");
    println!("  {}", "-".repeat(72));
    println!(
        "  {:<6} {:<28} {:<10} {:>6} {:>6} {:>6}",
        "Phase", "Name", "Result", "Done", "Skip", "Fail"
    );
    println!("  {}", "-".repeat(72));
    for outcome in &report.outcomes {
        println!(
            "  {:<6} {:<28} {:<10} {:>6} {:>6} {:>6}",
            outcome.phase_number,
            truncate(&outcome.phase_name, 28),
            result_label(outcome),
            outcome.completed_tasks.len(),
            outcome.skipped_tasks.len(),
            outcome.failed_tasks.len()
        );
    }
    for outcome in report.outcomes.iter() {
        if let PhaseResult::Failed { error } = &outcome.result {
            println!("  ! {} ({}): {error}", outcome.crew_name, outcome.run_id);
        }
    }
    if let Some(phase) = report.halted_at {
        println!("  Pipeline stopped after phase {phase}.");
    }
}

fn result_label(outcome: &PhaseOutcome) -> &'static str {
    match outcome.result {
        PhaseResult::Completed => "completed",
        PhaseResult::AlreadyComplete => "up to date",
        PhaseResult::Failed { .. } => "FAILED",
    }
}

fn print_session(runner: &PipelineRunner) {
    let summary = runner.governor().session_summary();
    println!();
    println!("  Session Usage");
    println!("  {}", "-".repeat(72));
    println!("  Calls:  {}", summary.total_calls);
    println!("  Tokens: {}", summary.total_tokens);
    println!("  Cost:   ${:.4}", summary.total_cost);
    for (model, totals) in &summary.by_model {
        println!(
            "    {:<30} {:>5} calls  {:>10} tokens  ${:.4}",
            model,
            totals.calls,
            totals.input_tokens + totals.output_tokens,
            totals.cost
        );
    }
    println!();
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{head}...")
    }
}
