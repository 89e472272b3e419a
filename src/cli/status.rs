//! CLI command: `mastery status`
//!
//! Phase progress, task and run counts, runs left in progress, and the
//! most recent failure with the phase it belongs to.

use crate::app::{context, AppConfig};
use chrono::Utc;
use mastery_state::{CrewRunRecord, StateSummary, Status};

/// Run the status subcommand.
pub async fn run(config: &AppConfig, json: bool) -> anyhow::Result<()> {
    let store = context::open_store(config).await?;
    let summary = store.get_summary().await?;
    let abandoned = store.list_runs_with_status(Status::InProgress).await?;
    let last_failed = store.last_failed_run().await?;

    if json {
        let value = serde_json::json!({
            "summary": summary,
            "abandoned_runs": abandoned,
            "last_failed_run": last_failed,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    print_phases(config, &summary);
    print_counts(&summary);

    if !abandoned.is_empty() {
        println!();
        println!("  Runs still marked in progress");
        for run in &abandoned {
            let age = Utc::now().signed_duration_since(run.started_at);
            println!(
                "    {} ({}) started {} minutes ago",
                run.run_id,
                run.crew_name,
                age.num_minutes()
            );
        }
    }

    if let Some(run) = &last_failed {
        println!();
        println!("  {}", failure_line(config, run));
    }
    println!();
    Ok(())
}

fn print_phases(config: &AppConfig, summary: &StateSummary) {
    println!();
    println!("  Pipeline Status");
    println!("  {}", "-".repeat(72));
    println!("  {:<6} {:<32} {:<12} Completed", "Phase", "Name", "Status");
    println!("  {}", "-".repeat(72));

    for phase in config.phases() {
        let record = summary
            .phases
            .iter()
            .find(|p| p.phase_number == phase.number);
        let status = record.map_or("not started", |r| r.status.as_str());
        let completed = record
            .and_then(|r| r.completed_at)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<6} {:<32} {:<12} {}",
            phase.number, phase.name, status, completed
        );
    }
}

fn print_counts(summary: &StateSummary) {
    println!();
    println!("  Tasks: {} total", summary.total_tasks());
    for status in Status::ALL {
        let count = summary.tasks_with(status);
        if count > 0 {
            println!("    {:<12} {}", status.as_str(), count);
        }
    }
    println!(
        "  Runs:  {} completed, {} failed, {} in progress",
        summary.runs_with(Status::Completed),
        summary.runs_with(Status::Failed),
        summary.runs_with(Status::InProgress)
    );
}

fn failure_line(config: &AppConfig, run: &CrewRunRecord) -> String {
    let phase = config
        .phases()
        .into_iter()
        .find(|p| p.crew == run.crew_name)
        .map(|p| format!("phase {} ", p.number))
        .unwrap_or_default();
    format!(
        "Last run failed: {phase}{} ({}): {}",
        run.crew_name,
        run.run_id,
        run.error_message.as_deref().unwrap_or("unknown error")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_line_names_phase() {
        let config = AppConfig::default();
        let run = CrewRunRecord {
            crew_name: "CurriculumCrew".to_string(),
            run_id: "CurriculumCrew_1a2b3c4d".to_string(),
            status: Status::Failed,
            started_at: Utc::now(),
            completed_at: Some(Utc::now()),
            error_message: Some("1 of 5 tasks failed: learning_science".to_string()),
        };
        assert_eq!(
            failure_line(&config, &run),
            "Last run failed: phase 2 CurriculumCrew (CurriculumCrew_1a2b3c4d): \
             1 of 5 tasks failed: learning_science"
        );
    }
}
