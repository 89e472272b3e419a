//! Integration tests for Mastery
//!
//! These tests verify the integration between the crates:
//! - mastery-state: file-backed task, run and phase state
//! - mastery-llm: provider limits and the JSONL cost ledger
//! - mastery-core: the pipeline runner driving a real crew process

use mastery_core::{
    FailurePolicy, PhaseResult, PhaseSpec, PipelineRunner, ProcessExecutor, RunnerSettings,
    TaskSpec,
};
use mastery_llm::{
    default_providers, PricingTable, UsageGovernor, UsageLedger, NO_CALLS_MESSAGE,
};
use mastery_state::{StateStore, Status};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Fixtures
// ============================================================================

/// Reports usage for every task it is given, writes the task's artifact
/// and reports completion, except for tasks listed in `MASTERY_FAIL_TASKS`.
#[cfg(unix)]
const CREW_SCRIPT: &str = r#"
for t in $(echo "$MASTERY_TASKS" | tr ',' ' '); do
  echo "working on $t"
  echo "{\"type\":\"usage\",\"agent_name\":\"$MASTERY_CREW Lead\",\"model\":\"gpt-4o\",\"input_tokens\":1000,\"output_tokens\":1000}"
  case ",$MASTERY_FAIL_TASKS," in
    *",$t,"*)
      echo "{\"type\":\"task\",\"task_id\":\"$t\",\"status\":\"failed\",\"error\":\"model refused\"}"
      ;;
    *)
      head -c 200 /dev/zero | tr '\0' 'x' > "$MASTERY_ARTIFACTS_DIR/$t.md"
      echo "{\"type\":\"task\",\"task_id\":\"$t\",\"status\":\"completed\",\"artifacts_path\":\"$MASTERY_ARTIFACTS_DIR/$t.md\"}"
      ;;
  esac
done
"#;

fn phase(number: u32, crew: &str, policy: FailurePolicy, tasks: &[&str]) -> PhaseSpec {
    PhaseSpec {
        number,
        name: format!("{crew} phase"),
        crew: crew.to_string(),
        policy,
        agents: Vec::new(),
        estimated_tokens: 500,
        tasks: tasks
            .iter()
            .map(|id| TaskSpec {
                id: (*id).to_string(),
                name: id.replace('_', " "),
                artifact: Some(format!("{id}.md")),
            })
            .collect(),
    }
}

fn phases() -> Vec<PhaseSpec> {
    vec![
        phase(1, "StrategyCrew", FailurePolicy::Halt, &["objectives", "prd"]),
        phase(2, "CurriculumCrew", FailurePolicy::Continue, &["scaffold", "overlay"]),
    ]
}

struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("artifacts")).unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn ledger(&self) -> UsageLedger {
        UsageLedger::new(self.path("logs/llm_calls.jsonl"), PricingTable::default()).unwrap()
    }

    async fn store(&self) -> StateStore {
        StateStore::from_path(&self.path("data/state.db")).await.unwrap()
    }

    #[cfg(unix)]
    async fn runner(&self, failing: &[&str], skip_existing_artifacts: bool) -> PipelineRunner {
        let cancel = CancellationToken::new();
        let governor = Arc::new(
            UsageGovernor::new(default_providers(), self.ledger(), cancel.clone())
                .without_credential_check(),
        );
        let script = format!("MASTERY_FAIL_TASKS='{}'\n{CREW_SCRIPT}", failing.join(","));
        let executor = ProcessExecutor::new("sh", vec!["-c".to_string(), script], governor.clone())
            .with_artifacts_dir(self.path("artifacts"));

        PipelineRunner::new(
            self.store().await,
            governor,
            Arc::new(executor),
            RunnerSettings {
                artifacts_dir: self.path("artifacts"),
                default_model: "gpt-4o".to_string(),
                task_delay: Duration::ZERO,
                skip_existing_artifacts,
            },
            cancel,
        )
    }
}

fn write_artifact(path: &Path, bytes: usize) {
    std::fs::write(path, "#".repeat(bytes)).unwrap();
}

// ============================================================================
// Full pipeline
// ============================================================================

#[cfg(unix)]
#[tokio::test]
async fn test_full_pipeline_persists_state_and_costs() {
    let ws = Workspace::new();
    let runner = ws.runner(&[], false).await;

    let report = assert_ok!(runner.run_all(&phases()).await);
    assert!(report.succeeded());
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.outcomes[1].completed_tasks, vec!["scaffold", "overlay"]);

    // State survives reopening the database
    let store = ws.store().await;
    assert_eq!(store.get_phase_status(1).await.unwrap(), Some(Status::Completed));
    assert_eq!(store.get_phase_status(2).await.unwrap(), Some(Status::Completed));
    let task = store.get_task("StrategyCrew", "prd").await.unwrap().unwrap();
    assert_eq!(task.status, Status::Completed);
    assert!(task.artifacts_path.unwrap().ends_with("prd.md"));
    assert!(ws.path("artifacts/prd.md").exists());

    // One ledger line per task, priced at gpt-4o rates
    let ledger = ws.ledger();
    let entries = ledger.read_entries().unwrap();
    assert_eq!(entries.len(), 4);
    assert!(entries.iter().all(|e| e.total_cost == 0.0125));
    assert_eq!(runner.governor().session_summary().total_cost, 0.05);

    let report_path = ws.path("reports/cost.txt");
    let text = ledger.generate_cost_report(Some(&report_path)).unwrap();
    assert!(text.contains("Total Cost:         $0.0500"));
    assert!(text.contains("StrategyCrew Lead"));
    assert_eq!(std::fs::read_to_string(report_path).unwrap(), text);
}

#[cfg(unix)]
#[tokio::test]
async fn test_rerun_only_retries_failed_work() {
    let ws = Workspace::new();

    let first = ws.runner(&["overlay"], false).await;
    let report = assert_ok!(first.run_all(&phases()).await);
    assert!(!report.succeeded());
    assert_eq!(report.halted_at, None);
    assert!(matches!(report.outcomes[1].result, PhaseResult::Failed { .. }));

    let second = ws.runner(&[], false).await;
    let report = assert_ok!(second.run_all(&phases()).await);
    assert!(report.succeeded());
    assert_eq!(report.outcomes[0].result, PhaseResult::AlreadyComplete);
    assert_eq!(report.outcomes[1].skipped_tasks, vec!["scaffold"]);
    assert_eq!(report.outcomes[1].completed_tasks, vec!["overlay"]);

    // Five calls in total: four on the first run, one retry
    assert_eq!(ws.ledger().read_entries().unwrap().len(), 5);

    let summary = ws.store().await.get_summary().await.unwrap();
    assert_eq!(summary.tasks_with(Status::Completed), 4);
    assert_eq!(summary.runs_with(Status::Failed), 1);
    assert_eq!(summary.runs_with(Status::Completed), 3);
}

#[cfg(unix)]
#[tokio::test]
async fn test_halt_leaves_later_phases_untouched() {
    let ws = Workspace::new();
    let runner = ws.runner(&["prd"], false).await;

    let report = assert_ok!(runner.run_all(&phases()).await);
    assert_eq!(report.halted_at, Some(1));
    assert_eq!(report.outcomes.len(), 1);

    let store = ws.store().await;
    assert_eq!(store.get_phase_status(1).await.unwrap(), Some(Status::Failed));
    assert_eq!(store.get_phase_status(2).await.unwrap(), None);

    let failed = store.last_failed_run().await.unwrap().unwrap();
    assert_eq!(failed.crew_name, "StrategyCrew");
    assert!(failed.error_message.unwrap().contains("prd"));

    let task = store.get_task("StrategyCrew", "prd").await.unwrap().unwrap();
    assert_eq!(task.metadata.unwrap()["error"], "model refused");
}

#[cfg(unix)]
#[tokio::test]
async fn test_existing_artifacts_skip_tasks() {
    let ws = Workspace::new();
    write_artifact(&ws.path("artifacts/objectives.md"), 500);
    write_artifact(&ws.path("artifacts/prd.md"), 50);

    let runner = ws.runner(&[], true).await;
    let outcome = runner.run_phase(&phases()[0]).await.unwrap();

    assert_eq!(outcome.skipped_tasks, vec!["objectives"]);
    // A stub artifact does not count
    assert_eq!(outcome.completed_tasks, vec!["prd"]);

    let store = ws.store().await;
    assert_eq!(
        store.get_task_status("StrategyCrew", "objectives").await.unwrap(),
        Some(Status::Skipped)
    );
    assert!(store.should_skip_task("StrategyCrew", "objectives").await.unwrap());
    assert_eq!(ws.ledger().read_entries().unwrap().len(), 1);
}

// ============================================================================
// Ledger and report edge cases
// ============================================================================

#[test]
fn test_empty_ledger_report() {
    let ws = Workspace::new();
    let report_path = ws.path("report.txt");

    let report = ws.ledger().generate_cost_report(Some(&report_path)).unwrap();
    assert_eq!(report, NO_CALLS_MESSAGE);
    assert!(!report_path.exists());
}

#[test]
fn test_ledger_shared_across_sessions() {
    let ws = Workspace::new();

    let first = ws.ledger();
    first.log_call("Chief of Staff", "claude-sonnet-4-5-20250929", 1000, 1000, "p", "r").unwrap();

    let second = ws.ledger();
    second.log_call("QA Researcher", "unknown-model", 1000, 1000, "p", "r").unwrap();

    // Sessions only see their own calls, the ledger sees both
    assert_eq!(first.session_summary().total_calls, 1);
    assert_eq!(second.session_summary().total_cost, 0.04);

    let entries = second.read_entries().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].total_cost, 0.018);

    let report = second.generate_cost_report(None).unwrap();
    assert!(report.contains("Total API Calls:    2"));
    assert!(report.contains("Total Cost:         $0.0580"));
}
