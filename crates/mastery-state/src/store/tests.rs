//! Tests for store module

use super::*;
use crate::error::Error;
use crate::record::TaskUpdate;
use crate::status::Status;
use serde_json::json;
use tokio_test::assert_ok;

const CREW: &str = "StrategyCrew";

// ============================================================================
// Tasks
// ============================================================================

#[tokio::test]
async fn test_unknown_task_has_no_status() {
    let store = StateStore::in_memory().await.unwrap();

    assert_eq!(store.get_task_status(CREW, "missing").await.unwrap(), None);
    assert!(!store.should_skip_task(CREW, "missing").await.unwrap());
}

#[tokio::test]
async fn test_only_completed_tasks_are_skipped() {
    let store = StateStore::in_memory().await.unwrap();

    let cases = [
        ("t_pending", Status::Pending, false),
        ("t_running", Status::InProgress, false),
        ("t_done", Status::Completed, true),
        ("t_failed", Status::Failed, false),
        ("t_skipped", Status::Skipped, false),
    ];

    for (task_id, status, _) in cases {
        store
            .set_task_status(CREW, task_id, status, TaskUpdate::new())
            .await
            .unwrap();
    }

    for (task_id, status, skip) in cases {
        assert_eq!(
            store.should_skip_task(CREW, task_id).await.unwrap(),
            skip,
            "unexpected skip decision for {status}"
        );
    }
}

#[tokio::test]
async fn test_task_upsert_keeps_single_row_and_coalesces() {
    let store = StateStore::in_memory().await.unwrap();

    store
        .set_task_status(
            CREW,
            "strategy_create_prd",
            Status::Pending,
            TaskUpdate::new()
                .named("Create PRD")
                .with_artifact("artifacts/prd.md")
                .with_metadata(json!({"attempt": 1})),
        )
        .await
        .unwrap();
    let first = store
        .get_task(CREW, "strategy_create_prd")
        .await
        .unwrap()
        .unwrap();

    store
        .set_task_status(CREW, "strategy_create_prd", Status::Completed, TaskUpdate::new())
        .await
        .unwrap();

    let tasks = store.list_tasks(CREW).await.unwrap();
    assert_eq!(tasks.len(), 1);

    let task = &tasks[0];
    assert_eq!(task.status, Status::Completed);
    assert_eq!(task.task_name, "Create PRD");
    assert_eq!(task.artifacts_path.as_deref(), Some("artifacts/prd.md"));
    assert_eq!(task.metadata, Some(json!({"attempt": 1})));
    assert_eq!(task.created_at, first.created_at);
    assert!(task.updated_at >= first.updated_at);
}

#[tokio::test]
async fn test_task_upsert_overwrites_provided_fields() {
    let store = StateStore::in_memory().await.unwrap();

    store
        .set_task_status(
            CREW,
            "t1",
            Status::InProgress,
            TaskUpdate::new().with_artifact("old.md"),
        )
        .await
        .unwrap();
    store
        .set_task_status(
            CREW,
            "t1",
            Status::Failed,
            TaskUpdate::new()
                .named("ignored on update")
                .with_artifact("new.md")
                .with_metadata(json!({"error": "boom"})),
        )
        .await
        .unwrap();

    let task = store.get_task(CREW, "t1").await.unwrap().unwrap();
    assert_eq!(task.status, Status::Failed);
    assert_eq!(task.task_name, "");
    assert_eq!(task.artifacts_path.as_deref(), Some("new.md"));
    assert_eq!(task.metadata, Some(json!({"error": "boom"})));
}

#[tokio::test]
async fn test_same_task_id_in_different_crews_is_distinct() {
    let store = StateStore::in_memory().await.unwrap();

    store
        .set_task_status("CrewA", "shared", Status::Completed, TaskUpdate::new())
        .await
        .unwrap();
    store
        .set_task_status("CrewB", "shared", Status::Pending, TaskUpdate::new())
        .await
        .unwrap();

    assert!(store.should_skip_task("CrewA", "shared").await.unwrap());
    assert!(!store.should_skip_task("CrewB", "shared").await.unwrap());
}

#[tokio::test]
async fn test_list_pending_tasks_in_registration_order() {
    let store = StateStore::in_memory().await.unwrap();

    for task_id in ["c", "a", "b"] {
        store
            .set_task_status(CREW, task_id, Status::Pending, TaskUpdate::new())
            .await
            .unwrap();
    }
    store
        .set_task_status(CREW, "a", Status::Completed, TaskUpdate::new())
        .await
        .unwrap();
    store
        .set_task_status("OtherCrew", "z", Status::Pending, TaskUpdate::new())
        .await
        .unwrap();

    let pending: Vec<String> = store
        .list_pending_tasks(CREW)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.task_id)
        .collect();
    assert_eq!(pending, vec!["c", "b"]);
}

#[tokio::test]
async fn test_completed_task_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("state.db");

    {
        let store = StateStore::from_path(&db_path).await.unwrap();
        store
            .set_task_status(CREW, "strategy_define_objectives", Status::Completed, TaskUpdate::new())
            .await
            .unwrap();
        store.pool().close().await;
    }

    let reopened = StateStore::from_path(&db_path).await.unwrap();
    assert!(reopened
        .should_skip_task(CREW, "strategy_define_objectives")
        .await
        .unwrap());
}

// ============================================================================
// Crew runs
// ============================================================================

#[tokio::test]
async fn test_start_crew_run_is_idempotent_per_run_id() {
    let store = StateStore::in_memory().await.unwrap();

    store.start_crew_run(CREW, "StrategyCrew_abcd1234").await.unwrap();
    let first = store
        .get_crew_run("StrategyCrew_abcd1234")
        .await
        .unwrap()
        .unwrap();

    store.start_crew_run(CREW, "StrategyCrew_abcd1234").await.unwrap();
    let second = store
        .get_crew_run("StrategyCrew_abcd1234")
        .await
        .unwrap()
        .unwrap();

    let in_progress = store.list_runs_with_status(Status::InProgress).await.unwrap();
    assert_eq!(in_progress.len(), 1);
    assert_eq!(second.status, Status::InProgress);
    assert!(second.started_at >= first.started_at);
}

#[tokio::test]
async fn test_complete_crew_run_success_and_failure() {
    let store = StateStore::in_memory().await.unwrap();

    store.start_crew_run(CREW, "ok_run").await.unwrap();
    store.start_crew_run(CREW, "bad_run").await.unwrap();
    store.start_crew_run(CREW, "empty_msg_run").await.unwrap();

    assert_ok!(store.complete_crew_run("ok_run", None).await);
    assert_ok!(store.complete_crew_run("bad_run", Some("LLM timeout")).await);
    assert_ok!(store.complete_crew_run("empty_msg_run", Some("")).await);

    let ok = store.get_crew_run("ok_run").await.unwrap().unwrap();
    assert_eq!(ok.status, Status::Completed);
    assert!(ok.completed_at.is_some());
    assert_eq!(ok.error_message, None);

    let bad = store.get_crew_run("bad_run").await.unwrap().unwrap();
    assert_eq!(bad.status, Status::Failed);
    assert_eq!(bad.error_message.as_deref(), Some("LLM timeout"));

    let empty = store.get_crew_run("empty_msg_run").await.unwrap().unwrap();
    assert_eq!(empty.status, Status::Completed);
}

#[tokio::test]
async fn test_complete_crew_run_transitions_once() {
    let store = StateStore::in_memory().await.unwrap();

    let err = store.complete_crew_run("never_started", None).await.unwrap_err();
    assert!(matches!(err, Error::RunNotFound(ref id) if id == "never_started"));

    store.start_crew_run(CREW, "run_1").await.unwrap();
    store.complete_crew_run("run_1", Some("boom")).await.unwrap();

    let err = store.complete_crew_run("run_1", None).await.unwrap_err();
    assert!(matches!(
        err,
        Error::RunAlreadyFinished {
            status: Status::Failed,
            ..
        }
    ));

    // Restarting the same run id makes it completable again
    store.start_crew_run(CREW, "run_1").await.unwrap();
    store.complete_crew_run("run_1", None).await.unwrap();
    let run = store.get_crew_run("run_1").await.unwrap().unwrap();
    assert_eq!(run.status, Status::Completed);
    assert_eq!(run.error_message, None);
}

#[tokio::test]
async fn test_last_failed_run() {
    let store = StateStore::in_memory().await.unwrap();
    assert!(store.last_failed_run().await.unwrap().is_none());

    store.start_crew_run("StrategyCrew", "s_1").await.unwrap();
    store.complete_crew_run("s_1", Some("first failure")).await.unwrap();
    store.start_crew_run("CurriculumCrew", "c_1").await.unwrap();
    store.complete_crew_run("c_1", Some("second failure")).await.unwrap();
    store.start_crew_run("PlatformCrew", "p_1").await.unwrap();
    store.complete_crew_run("p_1", None).await.unwrap();

    let last = store.last_failed_run().await.unwrap().unwrap();
    assert_eq!(last.run_id, "c_1");
    assert_eq!(last.crew_name, "CurriculumCrew");
    assert_eq!(last.error_message.as_deref(), Some("second failure"));
}

// ============================================================================
// Phases
// ============================================================================

#[tokio::test]
async fn test_phase_lifecycle() {
    let store = StateStore::in_memory().await.unwrap();

    store
        .set_phase_status(1, "Vision & Requirements", Status::InProgress)
        .await
        .unwrap();
    store
        .set_phase_status(1, "Vision & Requirements", Status::Completed)
        .await
        .unwrap();

    let phases = store.list_phases().await.unwrap();
    assert_eq!(phases.len(), 1);
    assert_eq!(phases[0].status, Status::Completed);
    assert!(phases[0].started_at.is_some());
    assert!(phases[0].completed_at.is_some());
}

#[tokio::test]
async fn test_phase_completion_without_start_is_noop() {
    let store = StateStore::in_memory().await.unwrap();

    store
        .set_phase_status(7, "Never Started", Status::Completed)
        .await
        .unwrap();
    store
        .set_phase_status(8, "Never Started Either", Status::Failed)
        .await
        .unwrap();

    assert_eq!(store.get_phase_status(7).await.unwrap(), None);
    assert_eq!(store.get_phase_status(8).await.unwrap(), None);
    assert!(store.list_phases().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_phase_pending_and_skipped_keep_timestamps() {
    let store = StateStore::in_memory().await.unwrap();

    store.set_phase_status(2, "Curriculum", Status::Pending).await.unwrap();
    let phase = &store.list_phases().await.unwrap()[0];
    assert_eq!(phase.status, Status::Pending);
    assert!(phase.started_at.is_none());

    store
        .set_phase_status(2, "Curriculum", Status::InProgress)
        .await
        .unwrap();
    let started = store.list_phases().await.unwrap()[0].started_at;

    store.set_phase_status(2, "Curriculum", Status::Skipped).await.unwrap();
    let phase = &store.list_phases().await.unwrap()[0];
    assert_eq!(phase.status, Status::Skipped);
    assert_eq!(phase.started_at, started);
}

// ============================================================================
// Summary
// ============================================================================

#[tokio::test]
async fn test_summary_counts_and_phase_order() {
    let store = StateStore::in_memory().await.unwrap();

    let summary = store.get_summary().await.unwrap();
    assert_eq!(summary.total_tasks(), 0);
    assert!(summary.phases.is_empty());

    for (task_id, status) in [
        ("a", Status::Completed),
        ("b", Status::Completed),
        ("c", Status::Failed),
        ("d", Status::Pending),
    ] {
        store
            .set_task_status(CREW, task_id, status, TaskUpdate::new())
            .await
            .unwrap();
    }
    store.start_crew_run(CREW, "r1").await.unwrap();
    store.start_crew_run(CREW, "r2").await.unwrap();
    store.complete_crew_run("r2", Some("failed")).await.unwrap();

    store.set_phase_status(3, "Platform", Status::InProgress).await.unwrap();
    store.set_phase_status(1, "Vision", Status::InProgress).await.unwrap();
    store.set_phase_status(1, "Vision", Status::Completed).await.unwrap();

    let summary = store.get_summary().await.unwrap();
    assert_eq!(summary.total_tasks(), 4);
    assert_eq!(summary.tasks_with(Status::Completed), 2);
    assert_eq!(summary.tasks_with(Status::Failed), 1);
    assert_eq!(summary.tasks_with(Status::Skipped), 0);
    assert_eq!(summary.runs_with(Status::InProgress), 1);
    assert_eq!(summary.runs_with(Status::Failed), 1);

    let numbers: Vec<u32> = summary.phases.iter().map(|p| p.phase_number).collect();
    assert_eq!(numbers, vec![1, 3]);
}
