//! Pipeline Integration Tests
//!
//! Drives briefs through intake, the engine and the hub with a scripted
//! completion service.

mod common;

use std::sync::Arc;

use uuid::Uuid;

use agentflow::core::{ExecutorKind, RunStatus, TaskStatus};
use agentflow::workflow::{DecompositionError, IntakeError};

use common::{eventually, next_batch, test_app, test_app_with_embedder, BrokenEmbedder};

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_single_automated_task_lifecycle() {
    let mut t = test_app(vec![r#"[{"title":"Design UI mockup","routed_to":"ai"}]"#, "mockup.png"]);
    let mut sub = t.app.hub.subscribe();
    let project = Uuid::new_v4();

    let tasks = t.app.intake.process(project, "Build a login page").await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].executor_kind, ExecutorKind::Automated);
    assert_eq!(tasks[0].owner, "LLM-Llama-3");

    let announced = next_batch(&mut sub.receiver).await;
    assert_eq!(announced.len(), 1);
    assert_eq!(announced[0].status, TaskStatus::Queued);

    let _engine = t.app.start_engine();

    let started = next_batch(&mut sub.receiver).await;
    let finished = next_batch(&mut sub.receiver).await;
    assert_eq!(started.len(), 1);
    assert_eq!(finished.len(), 1);
    assert_eq!(started[0].id, tasks[0].id);
    assert_eq!(finished[0].id, tasks[0].id);
    assert_eq!(started[0].status, TaskStatus::InProgress);
    assert_eq!(finished[0].status, TaskStatus::Done);
    assert_eq!(finished[0].result.as_deref(), Some("mockup.png"));

    let stored = t.app.registry.get(tasks[0].id).unwrap();
    assert_eq!(stored.status, TaskStatus::Done);
    assert_eq!(t.app.registry.run(project).unwrap().status, RunStatus::Completed);
}

#[tokio::test]
async fn test_automated_prompt_carries_retrieved_context() {
    let mut t = test_app(vec![
        r#"[{"title":"Write login form validation","routed_to":"ai","why":"mechanical"}]"#,
        "validated",
    ]);
    let mut sub = t.app.hub.subscribe();
    let _engine = t.app.start_engine();

    t.app.intake.process(Uuid::new_v4(), "Build a login page").await.unwrap();
    for _ in 0..3 {
        next_batch(&mut sub.receiver).await;
    }

    let prompts = t.completion.prompts.lock();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[1].contains(r#""title":"Write login form validation""#));
    assert!(prompts[1].ends_with("\n\n### TASK\nWrite login form validation"));
}

#[tokio::test]
async fn test_human_task_gets_roster_owner_and_canned_result() {
    let mut t = test_app(vec![r#"[{"title":"Sign vendor contract","routed_to":"human"}]"#]);
    let mut sub = t.app.hub.subscribe();
    let _engine = t.app.start_engine();

    let tasks = t.app.intake.process(Uuid::new_v4(), "Procure hosting").await.unwrap();
    let owner = tasks[0].owner.clone();
    assert!(t.app.config.roster.humans.contains(&owner));

    next_batch(&mut sub.receiver).await;
    next_batch(&mut sub.receiver).await;
    let finished = next_batch(&mut sub.receiver).await;
    assert_eq!(
        finished[0].result.as_deref(),
        Some(format!("{owner} finished: Sign vendor contract").as_str())
    );
    assert_eq!(t.completion.prompt_count(), 1);
}

// ============================================================================
// Decomposition failures
// ============================================================================

#[tokio::test]
async fn test_invalid_reply_aborts_run() {
    let t = test_app(vec!["not json"]);
    let mut sub = t.app.hub.subscribe();
    let project = Uuid::new_v4();

    let err = t.app.intake.process(project, "Build a login page").await.unwrap_err();
    assert!(matches!(err, IntakeError::Decomposition(DecompositionError::InvalidJson { .. })));

    assert!(t.app.registry.is_empty());
    assert!(sub.receiver.try_recv().is_err());
    assert!(t.app.artifacts.load_raw(project).await.unwrap().is_none());
    assert!(!t.app.artifacts.raw_path(project).exists());
    assert!(t.index_store.is_empty());
    assert!(matches!(t.app.registry.run(project).unwrap().status, RunStatus::Failed { .. }));
}

#[tokio::test]
async fn test_malformed_entries_are_dropped() {
    let t = test_app(vec![r#"[{"title":"","routed_to":"ai"}, {"title":"X","routed_to":"human"}]"#]);
    let project = Uuid::new_v4();

    let tasks = t.app.intake.process(project, "Anything").await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "X");
    assert_eq!(tasks[0].executor_kind, ExecutorKind::Human);
    assert_eq!(t.app.registry.project_tasks(project).len(), 1);

    // The raw artifact keeps every entry, including the dropped one.
    let raw = t.app.artifacts.load_raw(project).await.unwrap().unwrap();
    assert_eq!(raw.as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_no_valid_items_creates_nothing() {
    let t = test_app(vec![r#"[{"title":"Robots","routed_to":"robot"}]"#]);
    let project = Uuid::new_v4();

    let err = t.app.intake.process(project, "Anything").await.unwrap_err();
    assert!(matches!(err, IntakeError::Decomposition(DecompositionError::NoValidItems)));
    assert!(t.app.registry.project_tasks(project).is_empty());
    assert!(!t.app.artifacts.raw_path(project).exists());
}

// ============================================================================
// Artifacts and index
// ============================================================================

#[tokio::test]
async fn test_raw_artifact_and_index_are_built() {
    let t = test_app(vec![
        r#"```json
{"tasks": [
  {"title": "Set up payment provider account", "routed_to": "human"},
  {"title": "Design checkout page", "routed_to": "ai"}
]}
```"#,
    ]);
    let project = Uuid::new_v4();

    t.app.intake.process(project, "Online shop").await.unwrap();

    let raw = t.app.artifacts.load_raw(project).await.unwrap().unwrap();
    assert_eq!(raw[0]["title"], "Set up payment provider account");
    assert_eq!(t.index_store.len(), 1);

    let matches = t.app.retriever.query_records(project, "payment provider", 1).await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0]["title"], "Set up payment provider account");
}

#[tokio::test]
async fn test_index_failure_runs_tasks_without_context() {
    let mut t = test_app_with_embedder(
        vec![r#"[{"title":"Write login form validation","routed_to":"ai"}]"#, "validated"],
        Arc::new(BrokenEmbedder),
    );
    let mut sub = t.app.hub.subscribe();
    let _engine = t.app.start_engine();
    let project = Uuid::new_v4();

    let tasks = t.app.intake.process(project, "Build a login page").await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert!(t.index_store.is_empty());
    assert!(t.app.artifacts.raw_path(project).exists());

    next_batch(&mut sub.receiver).await;
    next_batch(&mut sub.receiver).await;
    let finished = next_batch(&mut sub.receiver).await;
    assert_eq!(finished[0].status, TaskStatus::Done);
    assert_eq!(finished[0].result.as_deref(), Some("validated"));
    assert_eq!(t.app.registry.run(project).unwrap().status, RunStatus::Completed);

    let prompts = t.completion.prompts.lock();
    assert_eq!(prompts[1], "\n\n### TASK\nWrite login form validation");
}

#[tokio::test]
async fn test_unknown_run_has_no_data() {
    let t = test_app(Vec::new());
    let project = Uuid::new_v4();

    assert!(t.app.registry.run(project).is_none());
    assert!(t.app.registry.project_tasks(project).is_empty());
    assert!(t.app.artifacts.load_raw(project).await.unwrap().is_none());
    assert_eq!(t.app.retriever.retrieve(project, "anything", 4).await, "");
}

// ============================================================================
// Background submission
// ============================================================================

#[tokio::test]
async fn test_submit_returns_before_processing_and_runs_fifo() {
    let mut t = test_app(vec![
        r#"[{"title":"First","routed_to":"ai"},{"title":"Second","routed_to":"ai"}]"#,
        "one",
        "two",
    ]);
    let _engine = t.app.start_engine();

    let project = t.app.intake.submit("Two step project".to_string());
    assert!(t.app.registry.run(project).is_some());

    let registry = t.app.registry.clone();
    eventually(|| registry.run(project).is_some_and(|r| r.status == RunStatus::Completed)).await;

    let tasks = registry.project_tasks(project);
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].result.as_deref(), Some("one"));
    assert_eq!(tasks[1].result.as_deref(), Some("two"));
    assert!(tasks[0].finished_at <= tasks[1].started_at);
}

#[tokio::test]
async fn test_every_subscriber_sees_same_sequence() {
    let mut t = test_app(vec![r#"[{"title":"Only","routed_to":"ai"}]"#, "ok"]);
    let mut a = t.app.hub.subscribe();
    let mut b = t.app.hub.subscribe();
    let _engine = t.app.start_engine();

    t.app.intake.process(Uuid::new_v4(), "brief").await.unwrap();

    for _ in 0..3 {
        assert_eq!(next_batch(&mut a.receiver).await, next_batch(&mut b.receiver).await);
    }
}
