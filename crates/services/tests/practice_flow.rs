use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use drill_core::model::{ProblemId, StaticCatalog, TargetDuration, TopicId, Verdict};
use services::persist::keys;
use services::{AppServices, AppServicesError, CheckOutcome, SandboxConfig};
use storage::repository::{InMemoryStore, KeyValueStore, Storage, StorageError};

const CATALOG: &str = r#"{
  "topics": [
    {
      "id": "arrays",
      "title": "Arrays",
      "problems": [
        { "id": "arrays-1", "title": "Hello", "expectedOutput": "hello", "canonicalLanguage": "rhai" },
        { "id": "arrays-2", "title": "Two Sum", "expectedOutput": "[0, 1]", "canonicalLanguage": "python" },
        { "id": "arrays-3", "title": "Free", "canonicalLanguage": "rhai" }
      ]
    },
    {
      "id": "graphs",
      "title": "Graphs",
      "problems": [
        { "id": "graphs-1", "title": "BFS", "canonicalLanguage": "go" }
      ]
    }
  ]
}"#;

fn catalog() -> Arc<StaticCatalog> {
    Arc::new(StaticCatalog::from_json(CATALOG).unwrap())
}

async fn services_over(store: &InMemoryStore) -> AppServices {
    let storage = Storage {
        kv: Arc::new(store.clone()),
    };
    AppServices::from_storage(storage, catalog(), SandboxConfig::default()).await
}

/// Reads succeed with nothing stored; every write fails.
struct ReadOnlyStore;

#[async_trait]
impl KeyValueStore for ReadOnlyStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Connection("disk is read-only".into()))
    }
}

#[tokio::test]
async fn completion_survives_a_restart() {
    let store = InMemoryStore::new();
    {
        let mut app = services_over(&store).await;
        assert!(app.ledger_mut().toggle(ProblemId::new("arrays-1")));
        assert!(app.ledger_mut().toggle(ProblemId::new("arrays-2")));
        assert!(app.ledger_mut().toggle(ProblemId::new("graphs-1")));
        assert!(!app.ledger_mut().toggle(ProblemId::new("graphs-1")));
        app.flush().await;
    }

    let app = services_over(&store).await;
    assert!(app.ledger().is_completed(&ProblemId::new("arrays-1")));
    assert!(!app.ledger().is_completed(&ProblemId::new("graphs-1")));
    assert_eq!(app.topic_progress(&TopicId::new("arrays")), 67);
    assert_eq!(app.topic_progress(&TopicId::new("graphs")), 0);
    assert_eq!(app.overall_progress(), 50);
}

#[tokio::test]
async fn failed_writes_keep_in_memory_state() {
    let storage = Storage {
        kv: Arc::new(ReadOnlyStore),
    };
    let mut app = AppServices::from_storage(storage, catalog(), SandboxConfig::default()).await;

    assert!(app.ledger_mut().toggle(ProblemId::new("arrays-1")));
    app.timer().set_target_duration(TargetDuration::Minutes60);
    app.flush().await;

    assert!(app.ledger().is_completed(&ProblemId::new("arrays-1")));
    assert_eq!(app.timer().target(), TargetDuration::Minutes60);
}

#[tokio::test]
async fn rhai_problem_passes_with_real_output() {
    let store = InMemoryStore::new();
    let app = services_over(&store).await;

    let outcome = app
        .check_problem(&ProblemId::new("arrays-1"), r#"print("hello");"#, None)
        .await
        .unwrap();
    let CheckOutcome::Completed(report) = outcome else {
        panic!("run should complete");
    };
    assert_eq!(report.verdict, Verdict::Pass);
    assert!(!report.is_simulated());
}

#[tokio::test]
async fn wrong_output_fails() {
    let store = InMemoryStore::new();
    let app = services_over(&store).await;

    let outcome = app
        .check_problem(&ProblemId::new("arrays-1"), r#"print("hello world");"#, None)
        .await
        .unwrap();
    let CheckOutcome::Completed(report) = outcome else {
        panic!("run should complete");
    };
    assert_eq!(report.verdict, Verdict::Fail);
}

#[tokio::test]
async fn other_languages_are_simulated() {
    let store = InMemoryStore::new();
    let app = services_over(&store).await;

    let outcome = app
        .check_problem(&ProblemId::new("arrays-2"), "def two_sum(): ...", None)
        .await
        .unwrap();
    let CheckOutcome::Completed(report) = outcome else {
        panic!("run should complete");
    };
    assert!(report.is_simulated());
    assert_eq!(report.result.captured_output, "[0, 1]");
}

#[tokio::test]
async fn problem_without_expectation_reports_no_expectation() {
    let store = InMemoryStore::new();
    let app = services_over(&store).await;

    let outcome = app
        .check_problem(&ProblemId::new("arrays-3"), "print(1 + 1);", None)
        .await
        .unwrap();
    let CheckOutcome::Completed(report) = outcome else {
        panic!("run should complete");
    };
    assert_eq!(report.result.captured_output, "2");
    assert_eq!(report.verdict, Verdict::NoExpectation);
}

#[tokio::test]
async fn unknown_problem_is_rejected() {
    let store = InMemoryStore::new();
    let app = services_over(&store).await;

    let err = app
        .check_problem(&ProblemId::new("trees-9"), "print(1);", None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppServicesError::UnknownProblem(id) if id.as_str() == "trees-9"));
}

#[tokio::test(start_paused = true)]
async fn timer_total_is_persisted_and_restored() {
    let store = InMemoryStore::new();
    {
        let app = services_over(&store).await;
        let timer = app.timer();
        timer.start();
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        timer.pause();
        app.flush().await;
    }

    assert_eq!(
        store.get(keys::TOTAL_ELAPSED_SECONDS).await.unwrap().as_deref(),
        Some("3")
    );
    let app = services_over(&store).await;
    assert_eq!(app.timer().total_elapsed_seconds(), 3);
    assert_eq!(app.timer().session_elapsed_seconds(), 0);
}
