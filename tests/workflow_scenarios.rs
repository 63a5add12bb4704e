//! End-to-end workflow runs against a scripted backend and the file
//! checkpoint store.
//!
//! Each invocation builds a fresh orchestrator over the same checkpoint
//! directory, the way separate CLI invocations would.

use camino::Utf8PathBuf;
use postflow::{
    CheckpointStore, EntryKind, FileCheckpointStore, Gateway, GatewayOptions, Interaction,
    Orchestrator, RunStatus, StepId, WorkflowError, WorkflowParams,
};
use postflow_llm::testing::ScriptedBackend;
use postflow_workflow::PUBLISH_CONFIRMATION;
use tempfile::TempDir;

struct Harness {
    _temp: TempDir,
    dir: Utf8PathBuf,
    backend: ScriptedBackend,
}

impl Harness {
    fn new(backend: ScriptedBackend) -> Self {
        let temp = TempDir::new().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().join("sessions")).unwrap();
        Self {
            _temp: temp,
            dir,
            backend,
        }
    }

    fn store(&self) -> FileCheckpointStore {
        FileCheckpointStore::new(self.dir.clone(), 900)
    }

    fn orchestrator(&self) -> Orchestrator {
        let gateway = Gateway::new(Box::new(self.backend.clone()), GatewayOptions::default())
            .with_cache(Some(64));
        Orchestrator::new(gateway, Box::new(self.store()))
    }
}

fn params() -> WorkflowParams {
    WorkflowParams::new("Remote work productivity", ["professional"], ["managers"]).unwrap()
}

fn drafting_backend() -> ScriptedBackend {
    ScriptedBackend::new()
        .always("validate-input", "Valid")
        .always(
            "generate-draft",
            "Remote teams ship faster when meetings shrink. #RemoteWork #Productivity #Leadership",
        )
        .always("validate-draft", r#"{"response": "Valid"}"#)
}

#[tokio::test]
async fn positive_feedback_ends_with_four_entries() {
    let harness = Harness::new(
        drafting_backend().always("collect-feedback", r#"{"sentiment": "positive"}"#),
    );

    let first = harness
        .orchestrator()
        .run("launch", Interaction::Start(params()))
        .await
        .unwrap();
    assert_eq!(first.status(), RunStatus::AwaitingFeedback);
    assert_eq!(first.state.history().len(), 3);

    let second = harness
        .orchestrator()
        .run("launch", Interaction::Feedback("This is great as is".to_string()))
        .await
        .unwrap();

    assert_eq!(second.status(), RunStatus::Completed);
    assert_eq!(second.state.best_post(), None);
    let kinds: Vec<EntryKind> = second.state.history().iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        [
            EntryKind::Plain,
            EntryKind::OriginalPost,
            EntryKind::Validation,
            EntryKind::UserFeedbackEcho,
        ]
    );
    assert_eq!(harness.backend.calls_for("revise-draft"), 0);

    let saved = harness.store().load("launch").unwrap().unwrap();
    assert_eq!(saved.state, second.state);
    assert_eq!(saved.cursor.status, RunStatus::Completed);
}

#[tokio::test]
async fn negative_feedback_revises_and_publishes() {
    let revision = "Remote teams ship 20% faster when meetings shrink, per our Q3 data. #RemoteWork";
    let harness = Harness::new(
        drafting_backend()
            .always("collect-feedback", r#"{"sentiment": "negative"}"#)
            .always("revise-draft", revision),
    );

    harness
        .orchestrator()
        .run("launch", Interaction::Start(params()))
        .await
        .unwrap();
    let outcome = harness
        .orchestrator()
        .run("launch", Interaction::Feedback("add more data".to_string()))
        .await
        .unwrap();

    assert_eq!(
        outcome.steps_run,
        [StepId::CollectFeedback, StepId::ReviseDraft, StepId::Publish]
    );
    assert_eq!(outcome.state.best_post(), Some(revision));

    let history = outcome.state.history();
    assert_eq!(history.len(), 6);
    assert_eq!(history[4].kind, EntryKind::FeedbackRevision);
    assert_eq!(
        history[4].text,
        format!("Generated post based on feedback: {revision}")
    );
    assert_eq!(history[5].text, PUBLISH_CONFIRMATION);
}

#[tokio::test]
async fn rejected_topic_produces_no_drafts() {
    let harness = Harness::new(ScriptedBackend::new().always("validate-input", "Invalid"));

    let outcome = harness
        .orchestrator()
        .run("launch", Interaction::Start(params()))
        .await
        .unwrap();

    assert_eq!(outcome.status(), RunStatus::Completed);
    assert!(outcome.state.drafts().is_empty());
    assert_eq!(harness.backend.call_count(), 1);
}

#[tokio::test]
async fn interrupted_run_resumes_from_checkpoint() {
    let harness = Harness::new(drafting_backend().fail(
        "validate-draft",
        postflow::LlmError::Timeout {
            duration: std::time::Duration::from_secs(120),
        },
    ));

    let err = harness
        .orchestrator()
        .run("launch", Interaction::Start(params()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::Gateway {
            step: StepId::ValidateDraft,
            ..
        }
    ));

    let saved = harness.store().load("launch").unwrap().unwrap();
    assert_eq!(saved.cursor.status, RunStatus::Running);
    assert_eq!(saved.cursor.next, Some(StepId::ValidateDraft));
    assert_eq!(saved.state.drafts().len(), 1);

    let outcome = harness
        .orchestrator()
        .run("launch", Interaction::Resume)
        .await
        .unwrap();
    assert_eq!(outcome.steps_run, [StepId::ValidateDraft]);
    assert_eq!(outcome.status(), RunStatus::AwaitingFeedback);
    assert_eq!(harness.backend.calls_for("generate-draft"), 1);
}

#[tokio::test]
async fn sessions_are_independent() {
    let harness = Harness::new(drafting_backend());

    harness
        .orchestrator()
        .run("alpha", Interaction::Start(params()))
        .await
        .unwrap();

    let err = harness
        .orchestrator()
        .run("beta", Interaction::Feedback("more".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::UnknownSession(s) if s == "beta"));
    assert!(harness.store().load("alpha").unwrap().is_some());
}

#[tokio::test]
async fn locked_session_is_refused() {
    let harness = Harness::new(drafting_backend());
    let store = harness.store();
    let _held = store.lock_session("launch").unwrap();

    let err = harness
        .orchestrator()
        .run("launch", Interaction::Start(params()))
        .await
        .unwrap_err();

    assert!(matches!(err, WorkflowError::Lock(_)));
    assert_eq!(err.exit_code(), postflow::ExitCode::LOCK_HELD);
    assert_eq!(harness.backend.call_count(), 0);
}
