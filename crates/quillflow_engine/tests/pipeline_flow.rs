//! End-to-end pipeline scenarios over the in-memory store and the
//! scripted generation service.

use quillflow_engine::{
    event_channel, validate_stage, CallBudget, CancelToken, DocSnapshot, DriveEnv, DriveStatus,
    EngineConfig, EngineError, PipelineEngine, ReasonCode, RunOptions, RunStatus, StageDriver,
};
use quillflow_gen::{GenerationService, ScriptedGeneration, ScriptedReply};
use quillflow_protocol::PipelineEvent;
use quillflow_store::{DocName, DocumentStore, MemoryStore, Session, Stage};
use std::sync::Arc;
use std::time::Duration;

const SEED_BRIEF: &str = "# Brief\n\n## Project\nAn internal analytics portal.\n\n## Goals\n- Self-serve dashboards for every team\n\n## Constraints\n- Six week timeline\n";

const REQUIREMENTS_REPLY: &str = "## Overview\nAnalytics portal requirements.\n\n## Functional Requirements\n- REQ-001: Provide self-serve dashboards\n- REQ-002: Export charts as CSV\n\n## Out of Scope\n- Mobile clients\n\n## Acceptance Criteria\n- Dashboards render for all teams\n";

const BLUEPRINT_REPLY: &str = "## Architecture\nSingle web service, covers REQ-001 and REQ-002.\n\n## Components\n- dashboard renderer\n- export worker\n\n## Data Flow\nBrowser -> API -> warehouse\n";

const WORKPLAN_REPLY: &str = "## Milestones\n- M1: dashboards (REQ-001)\n\n## Tasks\n- [ ] Build renderer for REQ-001\n- [ ] Ship CSV export for REQ-002\n";

struct Harness {
    engine: Arc<PipelineEngine>,
    store: Arc<MemoryStore>,
    generation: Arc<ScriptedGeneration>,
}

fn harness(config: EngineConfig) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let generation = Arc::new(ScriptedGeneration::new());
    let engine = Arc::new(PipelineEngine::new(
        store.clone(),
        generation.clone(),
        config,
    ));
    Harness {
        engine,
        store,
        generation,
    }
}

fn fast_config() -> EngineConfig {
    EngineConfig {
        call_timeout_ms: 2_000,
        ..EngineConfig::default()
    }
}

async fn snapshot(store: &MemoryStore, session: &Session) -> DocSnapshot {
    let mut docs = DocSnapshot::new();
    for name in store.list_docs(session.session_id).await.unwrap() {
        let doc = store
            .read_doc(session.session_id, name)
            .await
            .unwrap()
            .unwrap();
        docs.insert(name, doc.content);
    }
    docs
}

/// Seed a valid brief and approve it so the session sits at the
/// requirements stage.
async fn session_at_requirements(h: &Harness) -> Session {
    let session = h.engine.start_session().await.unwrap();
    h.store
        .write_doc(session.session_id, DocName::Brief, SEED_BRIEF.to_string())
        .await
        .unwrap();
    let outcome = h.engine.approve(session.session_id, Stage::Brief).await.unwrap();
    assert!(outcome.ok, "seed brief failed validation: {:?}", outcome.reasons);
    h.engine.session(session.session_id).await.unwrap()
}

fn terminal_events(events: &[PipelineEvent]) -> Vec<&PipelineEvent> {
    events.iter().filter(|e| e.is_terminal()).collect()
}

// ============================================================================
// Budget
// ============================================================================

#[tokio::test]
async fn budget_exhaustion_emits_exactly_one_needs_more() {
    let mut config = fast_config();
    config.call_budget = 1;
    let h = harness(config);
    let session = h.engine.start_session().await.unwrap();

    // One interview turn fits the budget; the compile call it leads
    // into does not.
    h.generation.queue(ScriptedReply::text(
        "I have enough to work with. [[READY_TO_DRAFT]]",
    ));

    let (report, events) = h
        .engine
        .run_stage_collected(
            session.session_id,
            Stage::Brief,
            RunOptions::default(),
            &CancelToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::NeedsMore);
    assert_eq!(report.reason, Some(ReasonCode::BudgetExceeded));
    assert_eq!(report.calls_used, 1);

    let terminals = terminal_events(&events);
    assert_eq!(terminals.len(), 1);
    assert!(matches!(
        terminals[0],
        PipelineEvent::StageNeedsMore { reason: ReasonCode::BudgetExceeded, .. }
    ));
    // The terminal event is the last event of the run.
    assert!(events.last().unwrap().is_terminal());
}

#[tokio::test]
async fn seeded_calls_count_against_the_budget() {
    let mut config = fast_config();
    config.call_budget = 2;
    let h = harness(config);
    let session = h.engine.start_session().await.unwrap();

    let (report, _) = h
        .engine
        .run_stage_collected(
            session.session_id,
            Stage::Brief,
            RunOptions { seed_calls: 2 },
            &CancelToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.reason, Some(ReasonCode::BudgetExceeded));
    // Nothing reached the generation service.
    assert_eq!(h.generation.calls_made(), 0);
}

// ============================================================================
// Single-flight
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn second_concurrent_run_is_rejected_not_queued() {
    let h = harness(fast_config());
    let session = h.engine.start_session().await.unwrap();
    h.generation.queue(ScriptedReply::text_after(
        "What is the main goal of the project?",
        Duration::from_millis(300),
    ));

    let engine = Arc::clone(&h.engine);
    let id = session.session_id;
    let first = tokio::spawn(async move {
        engine
            .run_stage_collected(id, Stage::Brief, RunOptions::default(), &CancelToken::new())
            .await
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = h
        .engine
        .run_stage_collected(id, Stage::Brief, RunOptions::default(), &CancelToken::new())
        .await;
    assert!(matches!(second, Err(EngineError::Busy { .. })));

    let (report, _) = first.await.unwrap().unwrap();
    assert_eq!(report.status, RunStatus::NeedsMore);
    assert_eq!(report.reason, Some(ReasonCode::AwaitingUser));

    // The lock was released on completion; the next attempt proceeds.
    h.generation
        .queue(ScriptedReply::text("And who is the audience?"));
    let third = h
        .engine
        .run_stage_collected(id, Stage::Brief, RunOptions::default(), &CancelToken::new())
        .await;
    assert!(third.is_ok());
}

#[tokio::test]
async fn rate_window_rejection_carries_retry_hint() {
    let mut config = fast_config();
    config.burst_limit = 1;
    let h = harness(config);
    let session = h.engine.start_session().await.unwrap();

    h.generation
        .queue(ScriptedReply::text("What is the main goal?"));
    h.engine
        .run_stage_collected(
            session.session_id,
            Stage::Brief,
            RunOptions::default(),
            &CancelToken::new(),
        )
        .await
        .unwrap();

    let rejected = h
        .engine
        .run_stage_collected(
            session.session_id,
            Stage::Brief,
            RunOptions::default(),
            &CancelToken::new(),
        )
        .await;
    match rejected {
        Err(EngineError::RateLimited {
            retry_after_secs, ..
        }) => assert!(retry_after_secs >= 1),
        other => panic!("expected rate limit rejection, got {other:?}"),
    }
}

// ============================================================================
// Missing upstream input
// ============================================================================

#[tokio::test]
async fn missing_upstream_short_circuits_without_external_call() {
    let h = harness(fast_config());
    let session = h.engine.start_session().await.unwrap();

    // Drive the requirements stage directly against a session that
    // has no brief at all.
    let driver = StageDriver::with_standard_writers();
    let mut budget = CallBudget::new(6);
    let (sink, _rx) = event_channel();
    let config = fast_config();
    let env = DriveEnv {
        store: h.store.as_ref(),
        generation: h.generation.as_ref(),
        config: &config,
        assets: None,
    };

    let status = driver
        .run(
            session.session_id,
            Stage::Requirements,
            &mut budget,
            &sink,
            &CancelToken::new(),
            &env,
        )
        .await
        .unwrap();

    assert_eq!(
        status,
        DriveStatus::NeedsMore(ReasonCode::MissingInput("brief.md".to_string()))
    );
    assert_eq!(budget.total_calls(), 0);
    assert_eq!(h.generation.calls_made(), 0);
}

#[tokio::test]
async fn empty_upstream_document_counts_as_missing() {
    let h = harness(fast_config());
    let session = h.engine.start_session().await.unwrap();
    h.store
        .write_doc(session.session_id, DocName::Brief, "   \n".to_string())
        .await
        .unwrap();

    let driver = StageDriver::with_standard_writers();
    let mut budget = CallBudget::new(6);
    let (sink, _rx) = event_channel();
    let config = fast_config();
    let env = DriveEnv {
        store: h.store.as_ref(),
        generation: h.generation.as_ref(),
        config: &config,
        assets: None,
    };

    let status = driver
        .run(
            session.session_id,
            Stage::Requirements,
            &mut budget,
            &sink,
            &CancelToken::new(),
            &env,
        )
        .await
        .unwrap();

    assert_eq!(
        status,
        DriveStatus::NeedsMore(ReasonCode::MissingInput("brief.md".to_string()))
    );
    assert_eq!(h.generation.calls_made(), 0);
}

// ============================================================================
// Validator gating
// ============================================================================

#[tokio::test]
async fn fresh_session_approval_names_the_missing_brief() {
    let h = harness(fast_config());
    let session = h.engine.start_session().await.unwrap();

    let outcome = h.engine.approve(session.session_id, Stage::Brief).await.unwrap();
    assert!(!outcome.ok);
    assert!(outcome.reasons.iter().any(|r| r.contains("brief.md")));

    // Nothing mutated.
    let record = h.engine.session(session.session_id).await.unwrap();
    assert_eq!(record.current_stage, Stage::Brief);
    assert!(record.approved.is_empty());
}

#[tokio::test]
async fn approving_non_current_stage_is_rejected_without_mutation() {
    let h = harness(fast_config());
    let session = h.engine.start_session().await.unwrap();
    h.store
        .write_doc(session.session_id, DocName::Brief, SEED_BRIEF.to_string())
        .await
        .unwrap();

    let result = h.engine.approve(session.session_id, Stage::Requirements).await;
    assert!(matches!(
        result,
        Err(EngineError::StageMismatch {
            requested: Stage::Requirements,
            current: Stage::Brief,
        })
    ));

    let record = h.engine.session(session.session_id).await.unwrap();
    assert_eq!(record.current_stage, Stage::Brief);
    assert!(record.approved.is_empty());
    let brief = h
        .store
        .read_doc(session.session_id, DocName::Brief)
        .await
        .unwrap()
        .unwrap();
    assert!(!brief.approved);
}

// ============================================================================
// Writers against their validators
// ============================================================================

#[tokio::test]
async fn seeded_brief_lets_requirements_writer_satisfy_its_validator() {
    let h = harness(fast_config());
    let session = session_at_requirements(&h).await;
    assert_eq!(session.current_stage, Stage::Requirements);

    h.generation.queue(ScriptedReply::text(REQUIREMENTS_REPLY));
    let (report, events) = h
        .engine
        .run_stage_collected(
            session.session_id,
            Stage::Requirements,
            RunOptions::default(),
            &CancelToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Ready);
    assert!(events.iter().any(|e| matches!(
        e,
        PipelineEvent::DocUpdated { doc, bytes } if doc == "requirements.md" && *bytes > 0
    )));
    assert!(matches!(
        events.last().unwrap(),
        PipelineEvent::StageReady { stage } if stage == "requirements"
    ));

    let docs = snapshot(&h.store, &session).await;
    let verdict = validate_stage(Stage::Requirements, &docs);
    assert!(verdict.ok, "validator reasons: {:?}", verdict.reasons);

    let approval = h
        .engine
        .approve(session.session_id, Stage::Requirements)
        .await
        .unwrap();
    assert!(approval.ok);
}

#[tokio::test]
async fn rerunning_a_stage_satisfies_the_validator_both_times() {
    let h = harness(fast_config());
    let session = session_at_requirements(&h).await;

    // Two generations with different content; each output must stand
    // on its own against the validator.
    h.generation.queue(ScriptedReply::text(REQUIREMENTS_REPLY));
    h.generation
        .queue(ScriptedReply::text("A rough draft that ignores instructions."));

    for _ in 0..2 {
        let (report, _) = h
            .engine
            .run_stage_collected(
                session.session_id,
                Stage::Requirements,
                RunOptions::default(),
                &CancelToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(report.status, RunStatus::Ready);

        let docs = snapshot(&h.store, &session).await;
        let verdict = validate_stage(Stage::Requirements, &docs);
        assert!(verdict.ok, "validator reasons: {:?}", verdict.reasons);
    }
}

// ============================================================================
// Timeout / runtime failure classification
// ============================================================================

#[tokio::test]
async fn generation_timeout_surfaces_as_needs_more_timeout() {
    let mut config = fast_config();
    config.call_timeout_ms = 20;
    let h = harness(config);
    let session = h.engine.start_session().await.unwrap();
    h.generation.queue(ScriptedReply::text_after(
        "slow reply",
        Duration::from_millis(200),
    ));

    let (report, events) = h
        .engine
        .run_stage_collected(
            session.session_id,
            Stage::Brief,
            RunOptions::default(),
            &CancelToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::NeedsMore);
    assert_eq!(report.reason, Some(ReasonCode::Timeout));
    assert_eq!(terminal_events(&events).len(), 1);
}

#[tokio::test]
async fn unexpected_generation_failure_is_classified_runtime_error() {
    let h = harness(fast_config());
    let session = h.engine.start_session().await.unwrap();
    h.generation.queue(ScriptedReply::failure());

    let (report, events) = h
        .engine
        .run_stage_collected(
            session.session_id,
            Stage::Brief,
            RunOptions::default(),
            &CancelToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::NeedsMore);
    assert_eq!(report.reason, Some(ReasonCode::RuntimeError));
    assert_eq!(terminal_events(&events).len(), 1);
}

// ============================================================================
// Abort
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn abort_terminates_silently_and_frees_the_session() {
    let h = harness(fast_config());
    let session = h.engine.start_session().await.unwrap();
    h.generation.queue(ScriptedReply::text_after(
        "never delivered",
        Duration::from_millis(500),
    ));

    let cancel = CancelToken::new();
    let engine = Arc::clone(&h.engine);
    let id = session.session_id;
    let token = cancel.clone();
    let run = tokio::spawn(async move {
        engine
            .run_stage_collected(id, Stage::Brief, RunOptions::default(), &token)
            .await
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let (report, events) = run.await.unwrap().unwrap();
    assert_eq!(report.status, RunStatus::Aborted);
    // Silent termination: no terminal event reached the stream.
    assert!(terminal_events(&events).is_empty());
    // All-or-nothing: no partial document was persisted.
    assert!(h
        .store
        .read_doc(id, DocName::Brief)
        .await
        .unwrap()
        .is_none());

    // The very next attempt may start immediately.
    h.generation
        .queue(ScriptedReply::text("What is the main goal?"));
    let next = h
        .engine
        .run_stage_collected(id, Stage::Brief, RunOptions::default(), &CancelToken::new())
        .await;
    assert!(next.is_ok());
}

// ============================================================================
// Full pipeline walk
// ============================================================================

#[tokio::test]
async fn full_pipeline_reaches_handoff() {
    let h = harness(fast_config());
    let session = h.engine.start_session().await.unwrap();
    let id = session.session_id;
    let cancel = CancelToken::new();

    // Interactive brief: one question, one user answer with explicit
    // compile intent, then the compile call.
    h.generation
        .queue(ScriptedReply::text("What is the main goal of the project?"));
    let (report, _) = h
        .engine
        .run_stage_collected(id, Stage::Brief, RunOptions::default(), &cancel)
        .await
        .unwrap();
    assert_eq!(report.reason, Some(ReasonCode::AwaitingUser));

    h.engine
        .post_user_message(id, "Self-serve analytics for every team. Draft it.")
        .await
        .unwrap();
    h.generation.queue(ScriptedReply::text(SEED_BRIEF));
    let (report, _) = h
        .engine
        .run_stage_collected(id, Stage::Brief, RunOptions::default(), &cancel)
        .await
        .unwrap();
    assert_eq!(report.status, RunStatus::Ready);
    assert!(h.engine.approve(id, Stage::Brief).await.unwrap().ok);

    // Generation-backed middle stages.
    for (stage, reply) in [
        (Stage::Requirements, REQUIREMENTS_REPLY),
        (Stage::Blueprint, BLUEPRINT_REPLY),
        (Stage::Workplan, WORKPLAN_REPLY),
    ] {
        h.generation.queue(ScriptedReply::text(reply));
        let (report, _) = h
            .engine
            .run_stage_collected(id, stage, RunOptions::default(), &cancel)
            .await
            .unwrap();
        assert_eq!(report.status, RunStatus::Ready, "stage {stage} not ready");
        let outcome = h.engine.approve(id, stage).await.unwrap();
        assert!(outcome.ok, "stage {stage} rejected: {:?}", outcome.reasons);
    }

    // Templated terminal stage: no generation call.
    let calls_before = h.generation.calls_made();
    let (report, events) = h
        .engine
        .run_stage_collected(id, Stage::Handoff, RunOptions::default(), &cancel)
        .await
        .unwrap();
    assert_eq!(report.status, RunStatus::Ready);
    assert_eq!(report.calls_used, 0);
    assert_eq!(h.generation.calls_made(), calls_before);
    assert!(events.iter().any(|e| matches!(
        e,
        PipelineEvent::DocUpdated { doc, .. } if doc == "handoff.md"
    )));

    assert!(h.engine.approve(id, Stage::Handoff).await.unwrap().ok);
    let record = h.engine.session(id).await.unwrap();
    assert!(record.is_complete());

    let handoff = h
        .store
        .read_doc(id, DocName::Handoff)
        .await
        .unwrap()
        .unwrap();
    for name in ["brief.md", "requirements.md", "blueprint.md", "workplan.md"] {
        assert!(handoff.content.contains(name));
    }
}
