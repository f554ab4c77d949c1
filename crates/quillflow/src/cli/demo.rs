//! `quillflow demo` - scripted end-to-end pipeline run.
//!
//! Drives a full session from intake interview to handoff against an
//! in-memory store and a scripted generation service. Every event is
//! printed in its wire-frame form, exactly as a byte-stream transport
//! would carry it.

use anyhow::{bail, Result};
use quillflow_engine::{
    AssetEntry, AssetIndex, CancelToken, EngineConfig, PipelineEngine, RunOptions, RunStatus,
    StaticAssets,
};
use quillflow_gen::{ScriptedGeneration, ScriptedReply};
use quillflow_store::{DocName, DocumentStore, MemoryStore, SessionId, Stage};
use std::sync::Arc;
use tracing::info;

const BRIEF_QUESTION: &str = "What is the main goal of the project, and who is it for?";

const BRIEF_DOC: &str = "## Project\nAn internal analytics portal for product teams.\n\n## Goals\n- Self-serve dashboards for every team\n- Weekly usage digests\n\n## Constraints\n- Six week timeline\n- Warehouse read-only access\n";

const REQUIREMENTS_DOC: &str = "## Overview\nRequirements for the analytics portal.\n\n## Functional Requirements\n- REQ-001: Render self-serve dashboards per team\n- REQ-002: Send weekly usage digests\n\n## Out of Scope\n- Mobile clients\n\n## Acceptance Criteria\n- Dashboards load for all seeded teams\n- Digest emails deliver on schedule\n";

const BLUEPRINT_DOC: &str = "## Architecture\nA single web service over the warehouse, covering REQ-001 and REQ-002.\n\n## Components\n- dashboard renderer\n- digest scheduler\n\n## Data Flow\nBrowser -> portal API -> warehouse views\n";

const WORKPLAN_DOC: &str = "## Milestones\n- M1: dashboards live (REQ-001)\n- M2: digests live (REQ-002)\n\n## Tasks\n- [ ] Build dashboard renderer for REQ-001\n- [ ] Build digest scheduler for REQ-002\n";

pub async fn run() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let generation = Arc::new(ScriptedGeneration::new());
    let assets = AssetIndex::new(vec![AssetEntry {
        path: "uploads/usage-export.csv".to_string(),
        size: 18_432,
        content_type: "text/csv".to_string(),
        checksum: "3f2a9c".to_string(),
    }]);
    let engine = PipelineEngine::new(store.clone(), generation.clone(), EngineConfig::default())
        .with_assets(Arc::new(StaticAssets::new(assets)));

    let session = engine.start_session().await?;
    let id = session.session_id;
    info!(session = %id, "demo session created");
    let cancel = CancelToken::new();

    // Stage 1: intake interview, then compile on the user's explicit
    // request.
    generation.queue(ScriptedReply::text(BRIEF_QUESTION));
    run_and_print(&engine, id, Stage::Brief, &cancel).await?;

    engine
        .post_user_message(
            id,
            "Self-serve analytics for product teams, with weekly digests. Draft it.",
        )
        .await?;
    generation.queue(ScriptedReply::text(BRIEF_DOC));
    run_and_print(&engine, id, Stage::Brief, &cancel).await?;
    approve_and_print(&engine, id, Stage::Brief).await?;

    // Stages 2-4: generation-backed documents.
    for (stage, reply) in [
        (Stage::Requirements, REQUIREMENTS_DOC),
        (Stage::Blueprint, BLUEPRINT_DOC),
        (Stage::Workplan, WORKPLAN_DOC),
    ] {
        generation.queue(ScriptedReply::text(reply));
        run_and_print(&engine, id, stage, &cancel).await?;
        approve_and_print(&engine, id, stage).await?;
    }

    // Stage 5: templated handoff, no generation call.
    run_and_print(&engine, id, Stage::Handoff, &cancel).await?;
    approve_and_print(&engine, id, Stage::Handoff).await?;

    let Some(handoff) = store.read_doc(id, DocName::Handoff).await? else {
        bail!("handoff document missing after approval");
    };
    println!("--- handoff.md ---------------------------------------------");
    println!("{}", handoff.content);
    Ok(())
}

/// Run one stage and print each event as its wire frame.
async fn run_and_print(
    engine: &PipelineEngine,
    session: SessionId,
    stage: Stage,
    cancel: &CancelToken,
) -> Result<()> {
    println!("=== run {} =================================================", stage);
    let (report, events) = engine
        .run_stage_collected(session, stage, RunOptions::default(), cancel)
        .await?;
    for event in &events {
        print!("{}", event.to_frame().encode());
    }
    if report.status == RunStatus::Aborted {
        bail!("demo run was aborted unexpectedly");
    }
    info!(
        stage = %stage,
        status = ?report.status,
        calls_used = report.calls_used,
        "demo stage finished"
    );
    Ok(())
}

async fn approve_and_print(
    engine: &PipelineEngine,
    session: SessionId,
    stage: Stage,
) -> Result<()> {
    let outcome = engine.approve(session, stage).await?;
    if outcome.ok {
        println!("approve {stage}: ok");
    } else {
        println!("approve {stage}: rejected");
        for reason in &outcome.reasons {
            println!("  - {reason}");
        }
        bail!("demo approval for {stage} was rejected");
    }
    Ok(())
}
