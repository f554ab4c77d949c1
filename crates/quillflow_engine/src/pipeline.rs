//! The stage state machine and approval entry point.

use crate::assets::{AssetSource, NoAssets};
use crate::budget::CallBudget;
use crate::channel::{event_channel, EventSink};
use crate::config::EngineConfig;
use crate::driver::{DriveEnv, DriveStatus, DriverError, StageDriver};
use crate::error::EngineError;
use crate::guard::{FlightPermit, RateBucket, SessionGuard};
use crate::refresh::{ContextRefresher, NoopRefresher, RefreshPhase};
use crate::validate::{validate_stage, DocSnapshot};
use quillflow_gen::{CancelToken, GenerationService};
use quillflow_protocol::{PipelineEvent, ReasonCode};
use quillflow_store::{ChatMessage, ChatRole, DocumentStore, Session, SessionId, Stage};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Per-invocation options.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Call count carried over from a prior partial run; seeds the
    /// fresh budget.
    pub seed_calls: u32,
}

/// Terminal status of a stage run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Artifact produced; `stage.ready` was the terminal event.
    Ready,
    /// `stage.needs_more` was the terminal event.
    NeedsMore,
    /// The caller aborted; the event stream ended with no terminal
    /// event. Not surfaced as an error.
    Aborted,
}

/// What one invocation of the state machine did.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub status: RunStatus,
    pub reason: Option<ReasonCode>,
    /// Calls consumed, including any seeded carry-over.
    pub calls_used: u32,
}

/// Result of the approval entry point.
#[derive(Debug, Clone)]
pub struct ApprovalOutcome {
    pub ok: bool,
    pub reasons: Vec<String>,
}

/// Sequences the fixed stage order, dispatches to drivers, and maps
/// outcomes to statuses.
pub struct PipelineEngine {
    store: Arc<dyn DocumentStore>,
    generation: Arc<dyn GenerationService>,
    refresher: Arc<dyn ContextRefresher>,
    assets: Arc<dyn AssetSource>,
    guard: Arc<SessionGuard>,
    driver: StageDriver,
    config: EngineConfig,
}

impl PipelineEngine {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        generation: Arc<dyn GenerationService>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            generation,
            refresher: Arc::new(NoopRefresher),
            assets: Arc::new(NoAssets),
            guard: Arc::new(SessionGuard::new()),
            driver: StageDriver::with_standard_writers(),
            config,
        }
    }

    pub fn with_refresher(mut self, refresher: Arc<dyn ContextRefresher>) -> Self {
        self.refresher = refresher;
        self
    }

    pub fn with_assets(mut self, assets: Arc<dyn AssetSource>) -> Self {
        self.assets = assets;
        self
    }

    pub fn with_driver(mut self, driver: StageDriver) -> Self {
        self.driver = driver;
        self
    }

    /// The process-wide lock/rate state (shared with any other engine
    /// instance the embedder wires it into).
    pub fn guard(&self) -> Arc<SessionGuard> {
        Arc::clone(&self.guard)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Create a fresh session at the first stage.
    pub async fn start_session(&self) -> Result<Session, EngineError> {
        Ok(self.store.create_session().await?)
    }

    /// Look up a session.
    pub async fn session(&self, session: SessionId) -> Result<Session, EngineError> {
        self.store
            .get_session(session)
            .await?
            .ok_or(EngineError::SessionNotFound(session))
    }

    /// Append a user chat message for the session's current stage.
    pub async fn post_user_message(
        &self,
        session: SessionId,
        text: impl Into<String>,
    ) -> Result<(), EngineError> {
        let record = self.session(session).await?;
        self.store
            .append_chat(ChatMessage::new(
                session,
                Some(record.current_stage),
                ChatRole::User,
                text,
            ))
            .await?;
        Ok(())
    }

    /// Execute exactly one stage for the session.
    ///
    /// Entry checks (session lookup, stage match, rate windows,
    /// single-flight lock) fail fast as [`EngineError`] without
    /// emitting events. Once the run is admitted, every outcome ends
    /// in a terminal event (or a sealed sink on abort) and the lock
    /// is released on every exit path.
    pub async fn run_stage(
        &self,
        session: SessionId,
        stage: Stage,
        opts: RunOptions,
        sink: &EventSink,
        cancel: &CancelToken,
    ) -> Result<RunReport, EngineError> {
        let record = self.session(session).await?;
        if stage != record.current_stage {
            return Err(EngineError::StageMismatch {
                requested: stage,
                current: record.current_stage,
            });
        }

        // Rate windows come first: a rate rejection must not consume
        // (or release) the single-flight lock.
        let windows = [
            (
                RateBucket::Burst,
                self.config.burst_limit,
                self.config.burst_window,
            ),
            (
                RateBucket::Sustained,
                self.config.sustained_limit,
                self.config.sustained_window,
            ),
        ];
        for (bucket, limit, window) in windows {
            let decision = self.guard.check(session, bucket, limit, window);
            if !decision.ok {
                return Err(EngineError::RateLimited {
                    session,
                    bucket,
                    retry_after_secs: decision.retry_after_secs,
                });
            }
        }

        if !self.guard.acquire(session) {
            return Err(EngineError::Busy { session });
        }
        // Single cleanup routine: released on success, error, abort,
        // and unwind alike.
        let _permit = FlightPermit::new(self.guard(), session);

        info!(session = %session, stage = %stage, "stage run started");
        let report = self.execute(session, stage, opts, sink, cancel).await?;
        info!(
            session = %session,
            stage = %stage,
            status = ?report.status,
            calls_used = report.calls_used,
            "stage run finished"
        );
        Ok(report)
    }

    /// Convenience wrapper that collects the run's events instead of
    /// streaming them.
    pub async fn run_stage_collected(
        &self,
        session: SessionId,
        stage: Stage,
        opts: RunOptions,
        cancel: &CancelToken,
    ) -> Result<(RunReport, Vec<PipelineEvent>), EngineError> {
        let (sink, mut rx) = event_channel();
        let result = self.run_stage(session, stage, opts, &sink, cancel).await;
        drop(sink);

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        Ok((result?, events))
    }

    async fn execute(
        &self,
        session: SessionId,
        stage: Stage,
        opts: RunOptions,
        sink: &EventSink,
        cancel: &CancelToken,
    ) -> Result<RunReport, EngineError> {
        if let Err(e) = self
            .refresher
            .refresh(session, RefreshPhase::StageStart)
            .await
        {
            error!(session = %session, stage = %stage, "stage_start refresh failed: {e:#}");
            return Ok(self.fail_run(stage, sink, ReasonCode::RuntimeError, 0));
        }

        let assets = match self.assets.index(session).await {
            Ok(index) => index,
            Err(e) => {
                error!(session = %session, stage = %stage, "asset index read failed: {e:#}");
                return Ok(self.fail_run(stage, sink, ReasonCode::RuntimeError, 0));
            }
        };

        let mut budget = CallBudget::seeded(self.config.call_budget, opts.seed_calls);
        let env = DriveEnv {
            store: self.store.as_ref(),
            generation: self.generation.as_ref(),
            config: &self.config,
            assets: assets.as_ref(),
        };

        let result = self
            .driver
            .run(session, stage, &mut budget, sink, cancel, &env)
            .await;
        let calls_used = budget.total_calls();

        match result {
            Ok(DriveStatus::Ready) => {
                if let Err(e) = self
                    .refresher
                    .refresh(session, RefreshPhase::PreValidation)
                    .await
                {
                    error!(session = %session, stage = %stage, "pre_validation refresh failed: {e:#}");
                    return Ok(self.fail_run(stage, sink, ReasonCode::RuntimeError, calls_used));
                }
                sink.emit(PipelineEvent::StageReady {
                    stage: stage.as_str().to_string(),
                });
                Ok(RunReport {
                    status: RunStatus::Ready,
                    reason: None,
                    calls_used,
                })
            }
            Ok(DriveStatus::NeedsMore(reason)) => {
                if !sink.terminal_sent() {
                    sink.emit(PipelineEvent::StageNeedsMore {
                        stage: stage.as_str().to_string(),
                        reason: reason.clone(),
                    });
                }
                Ok(RunReport {
                    status: RunStatus::NeedsMore,
                    reason: Some(reason),
                    calls_used,
                })
            }
            Ok(DriveStatus::Aborted) => {
                // Silent termination: no further events, no error.
                sink.seal();
                info!(session = %session, stage = %stage, "stage run aborted by caller");
                Ok(RunReport {
                    status: RunStatus::Aborted,
                    reason: None,
                    calls_used,
                })
            }
            Err(DriverError::Budget(e)) => {
                warn!(session = %session, stage = %stage, "budget exhausted: {e}");
                Ok(self.fail_run(stage, sink, ReasonCode::BudgetExceeded, calls_used))
            }
            Err(DriverError::Store(e)) => {
                // Store failures are not locally recoverable.
                error!(session = %session, stage = %stage, "document store failure: {e}");
                Err(EngineError::Store(e))
            }
            Err(e) => {
                error!(session = %session, stage = %stage, "stage run failed: {e}");
                Ok(self.fail_run(stage, sink, ReasonCode::RuntimeError, calls_used))
            }
        }
    }

    /// Map a stage-level failure to its terminal event and report.
    /// The raw error never reaches the stream.
    fn fail_run(
        &self,
        stage: Stage,
        sink: &EventSink,
        reason: ReasonCode,
        calls_used: u32,
    ) -> RunReport {
        if !sink.terminal_sent() {
            sink.emit(PipelineEvent::StageNeedsMore {
                stage: stage.as_str().to_string(),
                reason: reason.clone(),
            });
        }
        RunReport {
            status: RunStatus::NeedsMore,
            reason: Some(reason),
            calls_used,
        }
    }

    /// Approval entry point, independent of streaming.
    ///
    /// Atomically: refresh context, run the validator, and on success
    /// flip the document's approved flag and advance `current_stage`.
    /// A request for any stage other than the current one is rejected
    /// before anything mutates.
    pub async fn approve(
        &self,
        session: SessionId,
        stage: Stage,
    ) -> Result<ApprovalOutcome, EngineError> {
        let record = self.session(session).await?;
        if stage != record.current_stage {
            return Err(EngineError::StageMismatch {
                requested: stage,
                current: record.current_stage,
            });
        }

        self.refresher
            .refresh(session, RefreshPhase::PreValidation)
            .await
            .map_err(|e| EngineError::Refresh(e.to_string()))?;

        let docs = self.snapshot_docs(session).await?;
        let verdict = validate_stage(stage, &docs);
        if !verdict.ok {
            info!(
                session = %session,
                stage = %stage,
                reasons = verdict.reasons.len(),
                "approval blocked by validator"
            );
            return Ok(ApprovalOutcome {
                ok: false,
                reasons: verdict.reasons,
            });
        }

        let updated = self.store.approve_and_advance(session, stage).await?;
        info!(
            session = %session,
            approved = %stage,
            now_at = %updated.current_stage,
            "stage approved"
        );
        Ok(ApprovalOutcome {
            ok: true,
            reasons: Vec::new(),
        })
    }

    async fn snapshot_docs(&self, session: SessionId) -> Result<DocSnapshot, EngineError> {
        let mut snapshot = DocSnapshot::new();
        for name in self.store.list_docs(session).await? {
            if let Some(doc) = self.store.read_doc(session, name).await? {
                snapshot.insert(name, doc.content);
            }
        }
        Ok(snapshot)
    }
}
