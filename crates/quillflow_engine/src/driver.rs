//! Stage driver.
//!
//! Wires budget, event sink, cancellation, and the writer registry
//! for one stage execution. The driver owns two uniform behaviors so
//! writers never reimplement them:
//!
//! - missing-upstream short-circuit: a required document that is
//!   absent or empty ends the run with `MISSING_INPUT:<doc>` before
//!   any budget is touched or any external call is made;
//! - outcome classification: generation timeout and abort are run
//!   outcomes, not errors; budget and store failures bubble up for
//!   the state machine to classify.

use crate::assets::AssetIndex;
use crate::budget::{BudgetExceeded, CallBudget};
use crate::channel::EventSink;
use crate::config::EngineConfig;
use crate::writers::{StageWriter, WriterContext, WriterError, WriterOutcome};
use quillflow_gen::{CancelToken, GenError, GenerationService};
use quillflow_protocol::ReasonCode;
use quillflow_store::{DocumentStore, SessionId, Stage, StoreError};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};

/// How a driven stage execution ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriveStatus {
    /// Artifact produced; the state machine will emit `stage.ready`.
    Ready,
    /// More input needed; the state machine will emit
    /// `stage.needs_more` with this reason.
    NeedsMore(ReasonCode),
    /// The caller aborted; nothing further is emitted.
    Aborted,
}

/// Failures the driver cannot map to a run outcome itself.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("No writer registered for stage {0}")]
    UnknownStage(Stage),

    #[error(transparent)]
    Budget(BudgetExceeded),

    #[error(transparent)]
    Store(StoreError),

    #[error("Generation failure: {0}")]
    Gen(GenError),

    #[error(transparent)]
    Other(anyhow::Error),
}

/// Collaborators a stage execution reads from.
pub struct DriveEnv<'a> {
    pub store: &'a dyn DocumentStore,
    pub generation: &'a dyn GenerationService,
    pub config: &'a EngineConfig,
    pub assets: Option<&'a AssetIndex>,
}

/// Dispatches stage executions to their writers.
pub struct StageDriver {
    writers: HashMap<Stage, Box<dyn StageWriter>>,
}

impl StageDriver {
    pub fn new(writers: HashMap<Stage, Box<dyn StageWriter>>) -> Self {
        Self { writers }
    }

    pub fn with_standard_writers() -> Self {
        Self::new(crate::writers::standard_writers())
    }

    /// Execute one stage.
    pub async fn run(
        &self,
        session: SessionId,
        stage: Stage,
        budget: &mut CallBudget,
        sink: &EventSink,
        cancel: &CancelToken,
        env: &DriveEnv<'_>,
    ) -> Result<DriveStatus, DriverError> {
        let writer = self
            .writers
            .get(&stage)
            .ok_or(DriverError::UnknownStage(stage))?;

        // Required upstream documents, before budget or generation.
        for name in writer.required_inputs() {
            let present = env
                .store
                .read_doc(session, *name)
                .await
                .map_err(DriverError::Store)?
                .map(|d| d.has_content())
                .unwrap_or(false);
            if !present {
                info!(
                    session = %session,
                    stage = %stage,
                    missing = name.file_name(),
                    "stage blocked on missing upstream document"
                );
                return Ok(DriveStatus::NeedsMore(ReasonCode::MissingInput(
                    name.file_name().to_string(),
                )));
            }
        }

        if cancel.is_cancelled() {
            return Ok(DriveStatus::Aborted);
        }

        let mut ctx = WriterContext {
            session,
            store: env.store,
            generation: env.generation,
            budget,
            sink,
            cancel,
            config: env.config,
            assets: env.assets,
        };

        match writer.write(&mut ctx).await {
            Ok(WriterOutcome::Ready) => {
                debug!(session = %session, stage = %stage, "writer produced artifact");
                Ok(DriveStatus::Ready)
            }
            Ok(WriterOutcome::NeedsMore(reason)) => Ok(DriveStatus::NeedsMore(reason)),
            Err(WriterError::Gen(e)) if e.is_timeout() => {
                info!(session = %session, stage = %stage, "generation call timed out");
                Ok(DriveStatus::NeedsMore(ReasonCode::Timeout))
            }
            Err(WriterError::Gen(e)) if e.is_abort() => Ok(DriveStatus::Aborted),
            Err(WriterError::Budget(e)) => Err(DriverError::Budget(e)),
            Err(WriterError::Store(e)) => Err(DriverError::Store(e)),
            Err(WriterError::Gen(e)) => Err(DriverError::Gen(e)),
            Err(WriterError::Other(e)) => Err(DriverError::Other(e)),
        }
    }
}
