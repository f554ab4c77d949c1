//! Stage writers.
//!
//! Each writer reads zero or more upstream documents and/or the chat
//! transcript for its stage and produces exactly one target document.
//! Writers scaffold their stage's required section markers, so a
//! successful write independently satisfies the stage validator on
//! every run regardless of generation variance.

pub mod blueprint;
pub mod brief;
pub mod handoff;
pub mod requirements;
pub mod workplan;

pub use blueprint::BlueprintWriter;
pub use brief::BriefWriter;
pub use handoff::HandoffWriter;
pub use requirements::RequirementsWriter;
pub use workplan::WorkplanWriter;

use crate::assets::AssetIndex;
use crate::budget::{BudgetExceeded, CallBudget, CallKind};
use crate::channel::EventSink;
use crate::config::EngineConfig;
use async_trait::async_trait;
use quillflow_gen::{CancelToken, GenError, GenMessage, GenRequest, GenerationService};
use quillflow_protocol::{PipelineEvent, ReasonCode};
use quillflow_store::{DocName, DocumentStore, SessionId, Stage, StoreError};
use std::collections::HashMap;
use thiserror::Error;

/// How a writer finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriterOutcome {
    /// The stage document was produced and persisted.
    Ready,
    /// The stage cannot finish yet; the reason says why.
    NeedsMore(ReasonCode),
}

/// Errors a writer can raise. Classified by the driver/engine; never
/// streamed raw to the caller.
#[derive(Debug, Error)]
pub enum WriterError {
    #[error(transparent)]
    Budget(#[from] BudgetExceeded),

    #[error(transparent)]
    Gen(#[from] GenError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Writer failure: {0}")]
    Other(#[from] anyhow::Error),
}

/// Everything a writer needs for one execution.
pub struct WriterContext<'a> {
    pub session: SessionId,
    pub store: &'a dyn DocumentStore,
    pub generation: &'a dyn GenerationService,
    pub budget: &'a mut CallBudget,
    pub sink: &'a EventSink,
    pub cancel: &'a CancelToken,
    pub config: &'a EngineConfig,
    pub assets: Option<&'a AssetIndex>,
}

impl WriterContext<'_> {
    /// One budgeted generation call with the configured temperature
    /// and hard timeout.
    pub async fn call_generation(
        &mut self,
        messages: Vec<GenMessage>,
    ) -> Result<String, WriterError> {
        self.budget.consume(CallKind::Generation)?;
        let request = GenRequest::new(
            messages,
            self.config.temperature,
            self.config.call_timeout_ms,
        );
        Ok(self.generation.generate(request, self.cancel).await?)
    }

    /// Read an upstream document the driver already verified.
    pub async fn read_upstream(&self, name: DocName) -> Result<String, WriterError> {
        let doc = self
            .store
            .read_doc(self.session, name)
            .await?
            .ok_or(StoreError::DocumentNotFound {
                session: self.session,
                doc: name,
            })?;
        Ok(doc.content)
    }

    /// Persist the stage document and announce its new size.
    pub async fn persist_and_announce(
        &self,
        name: DocName,
        content: String,
    ) -> Result<(), WriterError> {
        let doc = self.store.write_doc(self.session, name, content).await?;
        self.sink.emit(PipelineEvent::DocUpdated {
            doc: name.file_name().to_string(),
            bytes: doc.byte_size(),
        });
        Ok(())
    }
}

/// One stage's artifact producer.
#[async_trait]
pub trait StageWriter: Send + Sync {
    /// The stage this writer serves.
    fn stage(&self) -> Stage;

    /// Upstream documents that must exist and be non-empty before the
    /// writer runs. The driver enforces this before any budget is
    /// touched.
    fn required_inputs(&self) -> &'static [DocName];

    /// Produce the stage artifact.
    async fn write(&self, ctx: &mut WriterContext<'_>) -> Result<WriterOutcome, WriterError>;
}

/// The full writer set, one per stage.
pub fn standard_writers() -> HashMap<Stage, Box<dyn StageWriter>> {
    let writers: Vec<Box<dyn StageWriter>> = vec![
        Box::new(BriefWriter),
        Box::new(RequirementsWriter),
        Box::new(BlueprintWriter),
        Box::new(WorkplanWriter),
        Box::new(HandoffWriter),
    ];
    writers.into_iter().map(|w| (w.stage(), w)).collect()
}

/// Placeholder content under a scaffolded heading.
const SECTION_PLACEHOLDER: &str = "_To be refined._";

/// Append any required heading the generated body is missing, so the
/// document always carries its stage markers.
pub(crate) fn ensure_sections(mut body: String, headings: &[&str]) -> String {
    for heading in headings {
        if !body.contains(heading) {
            if !body.ends_with('\n') {
                body.push('\n');
            }
            body.push_str(&format!("\n{heading}\n\n{SECTION_PLACEHOLDER}\n"));
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_sections_appends_missing_only() {
        let body = "## Goals\n- ship it\n".to_string();
        let out = ensure_sections(body, &["## Project", "## Goals"]);
        assert!(out.contains("## Project"));
        assert_eq!(out.matches("## Goals").count(), 1);
    }

    #[test]
    fn test_ensure_sections_keeps_complete_body_untouched() {
        let body = "## Project\nx\n\n## Goals\ny\n".to_string();
        let out = ensure_sections(body.clone(), &["## Project", "## Goals"]);
        assert_eq!(out, body);
    }

    #[test]
    fn test_standard_writers_cover_every_stage() {
        let writers = standard_writers();
        assert_eq!(writers.len(), 5);
        for stage in quillflow_store::STAGE_ORDER {
            assert!(writers.contains_key(&stage));
        }
    }
}
