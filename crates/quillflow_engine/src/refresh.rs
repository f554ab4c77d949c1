//! Context re-ingestion hook.
//!
//! Called immediately before persisted documents/assets are used as
//! generation input (`StageStart`) and again before a stage is
//! declared ready or approved (`PreValidation`). Implementations
//! refresh whatever external view they maintain; the engine itself
//! keeps no cache.

use async_trait::async_trait;
use quillflow_store::SessionId;
use std::fmt;

/// When in the run the refresh is happening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPhase {
    StageStart,
    PreValidation,
}

impl RefreshPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshPhase::StageStart => "stage_start",
            RefreshPhase::PreValidation => "pre_validation",
        }
    }
}

impl fmt::Display for RefreshPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Collaborator that re-ingests external context for a session.
#[async_trait]
pub trait ContextRefresher: Send + Sync {
    async fn refresh(&self, session: SessionId, phase: RefreshPhase) -> anyhow::Result<()>;
}

/// Default refresher: nothing to re-ingest.
pub struct NoopRefresher;

#[async_trait]
impl ContextRefresher for NoopRefresher {
    async fn refresh(&self, _session: SessionId, _phase: RefreshPhase) -> anyhow::Result<()> {
        Ok(())
    }
}
