//! Engine error types.

use crate::guard::RateBucket;
use quillflow_store::{SessionId, Stage, StoreError};
use thiserror::Error;

/// Request-level failures surfaced to the caller.
///
/// Stage-level failures (budget, timeout, runtime) never appear here;
/// they end the run with a `stage.needs_more` event instead. Store
/// failures DO appear here: they are not locally recoverable and must
/// propagate hard rather than be silently retried.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("A run is already active for session {session}; retry after it completes")]
    Busy { session: SessionId },

    #[error("Rate limit ({bucket}) exceeded for session {session}; retry after {retry_after_secs}s")]
    RateLimited {
        session: SessionId,
        bucket: RateBucket,
        retry_after_secs: u64,
    },

    #[error("Requested stage {requested} is not the session's current stage ({current})")]
    StageMismatch { requested: Stage, current: Stage },

    #[error("Context refresh failed: {0}")]
    Refresh(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
