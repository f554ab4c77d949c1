//! Storage abstraction for the pipeline.
//!
//! The engine never touches a concrete backend; it speaks this trait.
//! Backend failures (unavailability, corruption) are not locally
//! recoverable and surface as [`StoreError::Backend`], which the
//! engine propagates as a hard failure instead of retrying.

use crate::document::{ChatMessage, DocName, Document};
use crate::session::{Session, SessionId, Stage};
use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("Document {doc} not found for session {session}")]
    DocumentNotFound { session: SessionId, doc: DocName },

    #[error("Document {doc} is approved and immutable for session {session}")]
    DocumentApproved { session: SessionId, doc: DocName },

    #[error("Session {session} has no stage after {stage}")]
    NoNextStage { session: SessionId, stage: Stage },

    #[error("Store backend failure: {0}")]
    Backend(String),
}

/// Key-value-like document/session/chat service the core depends on.
///
/// All methods are async: real backends suspend on I/O, and the
/// engine's concurrency model treats store access as a suspension
/// point.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a fresh session at the first stage.
    async fn create_session(&self) -> Result<Session, StoreError>;

    /// Look up a session by id.
    async fn get_session(&self, session: SessionId) -> Result<Option<Session>, StoreError>;

    /// Read one document, if it exists.
    async fn read_doc(
        &self,
        session: SessionId,
        name: DocName,
    ) -> Result<Option<Document>, StoreError>;

    /// Write (create or replace) a document's content.
    ///
    /// Rejected with [`StoreError::DocumentApproved`] once the
    /// document has been approved.
    async fn write_doc(
        &self,
        session: SessionId,
        name: DocName,
        content: String,
    ) -> Result<Document, StoreError>;

    /// Flip a document's approved flag.
    async fn approve_doc(&self, session: SessionId, name: DocName) -> Result<(), StoreError>;

    /// Approval transaction: mark the stage's document approved,
    /// record the stage approval on the session, and advance
    /// `current_stage` to the next stage in the fixed order -- one
    /// atomic unit. From the terminal stage the session stays put
    /// (the document is still marked approved).
    async fn approve_and_advance(
        &self,
        session: SessionId,
        stage: Stage,
    ) -> Result<Session, StoreError>;

    /// Names of documents that exist for this session.
    async fn list_docs(&self, session: SessionId) -> Result<Vec<DocName>, StoreError>;

    /// Append one message to the session transcript.
    async fn append_chat(&self, message: ChatMessage) -> Result<(), StoreError>;

    /// The transcript in creation order, optionally filtered to one
    /// stage's messages.
    async fn chat_history(
        &self,
        session: SessionId,
        stage: Option<Stage>,
    ) -> Result<Vec<ChatMessage>, StoreError>;
}
