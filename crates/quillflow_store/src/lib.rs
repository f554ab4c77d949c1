//! Data model and store abstraction for the Quillflow pipeline.
//!
//! The pipeline core treats persistence as an external collaborator:
//! everything it needs is behind the [`DocumentStore`] trait so
//! backends can be swapped without touching orchestration code. An
//! in-memory reference implementation ([`MemoryStore`]) backs the CLI
//! demo and the test suite.

pub mod document;
pub mod memory;
pub mod session;
pub mod store;

pub use document::{ChatMessage, ChatRole, DocName, Document, DOC_NAMES};
pub use memory::MemoryStore;
pub use session::{Session, SessionId, Stage, STAGE_ORDER};
pub use store::{DocumentStore, StoreError};

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
