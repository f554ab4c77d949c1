//! Event contract for the Quillflow stage pipeline.
//!
//! A stage run emits a stream of typed events over any ordered
//! byte-stream transport:
//!
//! ```text
//! [assistant.delta]*  (zero or more, in generation order)
//! stage.ready XOR stage.needs_more  (exactly one, last event of the run)
//! doc.updated may appear before the terminal event when a document
//! was persisted during the run
//! ```
//!
//! # Wire format
//!
//! One frame per event, terminated by a blank line:
//!
//! ```text
//! event: assistant.delta
//! data: first payload line
//! data: second payload line
//!
//! ```
//!
//! Multi-line payloads are encoded as one `data:` line per source line
//! and rejoined with `\n` by the consumer, preserving embedded
//! formatting (lists, headings) exactly. The consumer buffers incoming
//! bytes until a full frame is available before parsing.

pub mod error;
pub mod events;
pub mod frame;
pub mod retry;

pub use error::ProtocolError;
pub use events::{PipelineEvent, ReasonCode};
pub use frame::{Frame, FrameDecoder};
pub use retry::{with_retry, RetryPolicy};

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;
