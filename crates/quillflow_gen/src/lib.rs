//! Generation service abstraction.
//!
//! The pipeline depends on a single operation: send a prompt, get the
//! assistant's text back. Everything else about the provider is
//! opaque; the core only distinguishes success, timeout, abort, and
//! service failure. Implementations:
//!
//! - [`ClaudeGeneration`] -- Anthropic Messages API over HTTP
//! - [`ScriptedGeneration`] -- queued canned replies for tests/demos

pub mod cancel;
pub mod claude;
pub mod mock;

pub use cancel::CancelToken;
pub use claude::ClaudeGeneration;
pub use mock::{ScriptedGeneration, ScriptedReply};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the generation service.
#[derive(Debug, Error)]
pub enum GenError {
    /// API key not found or invalid
    #[error("API key error: {0}")]
    ApiKey(String),

    /// HTTP transport failed
    #[error("HTTP error: {0}")]
    Http(String),

    /// Provider returned a non-success status
    #[error("Generation service error ({status}): {message}")]
    Service { status: u16, message: String },

    /// Provider response could not be interpreted
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The hard per-call timeout expired
    #[error("Generation call timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The caller aborted the run
    #[error("Generation call aborted")]
    Aborted,
}

impl GenError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, GenError::Timeout { .. })
    }

    pub fn is_abort(&self) -> bool {
        matches!(self, GenError::Aborted)
    }
}

/// Role of a prompt message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenRole {
    System,
    User,
    Assistant,
}

/// One prompt message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenMessage {
    pub role: GenRole,
    pub content: String,
}

impl GenMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: GenRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: GenRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: GenRole::Assistant,
            content: content.into(),
        }
    }
}

/// A single generation request.
#[derive(Debug, Clone)]
pub struct GenRequest {
    pub messages: Vec<GenMessage>,
    pub temperature: f32,
    /// Hard per-call timeout; on expiry the call fails with
    /// [`GenError::Timeout`] and is not retried.
    pub timeout_ms: u64,
}

impl GenRequest {
    pub fn new(messages: Vec<GenMessage>, temperature: f32, timeout_ms: u64) -> Self {
        Self {
            messages,
            temperature,
            timeout_ms,
        }
    }
}

/// Trait for generation providers.
///
/// Implementations must observe `cancel` promptly: an aborted call
/// returns [`GenError::Aborted`] without producing text.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Send the prompt and return the assistant's full text.
    async fn generate(&self, request: GenRequest, cancel: &CancelToken)
        -> Result<String, GenError>;
}
