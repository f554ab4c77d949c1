//! Protocol error types

use thiserror::Error;

/// Errors raised while encoding or decoding event frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Unknown event name: {0}")]
    UnknownEvent(String),

    #[error("Frame is missing its event name line")]
    MissingEventName,

    #[error("Frame has more than one event name line")]
    DuplicateEventName,

    #[error("Malformed frame line: {0:?}")]
    MalformedLine(String),

    #[error("Frame buffer is not valid UTF-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("Invalid payload for {event}: {detail}")]
    InvalidPayload { event: String, detail: String },

    #[error("Unknown reason code: {0}")]
    UnknownReason(String),
}
