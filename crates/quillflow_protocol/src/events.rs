//! Typed pipeline events and machine-readable reason codes.
//!
//! Four event kinds cross the wire. `assistant.delta` carries raw
//! text; the other three carry small JSON payloads so consumers can
//! parse them without positional conventions.

use crate::error::ProtocolError;
use crate::frame::Frame;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Event name for partial assistant text.
pub const EVENT_ASSISTANT_DELTA: &str = "assistant.delta";
/// Event name for a persisted document update.
pub const EVENT_DOC_UPDATED: &str = "doc.updated";
/// Terminal event: the stage artifact is ready for review.
pub const EVENT_STAGE_READY: &str = "stage.ready";
/// Terminal event: the stage needs more input before it can finish.
pub const EVENT_STAGE_NEEDS_MORE: &str = "stage.needs_more";

/// Machine-readable reason attached to `stage.needs_more`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReasonCode {
    /// Interactive stage is waiting for the next user turn.
    AwaitingUser,
    /// The run attempted more generation calls than its quota.
    BudgetExceeded,
    /// An external call exceeded its hard timeout.
    Timeout,
    /// Unexpected internal failure; details are logged, not streamed.
    RuntimeError,
    /// A required upstream document is absent or empty.
    MissingInput(String),
}

impl ReasonCode {
    /// Canonical wire code, e.g. `MISSING_INPUT:brief.md`.
    pub fn as_code(&self) -> String {
        match self {
            ReasonCode::AwaitingUser => "AWAITING_USER".to_string(),
            ReasonCode::BudgetExceeded => "BUDGET_EXCEEDED".to_string(),
            ReasonCode::Timeout => "TIMEOUT".to_string(),
            ReasonCode::RuntimeError => "RUNTIME_ERROR".to_string(),
            ReasonCode::MissingInput(doc) => format!("MISSING_INPUT:{doc}"),
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_code())
    }
}

impl FromStr for ReasonCode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AWAITING_USER" => Ok(ReasonCode::AwaitingUser),
            "BUDGET_EXCEEDED" => Ok(ReasonCode::BudgetExceeded),
            "TIMEOUT" => Ok(ReasonCode::Timeout),
            "RUNTIME_ERROR" => Ok(ReasonCode::RuntimeError),
            other => match other.strip_prefix("MISSING_INPUT:") {
                Some(doc) if !doc.is_empty() => {
                    Ok(ReasonCode::MissingInput(doc.to_string()))
                }
                _ => Err(ProtocolError::UnknownReason(other.to_string())),
            },
        }
    }
}

/// JSON payload of `doc.updated`.
#[derive(Debug, Serialize, Deserialize)]
struct DocUpdatedPayload {
    doc: String,
    bytes: u64,
}

/// JSON payload of `stage.ready`.
#[derive(Debug, Serialize, Deserialize)]
struct StageReadyPayload {
    stage: String,
}

/// JSON payload of `stage.needs_more`.
#[derive(Debug, Serialize, Deserialize)]
struct StageNeedsMorePayload {
    stage: String,
    reason: String,
}

/// A typed event emitted during a stage run.
///
/// Ordering contract: zero or more `AssistantDelta` events in
/// generation order, then exactly one terminal event (`StageReady`
/// xor `StageNeedsMore`) as the last event of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// Partial assistant text, possibly spanning multiple lines.
    AssistantDelta { text: String },

    /// A document was persisted; carries name and resulting byte size.
    DocUpdated { doc: String, bytes: u64 },

    /// Terminal: the stage artifact is ready for review.
    StageReady { stage: String },

    /// Terminal: the stage cannot finish without more input.
    StageNeedsMore { stage: String, reason: ReasonCode },
}

impl PipelineEvent {
    /// Wire event name.
    pub fn event_name(&self) -> &'static str {
        match self {
            PipelineEvent::AssistantDelta { .. } => EVENT_ASSISTANT_DELTA,
            PipelineEvent::DocUpdated { .. } => EVENT_DOC_UPDATED,
            PipelineEvent::StageReady { .. } => EVENT_STAGE_READY,
            PipelineEvent::StageNeedsMore { .. } => EVENT_STAGE_NEEDS_MORE,
        }
    }

    /// True for the two events that may end a run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineEvent::StageReady { .. } | PipelineEvent::StageNeedsMore { .. }
        )
    }

    /// Encode into a wire frame.
    pub fn to_frame(&self) -> Frame {
        let data = match self {
            PipelineEvent::AssistantDelta { text } => text.clone(),
            PipelineEvent::DocUpdated { doc, bytes } => {
                serde_json::to_string(&DocUpdatedPayload {
                    doc: doc.clone(),
                    bytes: *bytes,
                })
                .unwrap_or_default()
            }
            PipelineEvent::StageReady { stage } => {
                serde_json::to_string(&StageReadyPayload {
                    stage: stage.clone(),
                })
                .unwrap_or_default()
            }
            PipelineEvent::StageNeedsMore { stage, reason } => {
                serde_json::to_string(&StageNeedsMorePayload {
                    stage: stage.clone(),
                    reason: reason.as_code(),
                })
                .unwrap_or_default()
            }
        };
        Frame::new(self.event_name(), data)
    }

    /// Decode from a wire frame.
    pub fn from_frame(frame: &Frame) -> Result<Self, ProtocolError> {
        let invalid = |detail: String| ProtocolError::InvalidPayload {
            event: frame.event.clone(),
            detail,
        };

        match frame.event.as_str() {
            EVENT_ASSISTANT_DELTA => Ok(PipelineEvent::AssistantDelta {
                text: frame.data.clone(),
            }),
            EVENT_DOC_UPDATED => {
                let payload: DocUpdatedPayload =
                    serde_json::from_str(&frame.data).map_err(|e| invalid(e.to_string()))?;
                Ok(PipelineEvent::DocUpdated {
                    doc: payload.doc,
                    bytes: payload.bytes,
                })
            }
            EVENT_STAGE_READY => {
                let payload: StageReadyPayload =
                    serde_json::from_str(&frame.data).map_err(|e| invalid(e.to_string()))?;
                Ok(PipelineEvent::StageReady {
                    stage: payload.stage,
                })
            }
            EVENT_STAGE_NEEDS_MORE => {
                let payload: StageNeedsMorePayload =
                    serde_json::from_str(&frame.data).map_err(|e| invalid(e.to_string()))?;
                Ok(PipelineEvent::StageNeedsMore {
                    stage: payload.stage,
                    reason: payload.reason.parse()?,
                })
            }
            other => Err(ProtocolError::UnknownEvent(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_code_roundtrip() {
        let codes = [
            ReasonCode::AwaitingUser,
            ReasonCode::BudgetExceeded,
            ReasonCode::Timeout,
            ReasonCode::RuntimeError,
            ReasonCode::MissingInput("brief.md".to_string()),
        ];
        for code in codes {
            let parsed: ReasonCode = code.as_code().parse().unwrap();
            assert_eq!(parsed, code);
        }
    }

    #[test]
    fn test_missing_input_code_names_document() {
        let code = ReasonCode::MissingInput("requirements.md".to_string());
        assert_eq!(code.as_code(), "MISSING_INPUT:requirements.md");
    }

    #[test]
    fn test_unknown_reason_rejected() {
        assert!("NOT_A_REASON".parse::<ReasonCode>().is_err());
        assert!("MISSING_INPUT:".parse::<ReasonCode>().is_err());
    }

    #[test]
    fn test_terminal_classification() {
        assert!(!PipelineEvent::AssistantDelta {
            text: "hi".into()
        }
        .is_terminal());
        assert!(!PipelineEvent::DocUpdated {
            doc: "brief.md".into(),
            bytes: 10
        }
        .is_terminal());
        assert!(PipelineEvent::StageReady {
            stage: "brief".into()
        }
        .is_terminal());
        assert!(PipelineEvent::StageNeedsMore {
            stage: "brief".into(),
            reason: ReasonCode::Timeout
        }
        .is_terminal());
    }

    #[test]
    fn test_event_frame_roundtrip() {
        let events = vec![
            PipelineEvent::AssistantDelta {
                text: "Tell me more about the audience.".to_string(),
            },
            PipelineEvent::DocUpdated {
                doc: "requirements.md".to_string(),
                bytes: 2048,
            },
            PipelineEvent::StageReady {
                stage: "requirements".to_string(),
            },
            PipelineEvent::StageNeedsMore {
                stage: "blueprint".to_string(),
                reason: ReasonCode::MissingInput("requirements.md".to_string()),
            },
        ];
        for event in events {
            let frame = event.to_frame();
            let decoded = PipelineEvent::from_frame(&frame).unwrap();
            assert_eq!(decoded, event);
        }
    }
}
