//! Documents and the chat transcript.

use crate::session::{SessionId, Stage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed set of document names a session can hold.
///
/// One per stage; there is no free-form document creation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DocName {
    Brief,
    Requirements,
    Blueprint,
    Workplan,
    Handoff,
}

/// All document names in stage order.
pub const DOC_NAMES: [DocName; 5] = [
    DocName::Brief,
    DocName::Requirements,
    DocName::Blueprint,
    DocName::Workplan,
    DocName::Handoff,
];

impl DocName {
    /// On-disk style file name, also used in wire payloads and
    /// machine-readable reasons.
    pub fn file_name(&self) -> &'static str {
        match self {
            DocName::Brief => "brief.md",
            DocName::Requirements => "requirements.md",
            DocName::Blueprint => "blueprint.md",
            DocName::Workplan => "workplan.md",
            DocName::Handoff => "handoff.md",
        }
    }

    /// The stage that produces this document.
    pub fn stage(&self) -> Stage {
        match self {
            DocName::Brief => Stage::Brief,
            DocName::Requirements => Stage::Requirements,
            DocName::Blueprint => Stage::Blueprint,
            DocName::Workplan => Stage::Workplan,
            DocName::Handoff => Stage::Handoff,
        }
    }
}

impl fmt::Display for DocName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_name())
    }
}

/// A document row, keyed by (session, name).
///
/// Once `approved` is set the content is immutable for the lifetime
/// of the session; the store rejects further writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub session_id: SessionId,
    pub name: DocName,
    pub content: String,
    pub approved: bool,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Byte size of the content, as reported in `doc.updated` events.
    pub fn byte_size(&self) -> u64 {
        self.content.len() as u64
    }

    /// Present and non-empty (ignoring whitespace).
    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    /// Notes appended by the pipeline itself (stage compiled, etc.).
    Orchestrator,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatRole::User => write!(f, "user"),
            ChatRole::Assistant => write!(f, "assistant"),
            ChatRole::Orchestrator => write!(f, "orchestrator"),
        }
    }
}

/// One entry of the append-only chat transcript, ordered by creation
/// time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub session_id: SessionId,
    /// Stage the message belongs to, if tied to one.
    pub stage: Option<Stage>,
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(
        session_id: SessionId,
        stage: Option<Stage>,
        role: ChatRole,
        content: impl Into<String>,
    ) -> Self {
        Self {
            session_id,
            stage,
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_names_map_to_stages() {
        for name in DOC_NAMES {
            assert_eq!(name.stage().doc(), name);
        }
    }

    #[test]
    fn test_byte_size_counts_bytes_not_chars() {
        let doc = Document {
            session_id: SessionId::new(),
            name: DocName::Brief,
            content: "héllo".to_string(),
            approved: false,
            updated_at: Utc::now(),
        };
        assert_eq!(doc.byte_size(), 6);
    }

    #[test]
    fn test_whitespace_only_content_is_empty() {
        let doc = Document {
            session_id: SessionId::new(),
            name: DocName::Brief,
            content: "  \n\t ".to_string(),
            approved: false,
            updated_at: Utc::now(),
        };
        assert!(!doc.has_content());
    }
}
