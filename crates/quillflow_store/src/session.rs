//! Sessions and the fixed stage order.

use crate::document::DocName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ============================================================================
// Session ID - Newtype to prevent mixing with other IDs
// ============================================================================

/// Session identifier (UUID).
///
/// Newtype wrapper so a session id cannot be confused with any other
/// string-shaped identifier at an API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(uuid::Uuid::parse_str(s)?))
    }
}

// ============================================================================
// Stage - the fixed pipeline order
// ============================================================================

/// Pipeline stages in their fixed order.
///
/// Exhaustive enum; a session is in exactly one stage at a time and
/// only ever moves forward along this order. `Handoff` is terminal:
/// no transitions are defined beyond it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Interactive intake chat, compiled into the project brief.
    Brief,

    /// Requirements document derived from the brief.
    Requirements,

    /// Technical blueprint derived from the requirements.
    Blueprint,

    /// Work plan derived from blueprint and requirements.
    Workplan,

    /// Terminal export package assembled from all prior documents.
    Handoff,
}

/// The fixed stage order, first to last.
pub const STAGE_ORDER: [Stage; 5] = [
    Stage::Brief,
    Stage::Requirements,
    Stage::Blueprint,
    Stage::Workplan,
    Stage::Handoff,
];

impl Stage {
    /// Canonical string representation (also the wire stage id).
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Brief => "brief",
            Stage::Requirements => "requirements",
            Stage::Blueprint => "blueprint",
            Stage::Workplan => "workplan",
            Stage::Handoff => "handoff",
        }
    }

    /// The first stage in the fixed order.
    pub fn first() -> Self {
        STAGE_ORDER[0]
    }

    /// The next stage, or None from the terminal stage.
    pub fn next(&self) -> Option<Stage> {
        let idx = self.position();
        STAGE_ORDER.get(idx + 1).copied()
    }

    /// Zero-based position in the fixed order.
    pub fn position(&self) -> usize {
        *self as usize
    }

    /// Terminal stage: no further transitions are defined.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Handoff)
    }

    /// The one document this stage produces.
    pub fn doc(&self) -> DocName {
        match self {
            Stage::Brief => DocName::Brief,
            Stage::Requirements => DocName::Requirements,
            Stage::Blueprint => DocName::Blueprint,
            Stage::Workplan => DocName::Workplan,
            Stage::Handoff => DocName::Handoff,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when parsing a Stage from string.
#[derive(Debug, Clone)]
pub struct StageParseError(pub String);

impl fmt::Display for StageParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid stage: {}", self.0)
    }
}

impl std::error::Error for StageParseError {}

impl std::str::FromStr for Stage {
    type Err = StageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "brief" => Ok(Stage::Brief),
            "requirements" => Ok(Stage::Requirements),
            "blueprint" => Ok(Stage::Blueprint),
            "workplan" => Ok(Stage::Workplan),
            "handoff" => Ok(Stage::Handoff),
            _ => Err(StageParseError(s.to_string())),
        }
    }
}

// ============================================================================
// Session - the core session record
// ============================================================================

/// A pipeline session.
///
/// Invariant: `current_stage` only moves forward along [`STAGE_ORDER`],
/// and only via the approval transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier
    pub session_id: SessionId,

    /// Current stage (typed enum, not string)
    pub current_stage: Stage,

    /// Stages whose documents have been approved
    pub approved: BTreeSet<Stage>,

    /// When the session was created
    pub created_at: DateTime<Utc>,

    /// When the session was last updated
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Fresh session at the first stage, nothing approved.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            session_id: SessionId::new(),
            current_stage: Stage::first(),
            approved: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the given stage's document has been approved.
    pub fn is_approved(&self, stage: Stage) -> bool {
        self.approved.contains(&stage)
    }

    /// Whether the session has reached the terminal stage.
    pub fn is_complete(&self) -> bool {
        self.current_stage.is_terminal() && self.is_approved(Stage::Handoff)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
