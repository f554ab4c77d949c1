//! Quillflow stage orchestration engine.
//!
//! Sequences a fixed, human-gated pipeline of document stages:
//!
//! ```text
//! run_stage(session, stage)
//!     │
//!     ├─ rate windows + single-flight lock (SessionGuard)
//!     ├─ context refresh (phase: stage_start)
//!     ├─ StageDriver
//!     │    ├─ missing-input short-circuit (no budget touched)
//!     │    └─ StageWriter: generation calls under CallBudget,
//!     │       events through EventSink, document via DocumentStore
//!     ├─ context refresh (phase: pre_validation) on success
//!     └─ terminal event: stage.ready XOR stage.needs_more
//!
//! approve(session, stage)        (separate request/response entry)
//!     ├─ reject non-current stage, zero mutation
//!     ├─ context refresh + pure Validator
//!     └─ flip approved + advance current_stage, atomically
//! ```
//!
//! All stage-level failures are local and recoverable; only document
//! store failures propagate as hard errors.

pub mod assets;
pub mod budget;
pub mod cancel;
pub mod channel;
pub mod config;
pub mod driver;
pub mod error;
pub mod guard;
pub mod pipeline;
pub mod readiness;
pub mod refresh;
pub mod validate;
pub mod writers;

pub use quillflow_protocol::{PipelineEvent, ReasonCode};

pub use assets::{AssetEntry, AssetIndex, AssetSource, NoAssets, StaticAssets};
pub use budget::{BudgetExceeded, CallBudget, CallKind};
pub use cancel::CancelToken;
pub use channel::{event_channel, EventSink};
pub use config::EngineConfig;
pub use driver::{DriveEnv, DriveStatus, DriverError, StageDriver};
pub use error::EngineError;
pub use guard::{RateBucket, RateDecision, SessionGuard};
pub use pipeline::{ApprovalOutcome, PipelineEngine, RunOptions, RunReport, RunStatus};
pub use refresh::{ContextRefresher, NoopRefresher, RefreshPhase};
pub use validate::{validate_stage, DocSnapshot, Validation};
pub use writers::{StageWriter, WriterContext, WriterError, WriterOutcome};
