//! Cancellation token, shared with the generation seam.
//!
//! The token lives in `quillflow_gen` so an abort can propagate into
//! the in-flight external call; the engine re-exports it as the one
//! abort type across the API.

pub use quillflow_gen::CancelToken;
