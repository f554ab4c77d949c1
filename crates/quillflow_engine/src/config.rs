//! Engine configuration.

use std::time::Duration;

/// Deployment-wide tuning knobs for the pipeline engine.
///
/// The call budget is per stage run and shared across call kinds;
/// there is no per-stage override.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum external calls per stage run.
    pub call_budget: u32,

    /// Hard timeout applied to each external call.
    pub call_timeout_ms: u64,

    /// Sampling temperature passed to the generation service.
    pub temperature: f32,

    /// Short-window rate limit per session.
    pub burst_limit: u32,
    pub burst_window: Duration,

    /// Long-window rate limit per session.
    pub sustained_limit: u32,
    pub sustained_window: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            call_budget: 6,
            call_timeout_ms: 60_000,
            temperature: 0.7,
            burst_limit: 10,
            burst_window: Duration::from_secs(60),
            sustained_limit: 120,
            sustained_window: Duration::from_secs(3600),
        }
    }
}
