//! Per-session single-flight lock and rate windows.
//!
//! One mutation-guarded map holds all transient lock/rate state,
//! created on first touch and never persisted. The limits are
//! best-effort throttling, not a correctness guarantee; the
//! single-flight flag IS a correctness guarantee (at most one run in
//! flight per session).

use quillflow_store::SessionId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// The two independent rate windows checked per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateBucket {
    /// Short window catching rapid-fire retries.
    Burst,
    /// Long window bounding sustained usage.
    Sustained,
}

impl RateBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateBucket::Burst => "burst",
            RateBucket::Sustained => "sustained",
        }
    }
}

impl fmt::Display for RateBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a rate-window check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub ok: bool,
    /// Seconds until the window has room again; 0 when `ok`.
    pub retry_after_secs: u64,
}

impl RateDecision {
    fn allow() -> Self {
        Self {
            ok: true,
            retry_after_secs: 0,
        }
    }

    fn reject(retry_after: Duration) -> Self {
        Self {
            ok: false,
            retry_after_secs: retry_after.as_secs().max(1),
        }
    }
}

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug, Default)]
struct GateState {
    stream_active: bool,
    windows: HashMap<RateBucket, Window>,
}

/// Process-wide lock and rate state for all sessions.
#[derive(Debug, Default)]
pub struct SessionGuard {
    states: Mutex<HashMap<SessionId, GateState>>,
}

impl SessionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, GateState>> {
        self.states.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Try to mark a stream active for the session.
    ///
    /// Returns false immediately when one is already active; callers
    /// are never queued.
    pub fn acquire(&self, session: SessionId) -> bool {
        let mut states = self.lock();
        let gate = states.entry(session).or_default();
        if gate.stream_active {
            debug!(session = %session, "single-flight lock contended");
            return false;
        }
        gate.stream_active = true;
        true
    }

    /// Release the session's stream slot. Idempotent: releasing an
    /// already-released (or never-acquired) session is a no-op.
    pub fn release(&self, session: SessionId) {
        let mut states = self.lock();
        if let Some(gate) = states.get_mut(&session) {
            gate.stream_active = false;
        }
    }

    /// Whether a stream is currently active for the session.
    pub fn is_active(&self, session: SessionId) -> bool {
        self.lock()
            .get(&session)
            .map(|g| g.stream_active)
            .unwrap_or(false)
    }

    /// Check one fixed rate window, counting this attempt when it is
    /// admitted. Rejections leave the single-flight lock untouched.
    pub fn check(
        &self,
        session: SessionId,
        bucket: RateBucket,
        limit: u32,
        window: Duration,
    ) -> RateDecision {
        let now = Instant::now();
        let mut states = self.lock();
        let gate = states.entry(session).or_default();
        let slot = gate.windows.entry(bucket).or_insert(Window {
            started: now,
            count: 0,
        });

        let elapsed = now.duration_since(slot.started);
        if elapsed >= window {
            slot.started = now;
            slot.count = 0;
        }

        if slot.count >= limit {
            let retry_after = window.saturating_sub(elapsed);
            warn!(
                session = %session,
                bucket = %bucket,
                limit,
                "rate window exhausted"
            );
            return RateDecision::reject(retry_after);
        }

        slot.count += 1;
        RateDecision::allow()
    }
}

/// RAII handle for the single-flight slot.
///
/// Every exit path of a run (success, error, abort, panic unwind)
/// funnels through this one cleanup routine via Drop.
pub struct FlightPermit {
    guard: Arc<SessionGuard>,
    session: SessionId,
}

impl FlightPermit {
    pub(crate) fn new(guard: Arc<SessionGuard>, session: SessionId) -> Self {
        Self { guard, session }
    }
}

impl Drop for FlightPermit {
    fn drop(&mut self) {
        self.guard.release(self.session);
    }
}
