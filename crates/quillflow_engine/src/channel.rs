//! Typed, ordered event channel for one stage run.
//!
//! The producer pushes typed events; the consumer drains them in
//! order. The sink enforces the run's ordering contract: at most one
//! terminal event, nothing after it, and nothing at all once the sink
//! is sealed (abort path).

use quillflow_protocol::PipelineEvent;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Create a channel for one stage run.
pub fn event_channel() -> (EventSink, mpsc::UnboundedReceiver<PipelineEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        EventSink {
            tx,
            terminal_sent: Arc::new(AtomicBool::new(false)),
            sealed: Arc::new(AtomicBool::new(false)),
        },
        rx,
    )
}

/// Producer half of the event channel.
///
/// Clone is cheap and shares the terminal/sealed state.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<PipelineEvent>,
    terminal_sent: Arc<AtomicBool>,
    sealed: Arc<AtomicBool>,
}

impl EventSink {
    /// Push one event. Returns whether it was delivered.
    ///
    /// Events after the terminal event, after sealing, or after the
    /// consumer went away are dropped.
    pub fn emit(&self, event: PipelineEvent) -> bool {
        if self.sealed.load(Ordering::SeqCst) {
            debug!(event = event.event_name(), "dropping event on sealed sink");
            return false;
        }
        if event.is_terminal() {
            // Exactly one terminal event per run.
            if self
                .terminal_sent
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                warn!(
                    event = event.event_name(),
                    "dropping second terminal event"
                );
                return false;
            }
        } else if self.terminal_sent.load(Ordering::SeqCst) {
            warn!(
                event = event.event_name(),
                "dropping event after terminal event"
            );
            return false;
        }
        self.tx.send(event).is_ok()
    }

    /// Whether a terminal event has been emitted on this run.
    pub fn terminal_sent(&self) -> bool {
        self.terminal_sent.load(Ordering::SeqCst)
    }

    /// Stop all further emission. Used on abort: the consumer sees
    /// the stream end with no terminal event.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::SeqCst);
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::SeqCst)
    }
}
