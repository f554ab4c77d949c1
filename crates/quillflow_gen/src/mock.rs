//! Scripted generation service for deterministic tests and demos.
//!
//! Replies are queued and consumed in order, with optional simulated
//! latency and failure injection. An empty queue is an error rather
//! than a silent default, to catch misconfigured tests.

use crate::cancel::CancelToken;
use crate::{GenError, GenRequest, GenerationService};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One canned reply.
#[derive(Debug, Clone)]
pub struct ScriptedReply {
    text: Option<String>,
    delay: Duration,
}

impl ScriptedReply {
    /// Immediate text reply.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            text: Some(content.into()),
            delay: Duration::ZERO,
        }
    }

    /// Text reply after a simulated latency.
    pub fn text_after(content: impl Into<String>, delay: Duration) -> Self {
        Self {
            text: Some(content.into()),
            delay,
        }
    }

    /// Injected service failure.
    pub fn failure() -> Self {
        Self {
            text: None,
            delay: Duration::ZERO,
        }
    }

    /// Injected service failure after a simulated latency. With a
    /// delay longer than the request timeout this scripts a timeout.
    pub fn failure_after(delay: Duration) -> Self {
        Self {
            text: None,
            delay,
        }
    }
}

/// Deterministic [`GenerationService`] fed from a reply queue.
#[derive(Default)]
pub struct ScriptedGeneration {
    replies: Arc<Mutex<VecDeque<ScriptedReply>>>,
    received: Arc<Mutex<Vec<GenRequest>>>,
}

impl ScriptedGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one reply for the next call.
    pub fn queue(&self, reply: ScriptedReply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    /// Queue several replies in order.
    pub fn queue_all(&self, replies: impl IntoIterator<Item = ScriptedReply>) {
        let mut queue = self.replies.lock().unwrap();
        queue.extend(replies);
    }

    /// Requests seen so far, for assertions.
    pub fn received(&self) -> Vec<GenRequest> {
        self.received.lock().unwrap().clone()
    }

    /// Number of calls that reached the service.
    pub fn calls_made(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    /// Replies still queued.
    pub fn replies_remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerationService for ScriptedGeneration {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        request: GenRequest,
        cancel: &CancelToken,
    ) -> Result<String, GenError> {
        self.received.lock().unwrap().push(request.clone());

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| GenError::InvalidResponse("scripted reply queue is empty".to_string()))?;

        let timeout = Duration::from_millis(request.timeout_ms);
        let work = async move {
            if !reply.delay.is_zero() {
                tokio::time::sleep(reply.delay).await;
            }
            reply.text.ok_or(GenError::Service {
                status: 500,
                message: "scripted failure".to_string(),
            })
        };

        tokio::select! {
            _ = cancel.cancelled() => Err(GenError::Aborted),
            outcome = tokio::time::timeout(timeout, work) => match outcome {
                Err(_) => Err(GenError::Timeout { ms: request.timeout_ms }),
                Ok(result) => result,
            },
        }
    }
}
