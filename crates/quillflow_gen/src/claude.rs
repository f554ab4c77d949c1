//! Claude generation client.
//!
//! Non-streaming Messages API call; the pipeline chunks the returned
//! text into its own event frames, so provider-side streaming is not
//! needed here.
//!
//! # Configuration
//!
//! - API key: `ANTHROPIC_API_KEY` environment variable or passed
//!   directly
//! - Model: defaults to [`DEFAULT_MODEL`], configurable via
//!   [`ClaudeGeneration::with_model`]

use crate::cancel::CancelToken;
use crate::{GenError, GenRequest, GenRole, GenerationService};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Anthropic API base URL
const API_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Default model to use
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// API version header
const API_VERSION: &str = "2023-06-01";

/// Default completion budget per call
const DEFAULT_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Claude-backed [`GenerationService`].
pub struct ClaudeGeneration {
    client: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl ClaudeGeneration {
    /// Create a client with an explicit API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Create a client from the `ANTHROPIC_API_KEY` environment
    /// variable.
    pub fn from_env() -> Result<Self, GenError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            GenError::ApiKey("ANTHROPIC_API_KEY environment variable not set".to_string())
        })?;
        if api_key.is_empty() {
            return Err(GenError::ApiKey("ANTHROPIC_API_KEY is empty".to_string()));
        }
        Ok(Self::new(api_key))
    }

    /// Override the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the per-call completion budget.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Fold the prompt into the API shape: system messages are
    /// concatenated into the top-level `system` field, the rest keep
    /// their roles.
    fn build_request(&self, request: &GenRequest) -> MessagesRequest {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut messages = Vec::new();
        for msg in &request.messages {
            match msg.role {
                GenRole::System => system_parts.push(&msg.content),
                GenRole::User => messages.push(ApiMessage {
                    role: "user".to_string(),
                    content: msg.content.clone(),
                }),
                GenRole::Assistant => messages.push(ApiMessage {
                    role: "assistant".to_string(),
                    content: msg.content.clone(),
                }),
            }
        }
        MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: if system_parts.is_empty() {
                None
            } else {
                Some(system_parts.join("\n\n"))
            },
            messages,
            temperature: Some(request.temperature),
        }
    }

    async fn post_messages(&self, request: &GenRequest) -> Result<String, GenError> {
        let body = self.build_request(request);
        debug!(model = %body.model, messages = body.messages.len(), "calling generation service");

        let response = self
            .client
            .post(format!("{API_BASE_URL}/messages"))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| GenError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(GenError::Service {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| GenError::InvalidResponse(e.to_string()))?;

        let text: String = parsed
            .content
            .iter()
            .filter(|b| b.block_type == "text")
            .map(|b| b.text.as_str())
            .collect();
        if text.is_empty() {
            return Err(GenError::InvalidResponse(
                "response contained no text blocks".to_string(),
            ));
        }
        Ok(text)
    }
}

#[async_trait]
impl GenerationService for ClaudeGeneration {
    fn name(&self) -> &str {
        "claude"
    }

    async fn generate(
        &self,
        request: GenRequest,
        cancel: &CancelToken,
    ) -> Result<String, GenError> {
        let timeout = Duration::from_millis(request.timeout_ms);
        tokio::select! {
            _ = cancel.cancelled() => Err(GenError::Aborted),
            outcome = tokio::time::timeout(timeout, self.post_messages(&request)) => {
                match outcome {
                    Err(_) => Err(GenError::Timeout { ms: request.timeout_ms }),
                    Ok(result) => result,
                }
            }
        }
    }
}
