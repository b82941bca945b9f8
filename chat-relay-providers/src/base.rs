//! Base trait and wire types for inference backends

use async_trait::async_trait;
use chat_relay_core::config::GenerationConfig;
use chat_relay_core::session::{Role, Turn};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Error type for backend operations
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The server answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The call exceeded its timeout
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection-level failure (refused, DNS, reset, ...)
    #[error("server unreachable: {0}")]
    Unreachable(String),

    /// The server answered 2xx with a body we cannot use
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Classify a transport error raised while talking to the server
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(timeout)
        } else if err.is_decode() {
            ProviderError::InvalidResponse(err.to_string())
        } else {
            ProviderError::Unreachable(err.to_string())
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// A message in the upstream chat format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

impl From<&Turn> for Message {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role,
            content: turn.content.clone(),
        }
    }
}

/// Generation options in the server's native naming
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatOptions {
    pub num_predict: u32,
    pub temperature: f32,
    pub top_k: u32,
}

impl From<&GenerationConfig> for ChatOptions {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            num_predict: config.max_tokens,
            temperature: config.temperature,
            top_k: config.top_k,
        }
    }
}

/// Body of a chat-completion call
#[derive(Debug, Clone, Serialize)]
pub struct InferenceRequest {
    pub model: String,
    pub messages: Vec<Message>,
    /// Always false; streaming is not supported
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<ChatOptions>,
}

impl InferenceRequest {
    /// Create a non-streaming request without generation options
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: false,
            options: None,
        }
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = Some(options);
        self
    }
}

/// Trait for inference servers the relay can forward to
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Run one chat completion and return the produced text
    ///
    /// The returned text is never empty; an empty reply is reported as
    /// [`ProviderError::InvalidResponse`].
    async fn chat(&self, request: InferenceRequest, timeout: Duration) -> ProviderResult<String>;

    /// Fetch the server's model listing as opaque JSON
    async fn list_models(&self, timeout: Duration) -> ProviderResult<serde_json::Value>;

    /// Base URL of the server, for diagnostics
    fn api_base(&self) -> &str;
}
