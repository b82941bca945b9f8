//! The chat relay: session bookkeeping around an inference backend

use std::sync::Arc;
use std::time::{Duration, Instant};

use chat_relay_core::config::{Config, GenerationConfig, RelayMode};
use chat_relay_core::session::{Session, SessionStore, Turn};
use chat_relay_providers::{
    ChatOptions, InferenceBackend, InferenceRequest, Message, ProviderError,
};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Session used when the caller does not name one
pub const DEFAULT_SESSION_ID: &str = "default";

/// Failure kinds surfaced to callers
///
/// The display strings are what clients see in the `error` field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("No message provided")]
    EmptyInput,

    #[error("Ollama error: {0}")]
    UpstreamHttp(u16),

    #[error("Request timeout - Ollama is busy. Try a shorter question.")]
    UpstreamTimeout,

    #[error("Ollama stopped responding. Try again in a moment.")]
    UpstreamUnreachable,
}

impl From<ProviderError> for RelayError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Http { status, .. } => RelayError::UpstreamHttp(status),
            ProviderError::Timeout(_) => RelayError::UpstreamTimeout,
            ProviderError::Unreachable(_) | ProviderError::InvalidResponse(_) => {
                RelayError::UpstreamUnreachable
            }
        }
    }
}

/// Relay behaviour resolved from configuration
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub mode: RelayMode,
    pub model: String,
    pub fast_model: String,
    pub chat_timeout: Duration,
    pub fast_timeout: Duration,
    pub quick_timeout: Duration,
    pub health_timeout: Duration,
    pub system_prompt: String,
    pub generation: GenerationConfig,
}

impl RelaySettings {
    /// Model used by `/api/chat` in the current mode
    pub fn chat_model(&self) -> &str {
        match self.mode {
            RelayMode::Full => &self.model,
            RelayMode::Fast => &self.fast_model,
        }
    }

    /// Outbound timeout for `/api/chat` in the current mode
    pub fn chat_timeout(&self) -> Duration {
        match self.mode {
            RelayMode::Full => self.chat_timeout,
            RelayMode::Fast => self.fast_timeout,
        }
    }
}

impl From<&Config> for RelaySettings {
    fn from(config: &Config) -> Self {
        Self {
            mode: config.relay.mode,
            model: config.inference.model.clone(),
            fast_model: config.inference.fast_model.clone(),
            chat_timeout: Duration::from_secs(config.relay.chat_timeout_secs),
            fast_timeout: Duration::from_secs(config.relay.fast_timeout_secs),
            quick_timeout: Duration::from_secs(config.relay.quick_timeout_secs),
            health_timeout: Duration::from_secs(config.relay.health_timeout_secs),
            system_prompt: config.relay.system_prompt.clone(),
            generation: config.relay.generation.clone(),
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// A successful chat round trip
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub response: String,
    pub session_id: String,
    /// Wall-clock seconds spent handling the call
    pub response_time: f64,
}

/// Result of probing the inference server
#[derive(Debug, Clone, PartialEq)]
pub enum HealthStatus {
    /// The server answered; `models` is its listing, or `"unknown"` when
    /// the listing call answered with a non-success status
    Running { models: serde_json::Value },
    NotResponding,
}

/// Forwards chat messages to the inference backend and keeps transcripts
pub struct ChatRelay {
    store: Arc<SessionStore>,
    backend: Arc<dyn InferenceBackend>,
    settings: RelaySettings,
}

impl ChatRelay {
    pub fn new(
        store: Arc<SessionStore>,
        backend: Arc<dyn InferenceBackend>,
        settings: RelaySettings,
    ) -> Self {
        Self {
            store,
            backend,
            settings,
        }
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Send `message` on behalf of `session_id` and record the exchange
    ///
    /// The session lock is held for the whole upstream call. Waiting for the
    /// lock and the upstream call share one deadline, so a caller queued
    /// behind another chat on the same session still fails within the
    /// configured timeout. The user and assistant turns are appended
    /// together, and only when the call succeeds; on failure the transcript
    /// keeps its pre-call length.
    pub async fn chat(&self, message: &str, session_id: &str) -> Result<ChatReply, RelayError> {
        let started = Instant::now();
        let message = non_empty(message)?;
        let budget = self.settings.chat_timeout();

        let handle = self.store.handle(session_id);
        let mut session = match tokio::time::timeout(budget, handle.lock()).await {
            Ok(session) => session,
            Err(_) => {
                warn!(session_id, "Timed out waiting for a chat in flight on this session");
                return Err(RelayError::UpstreamTimeout);
            }
        };

        let timeout = match budget.checked_sub(started.elapsed()) {
            Some(remaining) if !remaining.is_zero() => remaining,
            _ => return Err(RelayError::UpstreamTimeout),
        };

        let user_turn = Turn::user(message);
        let request = self.build_chat_request(&session, &user_turn);

        info!(
            session_id,
            mode = %self.settings.mode,
            history = session.len(),
            "Forwarding chat to {}",
            self.backend.api_base()
        );

        match self.backend.chat(request, timeout).await {
            Ok(text) => {
                session.record_exchange(user_turn, Turn::assistant(text.clone()));
                let response_time = started.elapsed().as_secs_f64();
                debug!(session_id, response_time, "Chat completed");
                Ok(ChatReply {
                    response: text,
                    session_id: session_id.to_string(),
                    response_time,
                })
            }
            Err(err) => {
                warn!(session_id, "Chat failed: {}", err);
                Err(err.into())
            }
        }
    }

    /// Stateless single-turn chat; never touches session storage
    pub async fn quick(&self, message: &str) -> Result<String, RelayError> {
        let message = non_empty(message)?;
        let request =
            InferenceRequest::new(self.settings.fast_model.clone(), vec![Message::user(message)]);

        self.backend
            .chat(request, self.settings.quick_timeout)
            .await
            .map_err(|err| {
                warn!("Quick chat failed: {}", err);
                RelayError::from(err)
            })
    }

    /// Empty the transcript of `session_id`
    ///
    /// Unknown sessions are not created. Returns whether the session existed.
    pub async fn clear_history(&self, session_id: &str) -> bool {
        let existed = self.store.clear(session_id).await;
        info!(session_id, existed, "Cleared history");
        existed
    }

    /// Probe the inference server's model listing
    pub async fn health_check(&self) -> HealthStatus {
        match self.backend.list_models(self.settings.health_timeout).await {
            Ok(models) => HealthStatus::Running { models },
            Err(ProviderError::Http { status, .. }) => {
                debug!(status, "Model listing answered with non-success status");
                HealthStatus::Running {
                    models: serde_json::Value::String("unknown".to_string()),
                }
            }
            Err(
                err @ (ProviderError::Timeout(_)
                | ProviderError::Unreachable(_)
                | ProviderError::InvalidResponse(_)),
            ) => {
                warn!("Inference server not responding: {}", err);
                HealthStatus::NotResponding
            }
        }
    }

    fn build_chat_request(&self, session: &Session, user_turn: &Turn) -> InferenceRequest {
        match self.settings.mode {
            RelayMode::Full => {
                let messages = session
                    .turns
                    .iter()
                    .chain(std::iter::once(user_turn))
                    .map(Message::from)
                    .collect();
                InferenceRequest::new(self.settings.model.clone(), messages)
            }
            RelayMode::Fast => InferenceRequest::new(
                self.settings.fast_model.clone(),
                vec![
                    Message::system(self.settings.system_prompt.clone()),
                    Message::from(user_turn),
                ],
            )
            .with_options(ChatOptions::from(&self.settings.generation)),
        }
    }
}

fn non_empty(message: &str) -> Result<&str, RelayError> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        Err(RelayError::EmptyInput)
    } else {
        Ok(trimmed)
    }
}
