//! Ollama HTTP client implementation

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::base::{InferenceBackend, InferenceRequest, ProviderError, ProviderResult};

/// Default address of a local Ollama server
pub const DEFAULT_API_BASE: &str = "http://localhost:11434";

/// Chat endpoint response; only the reply text is used
#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

/// Client for an Ollama-compatible inference server
///
/// Any server exposing `POST /api/chat` and `GET /api/tags` in the Ollama
/// shape can stand behind this client.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    api_base: String,
}

impl OllamaClient {
    /// Create a new client for the server at `api_base`
    pub fn new(api_base: impl Into<String>) -> Self {
        let api_base = api_base.into().trim_end_matches('/').to_string();
        Self {
            client: Client::builder()
                .http1_only() // Force HTTP/1.1 to avoid issues with some local servers
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_base,
        }
    }

    async fn error_from_status(response: reqwest::Response) -> ProviderError {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        ProviderError::Http { status, body }
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE)
    }
}

#[async_trait]
impl InferenceBackend for OllamaClient {
    async fn chat(&self, request: InferenceRequest, timeout: Duration) -> ProviderResult<String> {
        let url = format!("{}/api/chat", self.api_base);
        debug!(
            "Sending chat request to {} with model {} ({} messages)",
            url,
            request.model,
            request.messages.len()
        );

        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, timeout))?;

        if !response.status().is_success() {
            let err = Self::error_from_status(response).await;
            warn!("Inference server rejected chat request: {}", err);
            return Err(err);
        }

        let data: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, timeout))?;

        if data.message.content.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "empty message content".to_string(),
            ));
        }
        Ok(data.message.content)
    }

    async fn list_models(&self, timeout: Duration) -> ProviderResult<serde_json::Value> {
        let url = format!("{}/api/tags", self.api_base);
        debug!("Probing model listing at {}", url);

        let response = self
            .client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, timeout))?;

        if !response.status().is_success() {
            return Err(Self::error_from_status(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, timeout))
    }

    fn api_base(&self) -> &str {
        &self.api_base
    }
}
