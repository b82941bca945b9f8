use anyhow::Result;
use chat_relay_server::state::{ChatResponse, ClearResponse, HealthResponse, QuickResponse};
use reqwest::Client;
use serde::de::DeserializeOwned;

/// Default address of a locally running relay
pub const DEFAULT_RELAY_URL: &str = "http://localhost:5001";

/// Thin client for a running relay's HTTP API
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: Option<String>) -> Self {
        let base_url = base_url.unwrap_or_else(|| DEFAULT_RELAY_URL.to_string());
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn chat(&self, message: &str, session_id: Option<&str>) -> Result<ChatResponse> {
        let mut body = serde_json::json!({ "message": message });
        if let Some(session_id) = session_id {
            body["session_id"] = serde_json::Value::String(session_id.to_string());
        }
        self.post("/api/chat", &body).await
    }

    pub async fn quick(&self, message: &str) -> Result<QuickResponse> {
        self.post("/api/quick", &serde_json::json!({ "message": message }))
            .await
    }

    pub async fn clear(&self, session_id: Option<&str>) -> Result<ClearResponse> {
        let body = match session_id {
            Some(id) => serde_json::json!({ "session_id": id }),
            None => serde_json::json!({}),
        };
        self.post("/api/clear", &body).await
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let url = format!("{}/api/health", self.base_url);
        let response = self.client.get(&url).send().await?;
        Self::decode(response).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &serde_json::Value) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.post(&url).json(body).send().await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        if !response.status().is_success() {
            anyhow::bail!("Server returned error: {}", response.status());
        }
        Ok(response.json().await?)
    }
}
