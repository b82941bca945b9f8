use axum::{
    extract::{rejection::JsonRejection, FromRequest, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use chat_relay_core::config::RelayMode;

use crate::relay::HealthStatus;
use crate::state::{
    AppState, ChatRequest, ChatResponse, ClearRequest, ClearResponse, ErrorResponse,
    HealthResponse, QuickRequest, QuickResponse,
};

/// JSON body extractor whose rejection matches the relay's response shape
#[derive(FromRequest)]
#[from_request(via(Json), rejection(InvalidJson))]
pub struct RelayJson<T>(pub T);

/// Rejection for bodies that are not valid JSON of the expected shape
pub struct InvalidJson(JsonRejection);

impl From<JsonRejection> for InvalidJson {
    fn from(rejection: JsonRejection) -> Self {
        Self(rejection)
    }
}

impl IntoResponse for InvalidJson {
    fn into_response(self) -> Response {
        tracing::debug!("Rejected request body: {}", self.0.body_text());
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                success: false,
                error: "Invalid JSON body".to_string(),
            }),
        )
            .into_response()
    }
}

pub async fn chat_handler(
    State(state): State<AppState>,
    RelayJson(payload): RelayJson<ChatRequest>,
) -> Json<ChatResponse> {
    let session_id = payload.session_id();
    tracing::info!(session_id, "Received chat request");

    match state.relay.chat(payload.message(), session_id).await {
        Ok(reply) => Json(ChatResponse {
            success: true,
            response: Some(reply.response),
            session_id: Some(reply.session_id),
            error: None,
            response_time: Some(reply.response_time),
        }),
        Err(e) => Json(ChatResponse {
            success: false,
            error: Some(e.to_string()),
            ..Default::default()
        }),
    }
}

pub async fn quick_handler(
    State(state): State<AppState>,
    RelayJson(payload): RelayJson<QuickRequest>,
) -> Json<QuickResponse> {
    match state.relay.quick(payload.message()).await {
        Ok(response) => Json(QuickResponse {
            success: true,
            response: Some(response),
            error: None,
        }),
        Err(e) => Json(QuickResponse {
            success: false,
            response: None,
            error: Some(e.to_string()),
        }),
    }
}

pub async fn clear_handler(
    State(state): State<AppState>,
    RelayJson(payload): RelayJson<ClearRequest>,
) -> Json<ClearResponse> {
    state.relay.clear_history(payload.session_id()).await;
    Json(ClearResponse {
        success: true,
        message: "History cleared".to_string(),
    })
}

pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    match state.relay.health_check().await {
        HealthStatus::Running { models } => Json(HealthResponse {
            success: true,
            ollama_status: "running".to_string(),
            models: Some(models),
        }),
        HealthStatus::NotResponding => Json(HealthResponse {
            success: false,
            ollama_status: "not_responding".to_string(),
            models: None,
        }),
    }
}

/// Minimal landing page for trying the relay from a browser
pub async fn index_handler(State(state): State<AppState>) -> Html<String> {
    let settings = state.relay.settings();
    let quick = if settings.mode == RelayMode::Fast {
        "<li><code>POST /api/quick</code> - single-turn chat, no history</li>"
    } else {
        ""
    };

    Html(format!(
        r#"<html>
  <body style="font-family: sans-serif; padding: 20px;">
    <h1>chat-relay</h1>
    <p><strong>Mode:</strong> {mode}</p>
    <p><strong>Model:</strong> {model}</p>
    <ul>
      <li><code>POST /api/chat</code> - chat with session history</li>
      {quick}
      <li><code>POST /api/clear</code> - clear a session</li>
      <li><code>GET /api/health</code> - inference server status</li>
    </ul>
  </body>
</html>"#,
        mode = settings.mode,
        model = html_escape(settings.chat_model()),
        quick = quick,
    ))
}

fn html_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
