use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chat_relay_core::config::RelayMode;
use chat_relay_core::session::SessionStore;
use chat_relay_providers::OllamaClient;
use chat_relay_server::{router, AppState, ChatRelay, RelaySettings};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn app_for(api_base: &str, settings: RelaySettings) -> (Router, AppState) {
    let relay = ChatRelay::new(
        Arc::new(SessionStore::new()),
        Arc::new(OllamaClient::new(api_base)),
        settings,
    );
    let state = AppState::new(relay);
    (router(state.clone()), state)
}

fn full_settings() -> RelaySettings {
    RelaySettings::default()
}

fn fast_settings() -> RelaySettings {
    RelaySettings {
        mode: RelayMode::Fast,
        ..RelaySettings::default()
    }
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn mount_reply(server: &MockServer, content: &str) {
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {"role": "assistant", "content": content},
            "done": true
        })))
        .mount(server)
        .await;
}

fn dead_address() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

async fn upstream_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

#[tokio::test]
async fn chat_round_trip_keeps_history() {
    let server = MockServer::start().await;
    mount_reply(&server, "Hi!").await;
    let (app, state) = app_for(&server.uri(), full_settings());

    let (status, body) = send(
        &app,
        post_json("/api/chat", r#"{"message":"Hello","session_id":"s1"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["response"], "Hi!");
    assert_eq!(body["session_id"], "s1");
    assert!(body["response_time"].as_f64().is_some());
    assert!(body.get("error").is_none());

    send(
        &app,
        post_json("/api/chat", r#"{"message":"And again","session_id":"s1"}"#),
    )
    .await;

    let bodies = upstream_bodies(&server).await;
    assert_eq!(bodies.len(), 2);
    assert_eq!(
        bodies[1]["messages"],
        json!([
            {"role": "user", "content": "Hello"},
            {"role": "assistant", "content": "Hi!"},
            {"role": "user", "content": "And again"}
        ])
    );
    assert_eq!(bodies[1]["stream"], false);
    assert_eq!(bodies[1]["model"], "llama3.2");

    let turns = state.relay.store().history("s1").await.unwrap();
    assert_eq!(turns.len(), 4);
}

#[tokio::test]
async fn chat_without_session_uses_default() {
    let server = MockServer::start().await;
    mount_reply(&server, "ok").await;
    let (app, state) = app_for(&server.uri(), full_settings());

    let (_, body) = send(&app, post_json("/api/chat", r#"{"message":"hey"}"#)).await;
    assert_eq!(body["session_id"], "default");
    assert_eq!(state.relay.store().history("default").await.unwrap().len(), 2);
}

#[tokio::test]
async fn blank_message_is_rejected_before_forwarding() {
    let server = MockServer::start().await;
    mount_reply(&server, "unused").await;
    let (app, _) = app_for(&server.uri(), full_settings());

    for payload in [
        r#"{"message":""}"#,
        r#"{"message":"   "}"#,
        r#"{"message":null}"#,
        r#"{}"#,
    ] {
        let (status, body) = send(&app, post_json("/api/chat", payload)).await;
        assert_eq!(status, StatusCode::OK, "{}", payload);
        assert_eq!(
            body,
            json!({"success": false, "error": "No message provided"}),
            "{}",
            payload
        );
    }

    assert!(upstream_bodies(&server).await.is_empty());
}

#[tokio::test]
async fn malformed_json_fails_identically_everywhere() {
    let (app, _) = app_for(&dead_address(), fast_settings());
    let expected = json!({"success": false, "error": "Invalid JSON body"});

    for uri in ["/api/chat", "/api/quick", "/api/clear"] {
        let (status, body) = send(&app, post_json(uri, "{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body, expected, "{}", uri);
    }

    let wrong_type = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .body(Body::from(r#"{"message":"hi"}"#))
        .unwrap();
    let (status, body) = send(&app, wrong_type).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, expected);
}

#[tokio::test]
async fn upstream_timeout_leaves_transcript_unchanged() {
    let server = MockServer::start().await;
    let (app, state) = {
        let settings = RelaySettings {
            chat_timeout: Duration::from_millis(200),
            ..full_settings()
        };
        app_for(&server.uri(), settings)
    };

    mount_reply(&server, "first").await;
    send(
        &app,
        post_json("/api/chat", r#"{"message":"one","session_id":"slow"}"#),
    )
    .await;
    server.reset().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"message": {"content": "too late"}}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let started = Instant::now();
    let (status, body) = send(
        &app,
        post_json("/api/chat", r#"{"message":"two","session_id":"slow"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(
        body["error"],
        "Request timeout - Ollama is busy. Try a shorter question."
    );
    assert!(started.elapsed() < Duration::from_millis(1500));
    assert_eq!(state.relay.store().history("slow").await.unwrap().len(), 2);
}

#[tokio::test]
async fn queued_chats_on_one_session_fail_within_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"message": {"content": "too late"}}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;
    let settings = RelaySettings {
        chat_timeout: Duration::from_millis(300),
        ..full_settings()
    };
    let (app, state) = app_for(&server.uri(), settings);

    let mut tasks = Vec::new();
    for i in 0..3 {
        let app = app.clone();
        tasks.push(tokio::spawn(async move {
            let started = Instant::now();
            let payload = format!(r#"{{"message":"msg {}","session_id":"shared"}}"#, i);
            let (_, body) = send(&app, post_json("/api/chat", &payload)).await;
            (body, started.elapsed())
        }));
    }

    for task in tasks {
        let (body, elapsed) = task.await.unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(
            body["error"],
            "Request timeout - Ollama is busy. Try a shorter question."
        );
        assert!(elapsed < Duration::from_millis(750), "took {:?}", elapsed);
    }
    assert_eq!(state.relay.store().history("shared").await.unwrap().len(), 0);
}

#[tokio::test]
async fn health_treats_unreadable_listing_as_not_responding() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
        .mount(&server)
        .await;
    let (app, _) = app_for(&server.uri(), full_settings());

    let (_, body) = send(&app, get("/api/health")).await;
    assert_eq!(
        body,
        json!({"success": false, "ollama_status": "not_responding"})
    );
}

#[tokio::test]
async fn upstream_errors_are_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let (app, _) = app_for(&server.uri(), full_settings());

    let (_, body) = send(&app, post_json("/api/chat", r#"{"message":"hi"}"#)).await;
    assert_eq!(body, json!({"success": false, "error": "Ollama error: 500"}));

    let (app, _) = app_for(&dead_address(), full_settings());
    let (_, body) = send(&app, post_json("/api/chat", r#"{"message":"hi"}"#)).await;
    assert_eq!(
        body["error"],
        "Ollama stopped responding. Try again in a moment."
    );
}

#[tokio::test]
async fn clear_resets_session() {
    let server = MockServer::start().await;
    mount_reply(&server, "ok").await;
    let (app, state) = app_for(&server.uri(), full_settings());

    send(&app, post_json("/api/chat", r#"{"message":"a","session_id":"c"}"#)).await;
    let (status, body) = send(&app, post_json("/api/clear", r#"{"session_id":"c"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "message": "History cleared"}));
    assert!(state.relay.store().history("c").await.unwrap().is_empty());

    send(&app, post_json("/api/chat", r#"{"message":"b","session_id":"c"}"#)).await;
    assert_eq!(state.relay.store().history("c").await.unwrap().len(), 2);

    let (_, body) = send(&app, post_json("/api/clear", r#"{"session_id":"nobody"}"#)).await;
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn quick_route_only_in_fast_mode() {
    let server = MockServer::start().await;
    mount_reply(&server, "pong").await;

    let (full_app, _) = app_for(&server.uri(), full_settings());
    let response = full_app
        .clone()
        .oneshot(post_json("/api/quick", r#"{"message":"ping"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let (fast_app, state) = app_for(&server.uri(), fast_settings());
    let (status, body) = send(&fast_app, post_json("/api/quick", r#"{"message":"ping"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "response": "pong"}));
    assert!(state.relay.store().is_empty());

    let (_, body) = send(&fast_app, post_json("/api/quick", r#"{"message":null}"#)).await;
    assert_eq!(body, json!({"success": false, "error": "No message provided"}));

    let bodies = upstream_bodies(&server).await;
    assert_eq!(
        bodies[0],
        json!({
            "model": "gemma2:2b",
            "messages": [{"role": "user", "content": "ping"}],
            "stream": false
        })
    );
}

#[tokio::test]
async fn health_reports_running_with_models() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"models": [{"name": "llama3.2"}]})),
        )
        .mount(&server)
        .await;
    let (app, _) = app_for(&server.uri(), full_settings());

    let (status, body) = send(&app, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "success": true,
            "ollama_status": "running",
            "models": {"models": [{"name": "llama3.2"}]}
        })
    );
}

#[tokio::test]
async fn health_reports_not_responding() {
    let (app, _) = app_for(&dead_address(), full_settings());

    let (status, body) = send(&app, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"success": false, "ollama_status": "not_responding"})
    );
}

#[tokio::test]
async fn every_response_allows_any_origin() {
    let (app, _) = app_for(&dead_address(), full_settings());

    let request = Request::builder()
        .method("POST")
        .uri("/api/clear")
        .header(header::ORIGIN, "http://10.0.2.2:8080")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );

    let preflight = Request::builder()
        .method("OPTIONS")
        .uri("/api/chat")
        .header(header::ORIGIN, "http://example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(preflight).await.unwrap();
    assert!(response.status().is_success());
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

#[tokio::test]
async fn index_page_names_model() {
    let (app, _) = app_for(&dead_address(), fast_settings());
    let response = app.oneshot(get("/")).await.unwrap();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();

    assert!(html.contains("gemma2:2b"));
    assert!(html.contains("/api/quick"));
}
