//! HTTP gateway tests against an in-process backend

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent_console::config::BackendConfig;
use agent_console::voice::{AudioPayload, Encoding};
use agent_console::{AgentDraft, AgentPatch, BackendGateway, Error, HttpGateway, Role, SessionDraft};
use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

#[derive(Debug, Clone)]
struct Upload {
    field: Option<String>,
    file_name: Option<String>,
    content_type: Option<String>,
    len: usize,
}

#[derive(Default)]
struct Seen {
    auth: Option<String>,
    created_agent: Option<Value>,
    patch: Option<Value>,
    session_draft: Option<Value>,
    sent: Option<Value>,
    upload: Option<Upload>,
}

type Shared = Arc<Mutex<Seen>>;

fn message(id: &str, session_id: &str, role: &str, content: &str, audio_url: Option<&str>) -> Value {
    json!({
        "id": id,
        "session_id": session_id,
        "role": role,
        "content": content,
        "audio_url": audio_url,
        "created_at": "2024-01-01T00:00:00Z",
    })
}

async fn list_agents(State(seen): State<Shared>, headers: HeaderMap) -> Json<Value> {
    seen.lock().unwrap().auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);
    Json(json!([
        { "id": "a1", "name": "Helper", "prompt": "Be helpful", "created_at": "2024-01-01T00:00:00Z" },
        { "id": "a2", "name": "Writer" },
    ]))
}

async fn get_agent(Path(agent_id): Path<String>) -> impl IntoResponse {
    if agent_id == "a9" {
        (StatusCode::NOT_FOUND, "agent not found").into_response()
    } else {
        let agent = json!({ "id": agent_id, "name": "Helper", "prompt": "Be helpful" });
        (StatusCode::OK, Json(agent)).into_response()
    }
}

async fn create_agent(State(seen): State<Shared>, Json(body): Json<Value>) -> impl IntoResponse {
    let name = body["name"].clone();
    seen.lock().unwrap().created_agent = Some(body);
    (StatusCode::CREATED, Json(json!({ "id": "a3", "name": name })))
}

async fn update_agent(
    State(seen): State<Shared>,
    Path(_agent_id): Path<String>,
    Json(body): Json<Value>,
) -> StatusCode {
    seen.lock().unwrap().patch = Some(body);
    StatusCode::NO_CONTENT
}

async fn delete_agent(Path(_agent_id): Path<String>) -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn list_sessions(Path(_agent_id): Path<String>) -> Json<Value> {
    Json(json!([
        { "id": "s2", "title": "Newer", "created_at": "2024-01-02T00:00:00Z" },
        { "id": "s1", "agent_id": "a1", "title": null, "created_at": "2024-01-01T00:00:00Z" },
    ]))
}

async fn create_session(
    State(seen): State<Shared>,
    Path(_agent_id): Path<String>,
    Json(body): Json<Value>,
) -> StatusCode {
    seen.lock().unwrap().session_draft = Some(body);
    StatusCode::OK
}

async fn delete_session(Path((_agent_id, _session_id)): Path<(String, String)>) -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "database is locked")
}

async fn list_messages(Path((_agent_id, session_id)): Path<(String, String)>) -> Json<Value> {
    Json(json!([
        message("m1", &session_id, "user", "hello", None),
        message("m2", &session_id, "assistant", "hi there", None),
    ]))
}

async fn send_message(
    State(seen): State<Shared>,
    Path((_agent_id, session_id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let content = body["content"].as_str().unwrap_or_default().to_string();
    seen.lock().unwrap().sent = Some(body);
    Json(json!({
        "user_message": message("m3", &session_id, "user", &content, None),
        "assistant_message": message("m4", &session_id, "assistant", "hi there", None),
    }))
}

async fn send_voice(
    State(seen): State<Shared>,
    Path((_agent_id, session_id)): Path<(String, String)>,
    mut multipart: Multipart,
) -> Json<Value> {
    while let Some(field) = multipart.next_field().await.unwrap() {
        let upload = Upload {
            field: field.name().map(ToString::to_string),
            file_name: field.file_name().map(ToString::to_string),
            content_type: field.content_type().map(ToString::to_string),
            len: 0,
        };
        let bytes = field.bytes().await.unwrap();
        seen.lock().unwrap().upload = Some(Upload {
            len: bytes.len(),
            ..upload
        });
    }

    Json(json!({
        "user_message": message("m5", &session_id, "user", "what's the weather", None),
        "assistant_message": message("m6", &session_id, "assistant", "sunny", Some("/audio/r1.mp3")),
    }))
}

/// Serve a fake backend, returning its address and what it saw
async fn serve() -> (SocketAddr, Shared) {
    let seen = Shared::default();
    let app = Router::new()
        .route("/api/agents", get(list_agents).post(create_agent))
        .route(
            "/api/agents/{agent_id}",
            get(get_agent).put(update_agent).delete(delete_agent),
        )
        .route(
            "/api/agents/{agent_id}/sessions",
            get(list_sessions).post(create_session),
        )
        .route(
            "/api/agents/{agent_id}/sessions/{session_id}",
            axum::routing::delete(delete_session),
        )
        .route(
            "/api/agents/{agent_id}/sessions/{session_id}/messages",
            get(list_messages).post(send_message),
        )
        .route(
            "/api/agents/{agent_id}/sessions/{session_id}/voice",
            post(send_voice),
        )
        .with_state(seen.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, seen)
}

fn gateway(addr: SocketAddr, api_key: Option<&str>) -> HttpGateway {
    HttpGateway::new(&BackendConfig {
        base_url: format!("http://{addr}"),
        api_prefix: "/api".to_string(),
        timeout: Duration::from_secs(5),
        api_key: api_key.map(ToString::to_string),
    })
    .unwrap()
}

#[tokio::test]
async fn test_list_agents_with_bearer_token() {
    let (addr, seen) = serve().await;
    let gateway = gateway(addr, Some("secret"));

    let agents = gateway.list_agents().await.unwrap();

    assert_eq!(agents.len(), 2);
    assert_eq!(agents[0].name, "Helper");
    assert!(agents[0].created_at.is_some());
    assert!(agents[1].prompt.is_empty());
    assert_eq!(seen.lock().unwrap().auth.as_deref(), Some("Bearer secret"));
}

#[tokio::test]
async fn test_no_auth_header_without_key() {
    let (addr, seen) = serve().await;

    gateway(addr, None).list_agents().await.unwrap();

    assert!(seen.lock().unwrap().auth.is_none());
}

#[tokio::test]
async fn test_get_agent_not_found_maps_status() {
    let (addr, _seen) = serve().await;
    let gateway = gateway(addr, None);

    assert_eq!(gateway.get_agent("a1").await.unwrap().prompt, "Be helpful");

    let err = gateway.get_agent("a9").await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    match err {
        Error::Backend { body, .. } => assert_eq!(body, "agent not found"),
        other => panic!("expected backend error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_create_and_update_agent() {
    let (addr, seen) = serve().await;
    let gateway = gateway(addr, None);

    let draft = AgentDraft {
        name: "Planner".to_string(),
        prompt: "Plan trips".to_string(),
    };
    let created = gateway.create_agent(&draft).await.unwrap().expect("created record");
    assert_eq!(created.id, "a3");
    assert_eq!(created.name, "Planner");

    let patch = AgentPatch {
        name: None,
        prompt: Some("Plan short trips".to_string()),
    };
    // 204 counts as success with no record
    assert!(gateway.update_agent("a3", &patch).await.unwrap().is_none());

    let seen = seen.lock().unwrap();
    assert_eq!(
        seen.created_agent,
        Some(json!({ "name": "Planner", "prompt": "Plan trips" }))
    );
    assert_eq!(seen.patch, Some(json!({ "prompt": "Plan short trips" })));
}

#[tokio::test]
async fn test_delete_agent_accepts_no_content() {
    let (addr, _seen) = serve().await;

    gateway(addr, None).delete_agent("a1").await.unwrap();
}

#[tokio::test]
async fn test_sessions_are_scoped_to_agent() {
    let (addr, _seen) = serve().await;

    let sessions = gateway(addr, None).list_sessions("a1").await.unwrap();

    assert_eq!(sessions.len(), 2);
    assert!(sessions.iter().all(|s| s.agent_id == "a1"));
    assert_eq!(sessions[0].label(), "Newer");
    assert_eq!(sessions[1].label(), "s1");
}

#[tokio::test]
async fn test_create_session_with_empty_body() {
    let (addr, seen) = serve().await;

    let draft = SessionDraft {
        title: Some("Trip".to_string()),
    };
    let created = gateway(addr, None).create_session("a1", &draft).await.unwrap();

    assert!(created.is_none());
    assert_eq!(seen.lock().unwrap().session_draft, Some(json!({ "title": "Trip" })));
}

#[tokio::test]
async fn test_server_error_carries_status_and_body() {
    let (addr, _seen) = serve().await;

    let err = gateway(addr, None).delete_session("a1", "s1").await.unwrap_err();

    match err {
        Error::Backend { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "database is locked");
        }
        other => panic!("expected backend error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_messages_round_trip() {
    let (addr, seen) = serve().await;
    let gateway = gateway(addr, None);

    let messages = gateway.list_messages("a1", "s1").await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[1].role, Role::Assistant);

    let pair = gateway
        .send_message("a1", "s1", "how are you?")
        .await
        .unwrap()
        .expect("reply");
    assert_eq!(pair.user_message.content, "how are you?");
    assert_eq!(pair.assistant_message.content, "hi there");
    assert_eq!(seen.lock().unwrap().sent, Some(json!({ "content": "how are you?" })));
}

#[tokio::test]
async fn test_voice_upload_is_multipart() {
    let (addr, seen) = serve().await;

    let payload = AudioPayload {
        data: vec![7; 320],
        encoding: Encoding::OggOpus,
    };
    let pair = gateway(addr, None)
        .send_voice("a1", "s1", payload)
        .await
        .unwrap()
        .expect("reply");

    assert_eq!(pair.assistant_message.audio_url.as_deref(), Some("/audio/r1.mp3"));

    let upload = seen.lock().unwrap().upload.clone().expect("upload seen");
    assert_eq!(upload.field.as_deref(), Some("audio"));
    assert_eq!(upload.file_name.as_deref(), Some("recording.ogg"));
    assert!(upload.content_type.as_deref().is_some_and(|t| t.starts_with("audio/ogg")));
    assert_eq!(upload.len, 320);
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = gateway(addr, None).list_agents().await.unwrap_err();

    assert!(matches!(err, Error::Network(_)));
    assert_eq!(err.status(), None);
}

#[tokio::test]
async fn test_ids_with_reserved_characters_stay_in_one_segment() {
    let (addr, _seen) = serve().await;
    let gateway = gateway(addr, None);

    let agent = gateway.get_agent("team/a1").await.unwrap();
    assert_eq!(agent.id, "team/a1");

    let messages = gateway.list_messages("a 1", "s?1#x").await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].session_id, "s?1#x");
}
