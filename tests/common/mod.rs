//! Shared test utilities for integration tests.
//!
//! [`MockAgent`] serves a card, a JSON-RPC endpoint at `/a2a` and an
//! HTTP+JSON binding under `/v1`, with knobs for the behaviors the
//! conformance checks branch on.

#![allow(dead_code)]

use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use a2a_check::{ProbeConfig, Suite};

/// Token the mock accepts for the authenticated extended card.
pub const TOKEN: &str = "secret";

/// How the mock answers an unknown method call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnknownMethod {
    /// `-32601` envelope.
    MethodNotFound,
    /// HTTP 500 with a plain-text body.
    ServerError,
    /// `-32603` envelope.
    InternalError,
}

/// Configurable in-process A2A server.
#[derive(Clone, Debug)]
pub struct MockAgent {
    /// Card served at the well-known path. `BASE` in strings is replaced by
    /// the server's base URL.
    pub card: Value,
    /// `status.state` of the task returned by `message/send`.
    pub task_state: &'static str,
    /// Answer `message/send` with a Message instead of a Task.
    pub message_only: bool,
    pub unknown_method: UnknownMethod,
    pub push_supported: bool,
    /// Delay before the first SSE event.
    pub stream_delay: Duration,
    /// Delay before the card is served.
    pub card_delay: Duration,
    /// Raw `(content type, body)` answer for REST `message:send`.
    pub rest_send_body: Option<(&'static str, &'static str)>,
}

impl Default for MockAgent {
    fn default() -> Self {
        Self {
            card: valid_card(),
            task_state: "working",
            message_only: false,
            unknown_method: UnknownMethod::MethodNotFound,
            push_supported: false,
            stream_delay: Duration::ZERO,
            card_delay: Duration::ZERO,
            rest_send_body: None,
        }
    }
}

/// A card that passes every schema and card rule, JSON-RPC only.
pub fn valid_card() -> Value {
    json!({
        "protocolVersion": "0.3.0",
        "name": "Mock Agent",
        "description": "In-process agent for conformance tests",
        "url": "BASE/a2a",
        "version": "1.0.0",
        "preferredTransport": "JSONRPC",
        "defaultInputModes": ["text/plain"],
        "defaultOutputModes": ["text/plain"],
        "capabilities": {"streaming": true, "pushNotifications": false},
        "skills": [{
            "id": "echo",
            "name": "Echo",
            "description": "Echoes messages back",
            "tags": ["test"]
        }]
    })
}

/// [`valid_card`] plus an HTTP+JSON interface at `BASE`.
pub fn card_with_rest() -> Value {
    let mut card = valid_card();
    card["additionalInterfaces"] = json!([
        {"transport": "JSONRPC", "url": "BASE/a2a"},
        {"transport": "HTTP+JSON", "url": "BASE"}
    ]);
    card
}

/// A suite with short timeouts suitable for loopback servers.
pub fn suite(config: ProbeConfig) -> Suite {
    Suite::structural(config).unwrap()
}

/// Default test configuration.
pub fn config() -> ProbeConfig {
    ProbeConfig::default()
        .with_timeout(Duration::from_secs(3))
        .with_stream_timeout(Duration::from_secs(2))
        .with_overall_budget(Duration::from_secs(20))
}

fn substitute(value: &Value, base: &str) -> Value {
    match value {
        Value::String(s) => Value::String(s.replace("BASE", base)),
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute(v, base)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute(v, base)))
                .collect(),
        ),
        other => other.clone(),
    }
}

struct AppState {
    agent: MockAgent,
    card: Value,
    /// Task ids canceled over REST.
    canceled: Mutex<HashSet<String>>,
    /// Counter for REST task ids, so repeated runs get fresh tasks.
    rest_tasks: AtomicUsize,
}

impl AppState {
    fn rest_state(&self, id: &str) -> &'static str {
        if self.canceled.lock().unwrap().contains(id) {
            "canceled"
        } else {
            self.agent.task_state
        }
    }
}

type Shared = Arc<AppState>;

fn is_terminal(state: &str) -> bool {
    matches!(state, "completed" | "failed" | "canceled" | "rejected")
}

fn task(id: &str, state: &str) -> Value {
    json!({
        "kind": "task",
        "id": id,
        "contextId": "ctx-1",
        "status": {"state": state}
    })
}

fn message() -> Value {
    json!({
        "kind": "message",
        "messageId": "msg-1",
        "role": "agent",
        "parts": [{"kind": "text", "text": "pong"}]
    })
}

fn rpc_result(id: &Value, result: Value) -> Response {
    Json(json!({"jsonrpc": "2.0", "id": id, "result": result})).into_response()
}

fn rpc_error(id: &Value, code: i64, message: &str) -> Response {
    Json(json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}}))
        .into_response()
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"))
}

fn sse(delay: Duration, events: Vec<Value>) -> Response {
    let body = async_stream::stream! {
        tokio::time::sleep(delay).await;
        for event in events {
            yield Ok::<_, Infallible>(format!("data: {event}\n\n"));
        }
    };
    (
        [(header::CONTENT_TYPE, "text/event-stream")],
        Body::from_stream(body),
    )
        .into_response()
}

fn stream_events(task_id: &str) -> Vec<Value> {
    vec![
        json!({"jsonrpc": "2.0", "id": 1, "result": task(task_id, "submitted")}),
        json!({"jsonrpc": "2.0", "id": 1, "result": {
            "kind": "status-update",
            "taskId": task_id,
            "contextId": "ctx-1",
            "status": {"state": "completed"},
            "final": true
        }}),
    ]
}

async fn root() -> &'static str {
    "mock agent"
}

async fn card(State(state): State<Shared>) -> Json<Value> {
    tokio::time::sleep(state.agent.card_delay).await;
    Json(state.card.clone())
}

async fn jsonrpc(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let agent = &state.agent;
    let id = body.get("id").cloned().unwrap_or(Value::Null);
    let method = body.get("method").and_then(Value::as_str).unwrap_or_default();
    let task_id = body
        .pointer("/params/id")
        .and_then(Value::as_str)
        .unwrap_or("task-1")
        .to_string();

    match method {
        "message/send" if agent.message_only => rpc_result(&id, message()),
        "message/send" => rpc_result(&id, task("task-1", agent.task_state)),
        "tasks/get" => rpc_result(&id, task(&task_id, agent.task_state)),
        "tasks/cancel" if is_terminal(agent.task_state) => {
            rpc_error(&id, -32002, "Task cannot be canceled")
        }
        "tasks/cancel" => rpc_result(&id, task(&task_id, "canceled")),
        m if m.starts_with("tasks/pushNotificationConfig/") && !agent.push_supported => {
            rpc_error(&id, -32003, "Push Notification is not supported")
        }
        "tasks/pushNotificationConfig/set" | "tasks/pushNotificationConfig/get" => rpc_result(
            &id,
            json!({
                "taskId": task_id,
                "pushNotificationConfig": {"id": "cfg-1", "url": "https://client.example.com/hook"}
            }),
        ),
        "tasks/pushNotificationConfig/list" => rpc_result(&id, json!([])),
        "tasks/pushNotificationConfig/delete" => rpc_result(&id, Value::Null),
        "message/stream" => sse(agent.stream_delay, stream_events("task-1")),
        "tasks/resubscribe" => sse(agent.stream_delay, stream_events(&task_id)),
        "agent/getAuthenticatedExtendedCard" if authorized(&headers) => {
            rpc_result(&id, state.card.clone())
        }
        "agent/getAuthenticatedExtendedCard" => StatusCode::UNAUTHORIZED.into_response(),
        _ => match agent.unknown_method {
            UnknownMethod::MethodNotFound => rpc_error(&id, -32601, "Method not found"),
            UnknownMethod::ServerError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()
            }
            UnknownMethod::InternalError => rpc_error(&id, -32603, "Internal error"),
        },
    }
}

async fn rest_send(State(state): State<Shared>) -> Response {
    if let Some((content_type, body)) = state.agent.rest_send_body {
        return ([(header::CONTENT_TYPE, content_type)], body).into_response();
    }
    if state.agent.message_only {
        Json(json!({"message": message()})).into_response()
    } else {
        let id = format!("rest-task-{}", state.rest_tasks.fetch_add(1, Ordering::Relaxed) + 1);
        Json(json!({"task": task(&id, state.agent.task_state)})).into_response()
    }
}

async fn rest_stream(State(state): State<Shared>) -> Response {
    sse(state.agent.stream_delay, stream_events("task-1"))
}

async fn rest_card(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if authorized(&headers) {
        Json(state.card.clone()).into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

async fn rest_task_get(State(state): State<Shared>, Path(rest): Path<String>) -> Response {
    if rest.contains(':') || rest.contains('/') {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }
    Json(task(&rest, state.rest_state(&rest))).into_response()
}

async fn rest_task_post(State(state): State<Shared>, Path(rest): Path<String>) -> Response {
    let agent = &state.agent;
    if let Some(id) = rest.strip_suffix(":cancel") {
        if is_terminal(state.rest_state(id)) {
            return StatusCode::CONFLICT.into_response();
        }
        state.canceled.lock().unwrap().insert(id.to_string());
        return Json(task(id, "canceled")).into_response();
    }
    if let Some(id) = rest.strip_suffix(":subscribe") {
        // Nothing left to stream once a task is terminal.
        if is_terminal(state.rest_state(id)) {
            return StatusCode::CONFLICT.into_response();
        }
        return sse(agent.stream_delay, stream_events(id));
    }
    if rest.ends_with("/pushNotificationConfigs") {
        return if agent.push_supported {
            Json(json!({"name": format!("tasks/{rest}/cfg-1")})).into_response()
        } else {
            StatusCode::NOT_IMPLEMENTED.into_response()
        };
    }
    StatusCode::NOT_FOUND.into_response()
}

/// Start the mock on a random port. Returns the base URL and the server task.
pub async fn start_mock(agent: MockAgent) -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{}", addr);

    let state = Arc::new(AppState {
        card: substitute(&agent.card, &base_url),
        agent,
        canceled: Mutex::new(HashSet::new()),
        rest_tasks: AtomicUsize::new(0),
    });

    let app = Router::new()
        .route("/", get(root))
        .route("/.well-known/agent-card.json", get(card))
        .route("/a2a", post(jsonrpc))
        .route("/v1/message:send", post(rest_send))
        .route("/v1/message:stream", post(rest_stream))
        .route("/v1/card", get(rest_card))
        .route("/v1/tasks/{*rest}", get(rest_task_get).post(rest_task_post))
        .with_state(state);

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (base_url, handle)
}

/// Start a server that only serves the given card (no transports).
pub async fn start_card_only(card: Value) -> (String, tokio::task::JoinHandle<()>) {
    start_mock(MockAgent {
        card,
        ..Default::default()
    })
    .await
}

/// Start a server that accepts connections and never answers.
pub async fn start_silent_server() -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    (base_url, handle)
}
