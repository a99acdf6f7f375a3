//! A2A wire types used by the conversation drivers.
//!
//! Outbound payloads (what the drivers send) are strongly typed and
//! serialized with the A2A v0.3 JSON field names. Inbound payloads are
//! deliberately *not* deserialized into strict structs: the server under test
//! may be partially compliant, so responses are classified from
//! `serde_json::Value` into [`RpcEnvelope`] and [`ResultShape`].
//!
//! Reference: <https://a2a-protocol.org/v0.3.0/specification/>

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::code_name;

// ============================================================================
// Enums
// ============================================================================

/// The lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    /// Task has been received but not yet started.
    Submitted,
    /// Task is actively being processed.
    Working,
    /// Task completed successfully.
    Completed,
    /// Task failed.
    Failed,
    /// Task was canceled.
    Canceled,
    /// Task requires additional input from the user.
    InputRequired,
    /// Task was rejected by the agent.
    Rejected,
    /// Task requires authentication.
    AuthRequired,
    /// Unknown state.
    Unknown,
}

impl TaskState {
    /// Parse a wire state, accepting both the JSON-RPC kebab-case form
    /// (`input-required`) and the ProtoJSON form (`TASK_STATE_INPUT_REQUIRED`).
    pub fn parse(raw: &str) -> Option<Self> {
        let lower = raw.to_ascii_lowercase();
        let normalized = lower
            .strip_prefix("task_state_")
            .unwrap_or(&lower)
            .replace('_', "-");
        let state = match normalized.as_str() {
            "submitted" => TaskState::Submitted,
            "working" => TaskState::Working,
            "completed" => TaskState::Completed,
            "failed" => TaskState::Failed,
            "canceled" | "cancelled" => TaskState::Canceled,
            "input-required" => TaskState::InputRequired,
            "rejected" => TaskState::Rejected,
            "auth-required" => TaskState::AuthRequired,
            "unknown" => TaskState::Unknown,
            _ => return None,
        };
        Some(state)
    }

    /// Terminal states cannot be canceled.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Canceled | TaskState::Rejected
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Submitted => "submitted",
            TaskState::Working => "working",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
            TaskState::Canceled => "canceled",
            TaskState::InputRequired => "input-required",
            TaskState::Rejected => "rejected",
            TaskState::AuthRequired => "auth-required",
            TaskState::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message from the user / client.
    User,
    /// Message from the agent / server.
    Agent,
}

// ============================================================================
// Outbound payloads
// ============================================================================

/// A content part. The probe only ever sends text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Part {
    /// Plain text content.
    Text {
        /// The text.
        text: String,
    },
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique message identifier.
    pub message_id: String,

    /// Who sent this message.
    pub role: Role,

    /// Discriminator field, always "message".
    pub kind: &'static str,

    /// Content parts of the message.
    pub parts: Vec<Part>,
}

impl Message {
    /// A user message with one text part and a fresh id.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            message_id: uuid::Uuid::new_v4().to_string(),
            role: Role::User,
            kind: "message",
            parts: vec![Part::Text { text: text.into() }],
        }
    }
}

/// Parameters for `message/send` and `message/stream`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageParams {
    /// The message to send.
    pub message: Message,

    /// Optional send configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration: Option<SendMessageConfiguration>,
}

impl SendMessageParams {
    /// Non-blocking send of a text message, so a Task comes back quickly.
    pub fn non_blocking(text: &str) -> Self {
        Self {
            message: Message::user_text(text),
            configuration: Some(SendMessageConfiguration {
                blocking: Some(false),
                ..Default::default()
            }),
        }
    }

    /// Send of a text message with server-default configuration.
    pub fn text(text: &str) -> Self {
        Self {
            message: Message::user_text(text),
            configuration: None,
        }
    }
}

/// Configuration for a `message/send` request.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageConfiguration {
    /// MIME types the client can accept as output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_output_modes: Option<Vec<String>>,

    /// Maximum number of history messages to include in the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_length: Option<i32>,

    /// Whether the request should block until the task completes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocking: Option<bool>,
}

/// Parameters for `tasks/get`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskQueryParams {
    /// Task ID to retrieve.
    pub id: String,

    /// Maximum number of history messages to include.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_length: Option<i32>,
}

/// Task ID parameters for `tasks/cancel`, `tasks/resubscribe` and the push
/// config get/list calls.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskIdParams {
    /// The task ID.
    pub id: String,

    /// Push config id, for get/delete.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_notification_config_id: Option<String>,
}

impl TaskIdParams {
    /// Params naming only the task.
    pub fn task(id: &str) -> Self {
        Self {
            id: id.to_string(),
            push_notification_config_id: None,
        }
    }
}

/// Configuration for push notification delivery.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushNotificationConfig {
    /// URL to deliver notifications to.
    pub url: String,

    /// Optional verification token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Authentication configuration for the push endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication: Option<PushNotificationAuthenticationInfo>,
}

/// Authentication information for push notification delivery.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushNotificationAuthenticationInfo {
    /// Supported authentication schemes (e.g. `["Bearer"]`).
    pub schemes: Vec<String>,
}

/// Push notification config bound to a task (`tasks/pushNotificationConfig/set`).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPushNotificationConfig {
    /// Task this config applies to.
    pub task_id: String,

    /// The push notification configuration details.
    pub push_notification_config: PushNotificationConfig,
}

impl TaskPushNotificationConfig {
    /// A throwaway webhook registration used to exercise the push API.
    pub fn probe(task_id: &str) -> Self {
        Self {
            task_id: task_id.to_string(),
            push_notification_config: PushNotificationConfig {
                url: "https://client.example.com/webhook/a2a-notifications".to_string(),
                token: Some("a2a-check-token".to_string()),
                authentication: Some(PushNotificationAuthenticationInfo {
                    schemes: vec!["Bearer".to_string()],
                }),
            },
        }
    }
}

// ============================================================================
// JSON-RPC Foundation
// ============================================================================

/// A JSON-RPC 2.0 request ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcId {
    /// String identifier.
    String(String),
    /// Numeric identifier.
    Number(i64),
}

impl fmt::Display for JsonRpcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonRpcId::String(s) => write!(f, "{}", s),
            JsonRpcId::Number(n) => write!(f, "{}", n),
        }
    }
}

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    /// Protocol version, always "2.0".
    pub jsonrpc: &'static str,

    /// Request identifier.
    pub id: JsonRpcId,

    /// Method name.
    pub method: String,

    /// Method parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Build a request with a random UUID id.
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id: JsonRpcId::String(uuid::Uuid::new_v4().to_string()),
            method: method.into(),
            params,
        }
    }

    /// Build a request from typed params.
    pub fn with_params(method: impl Into<String>, params: &impl Serialize) -> Self {
        // Serializing these plain structs to a Value cannot fail.
        Self::new(method, serde_json::to_value(params).ok())
    }

    /// The request as a JSON value.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,

    /// Human-readable error message.
    #[serde(default)]
    pub message: String,

    /// Optional structured error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match code_name(self.code) {
            Some(name) => write!(f, "{} ({name}) {}", self.code, self.message),
            None => write!(f, "{} {}", self.code, self.message),
        }
    }
}

// ============================================================================
// Inbound classification
// ============================================================================

/// A JSON-RPC response body, classified without trusting its shape.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcEnvelope {
    /// `{"jsonrpc":"2.0","result":...}`
    Result(Value),
    /// `{"jsonrpc":"2.0","error":{"code":...}}`
    Error(JsonRpcError),
    /// Anything else, with a reason.
    Malformed(String),
}

impl RpcEnvelope {
    /// Classify a parsed JSON body.
    pub fn classify(body: &Value) -> Self {
        let Some(obj) = body.as_object() else {
            return RpcEnvelope::Malformed("response is not a JSON object".to_string());
        };
        if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            return RpcEnvelope::Malformed("missing \"jsonrpc\": \"2.0\"".to_string());
        }
        if let Some(error) = obj.get("error") {
            return match serde_json::from_value::<JsonRpcError>(error.clone()) {
                Ok(error) => RpcEnvelope::Error(error),
                Err(e) => RpcEnvelope::Malformed(format!("invalid error object: {e}")),
            };
        }
        match obj.get("result") {
            Some(result) => RpcEnvelope::Result(result.clone()),
            None => RpcEnvelope::Malformed("neither \"result\" nor \"error\" present".to_string()),
        }
    }

    /// Parse raw bytes and classify.
    pub fn from_slice(bytes: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(bytes) {
            Ok(body) => Self::classify(&body),
            Err(e) => RpcEnvelope::Malformed(format!("response is not JSON: {e}")),
        }
    }
}

/// What a `message/send`, `tasks/get` or `tasks/cancel` result looks like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultShape {
    /// A Task with a non-empty id.
    Task {
        /// Task id.
        id: String,
        /// `status.state`, if it parsed.
        state: Option<TaskState>,
    },
    /// A direct Message reply.
    Message,
    /// Neither; carries a short description.
    Other(String),
}

impl ResultShape {
    /// Classify a result object.
    ///
    /// Accepts the JSON-RPC form (`kind` discriminator) and the ProtoJSON
    /// wrapper form used by HTTP+JSON servers (`{"task": {...}}`).
    pub fn classify(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return ResultShape::Other(format!("not an object ({})", json_type(value)));
        };

        if let Some(inner) = obj.get("task").filter(|v| v.is_object()) {
            return Self::classify_task(inner);
        }
        if obj.get("message").is_some_and(Value::is_object) && !obj.contains_key("kind") {
            return ResultShape::Message;
        }

        match obj.get("kind").and_then(Value::as_str) {
            Some("task") => Self::classify_task(value),
            Some("message") => ResultShape::Message,
            Some(other) => ResultShape::Other(format!("kind={other}")),
            None if obj.contains_key("status") && obj.contains_key("id") => {
                Self::classify_task(value)
            }
            None if obj.contains_key("messageId") && obj.contains_key("parts") => {
                ResultShape::Message
            }
            None => ResultShape::Other("no kind".to_string()),
        }
    }

    fn classify_task(value: &Value) -> Self {
        match value.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => ResultShape::Task {
                id: id.to_string(),
                state: value
                    .pointer("/status/state")
                    .and_then(Value::as_str)
                    .and_then(TaskState::parse),
            },
            _ => ResultShape::Other("task without id".to_string()),
        }
    }

    /// The task id, for Task results.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            ResultShape::Task { id, .. } => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for ResultShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultShape::Task { id, state } => match state {
                Some(state) => write!(f, "Task {id} ({state})"),
                None => write!(f, "Task {id}"),
            },
            ResultShape::Message => write!(f, "Message"),
            ResultShape::Other(desc) => write!(f, "unexpected result ({desc})"),
        }
    }
}

/// JSON type name for messages.
pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
