//! Error types for the probe engine.
//!
//! Two families live here:
//! - [`TransportFailure`]: a network-level fact observed while probing a
//!   server (connection refused, TLS, timeout, malformed HTTP). Drivers turn
//!   each one into exactly one finding; it never aborts a run.
//! - [`ProbeError`]: a setup problem on our side (bad header, client build
//!   failure), raised before any probing starts.
//!
//! The JSON-RPC 2.0 and A2A error codes the drivers branch on are kept as
//! plain constants.

use std::fmt;

// ---------------------------------------------------------------------------
// Standard JSON-RPC 2.0 error codes
// ---------------------------------------------------------------------------

/// Invalid JSON was received by the server.
pub const PARSE_ERROR: i64 = -32700;

/// The JSON sent is not a valid Request object.
pub const INVALID_REQUEST: i64 = -32600;

/// The method does not exist / is not available.
pub const METHOD_NOT_FOUND: i64 = -32601;

/// Invalid method parameter(s).
pub const INVALID_PARAMS: i64 = -32602;

/// Internal JSON-RPC error.
pub const INTERNAL_ERROR: i64 = -32603;

// ---------------------------------------------------------------------------
// A2A-specific error codes
// ---------------------------------------------------------------------------

/// The requested task was not found.
pub const TASK_NOT_FOUND: i64 = -32001;

/// The task cannot be canceled in its current state.
pub const TASK_NOT_CANCELABLE: i64 = -32002;

/// Push notifications are not supported by this agent.
pub const PUSH_NOTIFICATION_NOT_SUPPORTED: i64 = -32003;

/// The requested operation is not supported.
pub const UNSUPPORTED_OPERATION: i64 = -32004;

/// None of the requested content types is supported.
pub const CONTENT_TYPE_NOT_SUPPORTED: i64 = -32005;

/// The agent produced a response that does not conform to the protocol.
pub const INVALID_AGENT_RESPONSE: i64 = -32006;

/// Authenticated extended card is not configured.
pub const AUTHENTICATED_EXTENDED_CARD_NOT_CONFIGURED: i64 = -32007;

/// Error codes a server may use to say "push notifications are not offered".
pub const PUSH_NOT_SUPPORTED_CODES: [i64; 2] = [PUSH_NOTIFICATION_NOT_SUPPORTED, METHOD_NOT_FOUND];

/// Readable name of a JSON-RPC or A2A error code, for finding messages.
pub fn code_name(code: i64) -> Option<&'static str> {
    Some(match code {
        PARSE_ERROR => "parse error",
        INVALID_REQUEST => "invalid request",
        METHOD_NOT_FOUND => "method not found",
        INVALID_PARAMS => "invalid params",
        INTERNAL_ERROR => "internal error",
        TASK_NOT_FOUND => "task not found",
        TASK_NOT_CANCELABLE => "task not cancelable",
        PUSH_NOTIFICATION_NOT_SUPPORTED => "push notifications not supported",
        UNSUPPORTED_OPERATION => "unsupported operation",
        CONTENT_TYPE_NOT_SUPPORTED => "content type not supported",
        INVALID_AGENT_RESPONSE => "invalid agent response",
        AUTHENTICATED_EXTENDED_CARD_NOT_CONFIGURED => "authenticated extended card not configured",
        _ => return None,
    })
}

// ---------------------------------------------------------------------------
// Transport failures
// ---------------------------------------------------------------------------

/// Category of a [`TransportFailure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The URL could not be parsed or has an unsupported scheme.
    InvalidUrl,
    /// TCP connection could not be established.
    Connect,
    /// TLS handshake or certificate verification failed.
    Tls,
    /// The request or stream read window elapsed.
    Timeout,
    /// The peer spoke malformed HTTP or closed the connection mid-exchange.
    Protocol,
    /// The response body could not be read.
    Body,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::InvalidUrl => "invalid url",
            FailureKind::Connect => "connection failed",
            FailureKind::Tls => "tls failure",
            FailureKind::Timeout => "timeout",
            FailureKind::Protocol => "protocol error",
            FailureKind::Body => "body read failed",
        };
        f.write_str(s)
    }
}

/// A network-level failure. Never carries a parsed payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {detail}")]
pub struct TransportFailure {
    /// What went wrong.
    pub kind: FailureKind,
    /// Human-readable detail, usually the underlying error text.
    pub detail: String,
}

impl TransportFailure {
    /// Create a failure of the given kind.
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// Shorthand for a [`FailureKind::Timeout`] failure.
    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, detail)
    }

    /// Returns `true` if this failure is a timeout.
    pub fn is_timeout(&self) -> bool {
        self.kind == FailureKind::Timeout
    }
}

impl From<reqwest::Error> for TransportFailure {
    fn from(err: reqwest::Error) -> Self {
        let detail = error_chain(&err);
        let kind = if err.is_timeout() {
            FailureKind::Timeout
        } else if err.is_builder() {
            FailureKind::InvalidUrl
        } else if looks_like_tls(&detail) {
            FailureKind::Tls
        } else if err.is_connect() {
            FailureKind::Connect
        } else if err.is_body() || err.is_decode() {
            FailureKind::Body
        } else {
            FailureKind::Protocol
        };
        Self { kind, detail }
    }
}

/// Flatten an error and its sources into one line.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        let text = inner.to_string();
        if !out.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = inner.source();
    }
    out
}

fn looks_like_tls(detail: &str) -> bool {
    let lower = detail.to_ascii_lowercase();
    lower.contains("certificate") || lower.contains("tls") || lower.contains("ssl")
}

// ---------------------------------------------------------------------------
// Setup errors
// ---------------------------------------------------------------------------

/// Errors raised while configuring the engine, before any probe runs.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// A configured header name or value is not valid HTTP.
    #[error("invalid header '{name}': {reason}")]
    InvalidHeader {
        /// Header name as configured.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The underlying HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[from] reqwest::Error),
}

/// Convenience result type for engine setup.
pub type ProbeResult<T> = Result<T, ProbeError>;
