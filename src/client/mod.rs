//! Transport client: the request/response and event-stream primitives every
//! probe is built on.
//!
//! - [`HttpClient`] — one `reqwest` client per run; owns timeout, TLS and
//!   credential policy
//! - [`HttpExchange`] — raw status/content-type/body of one request
//! - [`EventStream`] / [`SseEvent`] — lazily parsed server-sent events

mod http;
mod sse;

pub use http::{HttpClient, HttpExchange};
pub use reqwest::Method;
pub use sse::{EventStream, SseEvent};

pub(crate) use http::content_type_is;
