//! Streaming validator shared by both conversation drivers.
//!
//! One hard wall-clock deadline covers the whole validation. The stream
//! passes on its first well-formed event; reading then continues (within
//! the same deadline) only until a task id turns up for resubscription.

use std::time::Duration;

use serde_json::Value;
use tokio::time::{timeout_at, Instant};

use crate::catalog::Rule;
use crate::client::{EventStream, SseEvent};
use crate::error::TransportFailure;
use crate::report::Finding;

/// What one stream validation concluded.
#[derive(Debug, Clone)]
pub struct StreamOutcome {
    /// Pass or fail of the calling rule.
    pub finding: Finding,
    /// Task id observed in the events, for resubscription.
    pub task_id: Option<String>,
    /// Number of events read, well-formed or not.
    pub events_seen: usize,
}

enum End {
    Deadline,
    Closed,
    Failed(TransportFailure),
    TaskFound,
}

/// Validates event streams against the timing and shape rules.
#[derive(Debug, Clone, Copy)]
pub struct StreamValidator {
    timeout: Duration,
}

impl StreamValidator {
    /// A validator with the given read window.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// The read window.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Validate an opened (or failed-to-open) stream under `rule`.
    pub async fn validate(
        &self,
        rule: Rule,
        opened: Result<EventStream, TransportFailure>,
    ) -> StreamOutcome {
        let started = Instant::now();
        let deadline = started + self.timeout;

        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(rule = rule.id, error = %e, "stream did not open");
                return Self::failed(rule.fail(format!("Stream did not open: {e}")), 0);
            }
        };

        if !(200..300).contains(&stream.status()) {
            return Self::failed(rule.fail(format!("Stream answered HTTP {}", stream.status())), 0);
        }
        if !stream.is_event_stream() {
            return Self::failed(
                rule.fail(format!(
                    "Content-Type {} is not text/event-stream",
                    stream.content_type().unwrap_or("missing")
                )),
                0,
            );
        }

        let mut events_seen = 0;
        let mut first_event: Option<Duration> = None;
        let mut task_id = None;

        let end = loop {
            match timeout_at(deadline, stream.next()).await {
                Err(_) => break End::Deadline,
                Ok(None) => break End::Closed,
                Ok(Some(Err(e))) => break End::Failed(e),
                Ok(Some(Ok(event))) => {
                    events_seen += 1;
                    let Some(payload) = well_formed(&event) else {
                        tracing::debug!(
                            rule = rule.id,
                            data = %event.data,
                            "ignoring malformed event"
                        );
                        continue;
                    };
                    if first_event.is_none() {
                        first_event = Some(started.elapsed());
                    }
                    task_id = task_id_from_event(&payload);
                    if task_id.is_some() {
                        break End::TaskFound;
                    }
                }
            }
        };

        let finding = match (first_event, end) {
            (Some(after), _) => rule.pass(format!(
                "First event after {:.2}s ({events_seen} event(s) read)",
                after.as_secs_f64()
            )),
            (None, End::Deadline) => rule.fail(format!(
                "Timeout: no well-formed event within {:.1}s",
                self.timeout.as_secs_f64()
            )),
            (None, End::Failed(e)) => rule.fail(format!("Stream error before first event: {e}")),
            (None, _) => rule.fail(format!(
                "Stream ended without a well-formed event ({events_seen} event(s) read)"
            )),
        };

        tracing::debug!(rule = rule.id, events_seen, task_id = ?task_id, "stream validated");

        StreamOutcome {
            finding,
            task_id,
            events_seen,
        }
    }

    fn failed(finding: Finding, events_seen: usize) -> StreamOutcome {
        StreamOutcome {
            finding,
            task_id: None,
            events_seen,
        }
    }
}

/// The event's JSON object payload, unless it is missing, not an object, or
/// a JSON-RPC error envelope.
fn well_formed(event: &SseEvent) -> Option<Value> {
    let payload = event.json()?;
    let obj = payload.as_object()?;
    if obj.contains_key("error") && !obj.contains_key("result") {
        return None;
    }
    Some(payload)
}

/// Pull a task id out of a stream event.
///
/// Understands JSON-RPC wrapped results, `kind`-tagged Task / status /
/// artifact events and the ProtoJSON wrapper shapes.
pub fn task_id_from_event(payload: &Value) -> Option<String> {
    let body = payload
        .get("result")
        .filter(|r| r.is_object())
        .unwrap_or(payload);

    let text = |v: Option<&Value>| {
        v.and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    if body.get("kind").and_then(Value::as_str) == Some("task") {
        if let Some(id) = text(body.get("id")) {
            return Some(id);
        }
    }
    text(body.get("taskId"))
        .or_else(|| text(body.pointer("/task/id")))
        .or_else(|| text(body.pointer("/statusUpdate/taskId")))
        .or_else(|| text(body.pointer("/artifactUpdate/taskId")))
}
