//! HTTP+JSON (REST) conversation driver.
//!
//! Mirrors the JSON-RPC sequence over resource-style calls. Endpoints are
//! `{base}/v1/{suffix}`, or `{base}/{suffix}` when the base already ends
//! with `/v1`. Status codes and content types take the place of envelope
//! error codes.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::card::{CapabilityDocument, SchemaValidator};
use crate::catalog::*;
use crate::client::{HttpClient, HttpExchange, Method};
use crate::report::{Finding, Section, SectionKind};
use crate::stream::StreamValidator;
use crate::types::{ResultShape, SendMessageParams, TaskPushNotificationConfig};

use super::{
    declares_extended_card, revalidate_card, streaming_declared_off, DriverOptions, TaskHandle,
};

/// Statuses that mean "push notifications are not offered".
const PUSH_NOT_SUPPORTED_STATUSES: [u16; 4] = [400, 404, 405, 501];

/// Drives one HTTP+JSON base URL through the A2A call sequence.
pub struct RestDriver {
    http: HttpClient,
    base: String,
    schema: Arc<dyn SchemaValidator>,
    streams: StreamValidator,
    options: DriverOptions,
}

impl std::fmt::Debug for RestDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestDriver")
            .field("base", &self.base)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl RestDriver {
    pub fn new(
        http: HttpClient,
        base: &str,
        schema: Arc<dyn SchemaValidator>,
        streams: StreamValidator,
        options: DriverOptions,
    ) -> Self {
        Self {
            http,
            base: base.trim_end_matches('/').to_string(),
            schema,
            streams,
            options,
        }
    }

    /// Absolute URL of an endpoint such as `message:send` or `tasks/{id}`.
    pub fn endpoint(&self, suffix: &str) -> String {
        let suffix = suffix.trim_start_matches('/');
        if self.base.ends_with("/v1") {
            format!("{}/{suffix}", self.base)
        } else {
            format!("{}/v1/{suffix}", self.base)
        }
    }

    /// Run every step and return the `rest` section.
    pub async fn run(&self, doc: Option<&CapabilityDocument>) -> Section {
        tracing::debug!(base = %self.base, "rest driver starting");
        let mut section = Section::new(SectionKind::Rest);

        let (findings, handle) = self.send_message().await;
        section.extend(findings);

        let streaming = self.streaming_reason(doc);
        section.push(self.message_stream(streaming).await);

        match handle {
            Some(mut handle) => {
                // Cancel goes last: it moves the task to a terminal state.
                section.extend(self.get_task(&mut handle).await);
                section.push(self.subscribe(&handle, streaming).await);
                section.push(self.push_config(&handle).await);
                section.push(self.cancel_task(&handle).await);
            }
            None => section.push(REST_030.skip(
                "message:send returned no task id; tasks GET/cancel/subscribe skipped",
            )),
        }

        section.extend(self.extended_card(doc).await);

        tracing::info!(
            base = %self.base,
            findings = section.findings().len(),
            severity = ?section.severity(),
            "rest section complete"
        );
        section
    }

    /// `None` when streaming steps should run, otherwise why not.
    fn streaming_reason(&self, doc: Option<&CapabilityDocument>) -> Option<&'static str> {
        if !self.options.streaming {
            Some("streaming probe disabled")
        } else if streaming_declared_off(doc) {
            Some("capabilities.streaming is false")
        } else {
            None
        }
    }

    async fn send_message(&self) -> (Vec<Finding>, Option<TaskHandle>) {
        let url = self.endpoint("message:send");
        let body =
            serde_json::to_value(SendMessageParams::non_blocking("ping")).unwrap_or(Value::Null);

        let exchange = match self.http.post_json(&url, &body).await {
            Ok(exchange) => exchange,
            Err(e) => {
                return (
                    vec![
                        REST_010.fail(format!("message:send transport error: {e}")),
                        REST_011.skip("no response to inspect"),
                        REST_012.skip("no response to inspect"),
                    ],
                    None,
                )
            }
        };

        let mut findings = vec![
            REST_010.check(
                exchange.is_success(),
                format!("POST message:send HTTP {}", exchange.status),
                format!("POST message:send HTTP {}", exchange.status),
            ),
            content_type(REST_011, &exchange),
        ];

        if !exchange.is_success() {
            findings.push(REST_012.skip("message:send did not succeed"));
            return (findings, None);
        }

        let shape = match exchange.json() {
            Ok(body) => ResultShape::classify(&body),
            Err(e) => {
                findings.push(REST_012.fail(format!("message:send body is not JSON: {e}")));
                return (findings, None);
            }
        };
        findings.push(match &shape {
            ResultShape::Other(_) => REST_012.fail(format!("message:send returned {shape}")),
            _ => REST_012.pass(format!("message:send returned {shape}")),
        });
        (findings, TaskHandle::from_shape(&shape))
    }

    async fn message_stream(&self, skip: Option<&str>) -> Finding {
        if let Some(reason) = skip {
            return REST_020.skip(reason);
        }
        let body =
            serde_json::to_value(SendMessageParams::text("stream test")).unwrap_or(Value::Null);
        let opened = self
            .http
            .open_event_stream(Method::POST, &self.endpoint("message:stream"), Some(&body))
            .await;
        self.streams.validate(REST_020, opened).await.finding
    }

    async fn get_task(&self, handle: &mut TaskHandle) -> Vec<Finding> {
        let url = self.endpoint(&format!("tasks/{}", handle.id));
        let exchange = match self.http.get(&url).await {
            Ok(exchange) => exchange,
            Err(e) => {
                return vec![
                    REST_030.fail(format!("GET tasks/{} transport error: {e}", handle.id)),
                    REST_031.skip("no response to inspect"),
                ]
            }
        };

        let task = if exchange.status != 200 {
            REST_030.fail(format!("GET tasks/{} HTTP {}", handle.id, exchange.status))
        } else {
            match exchange.json().map(|body| ResultShape::classify(&body)) {
                Ok(shape) if shape.task_id() == Some(handle.id.as_str()) => {
                    handle.observe(&shape);
                    REST_030.pass(format!("GET tasks/{} returned {shape}", handle.id))
                }
                Ok(shape) => REST_030.fail(format!("GET tasks/{} returned {shape}", handle.id)),
                Err(e) => REST_030.fail(format!("GET tasks/{} body is not JSON: {e}", handle.id)),
            }
        };
        vec![task, content_type(REST_031, &exchange)]
    }

    async fn cancel_task(&self, handle: &TaskHandle) -> Finding {
        let url = self.endpoint(&format!("tasks/{}:cancel", handle.id));
        let exchange = match self.http.post_json(&url, &json!({})).await {
            Ok(exchange) => exchange,
            Err(e) => {
                return REST_032.fail(format!(
                    "POST tasks/{}:cancel transport error: {e}",
                    handle.id
                ))
            }
        };
        let status = exchange.status;
        if handle.is_terminal() {
            REST_032.check(
                status == 409,
                format!("Terminal task refused with HTTP {status}"),
                format!(
                    "Task in terminal state {} answered HTTP {status}; expected 409",
                    handle.state_label()
                ),
            )
        } else {
            REST_032.check(
                exchange.is_success() || status == 409,
                format!("POST tasks/{}:cancel HTTP {status}", handle.id),
                format!("POST tasks/{}:cancel HTTP {status}; expected 2xx or 409", handle.id),
            )
        }
    }

    async fn subscribe(&self, handle: &TaskHandle, skip: Option<&str>) -> Finding {
        if let Some(reason) = skip {
            return REST_033.skip(reason);
        }
        if handle.is_terminal() {
            return REST_033.skip(format!(
                "task already in terminal state {}; nothing to subscribe to",
                handle.state_label()
            ));
        }
        let url = self.endpoint(&format!("tasks/{}:subscribe", handle.id));
        let opened = self
            .http
            .open_event_stream(Method::POST, &url, Some(&json!({})))
            .await;
        self.streams.validate(REST_033, opened).await.finding
    }

    async fn push_config(&self, handle: &TaskHandle) -> Finding {
        let url = self.endpoint(&format!("tasks/{}/pushNotificationConfigs", handle.id));
        let body = serde_json::to_value(TaskPushNotificationConfig::probe(&handle.id))
            .unwrap_or(Value::Null);
        match self.http.post_json(&url, &body).await {
            Err(e) => REST_040.fail(format!("push config create transport error: {e}")),
            Ok(exchange) if exchange.is_success() => {
                REST_040.pass(format!("push config created HTTP {}", exchange.status))
            }
            Ok(exchange) if PUSH_NOT_SUPPORTED_STATUSES.contains(&exchange.status) => {
                REST_040.pass(format!(
                    "push notifications not supported (HTTP {})",
                    exchange.status
                ))
            }
            Ok(exchange) => REST_040.fail(format!(
                "push config create HTTP {}; expected 2xx or 400/404/405/501",
                exchange.status
            )),
        }
    }

    async fn extended_card(&self, doc: Option<&CapabilityDocument>) -> Vec<Finding> {
        if !self.options.extended_card {
            return vec![REST_050.skip("extended card probe not requested")];
        }
        if !declares_extended_card(doc) {
            return vec![REST_050.skip("extended card not declared")];
        }

        let url = self.endpoint("card");
        let mut findings = vec![match self.http.exchange_anonymous(Method::GET, &url, None).await {
            Err(e) => REST_050.fail(format!("GET card transport error: {e}")),
            Ok(exchange) => REST_050.check(
                matches!(exchange.status, 401 | 403),
                format!("Without credentials HTTP {} (expected)", exchange.status),
                format!("Without credentials expected HTTP 401/403, got HTTP {}", exchange.status),
            ),
        }];

        if !self.http.has_credentials() {
            findings.push(REST_051.skip("no bearer token configured"));
            return findings;
        }

        match self.http.get(&url).await {
            Err(e) => findings.push(REST_051.fail(format!("GET card transport error: {e}"))),
            Ok(exchange) if exchange.status != 200 => {
                findings.push(REST_051.fail(format!("GET card HTTP {}", exchange.status)))
            }
            Ok(exchange) => match exchange.json() {
                Ok(card) if card.is_object() && exchange.is_json() => {
                    findings.push(REST_051.pass("Extended card returned with credentials"));
                    let schema = self.schema.as_ref();
                    findings.extend(revalidate_card(schema, &card, SectionKind::Rest));
                }
                Ok(_) => findings.push(REST_051.fail(format!(
                    "Extended card is not a JSON object (Content-Type {})",
                    exchange.content_type_label()
                ))),
                Err(e) => findings.push(REST_051.fail(format!("Extended card is not JSON: {e}"))),
            },
        }
        findings
    }
}

fn content_type(rule: Rule, exchange: &HttpExchange) -> Finding {
    rule.check(
        exchange.is_json(),
        "Content-Type application/json",
        format!("Content-Type not JSON ({})", exchange.content_type_label()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::StructuralValidator;
    use crate::config::ProbeConfig;
    use std::time::Duration;

    fn driver(base: &str) -> RestDriver {
        RestDriver::new(
            HttpClient::new(&ProbeConfig::default()).unwrap(),
            base,
            Arc::new(StructuralValidator),
            StreamValidator::new(Duration::from_secs(1)),
            DriverOptions::default(),
        )
    }

    #[test]
    fn endpoints_add_version_prefix_once() {
        assert_eq!(driver("http://h/").endpoint("message:send"), "http://h/v1/message:send");
        assert_eq!(driver("http://h/v1").endpoint("tasks/t1"), "http://h/v1/tasks/t1");
        assert_eq!(driver("http://h/api/v1/").endpoint("/card"), "http://h/api/v1/card");
    }
}
