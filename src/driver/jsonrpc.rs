//! JSON-RPC 2.0 conversation driver.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::card::{CapabilityDocument, SchemaValidator};
use crate::catalog::*;
use crate::client::{HttpClient, HttpExchange, Method};
use crate::error::{
    code_name, TransportFailure, METHOD_NOT_FOUND, PUSH_NOT_SUPPORTED_CODES, TASK_NOT_CANCELABLE,
};
use crate::report::{Finding, Outcome, Section, SectionKind};
use crate::stream::StreamValidator;
use crate::types::{
    JsonRpcRequest, ResultShape, RpcEnvelope, SendMessageParams, TaskIdParams,
    TaskPushNotificationConfig, TaskQueryParams,
};

use super::{
    declares_extended_card, revalidate_card, streaming_declared_off, DriverOptions, TaskHandle,
};

/// Method name no server implements.
const UNKNOWN_METHOD: &str = "foo/bar";

/// Text sent by `message/send`.
const PING_TEXT: &str = "ping";

/// Text sent by `message/stream`.
const STREAM_TEXT: &str = "stream test";

/// Drives one JSON-RPC endpoint through the A2A call sequence.
pub struct JsonRpcDriver {
    http: HttpClient,
    url: String,
    schema: Arc<dyn SchemaValidator>,
    streams: StreamValidator,
    options: DriverOptions,
}

impl std::fmt::Debug for JsonRpcDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonRpcDriver")
            .field("url", &self.url)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl JsonRpcDriver {
    pub fn new(
        http: HttpClient,
        url: impl Into<String>,
        schema: Arc<dyn SchemaValidator>,
        streams: StreamValidator,
        options: DriverOptions,
    ) -> Self {
        Self {
            http,
            url: url.into(),
            schema,
            streams,
            options,
        }
    }

    /// Run every step and return the `jsonrpc` section.
    pub async fn run(&self, doc: Option<&CapabilityDocument>) -> Section {
        tracing::debug!(url = %self.url, "jsonrpc driver starting");
        let mut section = Section::new(SectionKind::JsonRpc);

        section.push(self.unknown_method().await);

        let (findings, handle) = self.send_message().await;
        section.extend(findings);

        match handle {
            Some(mut handle) => {
                section.push(self.get_task(&mut handle).await);
                section.push(self.cancel_task(&handle).await);
                section.extend(self.push_configs(&handle).await);
            }
            None => {
                let reason = "message/send returned no task id";
                section.push(RPC_020.skip(reason));
                section.push(RPC_021.skip(reason));
                section.push(RPC_040.skip(reason));
            }
        }

        section.extend(self.streaming(doc).await);
        section.extend(self.extended_card(doc).await);

        tracing::info!(
            url = %self.url,
            findings = section.findings().len(),
            severity = ?section.severity(),
            "jsonrpc section complete"
        );
        section
    }

    async fn call(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<(HttpExchange, RpcEnvelope), TransportFailure> {
        let request = JsonRpcRequest::new(method, params).to_value();
        tracing::debug!(method, "jsonrpc call");
        let exchange = self.http.post_json(&self.url, &request).await?;
        let envelope = RpcEnvelope::from_slice(&exchange.body);
        Ok((exchange, envelope))
    }

    async fn call_with(
        &self,
        method: &str,
        params: &impl Serialize,
    ) -> Result<(HttpExchange, RpcEnvelope), TransportFailure> {
        self.call(method, serde_json::to_value(params).ok()).await
    }

    /// Step 1: an unknown method must be answered with -32601.
    async fn unknown_method(&self) -> Finding {
        match self.call(UNKNOWN_METHOD, None).await {
            Err(e) => RPC_001.fail(format!("{UNKNOWN_METHOD} transport error: {e}")),
            Ok((_, RpcEnvelope::Error(err))) => RPC_001.check(
                err.code == METHOD_NOT_FOUND,
                format!("Unknown method rejected with {}", err.code),
                format!(
                    "Unknown method answered with {err}; expected {METHOD_NOT_FOUND} ({})",
                    code_name(METHOD_NOT_FOUND).unwrap_or_default()
                ),
            ),
            Ok((_, RpcEnvelope::Result(_))) => {
                RPC_001.fail("Unknown method answered with a result instead of an error")
            }
            Ok((exchange, RpcEnvelope::Malformed(reason))) => RPC_001.fail(format!(
                "HTTP {} without a JSON-RPC error envelope ({reason})",
                exchange.status
            )),
        }
    }

    /// Step 2: `message/send` must return a Task or a Message.
    async fn send_message(&self) -> (Vec<Finding>, Option<TaskHandle>) {
        let params = SendMessageParams::non_blocking(PING_TEXT);
        let (exchange, envelope) = match self.call_with("message/send", &params).await {
            Ok(answer) => answer,
            Err(e) => {
                return (
                    vec![
                        RPC_010.fail(format!("message/send transport error: {e}")),
                        RPC_011.skip("no response to inspect"),
                    ],
                    None,
                )
            }
        };

        let content_type = RPC_011.check(
            exchange.is_json(),
            "Content-Type application/json",
            format!("Content-Type not JSON ({})", exchange.content_type_label()),
        );

        let (result, handle) = match envelope {
            RpcEnvelope::Error(err) => (RPC_010.fail(format!("message/send error {err}")), None),
            RpcEnvelope::Malformed(reason) => (
                RPC_010.fail(format!("message/send HTTP {}: {reason}", exchange.status)),
                None,
            ),
            RpcEnvelope::Result(value) => {
                let shape = ResultShape::classify(&value);
                let finding = match &shape {
                    ResultShape::Task { .. } => {
                        RPC_010.pass(format!("message/send returned {shape}"))
                    }
                    ResultShape::Message => {
                        RPC_010.pass("message/send returned Message (no task to follow up)")
                    }
                    ResultShape::Other(_) => RPC_010.fail(format!("message/send returned {shape}")),
                };
                (finding, TaskHandle::from_shape(&shape))
            }
        };

        (vec![result, content_type], handle)
    }

    /// Step 3: `tasks/get` must return the same Task.
    async fn get_task(&self, handle: &mut TaskHandle) -> Finding {
        let params = TaskQueryParams {
            id: handle.id.clone(),
            history_length: Some(1),
        };
        match self.call_with("tasks/get", &params).await {
            Err(e) => RPC_020.fail(format!("tasks/get transport error: {e}")),
            Ok((_, RpcEnvelope::Error(err))) => RPC_020.fail(format!("tasks/get error {err}")),
            Ok((exchange, RpcEnvelope::Malformed(reason))) => {
                RPC_020.fail(format!("tasks/get HTTP {}: {reason}", exchange.status))
            }
            Ok((_, RpcEnvelope::Result(value))) => {
                let shape = ResultShape::classify(&value);
                if shape.task_id() == Some(handle.id.as_str()) {
                    handle.observe(&shape);
                    RPC_020.pass(format!("tasks/get returned {shape}"))
                } else {
                    RPC_020.fail(format!("tasks/get expected Task {}, got {shape}", handle.id))
                }
            }
        }
    }

    /// Step 4: `tasks/cancel`; terminal tasks must be refused with -32002.
    async fn cancel_task(&self, handle: &TaskHandle) -> Finding {
        let terminal = handle.is_terminal();
        let state = handle.state_label();
        match self.call_with("tasks/cancel", &TaskIdParams::task(&handle.id)).await {
            Err(e) => RPC_021.fail(format!("tasks/cancel transport error: {e}")),
            Ok((_, RpcEnvelope::Error(err))) if err.code == TASK_NOT_CANCELABLE => {
                RPC_021.pass(format!("Task not cancelable in state {state} ({})", err.code))
            }
            Ok((_, RpcEnvelope::Error(err))) => RPC_021.fail(format!("tasks/cancel error {err}")),
            Ok((exchange, RpcEnvelope::Malformed(reason))) => {
                RPC_021.fail(format!("tasks/cancel HTTP {}: {reason}", exchange.status))
            }
            Ok((_, RpcEnvelope::Result(_))) if terminal => RPC_021.fail(format!(
                "Task in terminal state {state} was canceled; expected {TASK_NOT_CANCELABLE}"
            )),
            Ok((_, RpcEnvelope::Result(value))) => {
                let shape = ResultShape::classify(&value);
                RPC_021.check(
                    shape.task_id().is_some(),
                    format!("tasks/cancel returned {shape}"),
                    format!("tasks/cancel returned {shape}"),
                )
            }
        }
    }

    /// Step 5: push notification config set/get/list/delete.
    async fn push_configs(&self, handle: &TaskHandle) -> Vec<Finding> {
        let config = TaskPushNotificationConfig::probe(&handle.id);
        let (set, result) = self
            .push_step(RPC_040, "tasks/pushNotificationConfig/set", &config)
            .await;

        let Some(result) = result else {
            let reason = if set.outcome == Outcome::Pass {
                "push notifications not supported"
            } else {
                "pushNotificationConfig/set failed"
            };
            return vec![
                set,
                RPC_041.skip(reason),
                RPC_042.skip(reason),
                RPC_043.skip(reason),
            ];
        };

        let config_id = result
            .pointer("/pushNotificationConfig/id")
            .and_then(Value::as_str)
            .map(str::to_string);

        let mut findings = vec![set];
        let get = TaskIdParams {
            id: handle.id.clone(),
            push_notification_config_id: config_id.clone(),
        };
        findings.push(self.push_step(RPC_041, "tasks/pushNotificationConfig/get", &get).await.0);
        findings.push(
            self.push_step(
                RPC_042,
                "tasks/pushNotificationConfig/list",
                &TaskIdParams::task(&handle.id),
            )
            .await
                .0,
        );
        findings.push(match config_id {
            Some(id) => {
                let delete = TaskIdParams {
                    id: handle.id.clone(),
                    push_notification_config_id: Some(id),
                };
                self.push_step(RPC_043, "tasks/pushNotificationConfig/delete", &delete)
                    .await
                    .0
            }
            None => RPC_043.skip("no pushNotificationConfig id returned by set"),
        });
        findings
    }

    /// One push call: a result or a "not supported" code is compliant.
    /// Returns the result value when there was one.
    async fn push_step(
        &self,
        rule: Rule,
        method: &str,
        params: &impl Serialize,
    ) -> (Finding, Option<Value>) {
        match self.call_with(method, params).await {
            Err(e) => (rule.fail(format!("{method} transport error: {e}")), None),
            Ok((_, RpcEnvelope::Result(value))) => (rule.pass(format!("{method} OK")), Some(value)),
            Ok((_, RpcEnvelope::Error(err))) if PUSH_NOT_SUPPORTED_CODES.contains(&err.code) => (
                rule.pass(format!("{method} not supported ({})", err.code)),
                None,
            ),
            Ok((_, RpcEnvelope::Error(err))) => (rule.fail(format!("{method} error {err}")), None),
            Ok((exchange, RpcEnvelope::Malformed(reason))) => (
                rule.fail(format!("{method} HTTP {}: {reason}", exchange.status)),
                None,
            ),
        }
    }

    /// Step 6: `message/stream`, then `tasks/resubscribe` on the task seen.
    async fn streaming(&self, doc: Option<&CapabilityDocument>) -> Vec<Finding> {
        if !self.options.streaming {
            return vec![RPC_030.skip("streaming probe disabled")];
        }
        if streaming_declared_off(doc) {
            return vec![RPC_030.skip("capabilities.streaming is false")];
        }

        let request =
            JsonRpcRequest::with_params("message/stream", &SendMessageParams::text(STREAM_TEXT));
        let opened = self
            .http
            .open_event_stream(Method::POST, &self.url, Some(&request.to_value()))
            .await;
        let outcome = self.streams.validate(RPC_030, opened).await;

        if outcome.finding.outcome != Outcome::Pass {
            return vec![outcome.finding, RPC_032.skip("message/stream failed")];
        }

        let Some(task_id) = outcome.task_id else {
            return vec![
                outcome.finding,
                RPC_031.fail("Could not extract a task id from the stream; resubscribe skipped"),
            ];
        };

        let request =
            JsonRpcRequest::with_params("tasks/resubscribe", &TaskIdParams::task(&task_id));
        let opened = self
            .http
            .open_event_stream(Method::POST, &self.url, Some(&request.to_value()))
            .await;
        let resubscribe = self.streams.validate(RPC_032, opened).await;

        vec![
            outcome.finding,
            RPC_031.pass(format!("Stream exposed task id {task_id}")),
            resubscribe.finding,
        ]
    }

    /// Step 7: the authenticated extended card.
    async fn extended_card(&self, doc: Option<&CapabilityDocument>) -> Vec<Finding> {
        const METHOD: &str = "agent/getAuthenticatedExtendedCard";

        if !self.options.extended_card {
            return vec![RPC_050.skip("extended card probe not requested")];
        }
        if !declares_extended_card(doc) {
            return vec![RPC_050.skip("extended card not declared")];
        }

        let request = JsonRpcRequest::new(METHOD, None).to_value();
        let mut findings = vec![match self
            .http
            .exchange_anonymous(Method::POST, &self.url, Some(&request))
            .await
        {
            Err(e) => RPC_050.fail(format!("{METHOD} transport error: {e}")),
            Ok(exchange) => RPC_050.check(
                matches!(exchange.status, 401 | 403),
                format!("Without credentials HTTP {} (expected)", exchange.status),
                format!("Without credentials expected HTTP 401/403, got HTTP {}", exchange.status),
            ),
        }];

        if !self.http.has_credentials() {
            findings.push(RPC_051.skip("no bearer token configured"));
            return findings;
        }

        match self.call(METHOD, None).await {
            Err(e) => findings.push(RPC_051.fail(format!("{METHOD} transport error: {e}"))),
            Ok((_, RpcEnvelope::Error(err))) => {
                findings.push(RPC_051.fail(format!("{METHOD} error {err}")))
            }
            Ok((exchange, RpcEnvelope::Malformed(reason))) => {
                findings.push(RPC_051.fail(format!("{METHOD} HTTP {}: {reason}", exchange.status)))
            }
            Ok((_, RpcEnvelope::Result(card))) if card.is_object() => {
                findings.push(RPC_051.pass("Extended card returned with credentials"));
                findings.extend(revalidate_card(self.schema.as_ref(), &card, SectionKind::JsonRpc));
            }
            Ok((_, RpcEnvelope::Result(_))) => {
                findings.push(RPC_051.fail("Extended card result is not an object"))
            }
        }
        findings
    }
}
