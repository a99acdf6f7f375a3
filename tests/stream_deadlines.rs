//! Deadline behavior of the stream validator.
//!
//! The paused-clock tests feed synthetic chunks through
//! `EventStream::from_chunks`, so virtual time decides every outcome.

mod common;

use std::time::Duration;

use a2a_check::catalog::{RPC_030, RPC_STREAM};
use a2a_check::client::EventStream;
use a2a_check::error::{FailureKind, TransportFailure};
use a2a_check::report::SectionKind;
use a2a_check::stream::StreamValidator;
use a2a_check::Outcome;
use common::{config, start_mock, suite, MockAgent};

type Chunk = Result<Vec<u8>, TransportFailure>;

fn event(data: &str) -> Chunk {
    Ok(format!("data: {data}\n\n").into_bytes())
}

fn sse_stream<S>(chunks: S) -> EventStream
where
    S: futures::Stream<Item = Chunk> + Send + 'static,
{
    EventStream::from_chunks(200, Some("text/event-stream".into()), chunks)
}

#[tokio::test(start_paused = true)]
async fn event_inside_window_passes() {
    let chunks = async_stream::stream! {
        tokio::time::sleep(Duration::from_secs(5)).await;
        yield event(r#"{"jsonrpc":"2.0","id":1,"result":{"kind":"task","id":"t-9","status":{"state":"submitted"}}}"#);
    };
    let outcome = StreamValidator::new(Duration::from_secs(12))
        .validate(RPC_030, Ok(sse_stream(chunks)))
        .await;

    assert_eq!(outcome.finding.outcome, Outcome::Pass, "{}", outcome.finding.message);
    assert!(outcome.finding.message.starts_with("First event after 5.0"));
    assert_eq!(outcome.task_id.as_deref(), Some("t-9"));
}

#[tokio::test(start_paused = true)]
async fn silent_stream_times_out() {
    let chunks = async_stream::stream! {
        tokio::time::sleep(Duration::from_secs(20)).await;
        yield event(r#"{"kind":"task","id":"late"}"#);
    };
    let outcome = StreamValidator::new(Duration::from_secs(12))
        .validate(RPC_030, Ok(sse_stream(chunks)))
        .await;

    assert_eq!(outcome.finding.outcome, Outcome::Fail);
    assert_eq!(outcome.finding.message, "Timeout: no well-formed event within 12.0s");
    assert!(outcome.task_id.is_none());
}

#[tokio::test(start_paused = true)]
async fn error_envelopes_do_not_count_as_events() {
    let chunks = async_stream::stream! {
        yield event(r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32603,"message":"x"}}"#);
        yield event("not json");
        futures::future::pending::<()>().await;
    };
    let outcome = StreamValidator::new(Duration::from_secs(3))
        .validate(RPC_030, Ok(sse_stream(chunks)))
        .await;

    assert_eq!(outcome.finding.outcome, Outcome::Fail);
    assert!(outcome.finding.message.starts_with("Timeout"));
    assert_eq!(outcome.events_seen, 2);
}

#[tokio::test(start_paused = true)]
async fn reading_continues_until_task_id_within_deadline() {
    let chunks = async_stream::stream! {
        yield event(r#"{"kind":"message","messageId":"m1","parts":[]}"#);
        tokio::time::sleep(Duration::from_secs(2)).await;
        yield event(r#"{"kind":"status-update","taskId":"t-2","status":{"state":"working"}}"#);
        futures::future::pending::<()>().await;
    };
    let outcome = StreamValidator::new(Duration::from_secs(12))
        .validate(RPC_030, Ok(sse_stream(chunks)))
        .await;

    assert_eq!(outcome.finding.outcome, Outcome::Pass);
    assert!(outcome.finding.message.starts_with("First event after 0.00s"));
    assert_eq!(outcome.task_id.as_deref(), Some("t-2"));
}

#[tokio::test(start_paused = true)]
async fn first_event_without_task_id_still_passes() {
    let chunks = async_stream::stream! {
        yield event(r#"{"kind":"message","messageId":"m1","parts":[]}"#);
        futures::future::pending::<()>().await;
    };
    let outcome = StreamValidator::new(Duration::from_secs(4))
        .validate(RPC_030, Ok(sse_stream(chunks)))
        .await;

    assert_eq!(outcome.finding.outcome, Outcome::Pass);
    assert!(outcome.task_id.is_none());
}

#[tokio::test]
async fn wrong_content_type_fails_without_reading() {
    let stream = EventStream::from_chunks(
        200,
        Some("application/json".into()),
        futures::stream::iter(vec![event(r#"{"kind":"task","id":"t"}"#)]),
    );
    let outcome = StreamValidator::new(Duration::from_secs(1))
        .validate(RPC_030, Ok(stream))
        .await;

    assert_eq!(outcome.finding.outcome, Outcome::Fail);
    assert!(outcome.finding.message.contains("application/json"));
    assert_eq!(outcome.events_seen, 0);
}

#[tokio::test]
async fn open_failure_is_a_fail() {
    let failure = TransportFailure::new(FailureKind::Connect, "refused");
    let outcome = StreamValidator::new(Duration::from_secs(1))
        .validate(RPC_030, Err(failure))
        .await;
    assert_eq!(outcome.finding.outcome, Outcome::Fail);
    assert!(outcome.finding.message.contains("refused"));
}

#[tokio::test]
async fn stream_ended_early_fails() {
    let outcome = StreamValidator::new(Duration::from_secs(1))
        .validate(RPC_030, Ok(sse_stream(futures::stream::iter(vec![event("[]")]))))
        .await;
    assert_eq!(outcome.finding.outcome, Outcome::Fail);
    assert!(outcome.finding.message.starts_with("Stream ended"));
}

#[tokio::test]
async fn rpc_stream_against_live_server() {
    let (base_url, _handle) = start_mock(MockAgent::default()).await;
    let report = suite(config()).rpc_stream(&format!("{base_url}/a2a"), "stream test").await;

    let section = report.section(SectionKind::JsonRpc).unwrap();
    assert_eq!(section.findings().len(), 1);
    assert_eq!(section.findings()[0].rule_id, RPC_STREAM.id);
    assert_eq!(section.findings()[0].outcome, Outcome::Pass);
}

#[tokio::test]
async fn rpc_stream_slow_server_times_out() {
    let (base_url, _handle) = start_mock(MockAgent {
        stream_delay: Duration::from_secs(5),
        ..Default::default()
    })
    .await;
    let config = config().with_stream_timeout(Duration::from_millis(300));
    let report = suite(config).rpc_stream(&format!("{base_url}/a2a"), "stream test").await;

    let finding = &report.section(SectionKind::JsonRpc).unwrap().findings()[0];
    assert_eq!(finding.outcome, Outcome::Fail);
    assert!(finding.message.starts_with("Timeout"), "{}", finding.message);
    assert_eq!(report.exit_code(false), 1);
}
