//! HTTP+JSON driver runs against the in-process mock agent.

mod common;

use common::{card_with_rest, config, start_mock, suite, MockAgent};

use a2a_check::report::{Section, SectionKind};
use a2a_check::{Outcome, Report, Severity};

async fn rest_run(agent: MockAgent) -> Report {
    let (base_url, _handle) = start_mock(MockAgent {
        card: card_with_rest(),
        ..agent
    })
    .await;
    suite(config()).suite_all(&base_url, None).await
}

fn rest(report: &Report) -> &Section {
    report.section(SectionKind::Rest).unwrap()
}

fn position(section: &Section, rule: &str) -> usize {
    section.findings().iter().position(|f| f.rule_id == rule).unwrap()
}

#[tokio::test]
async fn subscribe_runs_while_the_task_is_live() {
    let report = rest_run(MockAgent::default()).await;
    let rest = rest(&report);

    for rule in ["REST-010", "REST-012", "REST-030", "REST-033", "REST-032"] {
        assert_eq!(rest.find(rule).unwrap().outcome, Outcome::Pass, "{rule}: {report}");
    }
    // The mock refuses to stream a canceled task, so cancel must come last.
    assert!(position(rest, "REST-033") < position(rest, "REST-032"));
    assert!(position(rest, "REST-040") < position(rest, "REST-032"));
    assert!(!rest.has_errors(), "{report}");
}

#[tokio::test]
async fn terminal_task_cancel_answers_conflict() {
    let report = rest_run(MockAgent {
        task_state: "completed",
        ..Default::default()
    })
    .await;
    let rest = rest(&report);

    let cancel = rest.find("REST-032").unwrap();
    assert_eq!(cancel.outcome, Outcome::Pass);
    assert_eq!(cancel.message, "Terminal task refused with HTTP 409");

    let subscribe = rest.find("REST-033").unwrap();
    assert_eq!(subscribe.outcome, Outcome::Skip);
    assert!(subscribe.message.contains("terminal state completed"), "{}", subscribe.message);
}

#[tokio::test]
async fn push_config_create_supported() {
    let report = rest_run(MockAgent {
        push_supported: true,
        ..Default::default()
    })
    .await;
    let push = rest(&report).find("REST-040").unwrap();
    assert_eq!(push.outcome, Outcome::Pass);
    assert!(push.message.starts_with("push config created HTTP 200"), "{}", push.message);
}

#[tokio::test]
async fn push_config_not_supported_is_accepted() {
    let report = rest_run(MockAgent::default()).await;
    let push = rest(&report).find("REST-040").unwrap();
    assert_eq!(push.outcome, Outcome::Pass);
    assert_eq!(push.message, "push notifications not supported (HTTP 501)");
}

#[tokio::test]
async fn message_result_skips_rest_task_steps() {
    let report = rest_run(MockAgent {
        message_only: true,
        ..Default::default()
    })
    .await;
    let rest = rest(&report);

    assert_eq!(rest.find("REST-012").unwrap().outcome, Outcome::Pass);
    assert_eq!(rest.find("REST-030").unwrap().outcome, Outcome::Skip);
    for rule in ["REST-031", "REST-032", "REST-033", "REST-040"] {
        assert!(!rest.contains(rule), "{rule} should not run without a task");
    }
    assert!(!rest.has_errors(), "{report}");
}

#[tokio::test]
async fn plain_text_send_fails_content_type_and_shape() {
    let report = rest_run(MockAgent {
        rest_send_body: Some(("text/plain", "ok")),
        ..Default::default()
    })
    .await;
    let rest = rest(&report);

    assert_eq!(rest.find("REST-010").unwrap().outcome, Outcome::Pass);
    let content_type = rest.find("REST-011").unwrap();
    assert_eq!(content_type.outcome, Outcome::Fail);
    assert!(content_type.message.contains("text/plain"), "{}", content_type.message);
    let shape = rest.find("REST-012").unwrap();
    assert_eq!(shape.outcome, Outcome::Fail);
    assert!(shape.message.contains("not JSON"), "{}", shape.message);
    assert_eq!(rest.find("REST-030").unwrap().outcome, Outcome::Skip);
    assert_eq!(report.exit_code(false), 1);
}

#[tokio::test]
async fn json_send_without_task_or_message_fails_shape() {
    let report = rest_run(MockAgent {
        rest_send_body: Some(("application/json", r#"{"status":"ok"}"#)),
        ..Default::default()
    })
    .await;
    let rest = rest(&report);

    assert_eq!(rest.find("REST-011").unwrap().outcome, Outcome::Pass);
    let shape = rest.find("REST-012").unwrap();
    assert_eq!(shape.outcome, Outcome::Fail);
    assert_eq!(shape.severity, Severity::Error);
    assert_eq!(rest.find("REST-030").unwrap().outcome, Outcome::Skip);
}
