//! Agent card discovery.
//!
//! Implements the well-known URI convention: probe the origin, then fetch
//! the card and record one network finding per step. A body is only handed
//! on when it parsed as JSON.

use reqwest::Url;
use serde_json::Value;

use crate::catalog::{HTTP_200, HTTP_CT, JSON_001, NET_001, URL_001};
use crate::client::HttpClient;
use crate::report::Finding;

/// Prefix `http://` when the input has no scheme.
pub fn ensure_scheme(target: &str) -> String {
    if target.contains("://") {
        target.to_string()
    } else {
        format!("http://{target}")
    }
}

/// `scheme://host[:port]` for a target URL.
pub fn build_origin(target: &str) -> String {
    let with_scheme = ensure_scheme(target);
    match Url::parse(&with_scheme) {
        Ok(url) if url.has_host() => {
            let origin = url.origin().ascii_serialization();
            if origin == "null" {
                fallback_origin(&with_scheme)
            } else {
                origin
            }
        }
        _ => fallback_origin(&with_scheme),
    }
}

fn fallback_origin(with_scheme: &str) -> String {
    let (scheme, rest) = with_scheme.split_once("://").unwrap_or(("http", with_scheme));
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    format!("{scheme}://{host}")
}

/// Work out the card URL from a target or an explicit override.
///
/// A target that already names `agent-card.json` is used as is; otherwise
/// the well-known path is appended to the target's origin.
pub fn resolve_card_url(target: &str, card_url: Option<&str>, well_known_path: &str) -> String {
    if let Some(card_url) = card_url.filter(|u| !u.is_empty()) {
        return ensure_scheme(card_url);
    }
    let target = ensure_scheme(target);
    if target.contains("/.well-known/agent-card.json") || target.ends_with("agent-card.json") {
        return target;
    }
    let path = if well_known_path.starts_with('/') {
        well_known_path.to_string()
    } else {
        format!("/{well_known_path}")
    };
    format!("{}{path}", build_origin(&target))
}

/// Result of discovering a card.
#[derive(Debug, Clone)]
pub struct Discovery {
    /// The card URL that was fetched.
    pub card_url: String,
    /// Network-section findings, in step order.
    pub findings: Vec<Finding>,
    /// The parsed card body, when it was JSON.
    pub body: Option<Value>,
}

/// Probe the origin and fetch the card.
///
/// Never fails: every transport problem becomes a finding. The card fetch
/// runs even when the origin is unreachable.
pub async fn discover(
    http: &HttpClient,
    target: &str,
    card_url: Option<&str>,
    well_known_path: &str,
) -> Discovery {
    let origin = build_origin(target);
    let card_url = resolve_card_url(target, card_url, well_known_path);

    tracing::debug!(%origin, %card_url, "discovering agent card");

    let mut findings = vec![check_origin(http, &origin).await];
    let (fetched, body) = fetch_card(http, &card_url).await;
    findings.extend(fetched);

    Discovery {
        card_url,
        findings,
        body,
    }
}

/// `NET-001`: any HTTP answer from the origin counts as reachable.
pub async fn check_origin(http: &HttpClient, origin: &str) -> Finding {
    match http.get(origin).await {
        Ok(resp) => NET_001.pass(format!("Origin reachable HTTP {}", resp.status)),
        Err(e) => {
            tracing::warn!(%origin, error = %e, "origin not reachable");
            NET_001.fail(format!("Origin not reachable: {e}"))
        }
    }
}

/// GET the card URL and classify the answer (`URL-001`, `HTTP-200`,
/// `HTTP-CT`, `JSON-001`).
pub async fn fetch_card(http: &HttpClient, card_url: &str) -> (Vec<Finding>, Option<Value>) {
    let resp = match http.get(card_url).await {
        Ok(resp) => resp,
        Err(e) => {
            tracing::warn!(%card_url, error = %e, "card endpoint not reachable");
            return (vec![URL_001.fail(format!("Card endpoint not reachable: {e}"))], None);
        }
    };

    let mut findings = vec![
        URL_001.pass(format!("Card endpoint reachable HTTP {}", resp.status)),
        HTTP_200.check(
            resp.status == 200,
            "HTTP 200 OK",
            format!("Unexpected HTTP status {}", resp.status),
        ),
        HTTP_CT.check(
            resp.is_json(),
            format!("Content-Type {}", resp.content_type_label()),
            format!("Content-Type not JSON ({})", resp.content_type_label()),
        ),
    ];

    let body = match resp.json() {
        Ok(body) => {
            findings.push(JSON_001.pass("JSON parsed"));
            Some(body)
        }
        Err(e) => {
            findings.push(JSON_001.fail(format!("JSON parse error: {e}")));
            None
        }
    };
    (findings, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_is_defaulted() {
        assert_eq!(ensure_scheme("localhost:8080"), "http://localhost:8080");
        assert_eq!(ensure_scheme("https://x"), "https://x");
    }

    #[test]
    fn origin_drops_path() {
        assert_eq!(build_origin("https://x.example/a2a/v1"), "https://x.example");
        assert_eq!(build_origin("localhost:9999/a2a"), "http://localhost:9999");
    }

    #[test]
    fn card_url_resolution() {
        let wk = "/.well-known/agent-card.json";
        assert_eq!(
            resolve_card_url("http://h:1/a2a", None, wk),
            "http://h:1/.well-known/agent-card.json"
        );
        assert_eq!(
            resolve_card_url("h:1", None, ".well-known/custom.json"),
            "http://h:1/.well-known/custom.json"
        );
        assert_eq!(
            resolve_card_url("http://h/cards/agent-card.json", None, wk),
            "http://h/cards/agent-card.json"
        );
        assert_eq!(
            resolve_card_url("http://h", Some("other:2/card.json"), wk),
            "http://other:2/card.json"
        );
    }
}
