//! Transport resolution: which endpoint each conversation driver talks to.
//!
//! Resolution depends only on the set of declared interfaces, never on
//! their order in the card, so the same card always yields the same
//! bindings.

use std::fmt;

use crate::card::{CapabilityDocument, InterfaceEntry};
use crate::catalog::CARD_017;
use crate::report::Finding;

/// A wire transport named by the A2A specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TransportKind {
    /// JSON-RPC 2.0 over HTTP.
    JsonRpc,
    /// gRPC.
    Grpc,
    /// HTTP+JSON (REST).
    HttpJson,
}

impl TransportKind {
    /// Exact, case-sensitive parse of a declared transport value.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "JSONRPC" => Some(TransportKind::JsonRpc),
            "GRPC" => Some(TransportKind::Grpc),
            "HTTP+JSON" => Some(TransportKind::HttpJson),
            _ => None,
        }
    }

    /// Canonical wire value.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::JsonRpc => "JSONRPC",
            TransportKind::Grpc => "GRPC",
            TransportKind::HttpJson => "HTTP+JSON",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A concrete (transport, endpoint) pair a driver exercises.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportBinding {
    pub kind: TransportKind,
    pub endpoint_url: String,
    /// The binding chosen for the card's preferred transport.
    pub preferred: bool,
}

/// Bindings plus the informational findings produced while resolving.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub bindings: Vec<TransportBinding>,
    /// Card-section findings (`CARD-017`).
    pub findings: Vec<Finding>,
}

impl Resolution {
    /// First binding of the given kind.
    pub fn binding_for(&self, kind: TransportKind) -> Option<&TransportBinding> {
        self.bindings.iter().find(|b| b.kind == kind)
    }

    fn add(&mut self, kind: TransportKind, endpoint_url: &str, preferred: bool) {
        let duplicate = self
            .bindings
            .iter()
            .any(|b| b.kind == kind && b.endpoint_url == endpoint_url);
        if !duplicate {
            self.bindings.push(TransportBinding {
                kind,
                endpoint_url: endpoint_url.to_string(),
                preferred,
            });
        }
    }
}

/// Pick one URL among the entries declaring `kind`.
///
/// An entry at the card's main url wins; otherwise the lexicographically
/// smallest URL.
fn pick<'a>(
    entries: &'a [InterfaceEntry],
    kind: TransportKind,
    main_url: Option<&str>,
) -> Option<&'a str> {
    let mut candidates: Vec<&str> = entries
        .iter()
        .filter(|e| e.transport.as_deref() == Some(kind.as_str()))
        .filter_map(|e| e.url.as_deref())
        .filter(|url| !url.is_empty())
        .collect();
    if let Some(main) = main_url.and_then(|m| candidates.iter().copied().find(|c| *c == m)) {
        return Some(main);
    }
    candidates.sort_unstable();
    candidates.first().copied()
}

/// Resolve the bindings for a card.
pub fn resolve(doc: &CapabilityDocument) -> Resolution {
    let mut resolution = Resolution::default();
    let entries = doc.interfaces();
    let main_url = doc.url.non_empty();
    let declared = doc.preferred_transport.non_empty().unwrap_or("JSONRPC");

    match TransportKind::parse(declared) {
        Some(TransportKind::JsonRpc) => {
            if let Some(url) = main_url {
                resolution.add(TransportKind::JsonRpc, url, true);
            }
        }
        preferred => {
            let chosen =
                preferred.and_then(|kind| pick(entries, kind, main_url).map(|url| (kind, url)));
            match chosen {
                Some((kind, url)) => resolution.add(kind, url, true),
                None => {
                    resolution.findings.push(CARD_017.fail(format!(
                        "preferredTransport {declared} has no additionalInterfaces entry; \
                         falling back to declared JSONRPC / HTTP+JSON interfaces"
                    )));
                    for kind in [TransportKind::JsonRpc, TransportKind::HttpJson] {
                        if let Some(url) = pick(entries, kind, main_url) {
                            resolution.add(kind, url, false);
                        }
                    }
                }
            }
        }
    }

    // Secondary bindings so both drivers can run.
    for kind in [TransportKind::JsonRpc, TransportKind::HttpJson] {
        if resolution.binding_for(kind).is_none() {
            if let Some(url) = pick(entries, kind, main_url) {
                resolution.add(kind, url, false);
            }
        }
    }

    tracing::debug!(
        bindings = ?resolution
            .bindings
            .iter()
            .map(|b| format!("{}={}", b.kind, b.endpoint_url))
            .collect::<Vec<_>>(),
        "transports resolved"
    );
    resolution
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(body: serde_json::Value) -> CapabilityDocument {
        CapabilityDocument::from_json(&body, true)
    }

    #[test]
    fn transport_values_are_exact() {
        assert_eq!(TransportKind::parse("HTTP+JSON"), Some(TransportKind::HttpJson));
        assert_eq!(TransportKind::parse("jsonrpc"), None);
        assert_eq!(TransportKind::Grpc.to_string(), "GRPC");
    }

    #[test]
    fn jsonrpc_preferred_binds_main_url() {
        let r = resolve(&doc(json!({"url": "https://x/a2a/v1", "preferredTransport": "JSONRPC"})));
        assert_eq!(r.bindings.len(), 1);
        assert_eq!(r.bindings[0].kind, TransportKind::JsonRpc);
        assert_eq!(r.bindings[0].endpoint_url, "https://x/a2a/v1");
        assert!(r.bindings[0].preferred);
        assert!(r.findings.is_empty());
    }

    #[test]
    fn missing_preferred_means_jsonrpc() {
        let r = resolve(&doc(json!({"url": "https://x/rpc"})));
        assert_eq!(r.binding_for(TransportKind::JsonRpc).unwrap().endpoint_url, "https://x/rpc");
    }

    #[test]
    fn rest_preferred_uses_interface() {
        let r = resolve(&doc(json!({
            "url": "https://x/rest",
            "preferredTransport": "HTTP+JSON",
            "additionalInterfaces": [
                {"transport": "HTTP+JSON", "url": "https://x/rest"},
                {"transport": "JSONRPC", "url": "https://x/rpc"}
            ]
        })));
        assert_eq!(r.bindings[0].kind, TransportKind::HttpJson);
        assert!(r.bindings[0].preferred);
        assert_eq!(r.binding_for(TransportKind::JsonRpc).unwrap().endpoint_url, "https://x/rpc");
        assert!(!r.binding_for(TransportKind::JsonRpc).unwrap().preferred);
    }

    #[test]
    fn choice_does_not_depend_on_entry_order() {
        let a = json!({"transport": "HTTP+JSON", "url": "https://b.example/rest"});
        let b = json!({"transport": "HTTP+JSON", "url": "https://a.example/rest"});
        let first = resolve(&doc(json!({
            "url": "https://x",
            "preferredTransport": "HTTP+JSON",
            "additionalInterfaces": [a.clone(), b.clone()]
        })));
        let second = resolve(&doc(json!({
            "url": "https://x", "preferredTransport": "HTTP+JSON", "additionalInterfaces": [b, a]
        })));
        assert_eq!(first, second);
        assert_eq!(first.bindings[0].endpoint_url, "https://a.example/rest");
    }

    #[test]
    fn unmatched_preferred_falls_back() {
        let r = resolve(&doc(json!({
            "url": "https://x",
            "preferredTransport": "GRPC",
            "additionalInterfaces": [{"transport": "HTTP+JSON", "url": "https://x/rest"}]
        })));
        assert_eq!(r.findings.len(), 1);
        assert_eq!(r.findings[0].rule_id, "CARD-017");
        assert_eq!(r.bindings.len(), 1);
        assert_eq!(r.bindings[0].kind, TransportKind::HttpJson);
    }

    #[test]
    fn grpc_only_yields_no_drivable_binding() {
        let r = resolve(&doc(json!({
            "url": "https://x/grpc",
            "preferredTransport": "GRPC",
            "additionalInterfaces": [{"transport": "GRPC", "url": "https://x/grpc"}]
        })));
        assert_eq!(r.bindings.len(), 1);
        assert_eq!(r.bindings[0].kind, TransportKind::Grpc);
        assert!(r.binding_for(TransportKind::JsonRpc).is_none());
        assert!(r.binding_for(TransportKind::HttpJson).is_none());
    }
}
