//! Rule catalog: every rule the engine can report, with its default
//! severity and the specification anchor it checks.
//!
//! The table is pure data. Checks pick a [`Rule`] and call
//! [`Rule::pass`], [`Rule::fail`] or [`Rule::skip`]; the severity of a
//! failure always comes from here.

use crate::report::{Finding, Outcome, SectionKind, Severity};

/// Default path for the agent card well-known endpoint (A2A v0.3+).
pub const DEFAULT_WELL_KNOWN_PATH: &str = "/.well-known/agent-card.json";

/// Base URL of the A2A specification all `spec_ref`s point into.
pub const SPEC_BASE: &str = "https://a2a-protocol.org/v0.3.0/specification/";

/// Rule id used for unexpected engine faults. Deliberately not in [`CATALOG`].
pub const INTERNAL_RULE_ID: &str = "INTERNAL";

/// Static metadata for one conformance rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    /// Stable, greppable identifier (e.g. `RPC-001`).
    pub id: &'static str,
    /// Section this rule reports into by default.
    pub section: SectionKind,
    /// Severity of a failing observation.
    pub severity: Severity,
    /// One-line description of what is checked.
    pub summary: &'static str,
    /// Anchor in the A2A specification.
    pub spec_ref: &'static str,
}

impl Rule {
    const fn new(
        id: &'static str,
        section: SectionKind,
        severity: Severity,
        summary: &'static str,
        spec_ref: &'static str,
    ) -> Self {
        Self {
            id,
            section,
            severity,
            summary,
            spec_ref,
        }
    }

    /// The observation satisfies the rule.
    pub fn pass(&self, message: impl Into<String>) -> Finding {
        self.finding(Outcome::Pass, Severity::Info, message)
    }

    /// The observation violates the rule; reported at the catalog severity.
    pub fn fail(&self, message: impl Into<String>) -> Finding {
        self.finding(Outcome::Fail, self.severity, message)
    }

    /// The rule could not be evaluated because a precondition was unmet.
    pub fn skip(&self, message: impl Into<String>) -> Finding {
        self.finding(Outcome::Skip, Severity::Info, message)
    }

    /// `pass` if `ok`, otherwise `fail`.
    pub fn check(&self, ok: bool, pass: impl Into<String>, fail: impl Into<String>) -> Finding {
        if ok {
            self.pass(pass)
        } else {
            self.fail(fail)
        }
    }

    fn finding(&self, outcome: Outcome, severity: Severity, message: impl Into<String>) -> Finding {
        Finding {
            rule_id: self.id,
            severity,
            outcome,
            message: message.into(),
            spec_ref: self.spec_ref,
            section: self.section,
        }
    }
}

pub use table::*;

/// The rule table, one rule per line.
#[rustfmt::skip]
mod table {
    use super::Rule;
    use crate::report::SectionKind::{Card, JsonRpc, Network, Rest, Schema};
    use crate::report::Severity::{Error, Info, Warn};

    // -- network ----------------------------------------------------------------

    pub const NET_001: Rule = Rule::new("NET-001", Network, Error, "origin reachable", "#5-agent-discovery-the-agent-card");
    pub const URL_001: Rule = Rule::new("URL-001", Network, Error, "card endpoint reachable", "#52-discovery-mechanisms");
    pub const HTTP_200: Rule = Rule::new("HTTP-200", Network, Error, "card endpoint answers HTTP 200", "#52-discovery-mechanisms");
    pub const HTTP_CT: Rule = Rule::new("HTTP-CT", Network, Error, "card served as application/json", "#52-discovery-mechanisms");
    pub const JSON_001: Rule = Rule::new("JSON-001", Network, Error, "card body parses as JSON", "#55-agentcard-object-structure");

    // -- schema -----------------------------------------------------------------

    pub const CARD_STRUCT: Rule = Rule::new("CARD-STRUCT", Schema, Error, "card matches the AgentCard schema", "#55-agentcard-object-structure");
    pub const CARD_TR_STRUCT: Rule = Rule::new("CARD-TR-STRUCT", Schema, Info, "card checks run in degraded mode", "#55-agentcard-object-structure");

    // -- card -------------------------------------------------------------------

    pub const CARD_SKIP: Rule = Rule::new("CARD-SKIP", Card, Info, "card checks skipped without a document", "#55-agentcard-object-structure");
    pub const CARD_001: Rule = Rule::new("CARD-001", Card, Error, "protocolVersion present", "#55-agentcard-object-structure");
    pub const CARD_001A: Rule = Rule::new("CARD-001a", Card, Warn, "protocolVersion is 0.3.x or dev", "#55-agentcard-object-structure");
    pub const CARD_002: Rule = Rule::new("CARD-002", Card, Error, "name present", "#55-agentcard-object-structure");
    pub const CARD_003: Rule = Rule::new("CARD-003", Card, Error, "url present and absolute http(s)", "#55-agentcard-object-structure");
    pub const CARD_004: Rule = Rule::new("CARD-004", Card, Error, "description present", "#55-agentcard-object-structure");
    pub const CARD_005: Rule = Rule::new("CARD-005", Card, Error, "version present", "#55-agentcard-object-structure");
    pub const CARD_005A: Rule = Rule::new("CARD-005a", Card, Warn, "version is semver-shaped", "#55-agentcard-object-structure");
    pub const CARD_006: Rule = Rule::new("CARD-006", Card, Error, "defaultInputModes is a non-empty string list", "#55-agentcard-object-structure");
    pub const CARD_007: Rule = Rule::new("CARD-007", Card, Error, "defaultOutputModes is a non-empty string list", "#55-agentcard-object-structure");
    pub const CARD_010: Rule = Rule::new("CARD-010", Card, Warn, "preferredTransport declared", "#56-transport-declaration-and-url-relationships");
    pub const CARD_011: Rule = Rule::new("CARD-011", Card, Warn, "preferred transport listed at the main url", "#56-transport-declaration-and-url-relationships");
    pub const CARD_012: Rule = Rule::new("CARD-012", Card, Error, "no url declared with conflicting transports", "#56-transport-declaration-and-url-relationships");
    pub const CARD_013: Rule = Rule::new("CARD-013", Card, Error, "at least one transport declared", "#56-transport-declaration-and-url-relationships");
    pub const CARD_016: Rule = Rule::new("CARD-016", Card, Error, "transport values are JSONRPC, GRPC or HTTP+JSON", "#32-supported-transport-protocols");
    pub const CARD_017: Rule = Rule::new("CARD-017", Card, Info, "preferred transport resolved from additionalInterfaces", "#56-transport-declaration-and-url-relationships");
    pub const CARD_020: Rule = Rule::new("CARD-020", Card, Error, "capabilities.streaming boolean or absent", "#552-agentcapabilities-object");
    pub const CARD_021: Rule = Rule::new("CARD-021", Card, Error, "capabilities.pushNotifications boolean or absent", "#552-agentcapabilities-object");
    pub const CARD_022: Rule = Rule::new("CARD-022", Card, Error, "capabilities.stateTransitionHistory boolean or absent", "#552-agentcapabilities-object");
    pub const CARD_023: Rule = Rule::new("CARD-023", Card, Warn, "capabilities.extensions entries carry a uri", "#553-agentextension-object");
    pub const CARD_030: Rule = Rule::new("CARD-030", Card, Error, "skills present", "#554-agentskill-object");
    pub const CARD_031: Rule = Rule::new("CARD-031", Card, Error, "skill ids unique", "#554-agentskill-object");
    pub const CARD_032: Rule = Rule::new("CARD-032", Card, Error, "every skill has a description", "#554-agentskill-object");
    pub const CARD_033: Rule = Rule::new("CARD-033", Card, Warn, "every skill has non-empty tags", "#554-agentskill-object");
    pub const CARD_041: Rule = Rule::new("CARD-041", Card, Error, "security requirements reference declared schemes", "#4-authentication-and-authorization");
    pub const CARD_043: Rule = Rule::new("CARD-043", Card, Error, "authenticated extended card requires securitySchemes", "#4-authentication-and-authorization");
    pub const CARD_050: Rule = Rule::new("CARD-050", Card, Warn, "provider has organization and url", "#551-agentprovider-object");
    pub const CARD_051: Rule = Rule::new("CARD-051", Card, Warn, "iconUrl is an absolute http(s) url", "#55-agentcard-object-structure");

    // -- JSON-RPC ---------------------------------------------------------------

    pub const RPC_URL: Rule = Rule::new("RPC-URL", JsonRpc, Info, "JSON-RPC interface declared", "#56-transport-declaration-and-url-relationships");
    pub const RPC_001: Rule = Rule::new("RPC-001", JsonRpc, Error, "unknown method answered with -32601", "#82-a2a-specific-errors");
    pub const RPC_010: Rule = Rule::new("RPC-010", JsonRpc, Error, "message/send returns Task or Message", "#71-messagesend");
    pub const RPC_011: Rule = Rule::new("RPC-011", JsonRpc, Error, "message/send answers application/json", "#321-json-rpc-20-transport");
    pub const RPC_020: Rule = Rule::new("RPC-020", JsonRpc, Error, "tasks/get returns the Task", "#73-tasksget");
    pub const RPC_021: Rule = Rule::new("RPC-021", JsonRpc, Error, "tasks/cancel returns Task or -32002", "#74-taskscancel");
    pub const RPC_030: Rule = Rule::new("RPC-030", JsonRpc, Error, "message/stream yields SSE events in time", "#72-messagestream");
    pub const RPC_031: Rule = Rule::new("RPC-031", JsonRpc, Warn, "stream exposes a task id", "#72-messagestream");
    pub const RPC_032: Rule = Rule::new("RPC-032", JsonRpc, Error, "tasks/resubscribe yields SSE events in time", "#79-tasksresubscribe");
    pub const RPC_040: Rule = Rule::new("RPC-040", JsonRpc, Error, "pushNotificationConfig/set result or not-supported", "#75-taskspushnotificationconfigset");
    pub const RPC_041: Rule = Rule::new("RPC-041", JsonRpc, Error, "pushNotificationConfig/get result or not-supported", "#76-taskspushnotificationconfigget");
    pub const RPC_042: Rule = Rule::new("RPC-042", JsonRpc, Error, "pushNotificationConfig/list result or not-supported", "#77-taskspushnotificationconfiglist");
    pub const RPC_043: Rule = Rule::new("RPC-043", JsonRpc, Error, "pushNotificationConfig/delete result or not-supported", "#78-taskspushnotificationconfigdelete");
    pub const RPC_050: Rule = Rule::new("RPC-050", JsonRpc, Error, "extended card requires authentication", "#710-agentgetauthenticatedextendedcard");
    pub const RPC_051: Rule = Rule::new("RPC-051", JsonRpc, Error, "extended card with credentials is a valid card", "#710-agentgetauthenticatedextendedcard");
    pub const RPC_STREAM: Rule = Rule::new("RPC-STREAM", JsonRpc, Error, "message/stream yields SSE events in time", "#72-messagestream");

    // -- HTTP+JSON --------------------------------------------------------------

    pub const REST_URL: Rule = Rule::new("REST-URL", Rest, Info, "HTTP+JSON interface declared", "#56-transport-declaration-and-url-relationships");
    pub const REST_010: Rule = Rule::new("REST-010", Rest, Error, "POST message:send answers 2xx", "#323-httpjsonrest-transport");
    pub const REST_011: Rule = Rule::new("REST-011", Rest, Error, "message:send answers application/json", "#323-httpjsonrest-transport");
    pub const REST_012: Rule = Rule::new("REST-012", Rest, Error, "message:send returns Task or Message", "#71-messagesend");
    pub const REST_020: Rule = Rule::new("REST-020", Rest, Error, "POST message:stream yields SSE events in time", "#72-messagestream");
    pub const REST_030: Rule = Rule::new("REST-030", Rest, Error, "GET tasks/{id} returns the Task", "#73-tasksget");
    pub const REST_031: Rule = Rule::new("REST-031", Rest, Error, "GET tasks/{id} answers application/json", "#323-httpjsonrest-transport");
    pub const REST_032: Rule = Rule::new("REST-032", Rest, Error, "POST tasks/{id}:cancel answers 2xx or 409", "#74-taskscancel");
    pub const REST_033: Rule = Rule::new("REST-033", Rest, Error, "POST tasks/{id}:subscribe yields SSE events in time", "#79-tasksresubscribe");
    pub const REST_040: Rule = Rule::new("REST-040", Rest, Error, "push config create answers 2xx or not-supported", "#75-taskspushnotificationconfigset");
    pub const REST_050: Rule = Rule::new("REST-050", Rest, Error, "GET card requires authentication", "#710-agentgetauthenticatedextendedcard");
    pub const REST_051: Rule = Rule::new("REST-051", Rest, Error, "GET card with credentials is a valid card", "#710-agentgetauthenticatedextendedcard");

    /// Every catalogued rule, in declaration order.
    pub static CATALOG: &[Rule] = &[
        NET_001, URL_001, HTTP_200, HTTP_CT, JSON_001,
        CARD_STRUCT, CARD_TR_STRUCT,
        CARD_SKIP, CARD_001, CARD_001A, CARD_002, CARD_003, CARD_004, CARD_005, CARD_005A,
        CARD_006, CARD_007, CARD_010, CARD_011, CARD_012, CARD_013, CARD_016, CARD_017,
        CARD_020, CARD_021, CARD_022, CARD_023, CARD_030, CARD_031, CARD_032, CARD_033,
        CARD_041, CARD_043, CARD_050, CARD_051,
        RPC_URL, RPC_001, RPC_010, RPC_011, RPC_020, RPC_021, RPC_030, RPC_031, RPC_032,
        RPC_040, RPC_041, RPC_042, RPC_043, RPC_050, RPC_051, RPC_STREAM,
        REST_URL, REST_010, REST_011, REST_012, REST_020, REST_030, REST_031, REST_032,
        REST_033, REST_040, REST_050, REST_051,
    ];
}

/// Look a rule up by id.
pub fn lookup(id: &str) -> Option<&'static Rule> {
    CATALOG.iter().find(|rule| rule.id == id)
}

/// Full URL of a rule's specification anchor.
pub fn spec_url(rule: &Rule) -> String {
    format!("{SPEC_BASE}{}", rule.spec_ref)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique() {
        let mut seen = HashSet::new();
        for rule in CATALOG {
            assert!(seen.insert(rule.id), "duplicate rule id {}", rule.id);
        }
    }

    #[test]
    fn every_table_rule_is_found_by_id() {
        for rule in CATALOG {
            assert_eq!(lookup(rule.id), Some(rule));
        }
        assert_eq!(lookup("NET-001"), Some(&NET_001));
        assert_eq!(lookup("REST-URL"), Some(&REST_URL));
    }

    #[test]
    fn internal_id_is_not_catalogued() {
        assert!(lookup(INTERNAL_RULE_ID).is_none());
    }

    #[test]
    fn lookup_finds_rules() {
        assert_eq!(lookup("RPC-001"), Some(&RPC_001));
        assert_eq!(lookup("CARD-043").map(|r| r.severity), Some(Severity::Error));
        assert!(lookup("NOPE-1").is_none());
    }

    #[test]
    fn pass_and_skip_are_info() {
        assert_eq!(RPC_001.pass("ok").severity, Severity::Info);
        assert_eq!(RPC_001.skip("n/a").severity, Severity::Info);
        assert_eq!(RPC_001.fail("bad").severity, Severity::Error);
        assert_eq!(CARD_033.fail("bad").severity, Severity::Warn);
    }

    #[test]
    fn findings_inherit_rule_metadata() {
        let finding = REST_URL.skip("no interface");
        assert_eq!(finding.rule_id, "REST-URL");
        assert_eq!(finding.section, SectionKind::Rest);
        assert_eq!(finding.outcome, Outcome::Skip);
        assert_eq!(finding.spec_ref, REST_URL.spec_ref);
    }

    #[test]
    fn spec_url_joins_anchor() {
        assert!(spec_url(&RPC_001).starts_with(SPEC_BASE));
        assert!(spec_url(&RPC_001).ends_with("#82-a2a-specific-errors"));
    }
}
