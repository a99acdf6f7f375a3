//! Findings, sections and the report they aggregate into.
//!
//! Findings are append-only values: a check creates one, a [`Section`]
//! stores it, and nothing edits it afterwards. Severity rolls up from
//! findings to sections to the whole [`Report`], which decides the process
//! exit code.

use std::fmt;

use serde::Serialize;

use crate::catalog::INTERNAL_RULE_ID;

/// Severity of a finding, ordered `Info < Warn < Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Informational; never affects the exit code.
    Info,
    /// Recommended behavior missing; fails the run only with `--fail-on-warn`.
    Warn,
    /// Conformance violation; fails the run.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warn => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// What a check concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The rule holds.
    Pass,
    /// The rule is violated.
    Fail,
    /// The rule was not evaluated (precondition unmet). Not an error.
    Skip,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Pass => write!(f, "pass"),
            Outcome::Fail => write!(f, "fail"),
            Outcome::Skip => write!(f, "skip"),
        }
    }
}

/// Probing phase a finding belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    /// Origin and card endpoint reachability.
    Network,
    /// Structural validation of the card.
    Schema,
    /// Semantic card rules.
    Card,
    /// JSON-RPC transport conversation.
    #[serde(rename = "jsonrpc")]
    JsonRpc,
    /// HTTP+JSON transport conversation.
    Rest,
}

impl SectionKind {
    /// Lowercase name used in rendered rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::Network => "network",
            SectionKind::Schema => "schema",
            SectionKind::Card => "card",
            SectionKind::JsonRpc => "jsonrpc",
            SectionKind::Rest => "rest",
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified observation.
///
/// Built through [`crate::catalog::Rule`] (`pass`/`fail`/`skip`) or
/// [`Finding::internal`]; checks never choose a severity themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    /// Catalog rule id, or `INTERNAL`.
    #[serde(rename = "rule")]
    pub rule_id: &'static str,
    /// Severity after applying the catalog policy.
    pub severity: Severity,
    /// Pass, fail or skip.
    pub outcome: Outcome,
    /// Human-readable detail.
    pub message: String,
    /// Specification anchor.
    pub spec_ref: &'static str,
    /// Owning section.
    pub section: SectionKind,
}

impl Finding {
    /// An unexpected engine fault, reported as ERROR outside the catalog.
    pub fn internal(section: SectionKind, message: impl Into<String>) -> Self {
        Self {
            rule_id: INTERNAL_RULE_ID,
            severity: Severity::Error,
            outcome: Outcome::Fail,
            message: message.into(),
            spec_ref: "",
            section,
        }
    }

    /// Re-home a not-yet-recorded finding into another section.
    pub fn within(self, section: SectionKind) -> Self {
        Self { section, ..self }
    }

    /// Prefix the message, consuming the finding.
    pub fn prefixed(self, prefix: &str) -> Self {
        Self {
            message: format!("{prefix}{}", self.message),
            ..self
        }
    }

    /// Returns `true` if this finding is a failure.
    pub fn is_failure(&self) -> bool {
        self.outcome == Outcome::Fail
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.section, self.rule_id, self.severity, self.outcome, self.message, self.spec_ref
        )
    }
}

/// An ordered group of findings for one probing phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    /// Which phase this is.
    pub kind: SectionKind,
    findings: Vec<Finding>,
    /// Set when the card failed schema validation and results here carry
    /// reduced confidence.
    pub degraded: bool,
}

impl Section {
    /// An empty section.
    pub fn new(kind: SectionKind) -> Self {
        Self {
            kind,
            findings: Vec::new(),
            degraded: false,
        }
    }

    /// A section holding the given findings, in order.
    pub fn with_findings(kind: SectionKind, findings: Vec<Finding>) -> Self {
        let mut section = Self::new(kind);
        section.extend(findings);
        section
    }

    /// Append one finding.
    pub fn push(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    /// Append several findings, preserving their order.
    pub fn extend(&mut self, findings: impl IntoIterator<Item = Finding>) {
        self.findings.extend(findings);
    }

    /// Mark results as reduced-confidence.
    pub fn mark_degraded(&mut self) {
        self.degraded = true;
    }

    /// Findings in declaration order.
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// Highest severity present, or `None` when the section is empty.
    pub fn severity(&self) -> Option<Severity> {
        self.findings.iter().map(|f| f.severity).max()
    }

    /// Returns `true` if the section has no findings at all.
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    /// Returns `true` if any finding is at ERROR severity.
    pub fn has_errors(&self) -> bool {
        self.severity() == Some(Severity::Error)
    }

    /// Returns `true` if any finding with the given rule id exists.
    pub fn contains(&self, rule_id: &str) -> bool {
        self.findings.iter().any(|f| f.rule_id == rule_id)
    }

    /// First finding with the given rule id.
    pub fn find(&self, rule_id: &str) -> Option<&Finding> {
        self.findings.iter().find(|f| f.rule_id == rule_id)
    }
}

/// One rendered report row.
pub type Row<'a> = (&'a str, &'a str, Severity, Outcome, &'a str, &'a str);

/// The result of one invocation: sections in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    sections: Vec<Section>,
}

impl Report {
    /// An empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a section.
    pub fn push(&mut self, section: Section) {
        self.sections.push(section);
    }

    /// Sections in execution order.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// First section of the given kind.
    pub fn section(&self, kind: SectionKind) -> Option<&Section> {
        self.sections.iter().find(|s| s.kind == kind)
    }

    /// Every finding, flattened in section then declaration order.
    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.sections.iter().flat_map(|s| s.findings.iter())
    }

    /// Flat `(section, rule, severity, outcome, message, spec_ref)` rows.
    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.findings().map(|f| {
            (
                f.section.as_str(),
                f.rule_id,
                f.severity,
                f.outcome,
                f.message.as_str(),
                f.spec_ref,
            )
        })
    }

    /// Highest severity across all sections.
    pub fn severity(&self) -> Option<Severity> {
        self.sections.iter().filter_map(Section::severity).max()
    }

    /// Count of findings at exactly the given severity.
    pub fn count(&self, severity: Severity) -> usize {
        self.findings().filter(|f| f.severity == severity).count()
    }

    /// Process exit code: `1` on any ERROR, `2` on WARN with
    /// `fail_on_warn`, otherwise `0`.
    pub fn exit_code(&self, fail_on_warn: bool) -> i32 {
        match self.severity() {
            Some(Severity::Error) => 1,
            Some(Severity::Warn) if fail_on_warn => 2,
            _ => 0,
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for finding in self.findings() {
            writeln!(f, "{finding}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CARD_001, CARD_033, NET_001, RPC_001};

    #[test]
    fn severity_ordering() {
        assert!(Severity::Error > Severity::Warn);
        assert!(Severity::Warn > Severity::Info);
    }

    #[test]
    fn empty_section_is_clean() {
        let section = Section::new(SectionKind::Card);
        assert!(section.is_clean());
        assert_eq!(section.severity(), None);
    }

    #[test]
    fn section_severity_is_max() {
        let mut section = Section::new(SectionKind::Card);
        section.push(CARD_001.pass("ok"));
        assert_eq!(section.severity(), Some(Severity::Info));
        section.push(CARD_033.fail("tags missing"));
        assert_eq!(section.severity(), Some(Severity::Warn));
        section.push(CARD_001.fail("missing"));
        assert_eq!(section.severity(), Some(Severity::Error));
        assert!(section.has_errors());
    }

    #[test]
    fn exit_codes() {
        let mut report = Report::new();
        assert_eq!(report.exit_code(true), 0);

        report.push(Section::with_findings(
            SectionKind::Card,
            vec![CARD_033.fail("warn")],
        ));
        assert_eq!(report.exit_code(false), 0);
        assert_eq!(report.exit_code(true), 2);

        report.push(Section::with_findings(
            SectionKind::Network,
            vec![NET_001.fail("down")],
        ));
        assert_eq!(report.exit_code(false), 1);
        assert_eq!(report.exit_code(true), 1);
    }

    #[test]
    fn skips_never_raise_exit_code() {
        let report = {
            let mut r = Report::new();
            r.push(Section::with_findings(
                SectionKind::JsonRpc,
                vec![RPC_001.skip("not run")],
            ));
            r
        };
        assert_eq!(report.exit_code(true), 0);
    }

    #[test]
    fn internal_finding_is_error() {
        let finding = Finding::internal(SectionKind::Rest, "panicked");
        assert_eq!(finding.rule_id, "INTERNAL");
        assert_eq!(finding.severity, Severity::Error);
    }

    #[test]
    fn within_rehomes_finding() {
        let finding = CARD_001.fail("missing").within(SectionKind::JsonRpc);
        assert_eq!(finding.section, SectionKind::JsonRpc);
        assert_eq!(finding.rule_id, "CARD-001");
    }

    #[test]
    fn rows_render_tab_separated() {
        let mut report = Report::new();
        report.push(Section::with_findings(
            SectionKind::Network,
            vec![NET_001.pass("Origin reachable HTTP 200")],
        ));
        let row = report.rows().next().unwrap();
        assert_eq!(row.1, "NET-001");
        assert_eq!(row.3, Outcome::Pass);
        let text = report.to_string();
        assert!(text.starts_with("network\tNET-001\tINFO\tpass\tOrigin reachable HTTP 200\t"));
    }

    #[test]
    fn report_serializes_to_json() {
        let mut report = Report::new();
        report.push(Section::with_findings(
            SectionKind::JsonRpc,
            vec![RPC_001.fail("expected -32601")],
        ));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["sections"][0]["kind"], "jsonrpc");
        assert_eq!(json["sections"][0]["findings"][0]["rule"], "RPC-001");
        assert_eq!(json["sections"][0]["findings"][0]["severity"], "ERROR");
        assert_eq!(json["sections"][0]["findings"][0]["outcome"], "fail");
    }
}
