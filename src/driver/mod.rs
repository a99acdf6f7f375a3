//! Conversation drivers.
//!
//! A driver walks one transport binding through the A2A call sequence and
//! classifies every response into its section. State between steps lives
//! in a [`TaskHandle`]; each step either records a finding or a skip, and
//! the driver always runs to the end.

pub mod jsonrpc;
pub mod rest;

use serde_json::Value;

use crate::card::{run_card_rules, validate_schema, CapabilityDocument, SchemaValidator};
use crate::report::{Finding, SectionKind};
use crate::types::{ResultShape, TaskState};

pub use jsonrpc::JsonRpcDriver;
pub use rest::RestDriver;

/// Which optional steps a driver runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverOptions {
    /// Run the streaming and resubscribe steps.
    pub streaming: bool,
    /// Run the authenticated extended card step.
    pub extended_card: bool,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            streaming: true,
            extended_card: true,
        }
    }
}

impl DriverOptions {
    /// Only the request/response steps.
    pub fn ping() -> Self {
        Self {
            streaming: false,
            extended_card: false,
        }
    }
}

/// A task created during one driver run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    pub id: String,
    pub last_known_state: Option<TaskState>,
}

impl TaskHandle {
    /// Handle for a Task result; `None` for anything else.
    pub fn from_shape(shape: &ResultShape) -> Option<Self> {
        match shape {
            ResultShape::Task { id, state } => Some(Self {
                id: id.clone(),
                last_known_state: *state,
            }),
            _ => None,
        }
    }

    /// The last observed state is terminal, so cancel must be refused.
    pub fn is_terminal(&self) -> bool {
        self.last_known_state.is_some_and(|s| s.is_terminal())
    }

    /// Record the state from a later Task result.
    pub fn observe(&mut self, shape: &ResultShape) {
        if let ResultShape::Task {
            state: Some(state), ..
        } = shape
        {
            self.last_known_state = Some(*state);
        }
    }

    fn state_label(&self) -> String {
        self.last_known_state
            .map_or_else(|| "unknown".to_string(), |s| s.to_string())
    }
}

/// Whether the card says streaming is off.
pub(crate) fn streaming_declared_off(doc: Option<&CapabilityDocument>) -> bool {
    doc.is_some_and(CapabilityDocument::streaming_declared_off)
}

/// Whether the card declares an authenticated extended card.
pub(crate) fn declares_extended_card(doc: Option<&CapabilityDocument>) -> bool {
    doc.is_some_and(CapabilityDocument::declares_extended_card)
}

/// Re-run schema and card rules on an extended card, re-homed into the
/// driver's section.
pub(crate) fn revalidate_card(
    validator: &dyn SchemaValidator,
    card: &Value,
    section: SectionKind,
) -> Vec<Finding> {
    let (doc, mut findings) = validate_schema(validator, card);
    findings.extend(run_card_rules(&doc));
    findings
        .into_iter()
        .map(|f| f.within(section).prefixed("extended card: "))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::StructuralValidator;
    use serde_json::json;

    #[test]
    fn handle_tracks_state() {
        let mut handle = TaskHandle::from_shape(&ResultShape::Task {
            id: "t1".into(),
            state: Some(TaskState::Working),
        })
        .unwrap();
        assert!(!handle.is_terminal());
        handle.observe(&ResultShape::Task {
            id: "t1".into(),
            state: Some(TaskState::Completed),
        });
        assert!(handle.is_terminal());
        assert!(TaskHandle::from_shape(&ResultShape::Message).is_none());
    }

    #[test]
    fn revalidated_findings_are_rehomed() {
        let card = json!({"name": "x"});
        let findings = revalidate_card(&StructuralValidator, &card, SectionKind::Rest);
        assert!(!findings.is_empty());
        assert!(findings.iter().all(|f| f.section == SectionKind::Rest));
        assert!(findings.iter().any(|f| f.rule_id == "CARD-STRUCT"));
        assert!(findings[0].message.starts_with("extended card: "));
    }
}
