//! Structural validation of an agent card against the A2A v0.3 `AgentCard`
//! shape.
//!
//! The validator is a seam: anything implementing [`SchemaValidator`] can be
//! plugged into the suite (a stricter house policy, a newer schema).
//! [`StructuralValidator`] runs the embedded [`agent_card_schema`] through
//! `jsonschema`.

use std::fmt;
use std::sync::OnceLock;

use jsonschema::error::ValidationErrorKind;
use jsonschema::{ValidationError, Validator};
use serde_json::{json, Value};

use crate::catalog::{CARD_STRUCT, CARD_TR_STRUCT};
use crate::report::Finding;

use super::document::CapabilityDocument;

/// One structural problem, addressed by a JSON path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Dotted path, e.g. `skills[0].tags`.
    pub path: String,
    /// What is wrong there.
    pub message: String,
}

impl FieldError {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Validates a parsed card body against a reference schema.
pub trait SchemaValidator: Send + Sync {
    /// `Ok(())` for a conforming card, otherwise every problem found.
    fn validate(&self, card: &Value) -> Result<(), Vec<FieldError>>;
}

/// JSON Schema for the A2A v0.3 `AgentCard`.
#[must_use]
pub fn agent_card_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "A2A AgentCard",
        "description": "Self-describing manifest of an A2A v0.3 agent.",
        "type": "object",
        "required": [
            "name",
            "description",
            "url",
            "version",
            "capabilities",
            "defaultInputModes",
            "defaultOutputModes",
            "skills"
        ],
        "properties": {
            "protocolVersion": { "type": "string" },
            "name": { "type": "string" },
            "description": { "type": "string" },
            "url": { "type": "string" },
            "version": { "type": "string" },
            "preferredTransport": { "type": "string" },
            "iconUrl": { "type": "string" },
            "documentationUrl": { "type": "string" },
            "supportsAuthenticatedExtendedCard": { "type": "boolean" },
            "defaultInputModes": { "$ref": "#/$defs/StringList" },
            "defaultOutputModes": { "$ref": "#/$defs/StringList" },
            "capabilities": { "$ref": "#/$defs/AgentCapabilities" },
            "skills": {
                "type": "array",
                "items": { "$ref": "#/$defs/AgentSkill" }
            },
            "additionalInterfaces": {
                "type": "array",
                "items": { "$ref": "#/$defs/AgentInterface" }
            },
            "provider": { "$ref": "#/$defs/AgentProvider" },
            "securitySchemes": { "type": "object" },
            "security": {
                "type": "array",
                "items": {
                    "type": "object",
                    "additionalProperties": { "$ref": "#/$defs/StringList" }
                }
            }
        },
        "$defs": {
            "StringList": {
                "type": "array",
                "items": { "type": "string" }
            },
            "AgentCapabilities": {
                "type": "object",
                "properties": {
                    "streaming": { "type": "boolean" },
                    "pushNotifications": { "type": "boolean" },
                    "stateTransitionHistory": { "type": "boolean" },
                    "extensions": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["uri"],
                            "properties": {
                                "uri": { "type": "string" },
                                "description": { "type": "string" },
                                "required": { "type": "boolean" }
                            }
                        }
                    }
                }
            },
            "AgentSkill": {
                "type": "object",
                "required": ["id", "name", "description", "tags"],
                "properties": {
                    "id": { "type": "string" },
                    "name": { "type": "string" },
                    "description": { "type": "string" },
                    "tags": { "$ref": "#/$defs/StringList" },
                    "examples": { "$ref": "#/$defs/StringList" },
                    "inputModes": { "$ref": "#/$defs/StringList" },
                    "outputModes": { "$ref": "#/$defs/StringList" }
                }
            },
            "AgentInterface": {
                "type": "object",
                "required": ["transport", "url"],
                "properties": {
                    "transport": { "type": "string" },
                    "url": { "type": "string" }
                }
            },
            "AgentProvider": {
                "type": "object",
                "required": ["organization", "url"],
                "properties": {
                    "organization": { "type": "string" },
                    "url": { "type": "string" }
                }
            }
        }
    })
}

/// Checks a card against [`agent_card_schema`].
///
/// The schema is compiled once per process and shared.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralValidator;

fn compiled() -> Result<&'static Validator, &'static str> {
    static VALIDATOR: OnceLock<Result<Validator, String>> = OnceLock::new();
    VALIDATOR
        .get_or_init(|| Validator::new(&agent_card_schema()).map_err(|e| e.to_string()))
        .as_ref()
        .map_err(String::as_str)
}

impl SchemaValidator for StructuralValidator {
    fn validate(&self, card: &Value) -> Result<(), Vec<FieldError>> {
        let validator = match compiled() {
            Ok(validator) => validator,
            Err(e) => {
                tracing::error!(error = %e, "AgentCard schema failed to compile");
                return Err(vec![FieldError::new("$", format!("reference schema unusable: {e}"))]);
            }
        };

        let errors: Vec<FieldError> =
            validator.iter_errors(card).map(|e| field_error(&e)).collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Map a schema violation onto a dotted path. A missing property is
/// addressed by its own name rather than by its parent.
fn field_error(error: &ValidationError<'_>) -> FieldError {
    let mut path = dotted(&error.instance_path.to_string());
    if let ValidationErrorKind::Required { property } = &error.kind {
        if let Some(name) = property.as_str() {
            path = if path == "$" {
                name.to_string()
            } else {
                format!("{path}.{name}")
            };
        }
    }
    FieldError::new(path, error.to_string())
}

/// `/skills/0/tags` becomes `skills[0].tags`; the root is `$`.
fn dotted(pointer: &str) -> String {
    let mut path = String::new();
    for segment in pointer.split('/').skip(1) {
        let segment = segment.replace("~1", "/").replace("~0", "~");
        if segment.parse::<usize>().is_ok() {
            path.push_str(&format!("[{segment}]"));
        } else {
            if !path.is_empty() {
                path.push('.');
            }
            path.push_str(&segment);
        }
    }
    if path.is_empty() {
        "$".to_string()
    } else {
        path
    }
}

/// Validate a card body and build its typed record.
///
/// Returns the schema-section findings: `CARD-STRUCT` pass, or
/// `CARD-STRUCT` fail listing the paths plus a `CARD-TR-STRUCT` note that
/// card checks run in degraded mode. The document is always returned.
pub fn validate_schema(
    validator: &dyn SchemaValidator,
    body: &Value,
) -> (CapabilityDocument, Vec<Finding>) {
    match validator.validate(body) {
        Ok(()) => (
            CapabilityDocument::from_json(body, true),
            vec![CARD_STRUCT.pass("AgentCard matches the v0.3 schema")],
        ),
        Err(errors) => {
            tracing::debug!(errors = errors.len(), "card failed schema validation");
            let listed = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            (
                CapabilityDocument::from_json(body, false),
                vec![
                    CARD_STRUCT.fail(format!("Schema validation failed: {listed}")),
                    CARD_TR_STRUCT
                        .fail("Card checks run in degraded mode on a best-effort document"),
                ],
            )
        }
    }
}
