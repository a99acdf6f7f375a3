//! Typed view of an agent card.
//!
//! The card under test may be partially broken, so every attribute is a
//! [`Field`] that remembers whether it was absent, present with the wrong
//! JSON shape, or present and usable. Card rules only ever look at this
//! record, never at the raw JSON.

use serde_json::{Map, Value};

use crate::types::json_type;

/// One attribute of the card.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Field<T> {
    /// Not in the document (or `null`).
    #[default]
    Absent,
    /// Present with the wrong JSON type; carries the type that was found.
    Invalid(&'static str),
    /// Present and well-shaped.
    Present(T),
}

impl<T> Field<T> {
    /// Returns `true` if the attribute was not sent.
    pub fn is_absent(&self) -> bool {
        matches!(self, Field::Absent)
    }

    /// The value, when present and well-shaped.
    pub fn get(&self) -> Option<&T> {
        match self {
            Field::Present(value) => Some(value),
            _ => None,
        }
    }

    fn map<U>(self, f: impl FnOnce(T) -> U) -> Field<U> {
        match self {
            Field::Absent => Field::Absent,
            Field::Invalid(found) => Field::Invalid(found),
            Field::Present(value) => Field::Present(f(value)),
        }
    }
}

impl Field<String> {
    /// The string, when present and non-empty.
    pub fn non_empty(&self) -> Option<&str> {
        self.get().map(String::as_str).filter(|s| !s.is_empty())
    }
}

/// One `additionalInterfaces` entry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InterfaceEntry {
    /// Declared transport, verbatim.
    pub transport: Option<String>,
    /// Declared endpoint URL.
    pub url: Option<String>,
}

/// One `capabilities.extensions` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtensionEntry {
    /// Whether the entry is an object carrying `uri`.
    pub has_uri: bool,
}

/// The `capabilities` object.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub streaming: Field<bool>,
    pub push_notifications: Field<bool>,
    pub state_transition_history: Field<bool>,
    pub extensions: Field<Vec<ExtensionEntry>>,
}

/// One `skills` entry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SkillEntry {
    /// JSON type of an entry that is not an object; its other fields stay empty.
    pub malformed: Option<&'static str>,
    pub id: Option<String>,
    pub description: Option<String>,
    pub tags: Field<Vec<String>>,
}

/// The `provider` object.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Provider {
    pub organization: Field<String>,
    pub url: Field<String>,
}

/// Typed, best-effort record of an agent card.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CapabilityDocument {
    pub protocol_version: Field<String>,
    pub name: Field<String>,
    pub description: Field<String>,
    pub url: Field<String>,
    pub version: Field<String>,
    pub default_input_modes: Field<Vec<String>>,
    pub default_output_modes: Field<Vec<String>>,
    pub preferred_transport: Field<String>,
    pub additional_interfaces: Field<Vec<InterfaceEntry>>,
    pub capabilities: Field<Capabilities>,
    pub skills: Field<Vec<SkillEntry>>,
    /// Scheme names referenced by each security requirement.
    pub security: Field<Vec<Vec<String>>>,
    /// Names of declared security schemes.
    pub security_schemes: Field<Vec<String>>,
    pub supports_authenticated_extended_card: Field<bool>,
    pub provider: Field<Provider>,
    pub icon_url: Field<String>,
    /// `false` when the card failed schema validation; downstream results
    /// then carry reduced confidence.
    pub schema_valid: bool,
}

impl CapabilityDocument {
    /// Build the typed record from a parsed card body.
    ///
    /// Never fails: a non-object body yields a document with every field
    /// absent. camelCase keys win over their snake_case aliases.
    pub fn from_json(body: &Value, schema_valid: bool) -> Self {
        let empty = Map::new();
        let obj = body.as_object().unwrap_or(&empty);

        Self {
            protocol_version: string(lookup(obj, "protocolVersion", "protocol_version")),
            name: string(obj.get("name")),
            description: string(obj.get("description")),
            url: string(obj.get("url")),
            version: string(obj.get("version")),
            default_input_modes: string_list(lookup(
                obj,
                "defaultInputModes",
                "default_input_modes",
            )),
            default_output_modes: string_list(lookup(
                obj,
                "defaultOutputModes",
                "default_output_modes",
            )),
            preferred_transport: string(lookup(
                obj,
                "preferredTransport",
                "preferred_transport",
            )),
            additional_interfaces: array(lookup(
                obj,
                "additionalInterfaces",
                "additional_interfaces",
            ))
                .map(|items| items.iter().map(interface_entry).collect()),
            capabilities: object(obj.get("capabilities")).map(capabilities),
            skills: array(obj.get("skills"))
                .map(|items| items.iter().map(skill_entry).collect()),
            security: array(obj.get("security")).map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_object)
                    .map(|req| req.keys().cloned().collect())
                    .collect()
            }),
            security_schemes: object(lookup(obj, "securitySchemes", "security_schemes"))
                .map(|schemes| schemes.keys().cloned().collect()),
            supports_authenticated_extended_card: boolean(lookup(
                obj,
                "supportsAuthenticatedExtendedCard",
                "supports_authenticated_extended_card",
            )),
            provider: object(obj.get("provider")).map(|p| Provider {
                organization: string(p.get("organization")),
                url: string(p.get("url")),
            }),
            icon_url: string(lookup(obj, "iconUrl", "icon_url")),
            schema_valid,
        }
    }

    /// `capabilities.streaming` was explicitly declared `false`.
    pub fn streaming_declared_off(&self) -> bool {
        self.capabilities
            .get()
            .is_some_and(|caps| caps.streaming == Field::Present(false))
    }

    /// `supportsAuthenticatedExtendedCard` is `true`.
    pub fn declares_extended_card(&self) -> bool {
        self.supports_authenticated_extended_card == Field::Present(true)
    }

    /// `additionalInterfaces` entries, or none.
    pub fn interfaces(&self) -> &[InterfaceEntry] {
        self.additional_interfaces.get().map(Vec::as_slice).unwrap_or_default()
    }
}

fn lookup<'a>(obj: &'a Map<String, Value>, camel: &str, snake: &str) -> Option<&'a Value> {
    obj.get(camel)
        .filter(|v| !v.is_null())
        .or_else(|| obj.get(snake))
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

fn string(value: Option<&Value>) -> Field<String> {
    match present(value) {
        None => Field::Absent,
        Some(Value::String(s)) => Field::Present(s.clone()),
        Some(other) => Field::Invalid(json_type(other)),
    }
}

fn boolean(value: Option<&Value>) -> Field<bool> {
    match present(value) {
        None => Field::Absent,
        Some(Value::Bool(b)) => Field::Present(*b),
        Some(other) => Field::Invalid(json_type(other)),
    }
}

fn array(value: Option<&Value>) -> Field<&Vec<Value>> {
    match present(value) {
        None => Field::Absent,
        Some(Value::Array(items)) => Field::Present(items),
        Some(other) => Field::Invalid(json_type(other)),
    }
}

fn object(value: Option<&Value>) -> Field<&Map<String, Value>> {
    match present(value) {
        None => Field::Absent,
        Some(Value::Object(map)) => Field::Present(map),
        Some(other) => Field::Invalid(json_type(other)),
    }
}

fn string_list(value: Option<&Value>) -> Field<Vec<String>> {
    match array(value) {
        Field::Present(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .map_or(Field::Invalid("array with non-string items"), Field::Present),
        Field::Invalid(found) => Field::Invalid(found),
        Field::Absent => Field::Absent,
    }
}

fn interface_entry(item: &Value) -> InterfaceEntry {
    InterfaceEntry {
        transport: item.get("transport").and_then(Value::as_str).map(str::to_string),
        url: item.get("url").and_then(Value::as_str).map(str::to_string),
    }
}

fn capabilities(caps: &Map<String, Value>) -> Capabilities {
    Capabilities {
        streaming: boolean(caps.get("streaming")),
        push_notifications: boolean(lookup(caps, "pushNotifications", "push_notifications")),
        state_transition_history: boolean(lookup(
            caps,
            "stateTransitionHistory",
            "state_transition_history",
        )),
        extensions: array(caps.get("extensions")).map(|items| {
            items
                .iter()
                .map(|item| ExtensionEntry {
                    has_uri: item.get("uri").is_some(),
                })
                .collect()
        }),
    }
}

fn skill_entry(item: &Value) -> SkillEntry {
    let Some(skill) = item.as_object() else {
        return SkillEntry {
            malformed: Some(json_type(item)),
            ..SkillEntry::default()
        };
    };
    SkillEntry {
        malformed: None,
        id: skill.get("id").and_then(Value::as_str).map(str::to_string),
        description: skill
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        tags: string_list(skill.get("tags")),
    }
}
