//! Agent card discovery and validation.
//!
//! - [`discover`] — reachability and fetch of the card (network section)
//! - [`validate_schema`] / [`SchemaValidator`] — structural check (schema section)
//! - [`CapabilityDocument`] — the typed, best-effort view the rules read
//! - [`run_card_rules`] — semantic rules (card section)

mod discovery;
mod document;
mod rules;
mod schema;

pub use discovery::{
    build_origin, check_origin, discover, ensure_scheme, fetch_card, resolve_card_url, Discovery,
};
pub use document::{
    CapabilityDocument, Capabilities, ExtensionEntry, Field, InterfaceEntry, Provider, SkillEntry,
};
pub use rules::run_card_rules;
pub use schema::{validate_schema, FieldError, SchemaValidator, StructuralValidator};
