//! Semantic card rules.
//!
//! Each rule is a pure function of the typed document returning at most one
//! finding. They run in a fixed order and never depend on each other, so a
//! broken field only ever trips its own rule.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use reqwest::Url;

use crate::catalog::*;
use crate::report::Finding;
use crate::resolver::TransportKind;

use super::document::{CapabilityDocument, Field, SkillEntry};

type CardRule = fn(&CapabilityDocument) -> Option<Finding>;

const RULES: &[CardRule] = &[
    protocol_version,
    protocol_version_value,
    name,
    description,
    url,
    version,
    version_semver,
    default_input_modes,
    default_output_modes,
    preferred_transport,
    transport_declared,
    preferred_at_main_url,
    transport_conflicts,
    transport_values,
    streaming,
    push_notifications,
    state_transition_history,
    extensions,
    skills,
    skill_ids,
    skill_descriptions,
    skill_tags,
    security_references,
    extended_card_schemes,
    provider,
    icon_url,
];

/// Run every card rule against the document, in declaration order.
pub fn run_card_rules(doc: &CapabilityDocument) -> Vec<Finding> {
    RULES.iter().filter_map(|rule| rule(doc)).collect()
}

// -- core fields ------------------------------------------------------------

fn protocol_version(doc: &CapabilityDocument) -> Option<Finding> {
    let present = match &doc.protocol_version {
        Field::Present(v) => !v.is_empty(),
        Field::Invalid(_) => true,
        Field::Absent => false,
    };
    Some(CARD_001.check(present, "protocolVersion present", "protocolVersion missing"))
}

fn protocol_version_value(doc: &CapabilityDocument) -> Option<Finding> {
    match &doc.protocol_version {
        Field::Present(v) if !v.is_empty() => {
            let ok = v == "dev" || v.starts_with("0.3.");
            Some(CARD_001A.check(
                ok,
                format!("protocolVersion acceptable ({v})"),
                format!("protocolVersion unexpected ({v}); expected 0.3.x or dev"),
            ))
        }
        Field::Invalid(found) => Some(CARD_001A.fail(format!(
            "protocolVersion must be a string, found {found}"
        ))),
        _ => None,
    }
}

fn required_string(rule: Rule, field: &Field<String>, label: &str) -> Option<Finding> {
    Some(match field {
        Field::Present(v) if !v.is_empty() => rule.pass(format!("{label} present")),
        Field::Invalid(found) => rule.fail(format!("{label} must be a string, found {found}")),
        _ => rule.fail(format!("{label} missing")),
    })
}

fn name(doc: &CapabilityDocument) -> Option<Finding> {
    required_string(CARD_002, &doc.name, "name")
}

fn description(doc: &CapabilityDocument) -> Option<Finding> {
    required_string(CARD_004, &doc.description, "description")
}

fn url(doc: &CapabilityDocument) -> Option<Finding> {
    match doc.url.non_empty() {
        Some(raw) => Some(CARD_003.check(
            is_absolute_http(raw),
            format!("url present ({raw})"),
            format!("url is not an absolute http(s) URL: {raw}"),
        )),
        None => required_string(CARD_003, &doc.url, "url"),
    }
}

fn version(doc: &CapabilityDocument) -> Option<Finding> {
    required_string(CARD_005, &doc.version, "version")
}

fn version_semver(doc: &CapabilityDocument) -> Option<Finding> {
    let v = doc.version.non_empty()?;
    Some(CARD_005A.check(
        is_semver(v),
        format!("version is semver-like ({v})"),
        format!("version not semver-like: {v}"),
    ))
}

fn mode_list(rule: Rule, field: &Field<Vec<String>>, label: &str) -> Option<Finding> {
    Some(match field {
        Field::Present(modes) if !modes.is_empty() => rule.pass(format!("{label} present")),
        Field::Present(_) => rule.fail(format!("{label} is empty")),
        Field::Invalid(found) => {
            rule.fail(format!("{label} must be an array of strings, found {found}"))
        }
        Field::Absent => rule.fail(format!("{label} missing")),
    })
}

fn default_input_modes(doc: &CapabilityDocument) -> Option<Finding> {
    mode_list(CARD_006, &doc.default_input_modes, "defaultInputModes")
}

fn default_output_modes(doc: &CapabilityDocument) -> Option<Finding> {
    mode_list(CARD_007, &doc.default_output_modes, "defaultOutputModes")
}

// -- transports -------------------------------------------------------------

/// `preferredTransport`, defaulting to JSONRPC when not declared.
fn effective_preferred(doc: &CapabilityDocument) -> &str {
    doc.preferred_transport
        .non_empty()
        .unwrap_or(TransportKind::JsonRpc.as_str())
}

fn preferred_transport(doc: &CapabilityDocument) -> Option<Finding> {
    Some(match doc.preferred_transport.non_empty() {
        Some(pref) => CARD_010.pass(format!("preferredTransport present ({pref})")),
        None => CARD_010.fail("preferredTransport missing; JSONRPC assumed"),
    })
}

fn transport_declared(doc: &CapabilityDocument) -> Option<Finding> {
    let declared = !doc.interfaces().is_empty() || doc.url.non_empty().is_some();
    Some(CARD_013.check(
        declared,
        "at least one transport declared",
        "no transports declared (no url and no additionalInterfaces)",
    ))
}

fn preferred_at_main_url(doc: &CapabilityDocument) -> Option<Finding> {
    let interfaces = doc.interfaces();
    if interfaces.is_empty() {
        return None;
    }
    let main = doc.url.non_empty();
    let pref = effective_preferred(doc);
    let listed = interfaces
        .iter()
        .any(|i| i.url.as_deref() == main && i.transport.as_deref() == Some(pref));
    Some(CARD_011.check(
        listed,
        format!("additionalInterfaces lists {pref} at the main url"),
        format!("additionalInterfaces has no {pref} entry at the main url"),
    ))
}

fn transport_conflicts(doc: &CapabilityDocument) -> Option<Finding> {
    let mut by_url: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    if let Some(main) = doc.url.non_empty() {
        by_url.entry(main).or_default().insert(effective_preferred(doc));
    }
    for iface in doc.interfaces() {
        if let (Some(url), Some(transport)) = (iface.url.as_deref(), iface.transport.as_deref()) {
            by_url.entry(url).or_default().insert(transport);
        }
    }
    let conflicts: Vec<String> = by_url
        .iter()
        .filter(|(_, transports)| transports.len() > 1)
        .map(|(url, transports)| {
            let listed: Vec<&str> = transports.iter().copied().collect();
            format!("{url} -> {}", listed.join(", "))
        })
        .collect();
    Some(CARD_012.check(
        conflicts.is_empty(),
        "no transport conflicts",
        format!("conflicting transport declarations: {}", conflicts.join("; ")),
    ))
}

fn transport_values(doc: &CapabilityDocument) -> Option<Finding> {
    let mut bad: BTreeSet<String> = BTreeSet::new();
    for iface in doc.interfaces() {
        match iface.transport.as_deref() {
            Some(t) if TransportKind::parse(t).is_some() => {}
            Some(t) => {
                bad.insert(t.to_string());
            }
            None => {
                bad.insert("<missing>".to_string());
            }
        }
    }
    if let Some(pref) = doc.preferred_transport.non_empty() {
        if TransportKind::parse(pref).is_none() {
            bad.insert(pref.to_string());
        }
    }
    let listed: Vec<String> = bad.into_iter().collect();
    Some(CARD_016.check(
        listed.is_empty(),
        "transports use standard values",
        format!("non-standard transport(s): {}", listed.join(", ")),
    ))
}

// -- capabilities -----------------------------------------------------------

fn capability_flag(
    doc: &CapabilityDocument,
    rule: Rule,
    label: &str,
    pick: fn(&super::document::Capabilities) -> &Field<bool>,
) -> Option<Finding> {
    let flag = doc.capabilities.get().map(pick);
    Some(match flag {
        Some(Field::Invalid(found)) => {
            rule.fail(format!("capabilities.{label} must be boolean, found {found}"))
        }
        Some(Field::Present(value)) => rule.pass(format!("capabilities.{label} = {value}")),
        _ => rule.pass(format!("capabilities.{label} absent")),
    })
}

fn streaming(doc: &CapabilityDocument) -> Option<Finding> {
    capability_flag(doc, CARD_020, "streaming", |c| &c.streaming)
}

fn push_notifications(doc: &CapabilityDocument) -> Option<Finding> {
    capability_flag(doc, CARD_021, "pushNotifications", |c| &c.push_notifications)
}

fn state_transition_history(doc: &CapabilityDocument) -> Option<Finding> {
    capability_flag(doc, CARD_022, "stateTransitionHistory", |c| {
        &c.state_transition_history
    })
}

fn extensions(doc: &CapabilityDocument) -> Option<Finding> {
    match &doc.capabilities.get()?.extensions {
        Field::Absent => None,
        Field::Invalid(found) => Some(CARD_023.fail(format!(
            "capabilities.extensions must be an array, found {found}"
        ))),
        Field::Present(entries) => {
            let missing = entries.iter().filter(|e| !e.has_uri).count();
            Some(CARD_023.check(
                missing == 0,
                "capabilities.extensions entries carry a uri",
                format!("{missing} capabilities.extensions entr(ies) without uri"),
            ))
        }
    }
}

// -- skills -----------------------------------------------------------------

fn skills(doc: &CapabilityDocument) -> Option<Finding> {
    Some(match &doc.skills {
        Field::Present(skills) if !skills.is_empty() => {
            let malformed: Vec<String> = skills
                .iter()
                .enumerate()
                .filter_map(|(i, s)| s.malformed.map(|found| format!("skills[{i}] is {found}")))
                .collect();
            CARD_030.check(
                malformed.is_empty(),
                format!("{} skill(s) declared", skills.len()),
                format!("skill entries must be objects: {}", malformed.join(", ")),
            )
        }
        Field::Invalid(found) => CARD_030.fail(format!("skills must be an array, found {found}")),
        _ => CARD_030.fail("skills missing"),
    })
}

fn skill_ids(doc: &CapabilityDocument) -> Option<Finding> {
    let skills = doc.skills.get()?;
    let mut seen = HashSet::new();
    let mut duplicates = BTreeSet::new();
    for skill in skills.iter().filter(|s| s.malformed.is_none()) {
        let id = skill.id.as_deref().unwrap_or("<missing>");
        if !seen.insert(id) {
            duplicates.insert(id);
        }
    }
    let listed: Vec<&str> = duplicates.into_iter().collect();
    Some(CARD_031.check(
        listed.is_empty(),
        "skill ids unique",
        format!("duplicate skill ids: {}", listed.join(", ")),
    ))
}

fn skill_label(index: usize, skill: &SkillEntry) -> String {
    match (skill.malformed, skill.id.as_deref()) {
        (Some(found), _) => format!("skills[{index}] ({found})"),
        (None, Some(id)) => id.to_string(),
        (None, None) => "<missing id>".to_string(),
    }
}

fn skill_descriptions(doc: &CapabilityDocument) -> Option<Finding> {
    let missing: Vec<String> = doc
        .skills
        .get()?
        .iter()
        .enumerate()
        .filter(|(_, s)| s.description.as_deref().map_or(true, str::is_empty))
        .map(|(i, s)| skill_label(i, s))
        .collect();
    Some(CARD_032.check(
        missing.is_empty(),
        "all skills have a description",
        format!("skills missing description: {}", missing.join(", ")),
    ))
}

fn skill_tags(doc: &CapabilityDocument) -> Option<Finding> {
    let bad: Vec<String> = doc
        .skills
        .get()?
        .iter()
        .enumerate()
        .filter(|(_, s)| s.tags.get().map_or(true, Vec::is_empty))
        .map(|(i, s)| skill_label(i, s))
        .collect();
    Some(CARD_033.check(
        bad.is_empty(),
        "skills have non-empty tags",
        format!("skills with empty/missing tags: {}", bad.join(", ")),
    ))
}

// -- security ---------------------------------------------------------------

fn declared_schemes(doc: &CapabilityDocument) -> &[String] {
    doc.security_schemes.get().map(Vec::as_slice).unwrap_or_default()
}

fn security_references(doc: &CapabilityDocument) -> Option<Finding> {
    let requirements = match &doc.security {
        Field::Present(reqs) if !reqs.is_empty() => reqs,
        Field::Invalid(found) => {
            return Some(CARD_041.fail(format!("security must be an array, found {found}")))
        }
        _ => return Some(CARD_041.pass("security optional and absent")),
    };
    let declared = declared_schemes(doc);
    let undeclared: BTreeSet<&str> = requirements
        .iter()
        .flatten()
        .map(String::as_str)
        .filter(|name| !declared.iter().any(|d| d == name))
        .collect();
    let listed: Vec<&str> = undeclared.into_iter().collect();
    Some(CARD_041.check(
        listed.is_empty(),
        "security requirements reference declared schemes",
        format!("security references undeclared schemes: {}", listed.join(", ")),
    ))
}

fn extended_card_schemes(doc: &CapabilityDocument) -> Option<Finding> {
    if !doc.declares_extended_card() {
        return None;
    }
    Some(CARD_043.check(
        !declared_schemes(doc).is_empty(),
        "securitySchemes declared for the authenticated extended card",
        "supportsAuthenticatedExtendedCard=true but no securitySchemes declared",
    ))
}

// -- provider / meta --------------------------------------------------------

fn provider(doc: &CapabilityDocument) -> Option<Finding> {
    match &doc.provider {
        Field::Absent => None,
        Field::Invalid(found) => {
            Some(CARD_050.fail(format!("provider must be an object, found {found}")))
        }
        Field::Present(p) => Some(CARD_050.check(
            p.organization.get().is_some() && p.url.get().is_some(),
            "provider has organization and url",
            "provider invalid (expect organization and url strings)",
        )),
    }
}

fn icon_url(doc: &CapabilityDocument) -> Option<Finding> {
    match &doc.icon_url {
        Field::Present(icon) if !icon.is_empty() => Some(CARD_051.check(
            is_absolute_http(icon),
            "iconUrl looks valid",
            format!("iconUrl invalid: {icon}"),
        )),
        Field::Invalid(found) => {
            Some(CARD_051.fail(format!("iconUrl must be a string, found {found}")))
        }
        _ => None,
    }
}

// -- helpers ----------------------------------------------------------------

fn is_absolute_http(raw: &str) -> bool {
    Url::parse(raw).is_ok_and(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
}

/// `MAJOR.MINOR.PATCH` with an optional `-prerelease` of `[0-9A-Za-z.-]`.
fn is_semver(v: &str) -> bool {
    let (core, pre) = match v.split_once('-') {
        Some((core, pre)) => (core, Some(pre)),
        None => (v, None),
    };
    let numeric = core.split('.').collect::<Vec<_>>();
    let core_ok = numeric.len() == 3
        && numeric
            .iter()
            .all(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()));
    let pre_ok = pre.map_or(true, |p| {
        !p.is_empty() && p.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-')
    });
    core_ok && pre_ok
}
