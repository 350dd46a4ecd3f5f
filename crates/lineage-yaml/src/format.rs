//! Persisted key and tag conventions
//!
//! - member keys: `Name` plus an override marker (`*`, `!`, `*!`)
//! - collection items: `<itemid><markers>`
//! - dictionary entries: `<itemid><itemMarkers>~<keyMarkers>~<key>`
//! - deletion records: `<itemid>: ~(Deleted)`
//! - references: `!ref <objectid>`

use lineage_core::{ItemId, Key, OverrideState};
use serde_yaml::value::{Tag, TaggedValue};
use serde_yaml::Value as Yaml;

/// Member holding an object's identity
pub const ID_MEMBER: &str = "Id";

/// Value of a deletion record
pub const DELETED: &str = "~(Deleted)";

/// Tag of an identity reference
pub const REFERENCE_TAG: &str = "ref";

const KEY_SEPARATOR: char = '~';

/// Key of a collection item
#[must_use]
pub fn item_key(id: ItemId, state: OverrideState) -> String {
    format!("{id}{}", state.marker())
}

/// Key of a dictionary entry
#[must_use]
pub fn entry_key(id: ItemId, item: OverrideState, key_state: OverrideState, key: &Key) -> String {
    format!(
        "{id}{}{KEY_SEPARATOR}{}{KEY_SEPARATOR}{key}",
        item.marker(),
        key_state.marker()
    )
}

fn split_id(text: &str) -> Option<(ItemId, &str)> {
    let id = text.get(..ItemId::TEXT_LEN)?;
    let rest = text.get(ItemId::TEXT_LEN..)?;
    Some((id.parse().ok()?, rest))
}

/// Parse `<itemid><markers>`
#[must_use]
pub fn parse_item_key(text: &str) -> Option<(ItemId, OverrideState)> {
    let (id, marker) = split_id(text)?;
    Some((id, OverrideState::from_marker(marker)?))
}

/// Parse `<itemid><itemMarkers>~<keyMarkers>~<key>`, leaving the key as text
#[must_use]
pub fn parse_entry_key(text: &str) -> Option<(ItemId, OverrideState, OverrideState, &str)> {
    let (id, rest) = split_id(text)?;
    let (item_marker, rest) = rest.split_once(KEY_SEPARATOR)?;
    let (key_marker, key) = rest.split_once(KEY_SEPARATOR)?;
    Some((
        id,
        OverrideState::from_marker(item_marker)?,
        OverrideState::from_marker(key_marker)?,
        key,
    ))
}

/// Whether an entry is a deletion record
#[must_use]
pub fn deletion_record(key: &str, value: &Yaml) -> Option<ItemId> {
    if value.as_str() != Some(DELETED) || key.len() != ItemId::TEXT_LEN {
        return None;
    }
    key.parse().ok()
}

/// Tag for a type name
#[must_use]
pub fn tag(name: &str) -> Tag {
    Tag::new(format!("!{name}"))
}

/// Type name of a tag
#[must_use]
pub fn tag_name(tag: &Tag) -> String {
    tag.to_string().trim_start_matches('!').to_string()
}

/// Wrap a value in a type tag
#[must_use]
pub fn tagged(name: &str, value: Yaml) -> Yaml {
    Yaml::Tagged(Box::new(TaggedValue {
        tag: tag(name),
        value,
    }))
}

/// Text of a scalar mapping key
#[must_use]
pub fn key_text(key: &Yaml) -> Option<String> {
    match key {
        Yaml::String(s) => Some(s.clone()),
        Yaml::Number(n) => Some(n.to_string()),
        Yaml::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// YAML form of a dictionary key
#[must_use]
pub fn key_value(key: &Key) -> Yaml {
    match key {
        Key::Bool(b) => Yaml::Bool(*b),
        Key::Int(i) => Yaml::Number((*i).into()),
        Key::String(s) => Yaml::String(s.clone()),
    }
}

/// Shape name for diagnostics
#[must_use]
pub fn kind_name(value: &Yaml) -> &'static str {
    match value {
        Yaml::Null => "null",
        Yaml::Bool(_) => "bool",
        Yaml::Number(_) => "number",
        Yaml::String(_) => "string",
        Yaml::Sequence(_) => "sequence",
        Yaml::Mapping(_) => "mapping",
        Yaml::Tagged(_) => "tagged value",
    }
}
