//! Document → YAML
//!
//! Walks the node graph of an [`AssetPropertyGraph`] and builds a
//! `serde_yaml::Value` tree carrying override markers, item ids and
//! deletion records. Unloadable placeholders are written back from their
//! raw text.

use crate::error::YamlError;
use crate::format::{
    entry_key, item_key, key_value, tagged, DELETED, ID_MEMBER, REFERENCE_TAG,
};
use indexmap::IndexMap;
use lineage_assets::AssetPropertyGraph;
use lineage_core::{DescriptorKind, ObjectId, Value};
use lineage_graph::{Content, NodeId};
use serde_yaml::{Mapping, Value as Yaml};
use std::path::Path;
use tracing::debug;

/// Serialize a document
///
/// # Errors
/// Returns `Emit` if the tree cannot be written, or `Syntax` if an
/// unloadable region's raw text no longer parses
pub fn save(document: &AssetPropertyGraph) -> Result<String, YamlError> {
    let tree = to_yaml(document)?;
    serde_yaml::to_string(&tree).map_err(YamlError::Emit)
}

/// Serialize a document into a file
///
/// # Errors
/// Any error of [`save`], or `Io`
pub fn save_path(document: &AssetPropertyGraph, path: impl AsRef<Path>) -> Result<(), YamlError> {
    let text = save(document)?;
    std::fs::write(path.as_ref(), text)?;
    debug!(document = %document.document(), path = %path.as_ref().display(), "document saved");
    Ok(())
}

/// YAML tree of a document, root tagged with its type
///
/// # Errors
/// See [`save`]
pub fn to_yaml(document: &AssetPropertyGraph) -> Result<Yaml, YamlError> {
    let writer = Writer { document };
    let graph = document.graph();
    let root = graph.node(graph.root())?;
    match root.content() {
        Content::Object {
            type_name,
            id,
            members,
        } => Ok(tagged(type_name, writer.object_body(type_name, *id, members)?)),
        _ => Err(YamlError::InvalidRoot(format!(
            "root of {} holds no object",
            document.document()
        ))),
    }
}

struct Writer<'a> {
    document: &'a AssetPropertyGraph,
}

impl Writer<'_> {
    fn node(&self, node: NodeId) -> Result<Yaml, YamlError> {
        let graph = self.document.graph();
        let n = graph.node(node)?;
        match n.content() {
            Content::Leaf(value) => leaf(value),
            Content::Object {
                type_name,
                id,
                members,
            } => {
                let body = self.object_body(type_name, *id, members)?;
                if graph.descriptor(node)?.name() == type_name {
                    Ok(body)
                } else {
                    Ok(tagged(type_name, body))
                }
            }
            Content::Sequence(children) => {
                if self.tracks_items(node)? {
                    self.identified(node, children, false)
                } else {
                    children
                        .iter()
                        .map(|child| self.node(*child))
                        .collect::<Result<Vec<_>, _>>()
                        .map(Yaml::Sequence)
                }
            }
            Content::Map(children) => {
                if self.tracks_items(node)? {
                    return self.identified(node, children, true);
                }
                let mut map = Mapping::new();
                if let Some(ids) = graph.item_ids(node) {
                    for (id, child) in ids.ids().iter().zip(children) {
                        if let Some(key) = ids.key_of(*id) {
                            map.insert(key_value(key), self.node(*child)?);
                        }
                    }
                }
                Ok(Yaml::Mapping(map))
            }
        }
    }

    fn object_body(
        &self,
        type_name: &str,
        id: Option<ObjectId>,
        members: &IndexMap<String, NodeId>,
    ) -> Result<Yaml, YamlError> {
        let mut map = Mapping::new();
        let declares_id = self
            .document
            .registry()
            .get(type_name)?
            .find_member(ID_MEMBER)
            .is_some();
        if let Some(id) = id.filter(|_| !declares_id) {
            map.insert(Yaml::String(ID_MEMBER.into()), Yaml::String(id.to_string()));
        }
        let overrides = self.document.overrides();
        for (name, child) in members {
            let key = format!("{name}{}", overrides.get_override(*child).marker());
            map.insert(Yaml::String(key), self.node(*child)?);
        }
        Ok(Yaml::Mapping(map))
    }

    /// Elements keyed by item id, then deletion records
    fn identified(&self, node: NodeId, children: &[NodeId], dictionary: bool) -> Result<Yaml, YamlError> {
        let graph = self.document.graph();
        let overrides = self.document.overrides();
        let mut map = Mapping::new();
        let Some(ids) = graph.item_ids(node) else {
            return Ok(Yaml::Mapping(map));
        };

        for (id, child) in ids.ids().iter().zip(children) {
            let state = overrides.get_item_override(node, *id);
            let key = match ids.key_of(*id).filter(|_| dictionary) {
                Some(key) => entry_key(*id, state, overrides.get_key_override(node, *id), key),
                None => item_key(*id, state),
            };
            map.insert(Yaml::String(key), self.node(*child)?);
        }
        for id in ids.deleted_ids() {
            map.insert(Yaml::String(id.to_string()), Yaml::String(DELETED.into()));
        }
        Ok(Yaml::Mapping(map))
    }

    fn tracks_items(&self, node: NodeId) -> Result<bool, YamlError> {
        let graph = self.document.graph();
        let fixed = matches!(graph.descriptor(node)?.kind(), DescriptorKind::Array { .. });
        Ok(graph.node(node)?.flags().identifiable_items && !fixed)
    }
}

fn leaf(value: &Value) -> Result<Yaml, YamlError> {
    Ok(match value {
        Value::Unloadable(unloadable) => serde_yaml::from_str(&unloadable.raw)?,
        Value::Reference(id) => tagged(REFERENCE_TAG, Yaml::String(id.to_string())),
        other => plain(other),
    })
}

/// Untracked form of a value (custom types and their contents)
fn plain(value: &Value) -> Yaml {
    match value {
        Value::Null => Yaml::Null,
        Value::Bool(b) => Yaml::Bool(*b),
        Value::Int(i) => Yaml::Number((*i).into()),
        Value::Float(f) => Yaml::Number((*f).into()),
        Value::String(s) => Yaml::String(s.clone()),
        Value::Reference(id) => tagged(REFERENCE_TAG, Yaml::String(id.to_string())),
        Value::Object(object) => {
            let members = object
                .members
                .iter()
                .map(|(name, member)| (Yaml::String(name.clone()), plain(member)))
                .collect();
            tagged(&object.type_name, Yaml::Mapping(members))
        }
        Value::List(items) => Yaml::Sequence(items.iter().map(|item| plain(&item.value)).collect()),
        Value::Map(entries) => Yaml::Mapping(
            entries
                .iter()
                .map(|(key, item)| (key_value(key), plain(&item.value)))
                .collect(),
        ),
        Value::Unloadable(unloadable) => {
            serde_yaml::from_str(&unloadable.raw).unwrap_or_else(|_| Yaml::String(unloadable.raw.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lineage_core::{DocumentId, UnloadableValue};
    use lineage_test_utils::{archetype, fixture_registry, object_id};

    fn document(root: lineage_core::ObjectValue, inherits: bool) -> AssetPropertyGraph {
        AssetPropertyGraph::new(DocumentId::from_u128(1), fixture_registry(), root, inherits).unwrap()
    }

    #[test]
    fn root_is_tagged_with_identity_first() {
        let doc = document(archetype().with_id(object_id(0xaa)), false);
        let text = save(&doc).unwrap();
        assert!(text.starts_with("!Character"));
        assert!(text.contains("\nId: 000000000000000000000000000000aa\nName: Archetype\n"));
    }

    #[test]
    fn items_are_keyed_by_id() {
        let doc = document(archetype(), false);
        let tree = to_yaml(&doc).unwrap();
        let Yaml::Tagged(root) = tree else {
            panic!("root is tagged")
        };
        let inventory = &root.value["Inventory"];
        assert_eq!(
            inventory["00000000000000000000000000000001"],
            Yaml::String("a".into())
        );
        let stats = &root.value["Stats"];
        assert_eq!(stats["0000000000000000000000000000000b~~str"], Yaml::Number(5i64.into()));
    }

    #[test]
    fn arrays_and_untracked_collections_are_sequences() {
        let doc = document(archetype().with_member("Notes", Value::list(["x", "y"])), false);
        let tree = to_yaml(&doc).unwrap();
        let Yaml::Tagged(root) = tree else {
            panic!("root is tagged")
        };
        assert!(root.value["Position"].is_sequence());
        assert_eq!(root.value["Notes"][1], Yaml::String("y".into()));
    }

    #[test]
    fn unloadable_region_is_written_verbatim() {
        let placeholder = UnloadableValue {
            type_name: Some("Blaster".into()),
            raw: "!Blaster\nDamage: 3\n".into(),
            error: "unknown type 'Blaster' at 'Weapon'".into(),
        };
        let doc = document(archetype().with_member("Weapon", placeholder), false);
        let text = save(&doc).unwrap();
        assert!(text.contains("Weapon: !Blaster"));
        assert!(text.contains("Damage: 3"));
    }

    #[test]
    fn subtype_and_reference_are_tagged() {
        let ally = lineage_test_utils::character("Ally").with_id(object_id(5));
        let doc = document(
            archetype()
                .with_member("Target", Value::Reference(object_id(5)))
                .with_member("Allies", Value::list([ally])),
            false,
        );
        let tree = to_yaml(&doc).unwrap();
        let Yaml::Tagged(root) = tree else {
            panic!("root is tagged")
        };
        assert!(matches!(&root.value["Target"], Yaml::Tagged(t) if crate::format::tag_name(&t.tag) == REFERENCE_TAG));
        let Yaml::Mapping(allies) = &root.value["Allies"] else {
            panic!("allies are keyed by id")
        };
        let (_, ally) = allies.iter().next().unwrap();
        assert!(ally.is_mapping());
    }
}
