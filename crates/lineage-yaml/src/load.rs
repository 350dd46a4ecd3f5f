//! YAML → document
//!
//! Converts a `serde_yaml::Value` tree into the root [`ObjectValue`] of a
//! document, guided by the type descriptors. Override markers, item ids and
//! deletion records are collected into an [`OverrideCapture`] that is
//! installed once the graph exists.
//!
//! A region that does not fit its declared type (unknown tag, wrong shape,
//! malformed item key) becomes an unloadable placeholder holding the
//! region's YAML text, so saving the document writes it back unchanged.

use crate::error::YamlError;
use crate::format::{
    deletion_record, key_text, kind_name, parse_entry_key, parse_item_key, tag_name, ID_MEMBER,
    REFERENCE_TAG,
};
use indexmap::IndexMap;
use lineage_assets::{AssetPropertyGraph, OverrideCapture, SessionConfig};
use lineage_core::{
    DescriptorKind, DocumentId, Item, ItemId, Key, NodePath, ObjectId, ObjectValue,
    OverrideState, PrimitiveKind, TypeRegistry, UnloadableValue, Value,
};
use serde::Serialize;
use serde_yaml::{Mapping, Value as Yaml};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Load settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// The document derives from a base; markers are kept
    pub inherits: bool,
    /// Keep misfit regions as placeholders instead of failing
    pub allow_unloadable: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            inherits: false,
            allow_unloadable: true,
        }
    }
}

impl LoadOptions {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options following a session's configuration
    #[inline]
    #[must_use]
    pub fn from_config(config: &SessionConfig, inherits: bool) -> Self {
        Self {
            inherits,
            allow_unloadable: config.allow_unloadable,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_inherits(mut self, inherits: bool) -> Self {
        self.inherits = inherits;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_allow_unloadable(mut self, allowed: bool) -> Self {
        self.allow_unloadable = allowed;
        self
    }
}

/// Non-fatal findings of a load
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    /// Human-readable warnings, in document order
    pub warnings: Vec<String>,
    /// Locations holding unloadable placeholders
    pub unloadable: Vec<NodePath>,
}

impl LoadReport {
    /// Nothing to report
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    fn warn(&mut self, message: String) {
        warn!("{message}");
        self.warnings.push(message);
    }
}

/// Load a document with default options
///
/// # Errors
/// See [`load_with`]
pub fn load(
    registry: &Arc<TypeRegistry>,
    text: &str,
    document: DocumentId,
    inherits: bool,
) -> Result<(AssetPropertyGraph, LoadReport), YamlError> {
    load_with(registry, text, document, LoadOptions::new().with_inherits(inherits))
}

/// Load a document
///
/// # Errors
/// - `Syntax` for malformed YAML
/// - `InvalidRoot` if the root is not a tagged mapping
/// - `UnknownRootType` if the root tag names no registered object type
/// - region errors (`UnknownType`, `Mismatch`, `InvalidItemKey`) when
///   unloadable regions are not allowed
pub fn load_with(
    registry: &Arc<TypeRegistry>,
    text: &str,
    document: DocumentId,
    options: LoadOptions,
) -> Result<(AssetPropertyGraph, LoadReport), YamlError> {
    let tree: Yaml = serde_yaml::from_str(text)?;
    let root = match tree {
        Yaml::Tagged(root) => root,
        other => {
            return Err(YamlError::InvalidRoot(format!(
                "expected a tagged mapping, found {}",
                kind_name(&other)
            )))
        }
    };

    let type_name = tag_name(&root.tag);
    let is_object = registry
        .get(&type_name)
        .is_ok_and(|d| matches!(d.kind(), DescriptorKind::Object { .. }));
    if !is_object {
        return Err(YamlError::UnknownRootType(type_name));
    }
    let Yaml::Mapping(body) = &root.value else {
        return Err(YamlError::InvalidRoot(format!(
            "'{type_name}' body is a {}",
            kind_name(&root.value)
        )));
    };

    let mut reader = Reader {
        registry: registry.as_ref(),
        options,
        capture: OverrideCapture::default(),
        report: LoadReport::default(),
    };
    let object = reader.object_body(&type_name, body, &NodePath::root())?;
    let Reader {
        capture,
        mut report,
        ..
    } = reader;

    let mut graph = AssetPropertyGraph::new(document, Arc::clone(registry), object, options.inherits)?;
    if !capture.is_empty() {
        if options.inherits {
            graph.load_overrides(&capture)?;
        } else {
            report.warn(format!(
                "document {document} has no base; override markers are ignored"
            ));
        }
    }
    debug!(
        document = %document,
        warnings = report.warnings.len(),
        unloadable = report.unloadable.len(),
        "document loaded"
    );
    Ok((graph, report))
}

/// Load a document from a file
///
/// # Errors
/// Any error of [`load_with`], or `Io`
pub fn load_path(
    registry: &Arc<TypeRegistry>,
    path: impl AsRef<Path>,
    document: DocumentId,
    options: LoadOptions,
) -> Result<(AssetPropertyGraph, LoadReport), YamlError> {
    let text = std::fs::read_to_string(path)?;
    load_with(registry, &text, document, options)
}

// ----------------------------------------------------------------------
// Reader
// ----------------------------------------------------------------------

/// Whether elements below carry persisted ids
#[derive(Debug, Clone, Copy)]
struct Tracking {
    identifiable_items: bool,
}

/// Capture and report lengths to rewind to when a region fails
#[derive(Debug, Clone, Copy)]
struct Mark {
    members: usize,
    items: usize,
    keys: usize,
    deleted: usize,
    unloadable: usize,
}

struct Reader<'a> {
    registry: &'a TypeRegistry,
    options: LoadOptions,
    capture: OverrideCapture,
    report: LoadReport,
}

impl Reader<'_> {
    /// Convert one member or element, isolating its failures
    fn region(
        &mut self,
        type_name: &str,
        tracking: Tracking,
        yaml: &Yaml,
        path: &NodePath,
    ) -> Result<Value, YamlError> {
        let mark = self.mark();
        match self.value(type_name, tracking, yaml, path) {
            Ok(value) => Ok(value),
            Err(err) if err.is_recoverable() && self.options.allow_unloadable => {
                self.rewind(mark);
                let error = err.to_string();
                self.report.warn(format!("unloadable region at '{path}': {error}"));
                self.report.unloadable.push(path.clone());
                placeholder(yaml, error)
            }
            Err(err) => Err(err),
        }
    }

    fn value(
        &mut self,
        type_name: &str,
        tracking: Tracking,
        yaml: &Yaml,
        path: &NodePath,
    ) -> Result<Value, YamlError> {
        let descriptor = self.registry.get(type_name)?;
        match descriptor.kind() {
            DescriptorKind::Nullable { inner } => {
                if yaml.is_null() {
                    Ok(Value::Null)
                } else {
                    self.value(inner, tracking, yaml, path)
                }
            }
            DescriptorKind::Custom => plain(yaml, path),
            DescriptorKind::Primitive(kind) => primitive(*kind, yaml, path),
            DescriptorKind::Object { .. } => self.object(type_name, yaml, path),
            DescriptorKind::Array { element, len } => {
                let Yaml::Sequence(elements) = yaml else {
                    return Err(YamlError::mismatch(type_name, kind_name(yaml), path));
                };
                if elements.len() != *len {
                    return Err(YamlError::mismatch(
                        format!("{len} items"),
                        format!("{} items", elements.len()),
                        path,
                    ));
                }
                self.sequence(element, tracking, elements, path)
            }
            DescriptorKind::Collection { element } => match yaml {
                Yaml::Mapping(entries) if tracking.identifiable_items => {
                    self.identified_list(element, tracking, entries, path)
                }
                Yaml::Sequence(elements) => self.sequence(element, tracking, elements, path),
                other => Err(YamlError::mismatch(type_name, kind_name(other), path)),
            },
            DescriptorKind::Dictionary { key, value } => {
                let Yaml::Mapping(entries) = yaml else {
                    return Err(YamlError::mismatch(type_name, kind_name(yaml), path));
                };
                if tracking.identifiable_items {
                    self.identified_map(*key, value, tracking, entries, path)
                } else {
                    self.plain_map(*key, value, tracking, entries, path)
                }
            }
        }
    }

    fn object(&mut self, declared: &str, yaml: &Yaml, path: &NodePath) -> Result<Value, YamlError> {
        match yaml {
            Yaml::Null => Ok(Value::Null),
            Yaml::Mapping(body) => Ok(Value::Object(self.object_body(declared, body, path)?)),
            Yaml::Tagged(tagged) => {
                let runtime = tag_name(&tagged.tag);
                if runtime == REFERENCE_TAG {
                    return reference(&tagged.value, path);
                }
                if !self.registry.contains(&runtime) {
                    return Err(YamlError::unknown_type(runtime, path));
                }
                if !self.registry.is_assignable(declared, &runtime) {
                    return Err(YamlError::mismatch(declared, runtime, path));
                }
                let Yaml::Mapping(body) = &tagged.value else {
                    return Err(YamlError::mismatch(runtime, kind_name(&tagged.value), path));
                };
                Ok(Value::Object(self.object_body(&runtime, body, path)?))
            }
            other => Err(YamlError::mismatch(declared, kind_name(other), path)),
        }
    }

    fn object_body(&mut self, type_name: &str, body: &Mapping, path: &NodePath) -> Result<ObjectValue, YamlError> {
        let descriptor = self.registry.get(type_name)?;
        let declares_id = descriptor.find_member(ID_MEMBER).is_some();
        let mut object = ObjectValue::new(type_name);

        for (key, yaml) in body {
            let Some(key) = key.as_str() else {
                return Err(YamlError::mismatch("member name", kind_name(key), path));
            };
            let (name, state) = OverrideState::split_marker(key);
            if name == ID_MEMBER && !declares_id {
                let id = yaml
                    .as_str()
                    .and_then(|text| text.parse::<ObjectId>().ok())
                    .ok_or_else(|| YamlError::mismatch("object id", kind_name(yaml), path.member(ID_MEMBER)))?;
                object.id = Some(id);
                continue;
            }
            let Some(member) = descriptor.find_member(name) else {
                // Kept under the key as written, markers included
                let err = YamlError::unknown_member(type_name, name, path);
                if !self.options.allow_unloadable {
                    return Err(err);
                }
                let error = err.to_string();
                self.report.warn(format!("{error}; kept as written"));
                self.report.unloadable.push(path.member(key));
                object.members.insert(key.to_string(), placeholder(yaml, error)?);
                continue;
            };

            let member_path = path.member(name);
            let tracking = Tracking {
                identifiable_items: member.identifiable_items,
            };
            let value = self.region(&member.type_name, tracking, yaml, &member_path)?;
            if !state.is_base() {
                self.capture.members.push((member_path, state));
            }
            object.members.insert(name.to_string(), value);
        }
        Ok(object)
    }

    /// Elements without persisted ids; fresh ids address them
    fn sequence(
        &mut self,
        element: &str,
        tracking: Tracking,
        elements: &[Yaml],
        path: &NodePath,
    ) -> Result<Value, YamlError> {
        let mut items = Vec::with_capacity(elements.len());
        for yaml in elements {
            let id = ItemId::new();
            let value = self.region(element, tracking, yaml, &path.item(id))?;
            items.push(Item::with_id(id, value));
        }
        Ok(Value::List(items))
    }

    fn identified_list(
        &mut self,
        element: &str,
        tracking: Tracking,
        entries: &Mapping,
        path: &NodePath,
    ) -> Result<Value, YamlError> {
        let mut items = Vec::with_capacity(entries.len());
        let mut seen = HashSet::new();
        for (key, yaml) in entries {
            let text = key_text(key).ok_or_else(|| YamlError::invalid_item_key(kind_name(key), path))?;
            if let Some(id) = deletion_record(&text, yaml) {
                if !seen.insert(id) {
                    return Err(YamlError::invalid_item_key(text, path));
                }
                self.capture.deleted.push((path.clone(), id));
                continue;
            }
            let (id, state) = parse_item_key(&text).ok_or_else(|| YamlError::invalid_item_key(&text, path))?;
            if !seen.insert(id) {
                return Err(YamlError::invalid_item_key(text, path));
            }

            let value = self.region(element, tracking, yaml, &path.item(id))?;
            if !state.is_base() {
                self.capture.items.push((path.clone(), id, state));
            }
            items.push(Item::with_id(id, value));
        }
        Ok(Value::List(items))
    }

    fn identified_map(
        &mut self,
        key_kind: PrimitiveKind,
        element: &str,
        tracking: Tracking,
        entries: &Mapping,
        path: &NodePath,
    ) -> Result<Value, YamlError> {
        let mut map = IndexMap::with_capacity(entries.len());
        let mut seen = HashSet::new();
        for (key, yaml) in entries {
            let text = key_text(key).ok_or_else(|| YamlError::invalid_item_key(kind_name(key), path))?;
            if let Some(id) = deletion_record(&text, yaml) {
                if !seen.insert(id) {
                    return Err(YamlError::invalid_item_key(text, path));
                }
                self.capture.deleted.push((path.clone(), id));
                continue;
            }
            let (id, item_state, key_state, key_text) =
                parse_entry_key(&text).ok_or_else(|| YamlError::invalid_item_key(&text, path))?;
            let key = key_kind
                .parse_key(key_text)
                .ok_or_else(|| YamlError::invalid_item_key(&text, path))?;
            if !seen.insert(id) || map.contains_key(&key) {
                return Err(YamlError::invalid_item_key(text, path));
            }

            let value = self.region(element, tracking, yaml, &path.item(id))?;
            if !item_state.is_base() {
                self.capture.items.push((path.clone(), id, item_state));
            }
            if !key_state.is_base() {
                self.capture.keys.push((path.clone(), id, key_state));
            }
            map.insert(key, Item::with_id(id, value));
        }
        Ok(Value::Map(map))
    }

    fn plain_map(
        &mut self,
        key_kind: PrimitiveKind,
        element: &str,
        tracking: Tracking,
        entries: &Mapping,
        path: &NodePath,
    ) -> Result<Value, YamlError> {
        let mut map = IndexMap::with_capacity(entries.len());
        for (key, yaml) in entries {
            let text = key_text(key).ok_or_else(|| YamlError::invalid_item_key(kind_name(key), path))?;
            let key = key_kind
                .parse_key(&text)
                .ok_or_else(|| YamlError::invalid_item_key(&text, path))?;
            if map.contains_key(&key) {
                return Err(YamlError::invalid_item_key(text, path));
            }
            let id = ItemId::new();
            let value = self.region(element, tracking, yaml, &path.item(id))?;
            map.insert(key, Item::with_id(id, value));
        }
        Ok(Value::Map(map))
    }

    fn mark(&self) -> Mark {
        Mark {
            members: self.capture.members.len(),
            items: self.capture.items.len(),
            keys: self.capture.keys.len(),
            deleted: self.capture.deleted.len(),
            unloadable: self.report.unloadable.len(),
        }
    }

    fn rewind(&mut self, mark: Mark) {
        self.capture.members.truncate(mark.members);
        self.capture.items.truncate(mark.items);
        self.capture.keys.truncate(mark.keys);
        self.capture.deleted.truncate(mark.deleted);
        self.report.unloadable.truncate(mark.unloadable);
    }
}

fn placeholder(yaml: &Yaml, error: String) -> Result<Value, YamlError> {
    Ok(Value::Unloadable(UnloadableValue {
        type_name: region_type(yaml),
        raw: serde_yaml::to_string(yaml).map_err(YamlError::Emit)?,
        error,
    }))
}

fn region_type(yaml: &Yaml) -> Option<String> {
    match yaml {
        Yaml::Tagged(tagged) => Some(tag_name(&tagged.tag)).filter(|name| name != REFERENCE_TAG),
        _ => None,
    }
}

fn reference(yaml: &Yaml, path: &NodePath) -> Result<Value, YamlError> {
    yaml.as_str()
        .and_then(|text| text.parse::<ObjectId>().ok())
        .map(Value::Reference)
        .ok_or_else(|| YamlError::mismatch("object id", kind_name(yaml), path))
}

fn primitive(kind: PrimitiveKind, yaml: &Yaml, path: &NodePath) -> Result<Value, YamlError> {
    let value = match (kind, yaml) {
        (PrimitiveKind::Bool, Yaml::Bool(b)) => Some(Value::Bool(*b)),
        (PrimitiveKind::Int, Yaml::Number(n)) => n.as_i64().map(Value::Int),
        (PrimitiveKind::Float, Yaml::Number(n)) => n.as_f64().map(Value::Float),
        (PrimitiveKind::String, Yaml::String(s)) => Some(Value::String(s.clone())),
        _ => None,
    };
    value.ok_or_else(|| YamlError::mismatch(kind.name(), kind_name(yaml), path))
}

/// Untracked conversion for custom types
fn plain(yaml: &Yaml, path: &NodePath) -> Result<Value, YamlError> {
    Ok(match yaml {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(*b),
        Yaml::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or_default()),
        },
        Yaml::String(s) => Value::String(s.clone()),
        Yaml::Sequence(elements) => Value::List(
            elements
                .iter()
                .map(|yaml| plain(yaml, path).map(Item::new))
                .collect::<Result<_, _>>()?,
        ),
        Yaml::Mapping(entries) => {
            let mut map = IndexMap::with_capacity(entries.len());
            for (key, yaml) in entries {
                let key = match key {
                    Yaml::Bool(b) => Key::Bool(*b),
                    Yaml::String(s) => Key::String(s.clone()),
                    Yaml::Number(n) => n
                        .as_i64()
                        .map(Key::Int)
                        .ok_or_else(|| YamlError::invalid_item_key(n.to_string(), path))?,
                    other => return Err(YamlError::invalid_item_key(kind_name(other), path)),
                };
                map.insert(key, Item::new(plain(yaml, path)?));
            }
            Value::Map(map)
        }
        Yaml::Tagged(tagged) => {
            let name = tag_name(&tagged.tag);
            if name == REFERENCE_TAG {
                return reference(&tagged.value, path);
            }
            let Yaml::Mapping(entries) = &tagged.value else {
                return Err(YamlError::mismatch(name, kind_name(&tagged.value), path));
            };
            let mut object = ObjectValue::new(name);
            for (key, yaml) in entries {
                let Some(key) = key.as_str() else {
                    return Err(YamlError::mismatch("member name", kind_name(key), path));
                };
                object.members.insert(key.to_string(), plain(yaml, path)?);
            }
            Value::Object(object)
        }
    })
}
