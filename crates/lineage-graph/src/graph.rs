//! Node graph
//!
//! Provides [`NodeGraph`], the arena that owns every node of one document.
//! Values enter through [`NodeGraph::new`], [`NodeGraph::set`] and the
//! structural operations, and are materialized into nodes immediately.
//! Parents own their children; the parent link on a node is lookup only.
//!
//! `set` reconciles instead of rebuilding: objects of the same type and
//! identity keep their member nodes, and elements whose [`ItemId`] (or
//! dictionary key) already exists keep theirs. A node handle therefore stays
//! valid across a `set` that does not remove its location.

use crate::error::GraphError;
use crate::item_ids::{ItemIdMap, ItemIdentifiers};
use crate::node::{Content, GraphListener, Node, NodeChange, NodeFlags, NodeId, NodeKind};
use crate::reference::{
    EnumerableReference, ObjectReference, Reference, ReferenceTarget, ReferenceTracker,
};
use indexmap::IndexMap;
use lineage_core::{
    DescriptorKind, Item, ItemId, Key, NodePath, ObjectId, ObjectValue, Segment, TypeDescriptor,
    TypeRegistry, Value,
};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Element taken out of a container
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedItem {
    /// Position it occupied
    pub index: usize,
    /// Dictionary key, for dictionary entries
    pub key: Option<Key>,
    /// The element, with its id
    pub item: Item,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Members kept from a document but unknown to their type: opaque and
/// never overridden
const UNDECLARED: NodeFlags = NodeFlags {
    overridable: false,
    identifiable_items: false,
};

enum Plan {
    Members(IndexMap<String, NodeId>),
    Items,
    Entries,
    Unchanged,
    Rebuild,
}

/// Arena-owned tree of nodes for one document
pub struct NodeGraph {
    registry: Arc<TypeRegistry>,
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    root: NodeId,
    item_ids: ItemIdMap,
    references: ReferenceTracker,
    touched: Vec<ObjectId>,
    journal: Option<Vec<NodeChange>>,
    listeners: Vec<Arc<dyn GraphListener>>,
}

impl fmt::Debug for NodeGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeGraph")
            .field("root", &self.root)
            .field("live", &self.live)
            .field("containers", &self.item_ids.len())
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl Clone for NodeGraph {
    /// Deep copy without listeners or pending journal entries
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            slots: self.slots.clone(),
            free: self.free.clone(),
            live: self.live,
            root: self.root,
            item_ids: self.item_ids.clone(),
            references: self.references.clone(),
            touched: Vec::new(),
            journal: self.journal.as_ref().map(|_| Vec::new()),
            listeners: Vec::new(),
        }
    }
}

impl NodeGraph {
    /// Materialize a document from its root object
    ///
    /// # Errors
    /// - `UnknownType` if the root type is not registered
    /// - `TypeMismatch` if the value does not fit its descriptors
    /// - `DuplicateItemId` if a container repeats an id
    pub fn new(registry: Arc<TypeRegistry>, root: ObjectValue) -> Result<Self, GraphError> {
        let type_name = root.type_name.clone();
        let value = Value::Object(root);

        let mut graph = Self {
            registry,
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            root: NodeId {
                index: 0,
                generation: 0,
            },
            item_ids: ItemIdMap::new(),
            references: ReferenceTracker::default(),
            touched: Vec::new(),
            journal: None,
            listeners: Vec::new(),
        };
        graph.check_value(&type_name, &value)?;
        graph.root = graph.build(None, NodeKind::Object, type_name, NodeFlags::default(), value)?;
        graph.refresh_subtree(graph.root);
        graph.touched.clear();

        tracing::debug!(nodes = graph.live, "node graph built");
        Ok(graph)
    }

    /// Type registry the graph was built with
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Document root
    #[inline]
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Whether `id` refers to a live node
    #[inline]
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    /// Node by id
    ///
    /// # Errors
    /// Returns `StaleNode` if the node was destroyed
    pub fn node(&self, id: NodeId) -> Result<&Node, GraphError> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or(GraphError::StaleNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, GraphError> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(GraphError::StaleNode(id))
    }

    /// Live nodes in arena order
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            #[allow(clippy::cast_possible_truncation)]
            let id = NodeId {
                index: index as u32,
                generation: slot.generation,
            };
            slot.node.as_ref().map(|node| (id, node))
        })
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Resolve a root-relative path
    ///
    /// # Errors
    /// Returns `PathNotFound` if any member or item along the path is missing
    pub fn resolve(&self, path: &NodePath) -> Result<NodeId, GraphError> {
        self.resolve_from(self.root, path)
    }

    /// Resolve a path relative to `start`
    ///
    /// # Errors
    /// Returns `PathNotFound` if any member or item along the path is missing
    pub fn resolve_from(&self, start: NodeId, path: &NodePath) -> Result<NodeId, GraphError> {
        let mut current = start;
        for segment in path.iter() {
            current = self
                .step(current, segment)
                .ok_or_else(|| GraphError::path_not_found(path))?;
        }
        Ok(current)
    }

    fn step(&self, node: NodeId, segment: &Segment) -> Option<NodeId> {
        let n = self.node(node).ok()?;
        match (&n.content, segment) {
            (Content::Object { members, .. }, Segment::Member(name)) => members.get(name).copied(),
            (Content::Sequence(children) | Content::Map(children), Segment::Item(id)) => {
                let index = self.item_ids.lookup(node, *id).ok()?;
                children.get(index).copied()
            }
            (Content::Sequence(children) | Content::Map(children), Segment::Index(index)) => {
                children.get(*index).copied()
            }
            (Content::Map(children), Segment::Key(key)) => {
                let ids = self.item_ids.get(node)?;
                let index = ids.lookup(ids.id_for_key(key)?).ok()?;
                children.get(index).copied()
            }
            _ => None,
        }
    }

    /// Root-relative path of a node (elements addressed by id)
    ///
    /// # Errors
    /// Returns `StaleNode` if the node or an ancestor was destroyed
    pub fn path_of(&self, node: NodeId) -> Result<NodePath, GraphError> {
        let mut segments = Vec::new();
        let mut current = self.node(node)?;
        loop {
            match &current.kind {
                NodeKind::Object => break,
                NodeKind::Member { name } => segments.push(Segment::Member(name.clone())),
                NodeKind::CollectionItem { id } | NodeKind::DictionaryEntry { id } => {
                    segments.push(Segment::Item(*id));
                }
            }
            match current.parent {
                Some(parent) => current = self.node(parent)?,
                None => break,
            }
        }
        segments.reverse();
        Ok(NodePath::from(segments))
    }

    /// Ordered children (empty for leaves)
    ///
    /// # Errors
    /// Returns `StaleNode` if the node was destroyed
    pub fn children(&self, node: NodeId) -> Result<Vec<NodeId>, GraphError> {
        Ok(self.node(node)?.child_ids())
    }

    /// Member node of an object
    ///
    /// # Errors
    /// - `StaleNode` if the node was destroyed
    /// - `PathNotFound` if there is no such member
    pub fn member(&self, node: NodeId, name: &str) -> Result<NodeId, GraphError> {
        match &self.node(node)?.content {
            Content::Object { members, .. } => members
                .get(name)
                .copied()
                .ok_or_else(|| GraphError::path_not_found(name)),
            _ => Err(GraphError::path_not_found(name)),
        }
    }

    /// Element node by id
    ///
    /// # Errors
    /// - `NotAContainer` if the node holds no elements
    /// - `ItemNotFound` if the id is not present
    pub fn item(&self, container: NodeId, id: ItemId) -> Result<NodeId, GraphError> {
        let children = self.container_children(container)?;
        let index = self.item_ids.lookup(container, id)?;
        children
            .get(index)
            .copied()
            .ok_or(GraphError::ItemNotFound { id })
    }

    fn container_children(&self, container: NodeId) -> Result<&[NodeId], GraphError> {
        match &self.node(container)?.content {
            Content::Sequence(children) | Content::Map(children) => Ok(children),
            _ => Err(GraphError::NotAContainer(container)),
        }
    }

    /// Item identifiers of a container
    #[inline]
    #[must_use]
    pub fn item_ids(&self, container: NodeId) -> Option<&ItemIdentifiers> {
        self.item_ids.get(container)
    }

    /// Item identifier map of the whole graph
    #[inline]
    #[must_use]
    pub fn item_id_map(&self) -> &ItemIdMap {
        &self.item_ids
    }

    /// Key of a dictionary entry
    #[must_use]
    pub fn key_of(&self, container: NodeId, id: ItemId) -> Option<Key> {
        self.item_ids.get(container)?.key_of(id).cloned()
    }

    /// Node and every descendant, parents before children
    ///
    /// # Errors
    /// Returns `StaleNode` if the node was destroyed
    pub fn descendants(&self, node: NodeId) -> Result<Vec<NodeId>, GraphError> {
        self.node(node)?;
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            out.push(current);
            if let Ok(n) = self.node(current) {
                stack.extend(n.child_ids().into_iter().rev());
            }
        }
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Descriptors
    // ------------------------------------------------------------------

    /// Descriptor of a node's current content (nullable wrappers removed
    /// unless the node holds null)
    ///
    /// # Errors
    /// `StaleNode` or `UnknownType`
    pub fn descriptor(&self, node: NodeId) -> Result<Arc<TypeDescriptor>, GraphError> {
        let n = self.node(node)?;
        match &n.content {
            Content::Leaf(Value::Null) => Ok(self.registry.get(&n.type_name)?),
            _ => self.strip_nullable(&n.type_name),
        }
    }

    /// Declared element type of a container
    ///
    /// # Errors
    /// `StaleNode`, `UnknownType` or `NotAContainer`
    pub fn element_type(&self, container: NodeId) -> Result<String, GraphError> {
        let descriptor = self.strip_nullable(&self.node(container)?.type_name)?;
        descriptor
            .element_type()
            .map(str::to_string)
            .ok_or(GraphError::NotAContainer(container))
    }

    fn strip_nullable(&self, type_name: &str) -> Result<Arc<TypeDescriptor>, GraphError> {
        let mut descriptor = self.registry.get(type_name)?;
        loop {
            let inner = match descriptor.kind() {
                DescriptorKind::Nullable { inner } => inner.clone(),
                _ => return Ok(descriptor),
            };
            descriptor = self.registry.get(&inner)?;
        }
    }

    fn effective_descriptor(
        &self,
        type_name: &str,
        value: &Value,
    ) -> Result<Arc<TypeDescriptor>, GraphError> {
        if matches!(value, Value::Null) {
            Ok(self.registry.get(type_name)?)
        } else {
            self.strip_nullable(type_name)
        }
    }

    fn is_object_type(&self, type_name: &str) -> bool {
        self.strip_nullable(type_name)
            .is_ok_and(|d| matches!(d.kind(), DescriptorKind::Object { .. }))
    }

    /// Type check plus per-container id uniqueness
    fn check_value(&self, type_name: &str, value: &Value) -> Result<(), GraphError> {
        self.registry.check(type_name, value)?;
        check_unique_ids(value)
    }

    // ------------------------------------------------------------------
    // Values
    // ------------------------------------------------------------------

    /// Current value of a node, with element ids
    ///
    /// # Errors
    /// Returns `StaleNode` if the node was destroyed
    pub fn get(&self, node: NodeId) -> Result<Value, GraphError> {
        let n = self.node(node)?;
        Ok(match &n.content {
            Content::Leaf(value) => value.clone(),
            Content::Object {
                type_name,
                id,
                members,
            } => {
                let mut object = ObjectValue::new(type_name.clone());
                object.id = *id;
                for (name, child) in members {
                    object.members.insert(name.clone(), self.get(*child)?);
                }
                Value::Object(object)
            }
            Content::Sequence(children) => {
                let ids = self.item_ids.get(node).ok_or(GraphError::NotAContainer(node))?;
                let mut items = Vec::with_capacity(children.len());
                for (id, child) in ids.ids().iter().zip(children) {
                    items.push(Item::with_id(*id, self.get(*child)?));
                }
                Value::List(items)
            }
            Content::Map(children) => {
                let ids = self.item_ids.get(node).ok_or(GraphError::NotAContainer(node))?;
                let mut entries = IndexMap::with_capacity(children.len());
                for (id, child) in ids.ids().iter().zip(children) {
                    let key = ids.key_of(*id).cloned().ok_or(GraphError::ItemNotFound { id: *id })?;
                    entries.insert(key, Item::with_id(*id, self.get(*child)?));
                }
                Value::Map(entries)
            }
        })
    }

    /// Replace a node's value, returning the previous one
    ///
    /// # Errors
    /// - `StaleNode` if the node was destroyed
    /// - `TypeMismatch` if the value does not fit the declared type
    /// - `DuplicateItemId` if a container in the value repeats an id
    pub fn set(&mut self, node: NodeId, value: Value) -> Result<Value, GraphError> {
        let type_name = self.node(node)?.type_name.clone();
        self.check_value(&type_name, &value)?;

        let previous = self.get(node)?;
        self.reconcile(node, value)?;

        self.refresh_subtree(node);
        if let Some(parent) = self.node(node)?.parent {
            self.refresh_node(parent);
        }
        self.refresh_touched();
        Ok(previous)
    }

    fn reconcile(&mut self, node: NodeId, value: Value) -> Result<(), GraphError> {
        let plan = {
            let n = self.node(node)?;
            match (&n.content, &value) {
                (
                    Content::Object {
                        type_name, id, members, ..
                    },
                    Value::Object(object),
                ) if *type_name == object.type_name
                    && *id == object.id
                    && self.same_undeclared(members, object) =>
                {
                    Plan::Members(members.clone())
                }
                (Content::Sequence(_), Value::List(_)) => Plan::Items,
                (Content::Map(_), Value::Map(_)) => Plan::Entries,
                (Content::Leaf(current), value) if current == value => Plan::Unchanged,
                _ => Plan::Rebuild,
            }
        };

        match (plan, value) {
            (Plan::Unchanged, _) => Ok(()),
            (Plan::Members(members), Value::Object(mut object)) => {
                let runtime = self.registry.get(&object.type_name)?;
                for member in runtime.members() {
                    let member_value = self.member_value(&mut object, member);
                    if let Some(child) = members.get(&member.name) {
                        self.reconcile(*child, member_value)?;
                    }
                }
                for (name, member_value) in object.members {
                    if let Some(child) = members.get(&name) {
                        self.reconcile(*child, member_value)?;
                    }
                }
                Ok(())
            }
            (Plan::Items, Value::List(items)) => self.reconcile_items(node, items),
            (Plan::Entries, Value::Map(entries)) => self.reconcile_entries(node, entries),
            (_, value) => {
                let (type_name, flags) = {
                    let n = self.node(node)?;
                    (n.type_name.clone(), n.flags)
                };
                self.clear_content(node)?;
                let content = self.build_content(node, &type_name, flags, value)?;
                self.node_mut(node)?.content = content;
                self.emit(NodeChange::ValueChanged { node });
                Ok(())
            }
        }
    }

    fn reconcile_items(&mut self, node: NodeId, items: Vec<Item>) -> Result<(), GraphError> {
        let element = self.element_type(node)?;
        let flags = self.item_flags(node)?;
        let old_ids = self
            .item_ids
            .get(node)
            .map(|ids| ids.ids().to_vec())
            .unwrap_or_default();
        let mut existing: HashMap<ItemId, NodeId> = old_ids
            .iter()
            .copied()
            .zip(self.container_children(node)?.iter().copied())
            .collect();

        let mut children = Vec::with_capacity(items.len());
        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            let id = item.id.unwrap_or_else(ItemId::new);
            let child = match existing.remove(&id) {
                Some(child) => {
                    self.reconcile(child, item.value)?;
                    child
                }
                None => self.build(
                    Some(node),
                    NodeKind::CollectionItem { id },
                    element.clone(),
                    flags,
                    item.value,
                )?,
            };
            children.push(child);
            ids.push(id);
        }

        self.finish_container(node, &old_ids, existing, children, ids, None)
    }

    fn reconcile_entries(
        &mut self,
        node: NodeId,
        entries: IndexMap<Key, Item>,
    ) -> Result<(), GraphError> {
        let element = self.element_type(node)?;
        let flags = self.item_flags(node)?;
        let (old_ids, old_keys): (Vec<ItemId>, HashMap<Key, ItemId>) = match self.item_ids.get(node)
        {
            Some(ids) => (
                ids.ids().to_vec(),
                ids.ids()
                    .iter()
                    .filter_map(|id| ids.key_of(*id).map(|k| (k.clone(), *id)))
                    .collect(),
            ),
            None => (Vec::new(), HashMap::new()),
        };
        let mut existing: HashMap<ItemId, NodeId> = old_ids
            .iter()
            .copied()
            .zip(self.container_children(node)?.iter().copied())
            .collect();
        let explicit: HashSet<ItemId> = entries.values().filter_map(|i| i.id).collect();

        let mut children = Vec::with_capacity(entries.len());
        let mut ids = Vec::with_capacity(entries.len());
        let mut keys = Vec::with_capacity(entries.len());
        for (key, item) in entries {
            let id = item.id.unwrap_or_else(|| {
                old_keys
                    .get(&key)
                    .copied()
                    .filter(|id| existing.contains_key(id) && !explicit.contains(id))
                    .unwrap_or_else(ItemId::new)
            });
            let child = match existing.remove(&id) {
                Some(child) => {
                    self.reconcile(child, item.value)?;
                    child
                }
                None => self.build(
                    Some(node),
                    NodeKind::DictionaryEntry { id },
                    element.clone(),
                    flags,
                    item.value,
                )?,
            };
            children.push(child);
            ids.push(id);
            keys.push(Some(key));
        }

        self.finish_container(node, &old_ids, existing, children, ids, Some(keys))
    }

    fn finish_container(
        &mut self,
        node: NodeId,
        old_ids: &[ItemId],
        mut leftover: HashMap<ItemId, NodeId>,
        children: Vec<NodeId>,
        ids: Vec<ItemId>,
        keys: Option<Vec<Option<Key>>>,
    ) -> Result<(), GraphError> {
        for id in old_ids {
            if let Some(child) = leftover.remove(id) {
                self.destroy(child);
            }
        }

        let keys_changed = keys.as_ref().is_some_and(|keys| {
            self.item_ids.get(node).map_or(true, |current| {
                ids.iter()
                    .zip(keys)
                    .any(|(id, key)| current.key_of(*id) != key.as_ref())
            })
        });
        let changed = old_ids != ids.as_slice() || keys_changed;

        let is_map = keys.is_some();
        let keys = keys.unwrap_or_else(|| vec![None; ids.len()]);
        self.item_ids.entry(node).reset(ids, keys);
        self.node_mut(node)?.content = if is_map {
            Content::Map(children)
        } else {
            Content::Sequence(children)
        };

        if changed {
            self.emit(NodeChange::ValueChanged { node });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Structural operations
    // ------------------------------------------------------------------

    /// Insert an element into an array-free collection
    ///
    /// An id carried by `item` is adopted; otherwise a fresh one is assigned.
    ///
    /// # Errors
    /// - `NotAContainer` / `FixedSize` for dictionaries, leaves or arrays
    /// - `IndexOutOfBounds` if `index > len`
    /// - `TypeMismatch` if the value does not fit the element type
    /// - `DuplicateItemId` if the id is already present or has a deletion record
    pub fn insert_item(
        &mut self,
        container: NodeId,
        index: usize,
        item: Item,
    ) -> Result<ItemId, GraphError> {
        let len = match &self.node(container)?.content {
            Content::Sequence(children) => children.len(),
            _ => return Err(GraphError::NotAContainer(container)),
        };
        self.ensure_resizable(container)?;
        self.insert_child(container, index, len, None, item)
    }

    /// Insert a dictionary entry
    ///
    /// # Errors
    /// As [`insert_item`](Self::insert_item), plus `DuplicateKey`
    pub fn insert_entry(
        &mut self,
        container: NodeId,
        index: usize,
        key: Key,
        item: Item,
    ) -> Result<ItemId, GraphError> {
        let len = match &self.node(container)?.content {
            Content::Map(children) => children.len(),
            _ => return Err(GraphError::NotAContainer(container)),
        };
        self.check_key(container, &key)?;
        if self
            .item_ids
            .get(container)
            .is_some_and(|ids| ids.id_for_key(&key).is_some())
        {
            return Err(GraphError::DuplicateKey(key.to_string()));
        }
        self.insert_child(container, index, len, Some(key), item)
    }

    fn insert_child(
        &mut self,
        container: NodeId,
        index: usize,
        len: usize,
        key: Option<Key>,
        item: Item,
    ) -> Result<ItemId, GraphError> {
        if index > len {
            return Err(GraphError::IndexOutOfBounds { index, len });
        }
        let element = self.element_type(container)?;
        self.check_value(&element, &item.value)?;

        let id = item.id.unwrap_or_else(ItemId::new);
        // A deletion record keeps its id reserved
        if self
            .item_ids
            .get(container)
            .is_some_and(|ids| ids.contains(id) || ids.is_deleted(id))
        {
            return Err(GraphError::DuplicateItemId(id));
        }

        let flags = self.item_flags(container)?;
        let kind = if key.is_some() {
            NodeKind::DictionaryEntry { id }
        } else {
            NodeKind::CollectionItem { id }
        };
        let child = self.build(Some(container), kind, element, flags, item.value)?;

        let ids = self.item_ids.entry(container);
        ids.insert(index, id)?;
        if let Some(key) = key {
            ids.set_key(id, key)?;
        }
        match &mut self.node_mut(container)?.content {
            Content::Sequence(children) | Content::Map(children) => children.insert(index, child),
            _ => return Err(GraphError::NotAContainer(container)),
        }

        self.emit(NodeChange::ItemInserted {
            container,
            id,
            index,
        });
        self.refresh_node(container);
        self.refresh_subtree(child);
        self.refresh_touched();
        Ok(id)
    }

    /// Remove an element, returning it with its id and former position
    ///
    /// # Errors
    /// - `NotAContainer` / `FixedSize`
    /// - `ItemNotFound` if the id is not present
    pub fn remove_item(&mut self, container: NodeId, id: ItemId) -> Result<RemovedItem, GraphError> {
        self.container_children(container)?;
        self.ensure_resizable(container)?;

        let child = self.item(container, id)?;
        let value = self.get(child)?;
        let key = self.key_of(container, id);
        let index = self.item_ids.get_mut(container)?.remove(id)?;
        if let Content::Sequence(children) | Content::Map(children) =
            &mut self.node_mut(container)?.content
        {
            children.remove(index);
        }
        self.destroy(child);

        self.emit(NodeChange::ItemRemoved {
            container,
            id,
            index,
        });
        self.refresh_node(container);
        self.refresh_touched();
        Ok(RemovedItem {
            index,
            key,
            item: Item::with_id(id, value),
        })
    }

    /// Move an element to `position`, returning its former position
    ///
    /// # Errors
    /// - `NotAContainer`
    /// - `ItemNotFound` if the id is not present
    /// - `IndexOutOfBounds` if `position >= len`
    pub fn move_item(
        &mut self,
        container: NodeId,
        id: ItemId,
        position: usize,
    ) -> Result<usize, GraphError> {
        self.container_children(container)?;
        let from = self.item_ids.get_mut(container)?.move_to(id, position)?;
        if let Content::Sequence(children) | Content::Map(children) =
            &mut self.node_mut(container)?.content
        {
            let child = children.remove(from);
            children.insert(position, child);
        }
        if from != position {
            self.emit(NodeChange::ItemMoved {
                container,
                id,
                from,
                to: position,
            });
            self.refresh_node(container);
        }
        Ok(from)
    }

    /// Change the key of a dictionary entry, returning the old key
    ///
    /// # Errors
    /// - `NotAContainer` for non-dictionaries
    /// - `TypeMismatch` if the key kind is wrong
    /// - `DuplicateKey` if another entry uses the key
    /// - `ItemNotFound` if the id is not present
    pub fn rename_key(&mut self, container: NodeId, id: ItemId, key: Key) -> Result<Key, GraphError> {
        if !self.node(container)?.is_dictionary() {
            return Err(GraphError::NotAContainer(container));
        }
        self.check_key(container, &key)?;
        let ids = self.item_ids.get_mut(container)?;
        ids.lookup(id)?;
        if ids.key_of(id) == Some(&key) {
            return Ok(key);
        }
        let previous = ids.set_key(id, key.clone())?.unwrap_or(key);
        self.emit(NodeChange::ItemRenamed { container, id });
        Ok(previous)
    }

    /// Give an element a different id, keeping its node, position and key
    ///
    /// # Errors
    /// - `NotAContainer`
    /// - `ItemNotFound` if `old` is not present
    /// - `DuplicateItemId` if `new` is already present
    pub fn remap_item(&mut self, container: NodeId, old: ItemId, new: ItemId) -> Result<(), GraphError> {
        let child = self.item(container, old)?;
        self.item_ids.get_mut(container)?.remap(old, new)?;
        let node = self.node_mut(child)?;
        node.kind = match node.kind {
            NodeKind::DictionaryEntry { .. } => NodeKind::DictionaryEntry { id: new },
            _ => NodeKind::CollectionItem { id: new },
        };
        self.emit(NodeChange::ItemRenamed { container, id: new });
        self.refresh_node(container);
        Ok(())
    }

    /// Record a local deletion of an inherited element
    ///
    /// # Errors
    /// Returns `NotAContainer` if the node holds no elements
    pub fn mark_deleted(&mut self, container: NodeId, id: ItemId) -> Result<bool, GraphError> {
        self.container_children(container)?;
        Ok(self.item_ids.entry(container).mark_deleted(id))
    }

    /// Drop a deletion record
    ///
    /// # Errors
    /// Returns `NotAContainer` if the node holds no elements
    pub fn unmark_deleted(&mut self, container: NodeId, id: ItemId) -> Result<bool, GraphError> {
        self.container_children(container)?;
        Ok(self.item_ids.entry(container).unmark_deleted(id))
    }

    fn ensure_resizable(&self, container: NodeId) -> Result<(), GraphError> {
        match self.strip_nullable(&self.node(container)?.type_name)?.kind() {
            DescriptorKind::Array { len, .. } => Err(GraphError::FixedSize { len: *len }),
            _ => Ok(()),
        }
    }

    fn check_key(&self, container: NodeId, key: &Key) -> Result<(), GraphError> {
        match self.strip_nullable(&self.node(container)?.type_name)?.kind() {
            DescriptorKind::Dictionary { key: kind, .. } if kind.accepts_key(key) => Ok(()),
            DescriptorKind::Dictionary { key: kind, .. } => Err(GraphError::TypeMismatch {
                expected: format!("{} key", kind.name()),
                found: format!("key '{key}'"),
                at: self.path_of(container)?.to_string(),
            }),
            _ => Err(GraphError::NotAContainer(container)),
        }
    }

    fn item_flags(&self, container: NodeId) -> Result<NodeFlags, GraphError> {
        Ok(NodeFlags {
            overridable: true,
            identifiable_items: self.node(container)?.flags.identifiable_items,
        })
    }

    // ------------------------------------------------------------------
    // References
    // ------------------------------------------------------------------

    /// Reference tracker of this graph
    #[inline]
    #[must_use]
    pub fn references(&self) -> &ReferenceTracker {
        &self.references
    }

    /// Reference rooted at a node, if it holds object-typed content
    #[inline]
    #[must_use]
    pub fn reference(&self, node: NodeId) -> Option<&Reference> {
        self.references.get(node)
    }

    /// Node holding the object with this identity
    #[inline]
    #[must_use]
    pub fn find_object(&self, id: ObjectId) -> Option<NodeId> {
        self.references.identity(id)
    }

    /// Recompute the reference rooted at `node`, returning whether it changed
    ///
    /// # Errors
    /// Returns `StaleNode` if the node was destroyed
    pub fn refresh_references(&mut self, node: NodeId) -> Result<bool, GraphError> {
        self.node(node)?;
        Ok(self.refresh_node(node))
    }

    fn refresh_node(&mut self, node: NodeId) -> bool {
        let (reference, watched) = self.compute_reference(node);
        self.references.store(node, reference, watched)
    }

    fn refresh_subtree(&mut self, node: NodeId) {
        if let Ok(nodes) = self.descendants(node) {
            for n in nodes {
                self.refresh_node(n);
            }
        }
    }

    fn refresh_touched(&mut self) {
        let touched = std::mem::take(&mut self.touched);
        let mut dependents: Vec<NodeId> = touched
            .iter()
            .flat_map(|id| self.references.dependents(*id))
            .collect();
        dependents.sort_unstable();
        dependents.dedup();
        for node in dependents {
            if self.contains(node) {
                self.refresh_node(node);
            }
        }
    }

    fn compute_reference(&self, node: NodeId) -> (Option<Reference>, Vec<ObjectId>) {
        let Ok(n) = self.node(node) else {
            return (None, Vec::new());
        };
        let mut watched = Vec::new();
        let reference = match &n.content {
            Content::Sequence(children) | Content::Map(children) => {
                let is_objects = self
                    .element_type(node)
                    .is_ok_and(|element| self.is_object_type(&element));
                match self.item_ids.get(node) {
                    Some(ids) if is_objects => {
                        let previous = match self.references.get(node) {
                            Some(Reference::Enumerable(e)) => Some(e),
                            _ => None,
                        };
                        let mut targets = IndexMap::new();
                        for (id, child) in ids.ids().iter().zip(children) {
                            let Some(target) = self.target_of(*child, &mut watched) else {
                                continue;
                            };
                            // Keep the existing entry when its identity is unchanged
                            let target = previous
                                .and_then(|p| p.target(*id))
                                .filter(|old| *old == target)
                                .unwrap_or(target);
                            targets.insert(*id, target);
                        }
                        Some(Reference::Enumerable(EnumerableReference::new(targets)))
                    }
                    _ => None,
                }
            }
            _ if n.kind.item_id().is_some() => None,
            _ if self.is_object_type(&n.type_name) => Some(Reference::Object(ObjectReference::new(
                self.target_of(node, &mut watched),
            ))),
            _ => None,
        };
        (reference, watched)
    }

    fn target_of(&self, node: NodeId, watched: &mut Vec<ObjectId>) -> Option<ReferenceTarget> {
        match &self.node(node).ok()?.content {
            Content::Object { .. } => Some(ReferenceTarget::Owned(node)),
            Content::Leaf(Value::Reference(id)) => {
                watched.push(*id);
                Some(
                    self.references
                        .identity(*id)
                        .map_or(ReferenceTarget::Unresolved(*id), ReferenceTarget::Resolved),
                )
            }
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Notifications and snapshots
    // ------------------------------------------------------------------

    /// Subscribe to change notifications
    pub fn subscribe(&mut self, listener: Arc<dyn GraphListener>) {
        self.listeners.push(listener);
    }

    /// Start keeping changes for [`drain_changes`](Self::drain_changes)
    pub fn enable_journal(&mut self) {
        self.journal.get_or_insert_with(Vec::new);
    }

    /// Take the changes recorded since the last drain
    pub fn drain_changes(&mut self) -> Vec<NodeChange> {
        self.journal.as_mut().map(std::mem::take).unwrap_or_default()
    }

    /// Immutable copy for background readers
    #[must_use]
    pub fn snapshot(&self) -> Arc<NodeGraph> {
        Arc::new(self.clone())
    }

    fn emit(&mut self, change: NodeChange) {
        for listener in &self.listeners {
            listener.on_change(&change);
        }
        if let Some(journal) = &mut self.journal {
            journal.push(change);
        }
    }

    // ------------------------------------------------------------------
    // Arena
    // ------------------------------------------------------------------

    fn alloc(&mut self, node: Node) -> NodeId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }
        #[allow(clippy::cast_possible_truncation)]
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId {
            index,
            generation: 0,
        }
    }

    fn build(
        &mut self,
        parent: Option<NodeId>,
        kind: NodeKind,
        type_name: String,
        flags: NodeFlags,
        value: Value,
    ) -> Result<NodeId, GraphError> {
        let id = self.alloc(Node {
            kind,
            parent,
            type_name: type_name.clone(),
            flags,
            content: Content::Leaf(Value::Null),
        });
        let content = self.build_content(id, &type_name, flags, value)?;
        self.node_mut(id)?.content = content;
        Ok(id)
    }

    fn build_content(
        &mut self,
        node: NodeId,
        type_name: &str,
        flags: NodeFlags,
        value: Value,
    ) -> Result<Content, GraphError> {
        let descriptor = self.effective_descriptor(type_name, &value)?;
        let item_flags = NodeFlags {
            overridable: true,
            identifiable_items: flags.identifiable_items,
        };

        match (descriptor.kind(), value) {
            (DescriptorKind::Object { .. }, Value::Object(mut object)) => {
                let runtime = self.registry.get(&object.type_name)?;
                let mut members = IndexMap::new();
                for member in runtime.members() {
                    let member_value = self.member_value(&mut object, member);
                    let child = self.build(
                        Some(node),
                        NodeKind::Member {
                            name: member.name.clone(),
                        },
                        member.type_name.clone(),
                        NodeFlags {
                            overridable: member.overridable,
                            identifiable_items: member.identifiable_items,
                        },
                        member_value,
                    )?;
                    members.insert(member.name.clone(), child);
                }
                for (name, member_value) in std::mem::take(&mut object.members) {
                    let child = self.build(
                        Some(node),
                        NodeKind::Member { name: name.clone() },
                        TypeRegistry::ANY.to_string(),
                        UNDECLARED,
                        member_value,
                    )?;
                    members.insert(name, child);
                }
                if let Some(id) = object.id {
                    self.references.register_identity(id, node);
                    self.touched.push(id);
                }
                Ok(Content::Object {
                    type_name: object.type_name,
                    id: object.id,
                    members,
                })
            }
            (
                DescriptorKind::Array { element, .. } | DescriptorKind::Collection { element },
                Value::List(items),
            ) => {
                let mut children = Vec::with_capacity(items.len());
                let mut ids = Vec::with_capacity(items.len());
                for item in items {
                    let id = item.id.unwrap_or_else(ItemId::new);
                    children.push(self.build(
                        Some(node),
                        NodeKind::CollectionItem { id },
                        element.clone(),
                        item_flags,
                        item.value,
                    )?);
                    ids.push(id);
                }
                let keys = vec![None; ids.len()];
                self.item_ids.entry(node).reset(ids, keys);
                Ok(Content::Sequence(children))
            }
            (DescriptorKind::Dictionary { value: element, .. }, Value::Map(entries)) => {
                let mut children = Vec::with_capacity(entries.len());
                let mut ids = Vec::with_capacity(entries.len());
                let mut keys = Vec::with_capacity(entries.len());
                for (key, item) in entries {
                    let id = item.id.unwrap_or_else(ItemId::new);
                    children.push(self.build(
                        Some(node),
                        NodeKind::DictionaryEntry { id },
                        element.clone(),
                        item_flags,
                        item.value,
                    )?);
                    ids.push(id);
                    keys.push(Some(key));
                }
                self.item_ids.entry(node).reset(ids, keys);
                Ok(Content::Map(children))
            }
            (_, value) => Ok(Content::Leaf(value)),
        }
    }

    /// Whether a node and a value carry the same members their type does
    /// not declare
    fn same_undeclared(&self, members: &IndexMap<String, NodeId>, object: &ObjectValue) -> bool {
        let Ok(runtime) = self.registry.get(&object.type_name) else {
            return false;
        };
        let undeclared = |name: &&String| runtime.find_member(name).is_none();
        members.keys().filter(undeclared).all(|name| object.members.contains_key(name))
            && object.members.keys().filter(undeclared).all(|name| members.contains_key(name))
    }

    fn member_value(
        &self,
        object: &mut ObjectValue,
        member: &lineage_core::MemberDescriptor,
    ) -> Value {
        object
            .members
            .shift_remove(&member.name)
            .or_else(|| member.default.clone())
            .unwrap_or_else(|| self.registry.default_value(&member.type_name))
    }

    /// Free the children of a node and forget its identity
    fn clear_content(&mut self, node: NodeId) -> Result<(), GraphError> {
        let content = std::mem::replace(&mut self.node_mut(node)?.content, Content::Leaf(Value::Null));
        match content {
            Content::Leaf(_) => {}
            Content::Object { id, members, .. } => {
                for child in members.into_values() {
                    self.destroy(child);
                }
                if let Some(id) = id {
                    self.references.unregister_identity(id, node);
                    self.touched.push(id);
                }
            }
            Content::Sequence(children) | Content::Map(children) => {
                for child in children {
                    self.destroy(child);
                }
                self.item_ids.remove_container(node);
            }
        }
        Ok(())
    }

    fn destroy(&mut self, node: NodeId) {
        if self.clear_content(node).is_err() {
            return;
        }
        let slot = &mut self.slots[node.index as usize];
        let Some(removed) = slot.node.take() else {
            return;
        };
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(node.index);
        self.live -= 1;
        self.references.forget(node);
        self.emit(NodeChange::Destroyed {
            node,
            parent: removed.parent,
            item: removed.kind.item_id(),
        });
    }
}

fn check_unique_ids(value: &Value) -> Result<(), GraphError> {
    match value {
        Value::Object(object) => object.members.values().try_for_each(check_unique_ids),
        Value::List(items) => {
            let mut seen = HashSet::new();
            for item in items {
                if let Some(id) = item.id {
                    if !seen.insert(id) {
                        return Err(GraphError::DuplicateItemId(id));
                    }
                }
                check_unique_ids(&item.value)?;
            }
            Ok(())
        }
        Value::Map(entries) => {
            let mut seen = HashSet::new();
            for item in entries.values() {
                if let Some(id) = item.id {
                    if !seen.insert(id) {
                        return Err(GraphError::DuplicateItemId(id));
                    }
                }
                check_unique_ids(&item.value)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lineage_core::{MemberDescriptor, TypeDescriptor};

    fn registry() -> Arc<TypeRegistry> {
        let mut registry = TypeRegistry::new();
        registry
            .register(
                TypeDescriptor::object("Weapon")
                    .member(MemberDescriptor::new("Damage", "int"))
                    .member(MemberDescriptor::new("Tags", "List<string>")),
            )
            .unwrap();
        registry
            .register(
                TypeDescriptor::object("Hero")
                    .member(MemberDescriptor::new("Name", "string"))
                    .member(MemberDescriptor::new("Level", "int").with_default(1))
                    .member(MemberDescriptor::new("Items", "List<string>"))
                    .member(MemberDescriptor::new("Stats", "Dict<string,int>"))
                    .member(MemberDescriptor::new("Slots", "Array<int;2>"))
                    .member(MemberDescriptor::new("Weapon", "Weapon?")),
            )
            .unwrap();
        Arc::new(registry)
    }

    fn hero() -> NodeGraph {
        let root = ObjectValue::new("Hero")
            .with_member("Name", "Ayla")
            .with_member("Items", Value::list(["sword", "shield"]))
            .with_member("Stats", Value::map([("str", 5), ("dex", 3)]));
        NodeGraph::new(registry(), root).unwrap()
    }

    fn at(graph: &NodeGraph, path: &str) -> NodeId {
        graph.resolve(&path.parse().unwrap()).unwrap()
    }

    #[test]
    fn build_materializes_defaults() {
        let graph = hero();
        assert_eq!(graph.get(at(&graph, "Level")).unwrap(), Value::Int(1));
        assert_eq!(graph.get(at(&graph, "Slots")).unwrap().without_ids(), Value::list([0, 0]));
        assert_eq!(graph.get(at(&graph, "Weapon")).unwrap(), Value::Null);
    }

    #[test]
    fn get_returns_item_ids() {
        let graph = hero();
        let items = at(&graph, "Items");
        let value = graph.get(items).unwrap();
        assert_eq!(value.item_ids(), graph.item_ids(items).unwrap().ids());
    }

    #[test]
    fn set_returns_previous_value() {
        let mut graph = hero();
        let name = at(&graph, "Name");
        let old = graph.set(name, Value::from("Brin")).unwrap();
        assert_eq!(old, Value::from("Ayla"));
        assert_eq!(graph.get(name).unwrap(), Value::from("Brin"));
    }

    #[test]
    fn set_rejects_type_mismatch() {
        let mut graph = hero();
        let level = at(&graph, "Level");
        let err = graph.set(level, Value::from("high")).unwrap_err();
        assert!(matches!(err, GraphError::TypeMismatch { .. }));
        assert_eq!(graph.get(level).unwrap(), Value::Int(1));
    }

    #[test]
    fn set_keeps_nodes_of_matching_items() {
        let mut graph = hero();
        let items = at(&graph, "Items");
        let first_id = graph.item_ids(items).unwrap().ids()[0];
        let first_node = graph.item(items, first_id).unwrap();

        let value = Value::List(vec![Item::new("bow"), Item::with_id(first_id, "axe")]);
        graph.set(items, value).unwrap();

        assert_eq!(graph.item(items, first_id).unwrap(), first_node);
        assert_eq!(graph.item_ids(items).unwrap().lookup(first_id).unwrap(), 1);
        assert_eq!(graph.get(first_node).unwrap(), Value::from("axe"));
        assert_eq!(graph.item_ids(items).unwrap().len(), 2);
    }

    #[test]
    fn set_dictionary_matches_by_key() {
        let mut graph = hero();
        let stats = at(&graph, "Stats");
        let str_id = graph
            .item_ids(stats)
            .unwrap()
            .id_for_key(&Key::from("str"))
            .unwrap();
        graph.set(stats, Value::map([("str", 9)])).unwrap();
        let ids = graph.item_ids(stats).unwrap();
        assert_eq!(ids.ids(), &[str_id]);
        assert_eq!(graph.get(graph.item(stats, str_id).unwrap()).unwrap(), Value::Int(9));
    }

    #[test]
    fn set_replaced_subtree_makes_old_handles_stale() {
        let mut graph = hero();
        let items = at(&graph, "Items");
        let id = graph.item_ids(items).unwrap().ids()[0];
        let node = graph.item(items, id).unwrap();
        graph.set(items, Value::list(["new"])).unwrap();
        assert!(matches!(graph.node(node), Err(GraphError::StaleNode(_))));
    }

    #[test]
    fn set_nullable_object() {
        let mut graph = hero();
        let weapon = at(&graph, "Weapon");
        graph
            .set(
                weapon,
                Value::Object(ObjectValue::new("Weapon").with_member("Damage", 7)),
            )
            .unwrap();
        assert_eq!(graph.get(at(&graph, "Weapon.Damage")).unwrap(), Value::Int(7));
        graph.set(weapon, Value::Null).unwrap();
        assert!(graph.resolve(&"Weapon.Damage".parse().unwrap()).is_err());
    }

    #[test]
    fn path_of_inverts_resolve() {
        let graph = hero();
        let items = at(&graph, "Items");
        let id = graph.item_ids(items).unwrap().ids()[1];
        let node = graph.item(items, id).unwrap();
        let path = graph.path_of(node).unwrap();
        assert_eq!(path, NodePath::root().member("Items").item(id));
        assert_eq!(graph.resolve(&path).unwrap(), node);
    }

    #[test]
    fn resolve_by_index_and_key() {
        let graph = hero();
        assert_eq!(graph.get(at(&graph, "Items[#1]")).unwrap(), Value::from("shield"));
        assert_eq!(graph.get(at(&graph, "Stats{\"dex\"}")).unwrap(), Value::Int(3));
        let err = graph.resolve(&"Nope".parse().unwrap()).unwrap_err();
        assert!(matches!(err, GraphError::PathNotFound { .. }));
    }

    #[test]
    fn insert_remove_move_items() {
        let mut graph = hero();
        let items = at(&graph, "Items");
        let id = graph.insert_item(items, 1, Item::new("potion")).unwrap();
        assert_eq!(graph.item_ids(items).unwrap().lookup(id).unwrap(), 1);

        graph.move_item(items, id, 2).unwrap();
        assert_eq!(graph.item_ids(items).unwrap().lookup(id).unwrap(), 2);
        assert_eq!(
            graph.get(items).unwrap().without_ids(),
            Value::list(["sword", "shield", "potion"])
        );

        let removed = graph.remove_item(items, id).unwrap();
        assert_eq!(removed.index, 2);
        assert_eq!(removed.item, Item::with_id(id, "potion"));
        assert!(graph.item(items, id).is_err());
    }

    #[test]
    fn insert_adopts_given_id_and_rejects_duplicates() {
        let mut graph = hero();
        let items = at(&graph, "Items");
        let id = ItemId::from_u128(42);
        assert_eq!(graph.insert_item(items, 0, Item::with_id(id, "x")).unwrap(), id);
        assert!(matches!(
            graph.insert_item(items, 0, Item::with_id(id, "y")),
            Err(GraphError::DuplicateItemId(_))
        ));
    }

    #[test]
    fn arrays_are_fixed_size() {
        let mut graph = hero();
        let slots = at(&graph, "Slots");
        assert!(matches!(
            graph.insert_item(slots, 0, Item::new(1)),
            Err(GraphError::FixedSize { len: 2 })
        ));
        let id = graph.item_ids(slots).unwrap().ids()[0];
        assert!(matches!(
            graph.remove_item(slots, id),
            Err(GraphError::FixedSize { .. })
        ));
    }

    #[test]
    fn dictionary_entries_and_rename() {
        let mut graph = hero();
        let stats = at(&graph, "Stats");
        let id = graph
            .insert_entry(stats, 0, Key::from("int"), Item::new(7))
            .unwrap();
        assert!(matches!(
            graph.insert_entry(stats, 0, Key::from("int"), Item::new(1)),
            Err(GraphError::DuplicateKey(_))
        ));
        assert!(matches!(
            graph.insert_entry(stats, 0, Key::Int(3), Item::new(1)),
            Err(GraphError::TypeMismatch { .. })
        ));

        let old = graph.rename_key(stats, id, Key::from("wis")).unwrap();
        assert_eq!(old, Key::from("int"));
        assert_eq!(graph.key_of(stats, id), Some(Key::from("wis")));
        assert!(matches!(
            graph.rename_key(stats, id, Key::from("str")),
            Err(GraphError::DuplicateKey(_))
        ));
    }

    #[test]
    fn remap_keeps_node() {
        let mut graph = hero();
        let items = at(&graph, "Items");
        let old = graph.item_ids(items).unwrap().ids()[0];
        let node = graph.item(items, old).unwrap();
        let new = ItemId::from_u128(7);
        graph.remap_item(items, old, new).unwrap();
        assert_eq!(graph.item(items, new).unwrap(), node);
        assert_eq!(graph.path_of(node).unwrap(), NodePath::root().member("Items").item(new));
    }

    #[test]
    fn structural_ops_on_leaf_fail() {
        let mut graph = hero();
        let name = at(&graph, "Name");
        assert!(matches!(
            graph.insert_item(name, 0, Item::new("x")),
            Err(GraphError::NotAContainer(_))
        ));
    }

    #[test]
    fn duplicate_ids_in_value_rejected() {
        let mut graph = hero();
        let items = at(&graph, "Items");
        let id = ItemId::new();
        let value = Value::List(vec![Item::with_id(id, "a"), Item::with_id(id, "b")]);
        assert!(matches!(
            graph.set(items, value),
            Err(GraphError::DuplicateItemId(_))
        ));
    }

    #[test]
    fn journal_reports_destroyed_nodes() {
        let mut graph = hero();
        graph.enable_journal();
        let items = at(&graph, "Items");
        let id = graph.item_ids(items).unwrap().ids()[0];
        graph.remove_item(items, id).unwrap();
        let changes = graph.drain_changes();
        assert!(changes.iter().any(|c| matches!(
            c,
            NodeChange::Destroyed { item: Some(removed), parent: Some(p), .. } if *removed == id && *p == items
        )));
        assert!(graph.drain_changes().is_empty());
    }

    #[test]
    fn snapshot_is_independent() {
        let mut graph = hero();
        let snapshot = graph.snapshot();
        let name = at(&graph, "Name");
        graph.set(name, Value::from("Brin")).unwrap();
        assert_eq!(snapshot.get(name).unwrap(), Value::from("Ayla"));
    }

    #[test]
    fn node_count_tracks_arena() {
        let mut graph = hero();
        let before = graph.len();
        let items = at(&graph, "Items");
        graph.insert_item(items, 0, Item::new("x")).unwrap();
        assert_eq!(graph.len(), before + 1);
        graph.set(items, Value::List(Vec::new())).unwrap();
        assert_eq!(graph.len(), before - 2);
    }
}
