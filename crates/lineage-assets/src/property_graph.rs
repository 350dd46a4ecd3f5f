//! Asset property graph
//!
//! Provides [`AssetPropertyGraph`], one document's node graph together with
//! its override states. It is the single mutation point for a document:
//! every edit applies the change, updates overrides and appends the
//! [`AssetOperation`]s that reproduce it to the caller's list.
//!
//! Edits in a document that has a base mark what they touch:
//! - a member set → member `NEW`
//! - an element inserted, moved or set in place → item `NEW`
//! - a dictionary entry renamed → key `NEW`
//! - an inherited element removed → deletion record
//!
//! Elements of arrays and of collections without identifiable items carry no
//! overrides of their own; edits to them mark the enclosing member instead.

use crate::error::AssetError;
use crate::operation::{AssetOperation, SubtreeState};
use crate::overrides::{OverrideCapture, OverrideTracker};
use indexmap::IndexMap;
use lineage_core::{
    DescriptorKind, DocumentId, Item, ItemId, Key, NodePath, ObjectValue, OverrideState,
    TypeRegistry, Value,
};
use lineage_graph::{NodeGraph, NodeId, NodeKind};
use std::sync::Arc;
use tracing::warn;

/// One document: node graph plus override states
#[derive(Debug, Clone)]
pub struct AssetPropertyGraph {
    pub(crate) document: DocumentId,
    pub(crate) graph: NodeGraph,
    pub(crate) overrides: OverrideTracker,
}

impl AssetPropertyGraph {
    /// Build a document from its root object
    ///
    /// # Errors
    /// Any error of [`NodeGraph::new`]
    pub fn new(
        document: DocumentId,
        registry: Arc<TypeRegistry>,
        root: ObjectValue,
        inherits: bool,
    ) -> Result<Self, AssetError> {
        let graph = NodeGraph::new(registry, root)?;
        Ok(Self::from_parts(document, graph, OverrideTracker::new(inherits)))
    }

    /// Assemble a document from an existing graph and tracker
    #[must_use]
    pub fn from_parts(document: DocumentId, mut graph: NodeGraph, overrides: OverrideTracker) -> Self {
        graph.enable_journal();
        graph.drain_changes();
        Self {
            document,
            graph,
            overrides,
        }
    }

    /// Install persisted override states and deletion records
    ///
    /// Ignored, with a warning, for a document without a base.
    ///
    /// # Errors
    /// Returns `PathNotFound` if a captured address does not exist
    pub fn load_overrides(&mut self, capture: &OverrideCapture) -> Result<(), AssetError> {
        if capture.is_empty() {
            return Ok(());
        }
        if !self.inherits() {
            warn!(document = %self.document, "override markers on a document without a base are ignored");
            return Ok(());
        }
        let root = self.graph.root();
        self.overrides.restore(&mut self.graph, root, capture)?;
        self.graph.drain_changes();
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn document(&self) -> DocumentId {
        self.document
    }

    #[inline]
    #[must_use]
    pub fn graph(&self) -> &NodeGraph {
        &self.graph
    }

    #[inline]
    #[must_use]
    pub fn overrides(&self) -> &OverrideTracker {
        &self.overrides
    }

    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        self.graph.registry()
    }

    /// Whether the document derives from a base
    #[inline]
    #[must_use]
    pub fn inherits(&self) -> bool {
        self.overrides.inherits()
    }

    /// Attach to or detach from a base; detaching drops every override
    pub fn set_inherits(&mut self, inherits: bool) {
        self.overrides.set_inherits(inherits);
    }

    /// Whole document as a value
    ///
    /// # Errors
    /// Never fails on a consistent graph
    pub fn root_value(&self) -> Result<Value, AssetError> {
        Ok(self.graph.get(self.graph.root())?)
    }

    /// Resolve a document path
    ///
    /// # Errors
    /// Returns `PathNotFound` for missing locations
    pub fn resolve(&self, path: &NodePath) -> Result<NodeId, AssetError> {
        Ok(self.graph.resolve(path)?)
    }

    /// Value at a path
    ///
    /// # Errors
    /// Returns `PathNotFound` for missing locations
    pub fn value(&self, path: &NodePath) -> Result<Value, AssetError> {
        Ok(self.graph.get(self.graph.resolve(path)?)?)
    }

    // ------------------------------------------------------------------
    // Override queries
    // ------------------------------------------------------------------

    /// Override state governing a node: the member override for members,
    /// the item override for elements, `BASE` for the root
    #[must_use]
    pub fn override_of(&self, node: NodeId) -> OverrideState {
        let Ok(n) = self.graph.node(node) else {
            return OverrideState::BASE;
        };
        match (n.kind(), n.parent()) {
            (NodeKind::Member { .. }, _) => self.overrides.get_override(node),
            (NodeKind::CollectionItem { id } | NodeKind::DictionaryEntry { id }, Some(parent)) => {
                self.overrides.get_item_override(parent, *id)
            }
            _ => OverrideState::BASE,
        }
    }

    /// Override state at a path
    ///
    /// # Errors
    /// Returns `PathNotFound` for missing locations
    pub fn override_at(&self, path: &NodePath) -> Result<OverrideState, AssetError> {
        Ok(self.override_of(self.resolve(path)?))
    }

    /// Item override of an element
    ///
    /// # Errors
    /// Returns `PathNotFound` if the container is missing
    pub fn item_override(&self, container: &NodePath, id: ItemId) -> Result<OverrideState, AssetError> {
        Ok(self.overrides.get_item_override(self.resolve(container)?, id))
    }

    /// Key override of a dictionary entry
    ///
    /// # Errors
    /// Returns `PathNotFound` if the container is missing
    pub fn key_override(&self, container: &NodePath, id: ItemId) -> Result<OverrideState, AssetError> {
        Ok(self.overrides.get_key_override(self.resolve(container)?, id))
    }

    /// Deletion records of a container, sorted
    ///
    /// # Errors
    /// Returns `PathNotFound` if the container is missing
    pub fn deleted_items(&self, container: &NodePath) -> Result<Vec<ItemId>, AssetError> {
        let node = self.resolve(container)?;
        Ok(self
            .graph
            .item_ids(node)
            .map(|ids| ids.deleted_ids().collect())
            .unwrap_or_default())
    }

    // ------------------------------------------------------------------
    // Edits
    // ------------------------------------------------------------------

    /// Set the value at `path`
    ///
    /// In a derived document, a container set also records deletions for
    /// elements it drops and marks new or changed elements `NEW`.
    ///
    /// # Errors
    /// - `NotOverridable` in a derived document for non-overridable members
    /// - graph errors (`PathNotFound`, `TypeMismatch`, ...)
    pub fn set_value(
        &mut self,
        path: &NodePath,
        value: Value,
        ops: &mut Vec<AssetOperation>,
    ) -> Result<(), AssetError> {
        let node = self.resolve(path)?;
        self.ensure_overridable(node)?;

        let before = if self.inherits() && self.tracks_items(node)? {
            Some(self.item_snapshot(node)?)
        } else {
            None
        };

        let start = ops.len();
        self.record_set(node, value, ops)?;
        if ops.len() == start {
            return Ok(());
        }

        if let Some(before) = before {
            let after = self.item_snapshot(node)?;
            for id in before.keys().filter(|id| !after.contains_key(*id)) {
                self.record_deleted(node, *id, true, ops)?;
            }
            for (id, (key, value)) in &after {
                match before.get(id) {
                    None => {
                        self.mark_item(node, *id, ops)?;
                        if key.is_some() {
                            self.mark_key(node, *id, ops)?;
                        }
                    }
                    Some((old_key, old_value)) => {
                        if old_value != value {
                            self.mark_item(node, *id, ops)?;
                        }
                        if old_key != key {
                            self.mark_key(node, *id, ops)?;
                        }
                    }
                }
            }
        }
        self.mark_edited(node, ops)
    }

    /// Insert an element into a collection, returning its id
    ///
    /// # Errors
    /// `NotOverridable` or any error of [`NodeGraph::insert_item`]
    pub fn insert_item(
        &mut self,
        container: &NodePath,
        index: usize,
        item: Item,
        ops: &mut Vec<AssetOperation>,
    ) -> Result<ItemId, AssetError> {
        let node = self.resolve(container)?;
        self.ensure_overridable(node)?;
        let id = self.record_insert(node, index, None, item, ops)?;
        self.mark_inserted(node, id, ops)?;
        Ok(id)
    }

    /// Insert a dictionary entry, returning its id
    ///
    /// # Errors
    /// `NotOverridable` or any error of [`NodeGraph::insert_entry`]
    pub fn insert_entry(
        &mut self,
        container: &NodePath,
        index: usize,
        key: Key,
        item: Item,
        ops: &mut Vec<AssetOperation>,
    ) -> Result<ItemId, AssetError> {
        let node = self.resolve(container)?;
        self.ensure_overridable(node)?;
        let id = self.record_insert(node, index, Some(key), item, ops)?;
        self.mark_inserted(node, id, ops)?;
        if self.inherits() && self.tracks_items(node)? {
            self.mark_key(node, id, ops)?;
        }
        Ok(id)
    }

    /// Remove an element
    ///
    /// In a derived document the removal leaves a deletion record so that
    /// synchronization does not bring an inherited element back.
    ///
    /// # Errors
    /// `NotOverridable` or any error of [`NodeGraph::remove_item`]
    pub fn remove_item(
        &mut self,
        container: &NodePath,
        id: ItemId,
        ops: &mut Vec<AssetOperation>,
    ) -> Result<(), AssetError> {
        let node = self.resolve(container)?;
        self.ensure_overridable(node)?;
        let tracks = self.tracks_items(node)?;
        self.record_remove(node, id, self.inherits() && tracks, ops)?;
        if !tracks {
            self.mark_edited(node, ops)?;
        }
        Ok(())
    }

    /// Move an element to `position`
    ///
    /// # Errors
    /// `NotOverridable` or any error of [`NodeGraph::move_item`]
    pub fn move_item(
        &mut self,
        container: &NodePath,
        id: ItemId,
        position: usize,
        ops: &mut Vec<AssetOperation>,
    ) -> Result<(), AssetError> {
        let node = self.resolve(container)?;
        self.ensure_overridable(node)?;
        let start = ops.len();
        self.record_move(node, id, position, ops)?;
        if ops.len() > start {
            self.mark_inserted(node, id, ops)?;
        }
        Ok(())
    }

    /// Change a dictionary entry's key
    ///
    /// # Errors
    /// `NotOverridable` or any error of [`NodeGraph::rename_key`]
    pub fn rename_key(
        &mut self,
        container: &NodePath,
        id: ItemId,
        key: Key,
        ops: &mut Vec<AssetOperation>,
    ) -> Result<(), AssetError> {
        let node = self.resolve(container)?;
        self.ensure_overridable(node)?;
        let start = ops.len();
        self.record_rename(node, id, key, ops)?;
        if ops.len() > start {
            if self.tracks_items(node)? {
                self.mark_key(node, id, ops)?;
            } else {
                self.mark_edited(node, ops)?;
            }
        }
        Ok(())
    }

    /// Set the override state governing the node at `path`
    ///
    /// Ignored in a document without a base.
    ///
    /// # Errors
    /// - `NotOverridable` when overriding a non-overridable member
    /// - `PathNotFound` for missing locations
    pub fn set_override(
        &mut self,
        path: &NodePath,
        state: OverrideState,
        ops: &mut Vec<AssetOperation>,
    ) -> Result<(), AssetError> {
        let node = self.resolve(path)?;
        if !self.inherits() {
            return Ok(());
        }
        if !state.is_base() {
            self.ensure_overridable(node)?;
        }
        let n = self.graph.node(node)?;
        match (n.kind().clone(), n.parent()) {
            (NodeKind::Member { .. }, _) => self.record_override(node, state, ops),
            (NodeKind::CollectionItem { id } | NodeKind::DictionaryEntry { id }, Some(parent)) => {
                self.record_item_override(parent, id, state, ops)
            }
            _ => Ok(()),
        }
    }

    /// Set the item override of an element
    ///
    /// # Errors
    /// `PathNotFound` or `ItemNotFound`
    pub fn set_item_override(
        &mut self,
        container: &NodePath,
        id: ItemId,
        state: OverrideState,
        ops: &mut Vec<AssetOperation>,
    ) -> Result<(), AssetError> {
        let node = self.resolve(container)?;
        self.graph.item(node, id)?;
        self.record_item_override(node, id, state, ops)
    }

    /// Set the key override of a dictionary entry
    ///
    /// # Errors
    /// `PathNotFound` or `ItemNotFound`
    pub fn set_key_override(
        &mut self,
        container: &NodePath,
        id: ItemId,
        state: OverrideState,
        ops: &mut Vec<AssetOperation>,
    ) -> Result<(), AssetError> {
        let node = self.resolve(container)?;
        self.graph.item(node, id)?;
        self.record_key_override(node, id, state, ops)
    }

    /// Reset every override and deletion record at or below `path` to base
    ///
    /// Values are not touched; the next synchronization brings them back in
    /// line with the base.
    ///
    /// # Errors
    /// Returns `PathNotFound` for missing locations
    pub fn reset_override(
        &mut self,
        path: &NodePath,
        ops: &mut Vec<AssetOperation>,
    ) -> Result<(), AssetError> {
        let root = self.resolve(path)?;
        if !self.inherits() {
            return Ok(());
        }

        let n = self.graph.node(root)?;
        if let (NodeKind::CollectionItem { id } | NodeKind::DictionaryEntry { id }, Some(parent)) =
            (n.kind().clone(), n.parent())
        {
            self.record_item_override(parent, id, OverrideState::BASE, ops)?;
            self.record_key_override(parent, id, OverrideState::BASE, ops)?;
        }

        for node in self.graph.descendants(root)? {
            if matches!(self.graph.node(node)?.kind(), NodeKind::Member { .. }) {
                self.record_override(node, OverrideState::BASE, ops)?;
            }
            let Some(ids) = self.graph.item_ids(node) else {
                continue;
            };
            let ids: Vec<ItemId> = ids.ids().to_vec();
            let deleted: Vec<ItemId> = self
                .graph
                .item_ids(node)
                .map(|ids| ids.deleted_ids().collect())
                .unwrap_or_default();
            for id in ids {
                self.record_item_override(node, id, OverrideState::BASE, ops)?;
                self.record_key_override(node, id, OverrideState::BASE, ops)?;
            }
            for id in deleted {
                self.record_deleted(node, id, false, ops)?;
            }
        }
        Ok(())
    }

    /// Drop the deletion record of an inherited element
    ///
    /// The element comes back on the next synchronization.
    ///
    /// # Errors
    /// `PathNotFound` or `NotAContainer`
    pub fn restore_deleted_item(
        &mut self,
        container: &NodePath,
        id: ItemId,
        ops: &mut Vec<AssetOperation>,
    ) -> Result<(), AssetError> {
        let node = self.resolve(container)?;
        self.record_deleted(node, id, false, ops)
    }

    // ------------------------------------------------------------------
    // Replay
    // ------------------------------------------------------------------

    /// Re-apply an operation recorded against this document
    ///
    /// # Errors
    /// Graph errors if the document no longer matches the operation
    pub fn apply_operation(&mut self, op: &AssetOperation) -> Result<(), AssetError> {
        self.replay(op, true)
    }

    /// Undo an operation recorded against this document
    ///
    /// # Errors
    /// Graph errors if the document no longer matches the operation
    pub fn revert_operation(&mut self, op: &AssetOperation) -> Result<(), AssetError> {
        self.replay(op, false)
    }

    fn replay(&mut self, op: &AssetOperation, forward: bool) -> Result<(), AssetError> {
        match op {
            AssetOperation::SetValue { path, old, new, .. } => {
                let state = pick(forward, old, new);
                let node = self.graph.resolve(path)?;
                self.graph.set(node, state.value.clone())?;
                self.sync_journal();
                self.overrides.restore(&mut self.graph, node, &state.overrides)?;
            }
            AssetOperation::InsertItem {
                container,
                index,
                key,
                id,
                state,
                item_override,
                key_override,
                ..
            } => {
                let node = self.graph.resolve(container)?;
                if forward {
                    self.insert_state(node, *index, key.clone(), *id, state, *item_override, *key_override)?;
                } else {
                    self.graph.remove_item(node, *id)?;
                    self.sync_journal();
                }
            }
            AssetOperation::RemoveItem {
                container,
                index,
                key,
                id,
                state,
                item_override,
                key_override,
                deleted,
                ..
            } => {
                let node = self.graph.resolve(container)?;
                if forward {
                    self.graph.remove_item(node, *id)?;
                    self.sync_journal();
                    if *deleted {
                        self.graph.mark_deleted(node, *id)?;
                    }
                } else {
                    if *deleted {
                        self.graph.unmark_deleted(node, *id)?;
                    }
                    self.insert_state(node, *index, key.clone(), *id, state, *item_override, *key_override)?;
                }
            }
            AssetOperation::MoveItem {
                container,
                id,
                from,
                to,
                ..
            } => {
                let node = self.graph.resolve(container)?;
                self.graph.move_item(node, *id, *pick(forward, from, to))?;
            }
            AssetOperation::RenameKey {
                container,
                id,
                old,
                new,
                ..
            } => {
                let node = self.graph.resolve(container)?;
                self.graph.rename_key(node, *id, pick(forward, old, new).clone())?;
            }
            AssetOperation::RemapItem {
                container, old, new, ..
            } => {
                let node = self.graph.resolve(container)?;
                let (from, to) = if forward { (*old, *new) } else { (*new, *old) };
                self.graph.remap_item(node, from, to)?;
                self.overrides.remap_item(node, from, to);
            }
            AssetOperation::SetOverride { path, old, new, .. } => {
                let node = self.graph.resolve(path)?;
                self.overrides.set_override(node, *pick(forward, old, new));
            }
            AssetOperation::SetItemOverride {
                container,
                id,
                old,
                new,
                ..
            } => {
                let node = self.graph.resolve(container)?;
                self.overrides.set_item_override(node, *id, *pick(forward, old, new));
            }
            AssetOperation::SetKeyOverride {
                container,
                id,
                old,
                new,
                ..
            } => {
                let node = self.graph.resolve(container)?;
                self.overrides.set_key_override(node, *id, *pick(forward, old, new));
            }
            AssetOperation::SetDeleted {
                container,
                id,
                deleted,
                ..
            } => {
                let node = self.graph.resolve(container)?;
                if *deleted == forward {
                    self.graph.mark_deleted(node, *id)?;
                } else {
                    self.graph.unmark_deleted(node, *id)?;
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn insert_state(
        &mut self,
        container: NodeId,
        index: usize,
        key: Option<Key>,
        id: ItemId,
        state: &SubtreeState,
        item_override: OverrideState,
        key_override: OverrideState,
    ) -> Result<(), AssetError> {
        let item = Item::with_id(id, state.value.clone());
        match key {
            Some(key) => self.graph.insert_entry(container, index, key, item)?,
            None => self.graph.insert_item(container, index, item)?,
        };
        self.sync_journal();
        let child = self.graph.item(container, id)?;
        self.overrides.restore(&mut self.graph, child, &state.overrides)?;
        self.overrides.set_item_override(container, id, item_override);
        self.overrides.set_key_override(container, id, key_override);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Recording primitives (shared with propagation)
    // ------------------------------------------------------------------

    fn sync_journal(&mut self) {
        for change in self.graph.drain_changes() {
            self.overrides.apply_change(&change);
        }
    }

    fn capture(&self, node: NodeId) -> Result<SubtreeState, AssetError> {
        Ok(SubtreeState {
            value: self.graph.get(node)?,
            overrides: self.overrides.capture(&self.graph, node)?,
        })
    }

    pub(crate) fn record_set(
        &mut self,
        node: NodeId,
        value: Value,
        ops: &mut Vec<AssetOperation>,
    ) -> Result<(), AssetError> {
        let path = self.graph.path_of(node)?;
        let old = self.capture(node)?;
        self.graph.set(node, value)?;
        self.sync_journal();
        let new = self.capture(node)?;
        if old != new {
            ops.push(AssetOperation::SetValue {
                document: self.document,
                path,
                old,
                new,
            });
        }
        Ok(())
    }

    pub(crate) fn record_insert(
        &mut self,
        container: NodeId,
        index: usize,
        key: Option<Key>,
        item: Item,
        ops: &mut Vec<AssetOperation>,
    ) -> Result<ItemId, AssetError> {
        let id = match &key {
            Some(key) => self.graph.insert_entry(container, index, key.clone(), item)?,
            None => self.graph.insert_item(container, index, item)?,
        };
        self.sync_journal();
        let child = self.graph.item(container, id)?;
        ops.push(AssetOperation::InsertItem {
            document: self.document,
            container: self.graph.path_of(container)?,
            index,
            key,
            id,
            state: self.capture(child)?,
            item_override: self.overrides.get_item_override(container, id),
            key_override: self.overrides.get_key_override(container, id),
        });
        Ok(id)
    }

    pub(crate) fn record_remove(
        &mut self,
        container: NodeId,
        id: ItemId,
        deleted: bool,
        ops: &mut Vec<AssetOperation>,
    ) -> Result<(), AssetError> {
        let child = self.graph.item(container, id)?;
        let state = self.capture(child)?;
        let item_override = self.overrides.get_item_override(container, id);
        let key_override = self.overrides.get_key_override(container, id);
        let path = self.graph.path_of(container)?;

        let removed = self.graph.remove_item(container, id)?;
        self.sync_journal();
        let deleted = deleted && self.graph.mark_deleted(container, id)?;

        ops.push(AssetOperation::RemoveItem {
            document: self.document,
            container: path,
            index: removed.index,
            key: removed.key,
            id,
            state,
            item_override,
            key_override,
            deleted,
        });
        Ok(())
    }

    pub(crate) fn record_move(
        &mut self,
        container: NodeId,
        id: ItemId,
        position: usize,
        ops: &mut Vec<AssetOperation>,
    ) -> Result<(), AssetError> {
        let from = self.graph.move_item(container, id, position)?;
        if from != position {
            ops.push(AssetOperation::MoveItem {
                document: self.document,
                container: self.graph.path_of(container)?,
                id,
                from,
                to: position,
            });
        }
        Ok(())
    }

    pub(crate) fn record_rename(
        &mut self,
        container: NodeId,
        id: ItemId,
        key: Key,
        ops: &mut Vec<AssetOperation>,
    ) -> Result<(), AssetError> {
        let old = self.graph.rename_key(container, id, key.clone())?;
        if old != key {
            ops.push(AssetOperation::RenameKey {
                document: self.document,
                container: self.graph.path_of(container)?,
                id,
                old,
                new: key,
            });
        }
        Ok(())
    }

    pub(crate) fn record_remap(
        &mut self,
        container: NodeId,
        old: ItemId,
        new: ItemId,
        ops: &mut Vec<AssetOperation>,
    ) -> Result<(), AssetError> {
        self.graph.remap_item(container, old, new)?;
        self.overrides.remap_item(container, old, new);
        ops.push(AssetOperation::RemapItem {
            document: self.document,
            container: self.graph.path_of(container)?,
            old,
            new,
        });
        Ok(())
    }

    pub(crate) fn record_deleted(
        &mut self,
        container: NodeId,
        id: ItemId,
        deleted: bool,
        ops: &mut Vec<AssetOperation>,
    ) -> Result<(), AssetError> {
        let changed = if deleted {
            self.graph.mark_deleted(container, id)?
        } else {
            self.graph.unmark_deleted(container, id)?
        };
        if changed {
            ops.push(AssetOperation::SetDeleted {
                document: self.document,
                container: self.graph.path_of(container)?,
                id,
                deleted,
            });
        }
        Ok(())
    }

    fn record_override(
        &mut self,
        node: NodeId,
        state: OverrideState,
        ops: &mut Vec<AssetOperation>,
    ) -> Result<(), AssetError> {
        if !self.inherits() {
            return Ok(());
        }
        let old = self.overrides.set_override(node, state);
        if old != state {
            ops.push(AssetOperation::SetOverride {
                document: self.document,
                path: self.graph.path_of(node)?,
                old,
                new: state,
            });
        }
        Ok(())
    }

    fn record_item_override(
        &mut self,
        container: NodeId,
        id: ItemId,
        state: OverrideState,
        ops: &mut Vec<AssetOperation>,
    ) -> Result<(), AssetError> {
        if !self.inherits() {
            return Ok(());
        }
        let old = self.overrides.set_item_override(container, id, state);
        if old != state {
            ops.push(AssetOperation::SetItemOverride {
                document: self.document,
                container: self.graph.path_of(container)?,
                id,
                old,
                new: state,
            });
        }
        Ok(())
    }

    fn record_key_override(
        &mut self,
        container: NodeId,
        id: ItemId,
        state: OverrideState,
        ops: &mut Vec<AssetOperation>,
    ) -> Result<(), AssetError> {
        if !self.inherits() {
            return Ok(());
        }
        let old = self.overrides.set_key_override(container, id, state);
        if old != state {
            ops.push(AssetOperation::SetKeyOverride {
                document: self.document,
                container: self.graph.path_of(container)?,
                id,
                old,
                new: state,
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// Whether elements of `node` carry overrides of their own
    pub(crate) fn tracks_items(&self, node: NodeId) -> Result<bool, AssetError> {
        let n = self.graph.node(node)?;
        if !n.is_container() || !n.flags().identifiable_items {
            return Ok(false);
        }
        Ok(!matches!(
            self.graph.descriptor(node)?.kind(),
            DescriptorKind::Array { .. }
        ))
    }

    fn ensure_overridable(&self, node: NodeId) -> Result<(), AssetError> {
        if !self.inherits() {
            return Ok(());
        }
        let mut current = Some(node);
        while let Some(id) = current {
            let n = self.graph.node(id)?;
            if !n.flags().overridable {
                return Err(AssetError::not_overridable(self.graph.path_of(id)?));
            }
            current = n.parent();
        }
        Ok(())
    }

    /// Mark the location of `node` as locally edited
    fn mark_edited(&mut self, node: NodeId, ops: &mut Vec<AssetOperation>) -> Result<(), AssetError> {
        if !self.inherits() {
            return Ok(());
        }
        let n = self.graph.node(node)?;
        match (n.kind().clone(), n.parent()) {
            (NodeKind::Member { .. }, _) => {
                let state = self.overrides.get_override(node) | OverrideState::NEW;
                self.record_override(node, state, ops)
            }
            (NodeKind::CollectionItem { id } | NodeKind::DictionaryEntry { id }, Some(parent)) => {
                if self.tracks_items(parent)? {
                    self.mark_item(parent, id, ops)
                } else {
                    self.mark_edited(parent, ops)
                }
            }
            _ => Ok(()),
        }
    }

    fn mark_inserted(
        &mut self,
        container: NodeId,
        id: ItemId,
        ops: &mut Vec<AssetOperation>,
    ) -> Result<(), AssetError> {
        if !self.inherits() {
            return Ok(());
        }
        if self.tracks_items(container)? {
            self.mark_item(container, id, ops)
        } else {
            self.mark_edited(container, ops)
        }
    }

    fn mark_item(
        &mut self,
        container: NodeId,
        id: ItemId,
        ops: &mut Vec<AssetOperation>,
    ) -> Result<(), AssetError> {
        let state = self.overrides.get_item_override(container, id) | OverrideState::NEW;
        self.record_item_override(container, id, state, ops)
    }

    fn mark_key(
        &mut self,
        container: NodeId,
        id: ItemId,
        ops: &mut Vec<AssetOperation>,
    ) -> Result<(), AssetError> {
        let state = self.overrides.get_key_override(container, id) | OverrideState::NEW;
        self.record_key_override(container, id, state, ops)
    }

    /// Key and id-free value of every element, in order
    fn item_snapshot(
        &self,
        container: NodeId,
    ) -> Result<IndexMap<ItemId, (Option<Key>, Value)>, AssetError> {
        let ids = self
            .graph
            .item_ids(container)
            .map(|ids| ids.ids().to_vec())
            .unwrap_or_default();
        let mut out = IndexMap::with_capacity(ids.len());
        for id in ids {
            let child = self.graph.item(container, id)?;
            out.insert(
                id,
                (self.graph.key_of(container, id), self.graph.get(child)?.without_ids()),
            );
        }
        Ok(out)
    }
}

#[inline]
fn pick<T>(forward: bool, old: T, new: T) -> T {
    if forward {
        new
    } else {
        old
    }
}
