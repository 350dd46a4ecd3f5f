//! Base propagation
//!
//! Provides [`AssetPropertyGraph::reconcile_with_base`], which walks a
//! derived document and its base in lock-step and copies every base change
//! the derived override states let through. Each change is recorded as an
//! [`AssetOperation`], so a synchronization pass undoes like any other edit.
//!
//! Collections are matched by item id:
//! - base elements missing from the derived document are inserted with
//!   their base id, unless a deletion record stands in the way
//! - `BASE` elements the base no longer has are removed
//! - `BASE` elements follow base order within the slots they occupy, while
//!   `NEW` and `SEALED` elements keep their positions
//!
//! A `SEALED` state stops propagation at its node, structure included.

use crate::error::AssetError;
use crate::operation::AssetOperation;
use crate::property_graph::AssetPropertyGraph;
use lineage_core::{Item, ItemId, Key, OverrideState};
use lineage_graph::{Content, NodeId};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Outcome of one synchronization pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    /// Changes applied to the derived document, in order
    #[serde(skip)]
    pub operations: Vec<AssetOperation>,
    /// Conditions that kept part of the base from propagating
    pub warnings: Vec<String>,
}

impl SyncReport {
    /// True when the pass changed nothing
    #[inline]
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.operations.is_empty()
    }

    fn warn(&mut self, message: String) {
        warn!("{message}");
        self.warnings.push(message);
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Shape {
    Object,
    Sequence,
    Map,
    Leaf,
}

fn shape(content: &Content) -> Shape {
    match content {
        Content::Object { .. } => Shape::Object,
        Content::Sequence(_) => Shape::Sequence,
        Content::Map(_) => Shape::Map,
        Content::Leaf(_) => Shape::Leaf,
    }
}

impl AssetPropertyGraph {
    /// Bring `BASE`-state locations in line with `base`
    ///
    /// Without a base the document keeps its last synchronized values and
    /// the report carries a warning.
    ///
    /// # Errors
    /// Graph errors only; conflicts are reported as warnings. A failed pass
    /// reverts the changes it had already applied.
    pub fn reconcile_with_base(
        &mut self,
        base: Option<&AssetPropertyGraph>,
    ) -> Result<SyncReport, AssetError> {
        let mut report = SyncReport::default();
        if !self.inherits() {
            return Ok(report);
        }
        let Some(base) = base else {
            report.warn(format!(
                "base of document {} is not loaded; keeping last synchronized values",
                self.document
            ));
            return Ok(report);
        };

        let (derived_root, base_root) = (self.graph.root(), base.graph.root());
        if let Err(err) = self.sync_node(base, derived_root, base_root, OverrideState::BASE, &mut report) {
            self.unwind(&report.operations);
            return Err(err);
        }

        debug!(
            document = %self.document,
            base = %base.document,
            operations = report.operations.len(),
            warnings = report.warnings.len(),
            "synchronized with base"
        );
        Ok(report)
    }

    fn unwind(&mut self, applied: &[AssetOperation]) {
        for op in applied.iter().rev() {
            if let Err(err) = self.revert_operation(op) {
                warn!(document = %self.document, error = %err, "could not revert partial synchronization");
            }
        }
    }

    fn sync_node(
        &mut self,
        base: &AssetPropertyGraph,
        node: NodeId,
        base_node: NodeId,
        state: OverrideState,
        report: &mut SyncReport,
    ) -> Result<(), AssetError> {
        if state.is_sealed() {
            return Ok(());
        }

        let derived_shape = shape(self.graph.node(node)?.content());
        let base_content = base.graph.node(base_node)?.content();
        let base_shape = shape(base_content);

        if derived_shape == base_shape
            && matches!(derived_shape, Shape::Sequence | Shape::Map)
            && self.tracks_items(node)?
        {
            return self.sync_container(base, node, base_node, report);
        }
        if state.is_new() {
            return Ok(());
        }

        if let (
            Content::Object {
                type_name, id, members, ..
            },
            Content::Object {
                type_name: base_type,
                id: base_id,
                members: base_members,
            },
        ) = (self.graph.node(node)?.content(), base_content)
        {
            if node == self.graph.root() || (type_name == base_type && id == base_id) {
                let pairs: Vec<(NodeId, NodeId)> = members
                    .iter()
                    .filter_map(|(name, child)| base_members.get(name).map(|b| (*child, *b)))
                    .collect();
                for (child, base_child) in pairs {
                    let child_state = self.overrides.get_override(child);
                    self.sync_node(base, child, base_child, child_state, report)?;
                }
                return Ok(());
            }
        }

        let incoming = base.graph.get(base_node)?;
        if self.graph.get(node)?.without_ids() != incoming.without_ids() {
            self.record_set(node, incoming, &mut report.operations)?;
        }
        Ok(())
    }

    fn sync_container(
        &mut self,
        base: &AssetPropertyGraph,
        node: NodeId,
        base_node: NodeId,
        report: &mut SyncReport,
    ) -> Result<(), AssetError> {
        let dictionary = self.graph.node(node)?.is_dictionary();
        let base_ids: Vec<ItemId> = base
            .graph
            .item_ids(base_node)
            .map(|ids| ids.ids().to_vec())
            .unwrap_or_default();
        let in_base: HashSet<ItemId> = base_ids.iter().copied().collect();

        self.adopt_base_ids(base, node, base_node, &base_ids, &in_base, report)?;

        // Drop BASE elements the base no longer has, and stale deletion records
        for id in self.ids(node) {
            if !in_base.contains(&id) && self.overrides.get_item_override(node, id).is_base() {
                self.record_remove(node, id, false, &mut report.operations)?;
            }
        }
        for id in self.deleted(node) {
            if !in_base.contains(&id) {
                self.record_deleted(node, id, false, &mut report.operations)?;
            }
        }

        // Insert base elements the derived document lacks
        for (position, id) in base_ids.iter().enumerate() {
            let present: HashSet<ItemId> = self.ids(node).into_iter().collect();
            if present.contains(id) || self.is_deleted(node, *id) {
                continue;
            }
            let key = if dictionary {
                let Some(key) = base.graph.key_of(base_node, *id) else {
                    continue;
                };
                if let Some(holder) = self.entry_with_key(node, &key) {
                    report.warn(format!(
                        "key '{key}' of base entry {id} is already used by entry {holder}; not inherited"
                    ));
                    continue;
                }
                Some(key)
            } else {
                None
            };
            let index = self.insertion_index(node, &base_ids[..position], &base_ids[position + 1..], &present)?;
            let value = base.graph.get(base.graph.item(base_node, *id)?)?;
            self.record_insert(node, index, key, Item::with_id(*id, value), &mut report.operations)?;
        }

        self.follow_base_order(node, &base_ids, &in_base, report)?;

        // Recurse into matched elements
        for id in self.ids(node) {
            if !in_base.contains(&id) {
                continue;
            }
            let state = self.overrides.get_item_override(node, id);
            if state.is_sealed() {
                continue;
            }
            if dictionary && self.overrides.get_key_override(node, id).is_base() {
                self.inherit_key(base, node, base_node, id, report)?;
            }
            let child = self.graph.item(node, id)?;
            let base_child = base.graph.item(base_node, id)?;
            self.sync_node(base, child, base_child, state, report)?;
        }
        Ok(())
    }

    /// Give a local `BASE` element the id of the base element in the same
    /// slot when both hold the same value
    fn adopt_base_ids(
        &mut self,
        base: &AssetPropertyGraph,
        node: NodeId,
        base_node: NodeId,
        base_ids: &[ItemId],
        in_base: &HashSet<ItemId>,
        report: &mut SyncReport,
    ) -> Result<(), AssetError> {
        let ids = self.ids(node);
        let mut present: HashSet<ItemId> = ids.iter().copied().collect();
        let start = report.operations.len();
        for (index, id) in ids.into_iter().enumerate() {
            let Some(&base_id) = base_ids.get(index) else {
                break;
            };
            if in_base.contains(&id)
                || present.contains(&base_id)
                || self.is_deleted(node, base_id)
                || !self.overrides.get_item_override(node, id).is_base()
            {
                continue;
            }
            if self.graph.key_of(node, id) != base.graph.key_of(base_node, base_id) {
                continue;
            }
            let local = self.graph.get(self.graph.item(node, id)?)?.without_ids();
            let inherited = base.graph.get(base.graph.item(base_node, base_id)?)?.without_ids();
            if local == inherited {
                self.record_remap(node, id, base_id, &mut report.operations)?;
                present.remove(&id);
                present.insert(base_id);
            }
        }
        if report.operations.len() > start {
            debug!(adopted = report.operations.len() - start, "adopted base item ids");
        }
        Ok(())
    }

    /// Lay out `BASE` elements in base order within the slots they occupy
    fn follow_base_order(
        &mut self,
        node: NodeId,
        base_ids: &[ItemId],
        in_base: &HashSet<ItemId>,
        report: &mut SyncReport,
    ) -> Result<(), AssetError> {
        let mut current = self.ids(node);
        let inherited: HashSet<ItemId> = current
            .iter()
            .copied()
            .filter(|id| in_base.contains(id) && self.overrides.get_item_override(node, *id).is_base())
            .collect();
        let mut ordered = base_ids.iter().copied().filter(|id| inherited.contains(id));
        let target: Vec<ItemId> = current
            .iter()
            .map(|id| {
                if inherited.contains(id) {
                    ordered.next().unwrap_or(*id)
                } else {
                    *id
                }
            })
            .collect();

        for (index, id) in target.into_iter().enumerate() {
            if current.get(index) == Some(&id) {
                continue;
            }
            self.record_move(node, id, index, &mut report.operations)?;
            if let Some(from) = current.iter().position(|c| *c == id) {
                current.remove(from);
                current.insert(index, id);
            }
        }
        Ok(())
    }

    fn inherit_key(
        &mut self,
        base: &AssetPropertyGraph,
        node: NodeId,
        base_node: NodeId,
        id: ItemId,
        report: &mut SyncReport,
    ) -> Result<(), AssetError> {
        let (Some(local), Some(inherited)) = (self.graph.key_of(node, id), base.graph.key_of(base_node, id))
        else {
            return Ok(());
        };
        if local == inherited {
            return Ok(());
        }
        if let Some(holder) = self.entry_with_key(node, &inherited) {
            report.warn(format!(
                "base renamed entry {id} to '{inherited}', which entry {holder} already uses; keeping '{local}'"
            ));
            return Ok(());
        }
        self.record_rename(node, id, inherited, &mut report.operations)
    }

    /// Index after the nearest preceding present sibling, else before the
    /// nearest following one, else the end
    fn insertion_index(
        &self,
        node: NodeId,
        before: &[ItemId],
        after: &[ItemId],
        present: &HashSet<ItemId>,
    ) -> Result<usize, AssetError> {
        let Some(ids) = self.graph.item_ids(node) else {
            return Ok(0);
        };
        if let Some(anchor) = before.iter().rev().find(|id| present.contains(id)) {
            return Ok(ids.lookup(*anchor)? + 1);
        }
        if let Some(anchor) = after.iter().find(|id| present.contains(id)) {
            return Ok(ids.lookup(*anchor)?);
        }
        Ok(ids.len())
    }

    fn ids(&self, node: NodeId) -> Vec<ItemId> {
        self.graph
            .item_ids(node)
            .map(|ids| ids.ids().to_vec())
            .unwrap_or_default()
    }

    fn deleted(&self, node: NodeId) -> Vec<ItemId> {
        self.graph
            .item_ids(node)
            .map(|ids| ids.deleted_ids().collect())
            .unwrap_or_default()
    }

    fn is_deleted(&self, node: NodeId, id: ItemId) -> bool {
        self.graph.item_ids(node).is_some_and(|ids| ids.is_deleted(id))
    }

    fn entry_with_key(&self, node: NodeId, key: &Key) -> Option<ItemId> {
        self.graph.item_ids(node).and_then(|ids| ids.id_for_key(key))
    }
}
