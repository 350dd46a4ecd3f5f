//! Override tracking
//!
//! Provides [`OverrideTracker`], the per-document record of which locations
//! deviate from the base document:
//! - member overrides, keyed by the member's node
//! - item overrides, keyed by `(container node, ItemId)`
//! - key overrides for dictionary entries, keyed the same way
//!
//! Node ids are addresses: a node keeps its id for as long as its location
//! exists, and destroyed nodes are forgotten through [`OverrideTracker::apply_change`].
//! A tracker for a document without a base never stores anything.

use lineage_core::{ItemId, NodePath, OverrideState};
use lineage_graph::{GraphError, NodeChange, NodeGraph, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Override entries of a subtree, addressed relative to its root
///
/// The root's own member override is not part of the capture.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideCapture {
    /// Member overrides of descendants
    pub members: Vec<(NodePath, OverrideState)>,
    /// Item overrides of containers in the subtree
    pub items: Vec<(NodePath, ItemId, OverrideState)>,
    /// Key overrides of dictionaries in the subtree
    pub keys: Vec<(NodePath, ItemId, OverrideState)>,
    /// Deletion records of containers in the subtree
    pub deleted: Vec<(NodePath, ItemId)>,
}

impl OverrideCapture {
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
            && self.items.is_empty()
            && self.keys.is_empty()
            && self.deleted.is_empty()
    }
}

/// Override states of one document
#[derive(Debug, Clone, Default)]
pub struct OverrideTracker {
    inherits: bool,
    members: HashMap<NodeId, OverrideState>,
    items: HashMap<NodeId, HashMap<ItemId, OverrideState>>,
    keys: HashMap<NodeId, HashMap<ItemId, OverrideState>>,
}

impl OverrideTracker {
    /// Tracker for a document that does (`inherits`) or does not have a base
    #[inline]
    #[must_use]
    pub fn new(inherits: bool) -> Self {
        Self {
            inherits,
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn inherits(&self) -> bool {
        self.inherits
    }

    /// Switch inheritance; turning it off drops every entry
    pub fn set_inherits(&mut self, inherits: bool) {
        self.inherits = inherits;
        if !inherits {
            self.clear();
        }
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.members.clear();
        self.items.clear();
        self.keys.clear();
    }

    /// Number of non-base entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
            + self.items.values().map(HashMap::len).sum::<usize>()
            + self.keys.values().map(HashMap::len).sum::<usize>()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ------------------------------------------------------------------
    // Queries and setters
    // ------------------------------------------------------------------

    #[must_use]
    pub fn get_override(&self, node: NodeId) -> OverrideState {
        self.members.get(&node).copied().unwrap_or_default()
    }

    /// Set a member override, returning the previous state
    pub fn set_override(&mut self, node: NodeId, state: OverrideState) -> OverrideState {
        if !self.inherits {
            return OverrideState::BASE;
        }
        let previous = if state.is_base() {
            self.members.remove(&node)
        } else {
            self.members.insert(node, state)
        };
        previous.unwrap_or_default()
    }

    #[must_use]
    pub fn get_item_override(&self, container: NodeId, id: ItemId) -> OverrideState {
        lookup(&self.items, container, id)
    }

    /// Set an item override, returning the previous state
    pub fn set_item_override(
        &mut self,
        container: NodeId,
        id: ItemId,
        state: OverrideState,
    ) -> OverrideState {
        if !self.inherits {
            return OverrideState::BASE;
        }
        store(&mut self.items, container, id, state)
    }

    #[must_use]
    pub fn get_key_override(&self, container: NodeId, id: ItemId) -> OverrideState {
        lookup(&self.keys, container, id)
    }

    /// Set a dictionary key override, returning the previous state
    pub fn set_key_override(
        &mut self,
        container: NodeId,
        id: ItemId,
        state: OverrideState,
    ) -> OverrideState {
        if !self.inherits {
            return OverrideState::BASE;
        }
        store(&mut self.keys, container, id, state)
    }

    /// Item overrides of a container, in no particular order
    pub fn item_overrides(&self, container: NodeId) -> impl Iterator<Item = (ItemId, OverrideState)> + '_ {
        self.items
            .get(&container)
            .into_iter()
            .flatten()
            .map(|(id, state)| (*id, *state))
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Forget entries of a destroyed node
    pub fn forget(&mut self, node: NodeId) {
        self.members.remove(&node);
        self.items.remove(&node);
        self.keys.remove(&node);
    }

    /// Forget the item and key override of one element
    pub fn forget_item(&mut self, container: NodeId, id: ItemId) {
        for map in [&mut self.items, &mut self.keys] {
            if let Some(entries) = map.get_mut(&container) {
                entries.remove(&id);
                if entries.is_empty() {
                    map.remove(&container);
                }
            }
        }
    }

    /// Forget every entry at or below `node`
    ///
    /// # Errors
    /// Returns `StaleNode` if the node was destroyed
    pub fn forget_subtree(&mut self, graph: &NodeGraph, node: NodeId) -> Result<(), GraphError> {
        for n in graph.descendants(node)? {
            self.forget(n);
        }
        Ok(())
    }

    /// Move the item and key override of an element to a new id
    pub fn remap_item(&mut self, container: NodeId, old: ItemId, new: ItemId) {
        for map in [&mut self.items, &mut self.keys] {
            if let Some(entries) = map.get_mut(&container) {
                if let Some(state) = entries.remove(&old) {
                    entries.insert(new, state);
                }
            }
        }
    }

    /// Keep the tracker consistent with a graph change
    pub fn apply_change(&mut self, change: &NodeChange) {
        if let NodeChange::Destroyed { node, parent, item } = change {
            self.forget(*node);
            if let (Some(parent), Some(item)) = (parent, item) {
                self.forget_item(*parent, *item);
            }
        }
    }

    // ------------------------------------------------------------------
    // Capture / restore
    // ------------------------------------------------------------------

    /// Record every entry and deletion record below `root`
    ///
    /// # Errors
    /// Returns `StaleNode` if `root` was destroyed
    pub fn capture(&self, graph: &NodeGraph, root: NodeId) -> Result<OverrideCapture, GraphError> {
        let root_path = graph.path_of(root)?;
        let mut capture = OverrideCapture::default();

        for node in graph.descendants(root)? {
            let path = relative(graph, node, &root_path)?;
            if node != root {
                if let Some(state) = self.members.get(&node) {
                    capture.members.push((path.clone(), *state));
                }
            }
            for (id, state) in sorted(self.items.get(&node)) {
                capture.items.push((path.clone(), id, state));
            }
            for (id, state) in sorted(self.keys.get(&node)) {
                capture.keys.push((path.clone(), id, state));
            }
            if let Some(ids) = graph.item_ids(node) {
                for id in ids.deleted_ids() {
                    capture.deleted.push((path.clone(), id));
                }
            }
        }
        Ok(capture)
    }

    /// Replace every entry and deletion record below `root` with `capture`
    ///
    /// # Errors
    /// - `StaleNode` if `root` was destroyed
    /// - `PathNotFound` if a captured address does not exist under `root`
    pub fn restore(
        &mut self,
        graph: &mut NodeGraph,
        root: NodeId,
        capture: &OverrideCapture,
    ) -> Result<(), GraphError> {
        for node in graph.descendants(root)? {
            if node != root {
                self.members.remove(&node);
            }
            self.items.remove(&node);
            self.keys.remove(&node);
            let deleted: Vec<ItemId> = graph
                .item_ids(node)
                .map(|ids| ids.deleted_ids().collect())
                .unwrap_or_default();
            for id in deleted {
                graph.unmark_deleted(node, id)?;
            }
        }

        for (path, state) in &capture.members {
            let node = graph.resolve_from(root, path)?;
            self.set_override(node, *state);
        }
        for (path, id, state) in &capture.items {
            let container = graph.resolve_from(root, path)?;
            self.set_item_override(container, *id, *state);
        }
        for (path, id, state) in &capture.keys {
            let container = graph.resolve_from(root, path)?;
            self.set_key_override(container, *id, *state);
        }
        for (path, id) in &capture.deleted {
            let container = graph.resolve_from(root, path)?;
            graph.mark_deleted(container, *id)?;
        }
        Ok(())
    }
}

fn lookup(
    map: &HashMap<NodeId, HashMap<ItemId, OverrideState>>,
    container: NodeId,
    id: ItemId,
) -> OverrideState {
    map.get(&container)
        .and_then(|entries| entries.get(&id))
        .copied()
        .unwrap_or_default()
}

fn store(
    map: &mut HashMap<NodeId, HashMap<ItemId, OverrideState>>,
    container: NodeId,
    id: ItemId,
    state: OverrideState,
) -> OverrideState {
    let previous = if state.is_base() {
        let previous = map.get_mut(&container).and_then(|entries| entries.remove(&id));
        if map.get(&container).is_some_and(HashMap::is_empty) {
            map.remove(&container);
        }
        previous
    } else {
        map.entry(container).or_default().insert(id, state)
    };
    previous.unwrap_or_default()
}

fn sorted(entries: Option<&HashMap<ItemId, OverrideState>>) -> Vec<(ItemId, OverrideState)> {
    let mut out: Vec<_> = entries
        .into_iter()
        .flatten()
        .map(|(id, state)| (*id, *state))
        .collect();
    out.sort_unstable_by_key(|(id, _)| *id);
    out
}

fn relative(graph: &NodeGraph, node: NodeId, root_path: &NodePath) -> Result<NodePath, GraphError> {
    graph
        .path_of(node)?
        .relative_to(root_path)
        .map_err(|_| GraphError::path_not_found(root_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lineage_test_utils::{archetype, fixture_registry, item_id};

    fn graph() -> NodeGraph {
        let mut graph = NodeGraph::new(fixture_registry(), archetype()).unwrap();
        graph.enable_journal();
        graph
    }

    fn node(graph: &NodeGraph, path: &str) -> NodeId {
        graph.resolve(&path.parse().unwrap()).unwrap()
    }

    #[test]
    fn no_base_is_always_base() {
        let graph = graph();
        let mut tracker = OverrideTracker::new(false);
        let health = node(&graph, "Health");
        tracker.set_override(health, OverrideState::NEW);
        assert_eq!(tracker.get_override(health), OverrideState::BASE);
        assert!(tracker.is_empty());
    }

    #[test]
    fn setters_return_previous() {
        let graph = graph();
        let mut tracker = OverrideTracker::new(true);
        let inventory = node(&graph, "Inventory");
        assert_eq!(
            tracker.set_item_override(inventory, item_id(2), OverrideState::SEALED),
            OverrideState::BASE
        );
        assert_eq!(
            tracker.set_item_override(inventory, item_id(2), OverrideState::BASE),
            OverrideState::SEALED
        );
        assert!(tracker.is_empty());
    }

    #[test]
    fn destroyed_items_are_forgotten() {
        let mut graph = graph();
        let mut tracker = OverrideTracker::new(true);
        let inventory = node(&graph, "Inventory");
        tracker.set_item_override(inventory, item_id(1), OverrideState::NEW);

        graph.remove_item(inventory, item_id(1)).unwrap();
        for change in graph.drain_changes() {
            tracker.apply_change(&change);
        }
        assert_eq!(tracker.get_item_override(inventory, item_id(1)), OverrideState::BASE);
    }

    #[test]
    fn capture_and_restore_round_trip() {
        let mut graph = graph();
        let mut tracker = OverrideTracker::new(true);
        let root = graph.root();
        let inventory = node(&graph, "Inventory");
        let stats = node(&graph, "Stats");
        tracker.set_override(inventory, OverrideState::NEW);
        tracker.set_item_override(inventory, item_id(2), OverrideState::SEALED);
        tracker.set_key_override(stats, item_id(11), OverrideState::NEW);
        graph.mark_deleted(inventory, item_id(9)).unwrap();

        let capture = tracker.capture(&graph, root).unwrap();
        assert_eq!(capture.members.len(), 1);
        assert_eq!(capture.deleted.len(), 1);

        tracker.clear();
        graph.unmark_deleted(inventory, item_id(9)).unwrap();
        tracker.restore(&mut graph, root, &capture).unwrap();

        assert_eq!(tracker.get_override(inventory), OverrideState::NEW);
        assert_eq!(tracker.get_item_override(inventory, item_id(2)), OverrideState::SEALED);
        assert_eq!(tracker.get_key_override(stats, item_id(11)), OverrideState::NEW);
        assert!(graph.item_ids(inventory).unwrap().is_deleted(item_id(9)));
    }

    #[test]
    fn capture_excludes_root_member_override() {
        let graph = graph();
        let mut tracker = OverrideTracker::new(true);
        let inventory = node(&graph, "Inventory");
        tracker.set_override(inventory, OverrideState::NEW);
        tracker.set_item_override(inventory, item_id(1), OverrideState::NEW);

        let capture = tracker.capture(&graph, inventory).unwrap();
        assert!(capture.members.is_empty());
        assert_eq!(capture.items, vec![(NodePath::root(), item_id(1), OverrideState::NEW)]);
    }

    #[test]
    fn remap_moves_item_override() {
        let graph = graph();
        let mut tracker = OverrideTracker::new(true);
        let inventory = node(&graph, "Inventory");
        tracker.set_item_override(inventory, item_id(1), OverrideState::NEW);
        tracker.remap_item(inventory, item_id(1), item_id(5));
        assert_eq!(tracker.get_item_override(inventory, item_id(5)), OverrideState::NEW);
        assert_eq!(tracker.get_item_override(inventory, item_id(1)), OverrideState::BASE);
    }
}
