//! Reference tracking
//!
//! References are relations, not ownership. A node whose declared type is an
//! object type carries an [`ObjectReference`]; a container of object-typed
//! elements carries an [`EnumerableReference`] keyed by [`ItemId`].
//!
//! The tracker keeps three indexes:
//! - `references`: node → current reference
//! - `identities`: object identity → node holding that object
//! - `dependents`: object identity → nodes whose references mention it
//!
//! When an identity appears or disappears, its dependents are re-resolved, so
//! a dangling reference becomes resolved as soon as its target exists.

use crate::node::NodeId;
use indexmap::IndexMap;
use lineage_core::{ItemId, ObjectId};
use std::collections::{HashMap, HashSet};

/// Where a reference points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceTarget {
    /// Object value held at this location
    Owned(NodeId),
    /// Identity reference to an object elsewhere in the graph
    Resolved(NodeId),
    /// Identity reference with no matching object
    Unresolved(ObjectId),
}

impl ReferenceTarget {
    /// Target node, if resolved
    #[inline]
    #[must_use]
    pub fn node(self) -> Option<NodeId> {
        match self {
            Self::Owned(node) | Self::Resolved(node) => Some(node),
            Self::Unresolved(_) => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_dangling(self) -> bool {
        matches!(self, Self::Unresolved(_))
    }
}

/// Single-target reference (`None` when the location holds null)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectReference {
    target: Option<ReferenceTarget>,
}

impl ObjectReference {
    #[inline]
    #[must_use]
    pub fn new(target: Option<ReferenceTarget>) -> Self {
        Self { target }
    }

    #[inline]
    #[must_use]
    pub fn target(&self) -> Option<ReferenceTarget> {
        self.target
    }
}

/// Per-element targets of a container, keyed by item id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumerableReference {
    targets: IndexMap<ItemId, ReferenceTarget>,
}

impl EnumerableReference {
    #[inline]
    #[must_use]
    pub fn new(targets: IndexMap<ItemId, ReferenceTarget>) -> Self {
        Self { targets }
    }

    /// Target of one element
    #[inline]
    #[must_use]
    pub fn target(&self, id: ItemId) -> Option<ReferenceTarget> {
        self.targets.get(&id).copied()
    }

    /// Targets in element order
    pub fn iter(&self) -> impl Iterator<Item = (ItemId, ReferenceTarget)> + '_ {
        self.targets.iter().map(|(id, target)| (*id, *target))
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Reference rooted at a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Object(ObjectReference),
    Enumerable(EnumerableReference),
}

impl Reference {
    /// All targets, in order
    #[must_use]
    pub fn targets(&self) -> Vec<ReferenceTarget> {
        match self {
            Self::Object(r) => r.target().into_iter().collect(),
            Self::Enumerable(r) => r.iter().map(|(_, t)| t).collect(),
        }
    }
}

/// Reference indexes of one graph
#[derive(Debug, Clone, Default)]
pub struct ReferenceTracker {
    references: HashMap<NodeId, Reference>,
    identities: HashMap<ObjectId, NodeId>,
    dependents: HashMap<ObjectId, HashSet<NodeId>>,
    watched: HashMap<NodeId, Vec<ObjectId>>,
}

impl ReferenceTracker {
    /// Reference rooted at `node`
    #[inline]
    #[must_use]
    pub fn get(&self, node: NodeId) -> Option<&Reference> {
        self.references.get(&node)
    }

    /// Node holding the object with identity `id`
    #[inline]
    #[must_use]
    pub fn identity(&self, id: ObjectId) -> Option<NodeId> {
        self.identities.get(&id).copied()
    }

    /// Nodes whose references mention `id`
    pub fn dependents(&self, id: ObjectId) -> impl Iterator<Item = NodeId> + '_ {
        self.dependents.get(&id).into_iter().flatten().copied()
    }

    /// Number of nodes carrying a reference
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.references.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    /// Dangling targets across the graph
    #[must_use]
    pub fn unresolved(&self) -> Vec<ObjectId> {
        let mut ids: Vec<_> = self
            .references
            .values()
            .flat_map(Reference::targets)
            .filter_map(|t| match t {
                ReferenceTarget::Unresolved(id) => Some(id),
                _ => None,
            })
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub(crate) fn register_identity(&mut self, id: ObjectId, node: NodeId) {
        if let Some(previous) = self.identities.insert(id, node) {
            if previous != node {
                tracing::warn!(object = %id, "duplicate object identity; latest holder wins");
            }
        }
    }

    pub(crate) fn unregister_identity(&mut self, id: ObjectId, node: NodeId) {
        if self.identities.get(&id) == Some(&node) {
            self.identities.remove(&id);
        }
    }

    /// Replace the reference of `node`, returning whether it changed
    pub(crate) fn store(
        &mut self,
        node: NodeId,
        reference: Option<Reference>,
        watched: Vec<ObjectId>,
    ) -> bool {
        if let Some(previous) = self.watched.remove(&node) {
            for id in previous {
                if let Some(nodes) = self.dependents.get_mut(&id) {
                    nodes.remove(&node);
                    if nodes.is_empty() {
                        self.dependents.remove(&id);
                    }
                }
            }
        }
        if !watched.is_empty() {
            for id in &watched {
                self.dependents.entry(*id).or_default().insert(node);
            }
            self.watched.insert(node, watched);
        }

        let changed = self.references.get(&node) != reference.as_ref();
        if changed {
            match reference {
                Some(reference) => {
                    self.references.insert(node, reference);
                }
                None => {
                    self.references.remove(&node);
                }
            }
        }
        changed
    }

    pub(crate) fn forget(&mut self, node: NodeId) {
        self.store(node, None, Vec::new());
    }
}
