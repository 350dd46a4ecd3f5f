//! Item identifier map
//!
//! Provides [`ItemIdentifiers`], the per-container mapping between element
//! positions and [`ItemId`]s, and [`ItemIdMap`], which holds one of them per
//! container node.
//!
//! Both directions are O(1): `ids` maps position → id and `positions` maps
//! id → position. Every structural change keeps the two in step.

use crate::error::GraphError;
use crate::node::NodeId;
use lineage_core::{ItemId, Key};
use std::collections::{BTreeSet, HashMap};

/// Identifiers of the elements of one container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemIdentifiers {
    ids: Vec<ItemId>,
    positions: HashMap<ItemId, usize>,
    keys: HashMap<ItemId, Key>,
    by_key: HashMap<Key, ItemId>,
    deleted: BTreeSet<ItemId>,
}

impl ItemIdentifiers {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live elements
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Ids in position order
    #[inline]
    #[must_use]
    pub fn ids(&self) -> &[ItemId] {
        &self.ids
    }

    /// Whether an element with this id is present
    #[inline]
    #[must_use]
    pub fn contains(&self, id: ItemId) -> bool {
        self.positions.contains_key(&id)
    }

    /// Assign a fresh id to a new element at `index`
    ///
    /// # Errors
    /// Returns `IndexOutOfBounds` if `index > len`
    pub fn assign(&mut self, index: usize) -> Result<ItemId, GraphError> {
        let id = ItemId::new();
        self.insert(index, id)?;
        Ok(id)
    }

    /// Insert a known id at `index`
    ///
    /// # Errors
    /// - `IndexOutOfBounds` if `index > len`
    /// - `DuplicateItemId` if the id is already present
    pub fn insert(&mut self, index: usize, id: ItemId) -> Result<(), GraphError> {
        if index > self.ids.len() {
            return Err(GraphError::IndexOutOfBounds {
                index,
                len: self.ids.len(),
            });
        }
        if self.positions.contains_key(&id) {
            return Err(GraphError::DuplicateItemId(id));
        }
        self.ids.insert(index, id);
        self.reindex_from(index);
        Ok(())
    }

    /// Current position of `id`
    ///
    /// # Errors
    /// Returns `ItemNotFound` if the id is not present
    pub fn lookup(&self, id: ItemId) -> Result<usize, GraphError> {
        self.positions
            .get(&id)
            .copied()
            .ok_or(GraphError::ItemNotFound { id })
    }

    /// Id at position `index`
    #[inline]
    #[must_use]
    pub fn id_at(&self, index: usize) -> Option<ItemId> {
        self.ids.get(index).copied()
    }

    /// Remove `id`, returning its former position
    ///
    /// The id is retired; its key (if any) is released.
    ///
    /// # Errors
    /// Returns `ItemNotFound` if the id is not present
    pub fn remove(&mut self, id: ItemId) -> Result<usize, GraphError> {
        let index = self.lookup(id)?;
        self.ids.remove(index);
        self.positions.remove(&id);
        if let Some(key) = self.keys.remove(&id) {
            self.by_key.remove(&key);
        }
        self.reindex_from(index);
        Ok(index)
    }

    /// Move `id` to `position`, returning its former position
    ///
    /// # Errors
    /// - `ItemNotFound` if the id is not present
    /// - `IndexOutOfBounds` if `position >= len`
    pub fn move_to(&mut self, id: ItemId, position: usize) -> Result<usize, GraphError> {
        let from = self.lookup(id)?;
        if position >= self.ids.len() {
            return Err(GraphError::IndexOutOfBounds {
                index: position,
                len: self.ids.len(),
            });
        }
        self.ids.remove(from);
        self.ids.insert(position, id);
        self.reindex_from(from.min(position));
        Ok(from)
    }

    /// Replace `old` by `new` in place, keeping position and key
    ///
    /// # Errors
    /// - `ItemNotFound` if `old` is not present
    /// - `DuplicateItemId` if `new` is already present
    pub fn remap(&mut self, old: ItemId, new: ItemId) -> Result<(), GraphError> {
        let index = self.lookup(old)?;
        if old == new {
            return Ok(());
        }
        if self.positions.contains_key(&new) {
            return Err(GraphError::DuplicateItemId(new));
        }
        self.ids[index] = new;
        self.positions.remove(&old);
        self.positions.insert(new, index);
        if let Some(key) = self.keys.remove(&old) {
            self.by_key.insert(key.clone(), new);
            self.keys.insert(new, key);
        }
        Ok(())
    }

    /// Key of a dictionary entry
    #[inline]
    #[must_use]
    pub fn key_of(&self, id: ItemId) -> Option<&Key> {
        self.keys.get(&id)
    }

    /// Entry id for a dictionary key
    #[inline]
    #[must_use]
    pub fn id_for_key(&self, key: &Key) -> Option<ItemId> {
        self.by_key.get(key).copied()
    }

    /// Bind `key` to `id`, returning the previous key
    ///
    /// # Errors
    /// - `ItemNotFound` if the id is not present
    /// - `DuplicateKey` if another entry uses `key`
    pub fn set_key(&mut self, id: ItemId, key: Key) -> Result<Option<Key>, GraphError> {
        self.lookup(id)?;
        if let Some(owner) = self.by_key.get(&key) {
            if *owner == id {
                return Ok(Some(key));
            }
            return Err(GraphError::DuplicateKey(key.to_string()));
        }
        let previous = self.keys.insert(id, key.clone());
        if let Some(previous) = &previous {
            self.by_key.remove(previous);
        }
        self.by_key.insert(key, id);
        Ok(previous)
    }

    /// Record that an inherited element was deleted locally
    ///
    /// Returns `true` if the record is new.
    pub fn mark_deleted(&mut self, id: ItemId) -> bool {
        self.deleted.insert(id)
    }

    /// Drop a deletion record, returning `true` if one existed
    pub fn unmark_deleted(&mut self, id: ItemId) -> bool {
        self.deleted.remove(&id)
    }

    #[inline]
    #[must_use]
    pub fn is_deleted(&self, id: ItemId) -> bool {
        self.deleted.contains(&id)
    }

    /// Deletion records, sorted by id
    pub fn deleted_ids(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.deleted.iter().copied()
    }

    /// Replace the live ordering wholesale, keeping deletion records
    pub(crate) fn reset(&mut self, ids: Vec<ItemId>, keys: Vec<Option<Key>>) {
        self.positions = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        self.keys.clear();
        self.by_key.clear();
        for (id, key) in ids.iter().zip(keys) {
            if let Some(key) = key {
                self.by_key.insert(key.clone(), *id);
                self.keys.insert(*id, key);
            }
        }
        self.ids = ids;
    }

    fn reindex_from(&mut self, start: usize) {
        for (offset, id) in self.ids[start..].iter().enumerate() {
            self.positions.insert(*id, start + offset);
        }
    }
}

/// Item identifiers of every container in a graph
#[derive(Debug, Clone, Default)]
pub struct ItemIdMap {
    containers: HashMap<NodeId, ItemIdentifiers>,
}

impl ItemIdMap {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifiers of a container
    #[inline]
    #[must_use]
    pub fn get(&self, container: NodeId) -> Option<&ItemIdentifiers> {
        self.containers.get(&container)
    }

    pub(crate) fn get_mut(&mut self, container: NodeId) -> Result<&mut ItemIdentifiers, GraphError> {
        self.containers
            .get_mut(&container)
            .ok_or(GraphError::NotAContainer(container))
    }

    pub(crate) fn entry(&mut self, container: NodeId) -> &mut ItemIdentifiers {
        self.containers.entry(container).or_default()
    }

    pub(crate) fn remove_container(&mut self, container: NodeId) {
        self.containers.remove(&container);
    }

    /// Position of `id` in `container`
    ///
    /// # Errors
    /// - `NotAContainer` if the node has no identifiers
    /// - `ItemNotFound` if the id is not present
    pub fn lookup(&self, container: NodeId, id: ItemId) -> Result<usize, GraphError> {
        self.containers
            .get(&container)
            .ok_or(GraphError::NotAContainer(container))?
            .lookup(id)
    }

    /// Id at a position of `container`
    #[must_use]
    pub fn id_at(&self, container: NodeId, index: usize) -> Option<ItemId> {
        self.containers.get(&container)?.id_at(index)
    }

    /// Number of tracked containers
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.containers.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }
}
