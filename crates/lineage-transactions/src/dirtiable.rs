//! Dirtiable tracking
//!
//! A dirtiable is an external "unsaved changes" flag, typically one per
//! document. The manager records, per dirtiable, the stack of applied
//! transactions that touched it. The top of that stack is the dirtiable's
//! current state; a save point remembers it. A dirtiable is dirty iff its
//! current state differs from the saved one, so undoing back to the save
//! point makes it clean again.

use crate::operation::TransactionId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;

/// Identifier of a dirtiable
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirtiableId(u128);

impl DirtiableId {
    #[inline]
    #[must_use]
    pub const fn new(value: u128) -> Self {
        Self(value)
    }

    #[inline]
    #[must_use]
    pub const fn get(self) -> u128 {
        self.0
    }
}

impl Display for DirtiableId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Receiver of dirtiness updates
pub trait Dirtiable: Send + Sync {
    /// Identity under which transactions report this dirtiable
    fn id(&self) -> DirtiableId;

    /// Called whenever the manager re-evaluates this dirtiable
    fn on_dirty_changed(&self, dirty: bool);
}

#[derive(Debug, Clone, Default)]
struct DirtyState {
    /// Applied transactions touching the dirtiable, oldest first
    applied: Vec<TransactionId>,
    /// Latest transaction purged from the undo stack
    baseline: Option<TransactionId>,
    saved: Option<TransactionId>,
}

impl DirtyState {
    fn current(&self) -> Option<TransactionId> {
        self.applied.last().copied().or(self.baseline)
    }

    fn is_dirty(&self) -> bool {
        self.current() != self.saved
    }
}

/// Dirty state of every dirtiable a transaction has touched
#[derive(Default)]
pub struct DirtiableManager {
    states: HashMap<DirtiableId, DirtyState>,
    listeners: HashMap<DirtiableId, Arc<dyn Dirtiable>>,
}

impl Debug for DirtiableManager {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirtiableManager")
            .field("states", &self.states)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl DirtiableManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dirtiable for notifications
    ///
    /// It is notified immediately with its current state.
    pub fn register(&mut self, dirtiable: Arc<dyn Dirtiable>) {
        let id = dirtiable.id();
        dirtiable.on_dirty_changed(self.is_dirty(id));
        self.listeners.insert(id, dirtiable);
    }

    /// Stop notifying and forget the dirtiable's history
    pub fn unregister(&mut self, id: DirtiableId) {
        self.listeners.remove(&id);
        self.states.remove(&id);
    }

    /// Whether the dirtiable differs from its save point
    #[must_use]
    pub fn is_dirty(&self, id: DirtiableId) -> bool {
        self.states.get(&id).is_some_and(DirtyState::is_dirty)
    }

    /// Dirtiables currently dirty, sorted
    #[must_use]
    pub fn dirty(&self) -> Vec<DirtiableId> {
        let mut ids: Vec<_> = self
            .states
            .iter()
            .filter(|(_, state)| state.is_dirty())
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Record the current state of every dirtiable as clean
    pub fn save_point(&mut self) {
        for state in self.states.values_mut() {
            state.saved = state.current();
        }
        let ids: Vec<_> = self.listeners.keys().copied().collect();
        self.notify(&ids);
    }

    /// Record the current state of one dirtiable as clean
    pub fn save_point_for(&mut self, id: DirtiableId) {
        if let Some(state) = self.states.get_mut(&id) {
            state.saved = state.current();
        }
        self.notify(&[id]);
    }

    /// A transaction was committed or redone
    pub(crate) fn applied(&mut self, tx: TransactionId, dirtiables: &[DirtiableId]) {
        for id in dirtiables {
            self.states.entry(*id).or_default().applied.push(tx);
        }
        self.notify(dirtiables);
    }

    /// A transaction was undone
    pub(crate) fn reverted(&mut self, tx: TransactionId, dirtiables: &[DirtiableId]) {
        for id in dirtiables {
            if let Some(state) = self.states.get_mut(id) {
                if state.applied.last() == Some(&tx) {
                    state.applied.pop();
                } else {
                    tracing::warn!(dirtiable = %id, transaction = %tx, "reverted transaction is not the latest applied");
                    state.applied.retain(|t| *t != tx);
                }
            }
        }
        self.notify(dirtiables);
    }

    /// The top transaction was merged into `merged`, taking a fresh id
    pub(crate) fn merged(
        &mut self,
        previous: TransactionId,
        previous_dirtiables: &[DirtiableId],
        merged: TransactionId,
        dirtiables: &[DirtiableId],
    ) {
        for id in previous_dirtiables {
            if let Some(state) = self.states.get_mut(id) {
                if state.applied.last() == Some(&previous) {
                    state.applied.pop();
                }
            }
        }
        for id in dirtiables {
            self.states.entry(*id).or_default().applied.push(merged);
        }
        let mut touched = previous_dirtiables.to_vec();
        touched.extend_from_slice(dirtiables);
        touched.sort_unstable();
        touched.dedup();
        self.notify(&touched);
    }

    /// The oldest transaction left the undo stack
    pub(crate) fn purged(&mut self, tx: TransactionId, dirtiables: &[DirtiableId]) {
        for id in dirtiables {
            if let Some(state) = self.states.get_mut(id) {
                if state.applied.first() == Some(&tx) {
                    state.applied.remove(0);
                    state.baseline = Some(tx);
                }
            }
        }
    }

    fn notify(&self, ids: &[DirtiableId]) {
        for id in ids {
            if let Some(listener) = self.listeners.get(id) {
                listener.on_dirty_changed(self.is_dirty(*id));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(n: u64) -> TransactionId {
        TransactionId::new(n)
    }

    const DOC: DirtiableId = DirtiableId::new(1);

    #[test]
    fn clean_until_touched() {
        let mut manager = DirtiableManager::new();
        assert!(!manager.is_dirty(DOC));
        manager.applied(tx(1), &[DOC]);
        assert!(manager.is_dirty(DOC));
        assert_eq!(manager.dirty(), vec![DOC]);
    }

    #[test]
    fn undo_to_save_point_is_clean() {
        let mut manager = DirtiableManager::new();
        manager.applied(tx(1), &[DOC]);
        manager.save_point();
        manager.applied(tx(2), &[DOC]);
        assert!(manager.is_dirty(DOC));
        manager.reverted(tx(2), &[DOC]);
        assert!(!manager.is_dirty(DOC));
        manager.reverted(tx(1), &[DOC]);
        assert!(manager.is_dirty(DOC));
    }

    #[test]
    fn merge_invalidates_save_point() {
        let mut manager = DirtiableManager::new();
        manager.applied(tx(1), &[DOC]);
        manager.save_point();
        manager.merged(tx(1), &[DOC], tx(2), &[DOC]);
        assert!(manager.is_dirty(DOC));
    }

    #[test]
    fn purge_keeps_baseline() {
        let mut manager = DirtiableManager::new();
        manager.applied(tx(1), &[DOC]);
        manager.save_point();
        manager.purged(tx(1), &[DOC]);
        assert!(!manager.is_dirty(DOC));
        manager.applied(tx(2), &[DOC]);
        manager.reverted(tx(2), &[DOC]);
        assert!(!manager.is_dirty(DOC));
    }

    #[test]
    fn save_point_for_one_dirtiable() {
        let other = DirtiableId::new(2);
        let mut manager = DirtiableManager::new();
        manager.applied(tx(1), &[DOC, other]);
        manager.save_point_for(DOC);
        assert!(!manager.is_dirty(DOC));
        assert!(manager.is_dirty(other));
    }
}
