//! Integration tests for transaction history
//!
//! Undo followed by redo must land on the post-commit state, and registered
//! dirtiables must follow commits, undos and save points.

use lineage_test_utils::init_tracing;
use lineage_transactions::{
    CoalesceConfig, Dirtiable, DirtiableId, Operation, Replay, TransactionError, TransactionStack,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Write to a slot of a small key/value store
#[derive(Debug, Clone, PartialEq)]
struct Write {
    doc: u128,
    slot: u8,
    old: Option<i64>,
    new: Option<i64>,
}

impl Operation for Write {
    fn dirtiables(&self) -> Vec<DirtiableId> {
        vec![DirtiableId::new(self.doc)]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Store(BTreeMap<(u128, u8), i64>);

impl Store {
    fn write(&mut self, stack: &mut TransactionStack<Write>, doc: u128, slot: u8, new: Option<i64>) {
        let old = self.put(doc, slot, new);
        stack.push_operation(Write { doc, slot, old, new }).unwrap();
    }

    fn put(&mut self, doc: u128, slot: u8, value: Option<i64>) -> Option<i64> {
        match value {
            Some(v) => self.0.insert((doc, slot), v),
            None => self.0.remove(&(doc, slot)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("slot {0} is locked")]
struct Locked(u8);

impl Replay<Write> for Store {
    type Error = Locked;

    fn apply(&mut self, op: &Write) -> Result<(), Locked> {
        self.put(op.doc, op.slot, op.new);
        Ok(())
    }

    fn revert(&mut self, op: &Write) -> Result<(), Locked> {
        self.put(op.doc, op.slot, op.old);
        Ok(())
    }
}

fn write_strategy() -> impl Strategy<Value = (u128, u8, Option<i64>)> {
    (1u128..3, 0u8..4, prop::option::of(-50i64..50))
}

proptest! {
    #[test]
    fn undo_then_redo_restores_committed_state(
        transactions in prop::collection::vec(prop::collection::vec(write_strategy(), 1..6), 1..8)
    ) {
        let mut stack = TransactionStack::new(0, CoalesceConfig::disabled());
        let mut store = Store::default();
        let mut states = vec![store.clone()];

        for writes in transactions {
            let tx = stack.begin();
            for (doc, slot, value) in writes {
                store.write(&mut stack, doc, slot, value);
            }
            stack.commit(tx).unwrap();
            states.push(store.clone());
        }

        let after = store.clone();
        while stack.can_undo() {
            stack.undo(&mut store).unwrap();
            states.pop();
            prop_assert_eq!(Some(&store), states.last());
        }
        prop_assert_eq!(&store, &Store::default());

        while stack.can_redo() {
            stack.redo(&mut store).unwrap();
        }
        prop_assert_eq!(store, after);
    }
}

struct Document {
    id: DirtiableId,
    seen: Mutex<Vec<bool>>,
}

impl Dirtiable for Document {
    fn id(&self) -> DirtiableId {
        self.id
    }

    fn on_dirty_changed(&self, dirty: bool) {
        self.seen.lock().push(dirty);
    }
}

#[test]
fn registered_dirtiable_is_notified() {
    init_tracing();
    let doc = Arc::new(Document {
        id: DirtiableId::new(1),
        seen: Mutex::new(Vec::new()),
    });
    let mut stack = TransactionStack::new(10, CoalesceConfig::disabled());
    stack.dirtiables_mut().register(doc.clone());
    let mut store = Store::default();

    let tx = stack.begin();
    store.write(&mut stack, 1, 0, Some(3));
    stack.commit(tx).unwrap();
    stack.dirtiables_mut().save_point();
    stack.undo(&mut store).unwrap();

    assert_eq!(*doc.seen.lock(), vec![false, true, false, true]);
}

#[test]
fn untouched_document_stays_clean() {
    let mut stack = TransactionStack::new(10, CoalesceConfig::disabled());
    let mut store = Store::default();
    let tx = stack.begin();
    store.write(&mut stack, 1, 0, Some(3));
    stack.commit(tx).unwrap();

    assert!(stack.dirtiables().is_dirty(DirtiableId::new(1)));
    assert!(!stack.dirtiables().is_dirty(DirtiableId::new(2)));
}

/// Store whose revert fails once a slot is locked
#[derive(Default)]
struct Guarded {
    store: Store,
    locked: Option<u8>,
}

impl Replay<Write> for Guarded {
    type Error = Locked;

    fn apply(&mut self, op: &Write) -> Result<(), Locked> {
        self.store.apply(op)
    }

    fn revert(&mut self, op: &Write) -> Result<(), Locked> {
        if self.locked == Some(op.slot) {
            return Err(Locked(op.slot));
        }
        self.store.revert(op)
    }
}

#[test]
fn failed_undo_leaves_history_intact() {
    let mut stack = TransactionStack::new(10, CoalesceConfig::disabled());
    let mut target = Guarded::default();

    let tx = stack.begin();
    target.store.write(&mut stack, 1, 0, Some(1));
    target.store.write(&mut stack, 1, 1, Some(2));
    stack.commit(tx).unwrap();
    let committed = target.store.clone();

    target.locked = Some(0);
    let err = stack.undo(&mut target).unwrap_err();
    assert!(matches!(err, TransactionError::Replay { .. }));
    assert_eq!(stack.undo_len(), 1);
    assert_eq!(target.store, committed);

    target.locked = None;
    stack.undo(&mut target).unwrap();
    assert_eq!(target.store, Store::default());
}
