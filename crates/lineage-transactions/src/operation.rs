//! Operations and transactions
//!
//! Provides the record types the stack stores:
//! - [`Operation`]: a reversible unit, plain data
//! - [`Replay`]: the target that applies and reverts operations
//! - [`Transaction`]: a committed, replayable group of operations

use crate::dirtiable::DirtiableId;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display, Formatter};
use std::time::Instant;

/// Reversible unit of change
///
/// An operation carries everything needed to apply and exactly undo itself.
/// The stack never interprets it; replay goes through [`Replay`].
pub trait Operation: Clone + Debug {
    /// Dirtiables this operation touches
    fn dirtiables(&self) -> Vec<DirtiableId> {
        Vec::new()
    }
}

/// Something operations can be replayed against
pub trait Replay<Op> {
    /// Error raised when an operation no longer fits the target
    type Error: std::error::Error + Send + Sync + 'static;

    /// Re-apply `op` (redo)
    ///
    /// # Errors
    /// Implementation-defined
    fn apply(&mut self, op: &Op) -> Result<(), Self::Error>;

    /// Undo `op`
    ///
    /// # Errors
    /// Implementation-defined
    fn revert(&mut self, op: &Op) -> Result<(), Self::Error>;
}

/// Identifier of a committed transaction
///
/// Ids are never reused; a coalesced transaction receives a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(u64);

impl TransactionId {
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl Display for TransactionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "tx#{}", self.0)
    }
}

/// Handle of an open transaction
///
/// Must be passed back to `commit` or `rollback` of the innermost open
/// transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use = "an open transaction must be committed or rolled back"]
pub struct TransactionHandle {
    pub(crate) serial: u64,
    pub(crate) depth: usize,
}

impl TransactionHandle {
    /// Nesting depth (0 = outermost)
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[inline]
    #[must_use]
    pub fn is_outermost(&self) -> bool {
        self.depth == 0
    }
}

/// Committed group of operations
#[derive(Debug, Clone)]
pub struct Transaction<Op> {
    pub(crate) id: TransactionId,
    pub(crate) operations: Vec<Op>,
    pub(crate) merge_key: Option<String>,
    pub(crate) dirtiables: Vec<DirtiableId>,
    pub(crate) committed_at: Instant,
}

impl<Op: Operation> Transaction<Op> {
    pub(crate) fn new(id: TransactionId, operations: Vec<Op>, merge_key: Option<String>) -> Self {
        let dirtiables = collect_dirtiables(&operations);
        Self {
            id,
            operations,
            merge_key,
            dirtiables,
            committed_at: Instant::now(),
        }
    }

    /// Append the operations of a later transaction
    pub(crate) fn absorb(&mut self, id: TransactionId, operations: Vec<Op>) {
        self.operations.extend(operations);
        self.dirtiables = collect_dirtiables(&self.operations);
        self.id = id;
        self.committed_at = Instant::now();
    }
}

impl<Op> Transaction<Op> {
    #[inline]
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Operations in application order
    #[inline]
    #[must_use]
    pub fn operations(&self) -> &[Op] {
        &self.operations
    }

    /// Coalescing key, for mergeable transactions
    #[inline]
    #[must_use]
    pub fn merge_key(&self) -> Option<&str> {
        self.merge_key.as_deref()
    }

    /// Dirtiables touched by any operation, deduplicated
    #[inline]
    #[must_use]
    pub fn dirtiables(&self) -> &[DirtiableId] {
        &self.dirtiables
    }
}

fn collect_dirtiables<Op: Operation>(operations: &[Op]) -> Vec<DirtiableId> {
    let mut ids: Vec<_> = operations.iter().flat_map(Operation::dirtiables).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Touch(u128);

    impl Operation for Touch {
        fn dirtiables(&self) -> Vec<DirtiableId> {
            vec![DirtiableId::new(self.0)]
        }
    }

    #[test]
    fn dirtiables_are_deduplicated() {
        let tx = Transaction::new(TransactionId::new(1), vec![Touch(2), Touch(1), Touch(2)], None);
        assert_eq!(tx.dirtiables(), &[DirtiableId::new(1), DirtiableId::new(2)]);
    }

    #[test]
    fn absorb_takes_new_id() {
        let mut tx = Transaction::new(TransactionId::new(1), vec![Touch(1)], Some("k".into()));
        tx.absorb(TransactionId::new(4), vec![Touch(3)]);
        assert_eq!(tx.id(), TransactionId::new(4));
        assert_eq!(tx.operations().len(), 2);
        assert_eq!(tx.dirtiables().len(), 2);
        assert_eq!(tx.merge_key(), Some("k"));
    }

    #[test]
    fn id_display() {
        assert_eq!(TransactionId::new(7).to_string(), "tx#7");
    }
}
