//! Transaction stack
//!
//! States: idle → recording (one or more open transactions) → idle.
//!
//! Operations are applied by the caller as they happen and recorded with
//! [`TransactionStack::push_operation`]. Committing a nested transaction
//! flattens its operations into the parent; committing the outermost one
//! archives it on the undo stack. Rollback reverts the open transaction's
//! operations in reverse order and discards them.

use crate::dirtiable::DirtiableManager;
use crate::error::TransactionError;
use crate::operation::{Operation, Replay, Transaction, TransactionHandle, TransactionId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Coalescing policy for mergeable transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoalesceConfig {
    /// Merge consecutive mergeable transactions with the same key
    pub enabled: bool,
    /// Maximum time since the previous commit, in milliseconds
    pub window_ms: u64,
}

impl Default for CoalesceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_ms: 500,
        }
    }
}

impl CoalesceConfig {
    /// Coalescing switched off
    #[inline]
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Merge window as a duration
    #[inline]
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

#[derive(Debug)]
struct Frame<Op> {
    serial: u64,
    operations: Vec<Op>,
    merge_key: Option<String>,
}

/// Undo/redo engine over operations of type `Op`
#[derive(Debug)]
pub struct TransactionStack<Op> {
    undo: VecDeque<Transaction<Op>>,
    redo: Vec<Transaction<Op>>,
    open: Vec<Frame<Op>>,
    capacity: usize,
    coalesce: CoalesceConfig,
    next_serial: u64,
    next_id: u64,
    dirtiables: DirtiableManager,
}

impl<Op: Operation> Default for TransactionStack<Op> {
    fn default() -> Self {
        Self::new(100, CoalesceConfig::default())
    }
}

impl<Op: Operation> TransactionStack<Op> {
    /// Stack keeping at most `capacity` committed transactions (0 = unbounded)
    #[must_use]
    pub fn new(capacity: usize, coalesce: CoalesceConfig) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            open: Vec::new(),
            capacity,
            coalesce,
            next_serial: 1,
            next_id: 1,
            dirtiables: DirtiableManager::new(),
        }
    }

    // ------------------------------------------------------------------
    // Recording
    // ------------------------------------------------------------------

    /// Open a transaction (nested if one is already open)
    pub fn begin(&mut self) -> TransactionHandle {
        self.open_frame(None)
    }

    /// Open a transaction that may merge with the previous commit of the
    /// same key
    pub fn begin_mergeable(&mut self, key: impl Into<String>) -> TransactionHandle {
        self.open_frame(Some(key.into()))
    }

    fn open_frame(&mut self, merge_key: Option<String>) -> TransactionHandle {
        let serial = self.next_serial;
        self.next_serial += 1;
        let depth = self.open.len();
        self.open.push(Frame {
            serial,
            operations: Vec::new(),
            merge_key,
        });
        tracing::trace!(serial, depth, "transaction opened");
        TransactionHandle { serial, depth }
    }

    /// Record an already-applied operation in the innermost transaction
    ///
    /// # Errors
    /// Returns `NoActiveTransaction` when idle
    pub fn push_operation(&mut self, op: Op) -> Result<(), TransactionError> {
        self.open
            .last_mut()
            .ok_or(TransactionError::NoActiveTransaction)?
            .operations
            .push(op);
        Ok(())
    }

    /// Operations recorded so far across all open transactions
    pub fn pending_operations(&self) -> impl Iterator<Item = &Op> + '_ {
        self.open.iter().flat_map(|frame| frame.operations.iter())
    }

    /// Commit the innermost transaction
    ///
    /// Returns the id of the archived transaction, or `None` when the
    /// operations were flattened into a parent or there were none.
    ///
    /// # Errors
    /// - `NoActiveTransaction` when idle
    /// - `TransactionMismatch` if `handle` is not the innermost transaction
    pub fn commit(
        &mut self,
        handle: TransactionHandle,
    ) -> Result<Option<TransactionId>, TransactionError> {
        let frame = self.pop_frame(handle)?;

        if let Some(parent) = self.open.last_mut() {
            parent.operations.extend(frame.operations);
            return Ok(None);
        }
        if frame.operations.is_empty() {
            return Ok(None);
        }

        let id = self.fresh_id();
        self.redo.clear();

        if let Some(top) = self.undo.back_mut().filter(|top| {
            self.coalesce.enabled
                && frame.merge_key.is_some()
                && top.merge_key == frame.merge_key
                && top.committed_at.elapsed() < self.coalesce.window()
        }) {
            let previous = top.id;
            let previous_dirtiables = top.dirtiables.clone();
            top.absorb(id, frame.operations);
            self.dirtiables
                .merged(previous, &previous_dirtiables, id, &top.dirtiables);
            tracing::debug!(transaction = %id, merged = %previous, "transaction coalesced");
            return Ok(Some(id));
        }

        let tx = Transaction::new(id, frame.operations, frame.merge_key);
        self.dirtiables.applied(id, &tx.dirtiables);
        tracing::debug!(transaction = %id, operations = tx.operations.len(), "transaction committed");
        self.undo.push_back(tx);
        self.purge();
        Ok(Some(id))
    }

    /// Revert and discard the innermost transaction
    ///
    /// # Errors
    /// - `NoActiveTransaction` when idle
    /// - `TransactionMismatch` if `handle` is not the innermost transaction
    /// - `Replay` if the target rejects an operation (the frame is still discarded)
    pub fn rollback<T: Replay<Op>>(
        &mut self,
        handle: TransactionHandle,
        target: &mut T,
    ) -> Result<(), TransactionError> {
        let frame = self.pop_frame(handle)?;
        tracing::debug!(
            serial = frame.serial,
            operations = frame.operations.len(),
            "transaction rolled back"
        );
        for op in frame.operations.iter().rev() {
            target.revert(op).map_err(TransactionError::replay)?;
        }
        Ok(())
    }

    /// Check that `handle` is the innermost open transaction
    ///
    /// # Errors
    /// - `NoActiveTransaction` when idle
    /// - `TransactionMismatch` if another transaction is innermost
    pub fn check_handle(&self, handle: TransactionHandle) -> Result<(), TransactionError> {
        let top = self.open.last().ok_or(TransactionError::NoActiveTransaction)?;
        if top.serial != handle.serial {
            return Err(TransactionError::TransactionMismatch {
                expected: top.serial,
                given: handle.serial,
            });
        }
        Ok(())
    }

    fn pop_frame(&mut self, handle: TransactionHandle) -> Result<Frame<Op>, TransactionError> {
        self.check_handle(handle)?;
        self.open.pop().ok_or(TransactionError::NoActiveTransaction)
    }

    fn fresh_id(&mut self) -> TransactionId {
        let id = TransactionId::new(self.next_id);
        self.next_id += 1;
        id
    }

    fn purge(&mut self) {
        if self.capacity == 0 {
            return;
        }
        while self.undo.len() > self.capacity {
            if let Some(oldest) = self.undo.pop_front() {
                tracing::trace!(transaction = %oldest.id, "transaction purged");
                self.dirtiables.purged(oldest.id, &oldest.dirtiables);
            }
        }
    }

    // ------------------------------------------------------------------
    // Undo / redo
    // ------------------------------------------------------------------

    /// Revert the most recent committed transaction
    ///
    /// # Errors
    /// - `TransactionInProgress` while recording
    /// - `NothingToUndo` if the undo stack is empty
    /// - `Replay` if the target rejects an operation (the transaction stays
    ///   on the undo stack and already-reverted operations are re-applied)
    pub fn undo<T: Replay<Op>>(&mut self, target: &mut T) -> Result<TransactionId, TransactionError> {
        self.ensure_idle()?;
        let tx = self.undo.pop_back().ok_or(TransactionError::NothingToUndo)?;

        for (done, op) in tx.operations.iter().rev().enumerate() {
            if let Err(err) = target.revert(op) {
                let reverted = &tx.operations[tx.operations.len() - done..];
                for op in reverted {
                    if let Err(again) = target.apply(op) {
                        tracing::warn!(error = %again, "failed to restore after undo error");
                    }
                }
                self.undo.push_back(tx);
                return Err(TransactionError::replay(err));
            }
        }

        let id = tx.id;
        self.dirtiables.reverted(id, &tx.dirtiables);
        tracing::debug!(transaction = %id, "undo");
        self.redo.push(tx);
        Ok(id)
    }

    /// Re-apply the most recently undone transaction
    ///
    /// # Errors
    /// - `TransactionInProgress` while recording
    /// - `NothingToRedo` if the redo stack is empty
    /// - `Replay` if the target rejects an operation (the transaction stays
    ///   on the redo stack and already-applied operations are reverted)
    pub fn redo<T: Replay<Op>>(&mut self, target: &mut T) -> Result<TransactionId, TransactionError> {
        self.ensure_idle()?;
        let tx = self.redo.pop().ok_or(TransactionError::NothingToRedo)?;

        for (done, op) in tx.operations.iter().enumerate() {
            if let Err(err) = target.apply(op) {
                for op in tx.operations[..done].iter().rev() {
                    if let Err(again) = target.revert(op) {
                        tracing::warn!(error = %again, "failed to restore after redo error");
                    }
                }
                self.redo.push(tx);
                return Err(TransactionError::replay(err));
            }
        }

        let id = tx.id;
        self.dirtiables.applied(id, &tx.dirtiables);
        tracing::debug!(transaction = %id, "redo");
        self.undo.push_back(tx);
        Ok(id)
    }

    fn ensure_idle(&self) -> Result<(), TransactionError> {
        if self.open.is_empty() {
            Ok(())
        } else {
            Err(TransactionError::TransactionInProgress {
                depth: self.open.len(),
            })
        }
    }

    /// Drop all undo and redo history (open transactions are kept)
    pub fn clear_history(&mut self) {
        while let Some(oldest) = self.undo.pop_front() {
            self.dirtiables.purged(oldest.id, &oldest.dirtiables);
        }
        self.redo.clear();
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// True when no transaction is open
    #[inline]
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.open.is_empty()
    }

    /// Number of open transactions
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// True when idle with committed history to revert
    #[inline]
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.is_idle() && !self.undo.is_empty()
    }

    /// True when idle with undone transactions to re-apply
    #[inline]
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.is_idle() && !self.redo.is_empty()
    }

    /// Number of committed transactions on the undo stack
    #[inline]
    #[must_use]
    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    /// Number of undone transactions available for redo
    #[inline]
    #[must_use]
    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// Maximum number of committed transactions kept (0 = unbounded)
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Coalescing policy
    #[inline]
    #[must_use]
    pub fn coalesce(&self) -> CoalesceConfig {
        self.coalesce
    }

    /// Most recent committed transaction
    #[must_use]
    pub fn last_committed(&self) -> Option<&Transaction<Op>> {
        self.undo.back()
    }

    /// Committed transactions, oldest first
    pub fn history(&self) -> impl Iterator<Item = &Transaction<Op>> + '_ {
        self.undo.iter()
    }

    /// Dirty-state bookkeeping driven by this stack
    #[inline]
    #[must_use]
    pub fn dirtiables(&self) -> &DirtiableManager {
        &self.dirtiables
    }

    /// Mutable access, for registering dirtiables and taking save points
    #[inline]
    pub fn dirtiables_mut(&mut self) -> &mut DirtiableManager {
        &mut self.dirtiables
    }
}
