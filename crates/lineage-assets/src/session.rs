//! Asset session
//!
//! Provides [`AssetSession`], the single-writer service context that owns
//! the loaded documents, their base relations and the undo history.
//!
//! Every edit goes through the session. An edit made while no transaction
//! is open runs in an implicit transaction of its own, so each call is one
//! undo step unless the caller groups calls with
//! [`begin_transaction`](AssetSession::begin_transaction) or
//! [`transact`](AssetSession::transact).

use crate::config::SessionConfig;
use crate::error::AssetError;
use crate::operation::{document_dirtiable, AssetOperation};
use crate::propagation::SyncReport;
use crate::property_graph::AssetPropertyGraph;
use crate::registry::DocumentRegistry;
use indexmap::IndexMap;
use lineage_core::{DocumentId, Item, ItemId, Key, NodePath, ObjectId, ObjectValue, OverrideState, TypeRegistry, Value};
use lineage_graph::{NodeGraph, NodeId};
use lineage_transactions::{Dirtiable, Replay, TransactionHandle, TransactionId, TransactionStack};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Loaded documents with their declared bases
#[derive(Debug, Default)]
struct Documents {
    graphs: IndexMap<DocumentId, AssetPropertyGraph>,
    bases: DocumentRegistry,
}

impl Documents {
    fn get(&self, document: DocumentId) -> Result<&AssetPropertyGraph, AssetError> {
        self.graphs
            .get(&document)
            .ok_or(AssetError::UnknownDocument(document))
    }

    fn get_mut(&mut self, document: DocumentId) -> Result<&mut AssetPropertyGraph, AssetError> {
        self.graphs
            .get_mut(&document)
            .ok_or(AssetError::UnknownDocument(document))
    }

    /// Reconcile one document with its declared base
    fn synchronize(&mut self, document: DocumentId) -> Result<SyncReport, AssetError> {
        let base = self.bases.base_of(document);
        let (index, id, mut graph) = self
            .graphs
            .shift_remove_full(&document)
            .ok_or(AssetError::UnknownDocument(document))?;
        let result = graph.reconcile_with_base(base.and_then(|b| self.graphs.get(&b)));
        self.graphs.shift_insert(index, id, graph);
        result
    }
}

impl Replay<AssetOperation> for Documents {
    type Error = AssetError;

    fn apply(&mut self, op: &AssetOperation) -> Result<(), AssetError> {
        self.get_mut(op.document())?.apply_operation(op)
    }

    fn revert(&mut self, op: &AssetOperation) -> Result<(), AssetError> {
        self.get_mut(op.document())?.revert_operation(op)
    }
}

/// Documents, base relations and undo history behind one owner
#[derive(Debug)]
pub struct AssetSession {
    registry: Arc<TypeRegistry>,
    documents: Documents,
    stack: TransactionStack<AssetOperation>,
    config: SessionConfig,
}

impl AssetSession {
    /// Create an empty session
    #[must_use]
    pub fn new(registry: Arc<TypeRegistry>, config: SessionConfig) -> Self {
        let stack = TransactionStack::new(config.undo_capacity, config.coalesce);
        Self {
            registry,
            documents: Documents::default(),
            stack,
            config,
        }
    }

    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Undo history, read-only
    #[inline]
    #[must_use]
    pub fn history(&self) -> &TransactionStack<AssetOperation> {
        &self.stack
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    /// Add a loaded document, deriving from `base` if given
    ///
    /// A derived document is synchronized with its base right away; that
    /// pass is part of loading and is not recorded for undo.
    ///
    /// # Errors
    /// - `DuplicateDocument` / `UnknownDocument` from the registry
    /// - graph errors from the initial synchronization
    pub fn add_document(
        &mut self,
        mut graph: AssetPropertyGraph,
        base: Option<DocumentId>,
    ) -> Result<SyncReport, AssetError> {
        let document = graph.document();
        self.documents.bases.register(document, base)?;
        graph.set_inherits(base.is_some());
        self.documents.graphs.insert(document, graph);
        info!(document = %document, base = ?base, "document added");

        match base {
            Some(_) => self.documents.synchronize(document),
            None => Ok(SyncReport::default()),
        }
    }

    /// Build and add a document from its root object
    ///
    /// # Errors
    /// As [`add_document`](Self::add_document), plus graph construction errors
    pub fn create_document(
        &mut self,
        document: DocumentId,
        root: ObjectValue,
        base: Option<DocumentId>,
    ) -> Result<SyncReport, AssetError> {
        let graph = AssetPropertyGraph::new(document, Arc::clone(&self.registry), root, base.is_some())?;
        self.add_document(graph, base)
    }

    /// Remove a document and return it
    ///
    /// Undo history is cleared, since it may address the removed document.
    /// Documents deriving from it keep their values and report a missing
    /// base on their next synchronization.
    ///
    /// # Errors
    /// - `TransactionInProgress` while a transaction is open
    /// - `UnknownDocument`
    pub fn remove_document(&mut self, document: DocumentId) -> Result<AssetPropertyGraph, AssetError> {
        if !self.stack.is_idle() {
            return Err(lineage_transactions::TransactionError::TransactionInProgress {
                depth: self.stack.depth(),
            }
            .into());
        }
        let graph = self
            .documents
            .graphs
            .shift_remove(&document)
            .ok_or(AssetError::UnknownDocument(document))?;
        self.documents.bases.unregister(document);
        self.stack.clear_history();
        self.stack.dirtiables_mut().unregister(document_dirtiable(document));
        info!(document = %document, "document removed");
        Ok(graph)
    }

    /// Loaded document
    ///
    /// # Errors
    /// Returns `UnknownDocument`
    pub fn document(&self, document: DocumentId) -> Result<&AssetPropertyGraph, AssetError> {
        self.documents.get(document)
    }

    /// Loaded documents, in load order
    pub fn documents(&self) -> impl Iterator<Item = &AssetPropertyGraph> + '_ {
        self.documents.graphs.values()
    }

    /// Declared base of a document
    #[must_use]
    pub fn base_of(&self, document: DocumentId) -> Option<DocumentId> {
        self.documents.bases.base_of(document)
    }

    /// Value at a path
    ///
    /// # Errors
    /// `UnknownDocument` or `PathNotFound`
    pub fn value(&self, document: DocumentId, path: &NodePath) -> Result<Value, AssetError> {
        self.documents.get(document)?.value(path)
    }

    /// Override state at a path
    ///
    /// # Errors
    /// `UnknownDocument` or `PathNotFound`
    pub fn override_at(&self, document: DocumentId, path: &NodePath) -> Result<OverrideState, AssetError> {
        self.documents.get(document)?.override_at(path)
    }

    /// Find the object with `id` in any loaded document
    #[must_use]
    pub fn resolve_reference(&self, id: ObjectId) -> Option<(DocumentId, NodeId)> {
        self.documents
            .graphs
            .iter()
            .find_map(|(document, graph)| graph.graph().find_object(id).map(|node| (*document, node)))
    }

    /// Immutable copy of a document's graph for background readers
    ///
    /// # Errors
    /// Returns `UnknownDocument`
    pub fn snapshot(&self, document: DocumentId) -> Result<Arc<NodeGraph>, AssetError> {
        Ok(self.documents.get(document)?.graph().snapshot())
    }

    // ------------------------------------------------------------------
    // Edits
    // ------------------------------------------------------------------

    /// Set the value at a path
    ///
    /// # Errors
    /// See [`AssetPropertyGraph::set_value`]
    pub fn set_value(&mut self, document: DocumentId, path: &NodePath, value: Value) -> Result<(), AssetError> {
        self.edit(document, |graph, ops| graph.set_value(path, value, ops))
    }

    /// Insert an element
    ///
    /// # Errors
    /// See [`AssetPropertyGraph::insert_item`]
    pub fn insert_item(
        &mut self,
        document: DocumentId,
        container: &NodePath,
        index: usize,
        item: Item,
    ) -> Result<ItemId, AssetError> {
        self.edit(document, |graph, ops| graph.insert_item(container, index, item, ops))
    }

    /// Insert a dictionary entry
    ///
    /// # Errors
    /// See [`AssetPropertyGraph::insert_entry`]
    pub fn insert_entry(
        &mut self,
        document: DocumentId,
        container: &NodePath,
        index: usize,
        key: Key,
        item: Item,
    ) -> Result<ItemId, AssetError> {
        self.edit(document, |graph, ops| graph.insert_entry(container, index, key, item, ops))
    }

    /// Remove an element
    ///
    /// # Errors
    /// See [`AssetPropertyGraph::remove_item`]
    pub fn remove_item(&mut self, document: DocumentId, container: &NodePath, id: ItemId) -> Result<(), AssetError> {
        self.edit(document, |graph, ops| graph.remove_item(container, id, ops))
    }

    /// Move an element
    ///
    /// # Errors
    /// See [`AssetPropertyGraph::move_item`]
    pub fn move_item(
        &mut self,
        document: DocumentId,
        container: &NodePath,
        id: ItemId,
        position: usize,
    ) -> Result<(), AssetError> {
        self.edit(document, |graph, ops| graph.move_item(container, id, position, ops))
    }

    /// Change a dictionary entry's key
    ///
    /// # Errors
    /// See [`AssetPropertyGraph::rename_key`]
    pub fn rename_key(
        &mut self,
        document: DocumentId,
        container: &NodePath,
        id: ItemId,
        key: Key,
    ) -> Result<(), AssetError> {
        self.edit(document, |graph, ops| graph.rename_key(container, id, key, ops))
    }

    /// Set the override state governing a path
    ///
    /// # Errors
    /// See [`AssetPropertyGraph::set_override`]
    pub fn set_override(
        &mut self,
        document: DocumentId,
        path: &NodePath,
        state: OverrideState,
    ) -> Result<(), AssetError> {
        self.edit(document, |graph, ops| graph.set_override(path, state, ops))
    }

    /// Set the item override of an element
    ///
    /// # Errors
    /// See [`AssetPropertyGraph::set_item_override`]
    pub fn set_item_override(
        &mut self,
        document: DocumentId,
        container: &NodePath,
        id: ItemId,
        state: OverrideState,
    ) -> Result<(), AssetError> {
        self.edit(document, |graph, ops| graph.set_item_override(container, id, state, ops))
    }

    /// Set the key override of a dictionary entry
    ///
    /// # Errors
    /// See [`AssetPropertyGraph::set_key_override`]
    pub fn set_key_override(
        &mut self,
        document: DocumentId,
        container: &NodePath,
        id: ItemId,
        state: OverrideState,
    ) -> Result<(), AssetError> {
        self.edit(document, |graph, ops| graph.set_key_override(container, id, state, ops))
    }

    /// Reset every override below a path and take the base values back
    ///
    /// # Errors
    /// See [`AssetPropertyGraph::reset_override`]
    pub fn reset_override(&mut self, document: DocumentId, path: &NodePath) -> Result<SyncReport, AssetError> {
        self.transact(|session| {
            session.edit(document, |graph, ops| graph.reset_override(path, ops))?;
            session.resync(document)
        })
    }

    /// Drop a deletion record and bring the inherited element back
    ///
    /// # Errors
    /// See [`AssetPropertyGraph::restore_deleted_item`]
    pub fn restore_deleted_item(
        &mut self,
        document: DocumentId,
        container: &NodePath,
        id: ItemId,
    ) -> Result<SyncReport, AssetError> {
        self.transact(|session| {
            session.edit(document, |graph, ops| graph.restore_deleted_item(container, id, ops))?;
            session.resync(document)
        })
    }

    /// Reconcile a document with its base as one undoable step
    ///
    /// # Errors
    /// `UnknownDocument` or graph errors
    pub fn synchronize(&mut self, document: DocumentId) -> Result<SyncReport, AssetError> {
        self.transact(|session| session.resync(document))
    }

    fn resync(&mut self, document: DocumentId) -> Result<SyncReport, AssetError> {
        let report = self.documents.synchronize(document)?;
        for op in &report.operations {
            self.stack.push_operation(op.clone())?;
        }
        Ok(report)
    }

    /// Run `apply` against one document inside the open transaction, or an
    /// implicit one when idle
    fn edit<R>(
        &mut self,
        document: DocumentId,
        apply: impl FnOnce(&mut AssetPropertyGraph, &mut Vec<AssetOperation>) -> Result<R, AssetError>,
    ) -> Result<R, AssetError> {
        if !self.documents.graphs.contains_key(&document) {
            return Err(AssetError::UnknownDocument(document));
        }
        let implicit = self.stack.is_idle().then(|| self.stack.begin());
        let graph = self.documents.get_mut(document)?;

        let mut ops = Vec::new();
        match apply(graph, &mut ops) {
            Ok(value) => {
                for op in ops {
                    self.stack.push_operation(op)?;
                }
                if let Some(handle) = implicit {
                    self.commit(handle)?;
                }
                Ok(value)
            }
            Err(err) => {
                for op in ops.iter().rev() {
                    if let Err(again) = graph.revert_operation(op) {
                        warn!(error = %again, op = op.name(), "failed to revert partial edit");
                    }
                }
                if let Some(handle) = implicit {
                    self.stack.rollback(handle, &mut self.documents)?;
                }
                Err(err)
            }
        }
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Open a transaction (nested if one is already open)
    pub fn begin_transaction(&mut self) -> TransactionHandle {
        self.stack.begin()
    }

    /// Open a transaction that may merge with the previous commit of the
    /// same key
    pub fn begin_mergeable(&mut self, key: impl Into<String>) -> TransactionHandle {
        self.stack.begin_mergeable(key)
    }

    /// Commit the innermost transaction
    ///
    /// With `auto_propagate`, the outermost commit first re-synchronizes
    /// every document deriving from a touched one, inside the same
    /// transaction.
    ///
    /// # Errors
    /// `NoActiveTransaction`, `TransactionMismatch` or propagation errors;
    /// a failed propagation rolls the transaction back
    pub fn commit(&mut self, handle: TransactionHandle) -> Result<Option<TransactionId>, AssetError> {
        self.stack.check_handle(handle)?;
        if self.config.auto_propagate && handle.is_outermost() && self.stack.depth() == 1 {
            if let Err(err) = self.propagate() {
                if let Err(again) = self.stack.rollback(handle, &mut self.documents) {
                    warn!(error = %again, "rollback after failed propagation");
                }
                return Err(err);
            }
        }
        Ok(self.stack.commit(handle)?)
    }

    fn propagate(&mut self) -> Result<(), AssetError> {
        let mut touched: Vec<DocumentId> = Vec::new();
        for op in self.stack.pending_operations() {
            if !touched.contains(&op.document()) {
                touched.push(op.document());
            }
        }
        for document in self.documents.bases.derived_closure(&touched) {
            let report = self.resync(document)?;
            if !report.is_noop() {
                debug!(document = %document, operations = report.operations.len(), "propagated base changes");
            }
        }
        Ok(())
    }

    /// Revert and discard the innermost transaction
    ///
    /// # Errors
    /// `NoActiveTransaction`, `TransactionMismatch` or replay errors
    pub fn rollback(&mut self, handle: TransactionHandle) -> Result<(), AssetError> {
        Ok(self.stack.rollback(handle, &mut self.documents)?)
    }

    /// Run `body` in a transaction: commit on `Ok`, roll back on `Err`
    ///
    /// # Errors
    /// The error of `body`, or of the commit
    pub fn transact<R>(&mut self, body: impl FnOnce(&mut Self) -> Result<R, AssetError>) -> Result<R, AssetError> {
        let handle = self.begin_transaction();
        match body(self) {
            Ok(value) => {
                self.commit(handle)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(again) = self.rollback(handle) {
                    warn!(error = %again, "rollback after failed transaction body");
                }
                Err(err)
            }
        }
    }

    /// Undo the most recent committed transaction
    ///
    /// # Errors
    /// `TransactionInProgress`, `NothingToUndo` or replay errors
    pub fn undo(&mut self) -> Result<TransactionId, AssetError> {
        Ok(self.stack.undo(&mut self.documents)?)
    }

    /// Redo the most recently undone transaction
    ///
    /// # Errors
    /// `TransactionInProgress`, `NothingToRedo` or replay errors
    pub fn redo(&mut self) -> Result<TransactionId, AssetError> {
        Ok(self.stack.redo(&mut self.documents)?)
    }

    #[inline]
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.stack.can_undo()
    }

    #[inline]
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.stack.can_redo()
    }

    // ------------------------------------------------------------------
    // Dirtiness
    // ------------------------------------------------------------------

    /// Whether a document has changes since its last save point
    #[must_use]
    pub fn is_dirty(&self, document: DocumentId) -> bool {
        self.stack.dirtiables().is_dirty(document_dirtiable(document))
    }

    /// Mark every document clean
    pub fn save_point(&mut self) {
        self.stack.dirtiables_mut().save_point();
    }

    /// Mark one document clean
    pub fn save_point_for(&mut self, document: DocumentId) {
        self.stack.dirtiables_mut().save_point_for(document_dirtiable(document));
    }

    /// Notify `dirtiable` whenever its dirty flag changes
    pub fn register_dirtiable(&mut self, dirtiable: Arc<dyn Dirtiable>) {
        self.stack.dirtiables_mut().register(dirtiable);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lineage_test_utils::{archetype, fixture_registry, item_id};
    use lineage_transactions::TransactionError;

    fn doc(n: u128) -> DocumentId {
        DocumentId::from_u128(n)
    }

    fn path(text: &str) -> NodePath {
        text.parse().unwrap()
    }

    fn session() -> AssetSession {
        let mut session = AssetSession::new(fixture_registry(), SessionConfig::default());
        session.create_document(doc(1), archetype(), None).unwrap();
        session.create_document(doc(2), archetype(), Some(doc(1))).unwrap();
        session
    }

    #[test]
    fn each_edit_is_one_undo_step() {
        let mut session = session();
        session.set_value(doc(2), &path("Health"), Value::Int(1)).unwrap();
        session.set_value(doc(2), &path("Health"), Value::Int(2)).unwrap();
        assert_eq!(session.history().undo_len(), 2);
        session.undo().unwrap();
        assert_eq!(session.value(doc(2), &path("Health")).unwrap(), Value::Int(1));
    }

    #[test]
    fn failed_edit_leaves_no_history() {
        let mut session = session();
        let err = session
            .remove_item(doc(2), &path("Inventory"), item_id(99))
            .unwrap_err();
        assert!(err.is_recoverable());
        assert!(!session.can_undo());
        assert!(session.history().is_idle());
    }

    #[test]
    fn unknown_document_is_rejected() {
        let mut session = session();
        assert!(matches!(
            session.set_value(doc(9), &path("Health"), Value::Int(1)),
            Err(AssetError::UnknownDocument(_))
        ));
        assert!(session.history().is_idle());
    }

    #[test]
    fn remove_document_needs_idle_stack() {
        let mut session = session();
        let handle = session.begin_transaction();
        assert!(matches!(
            session.remove_document(doc(2)),
            Err(AssetError::Transaction(TransactionError::TransactionInProgress { .. }))
        ));
        session.rollback(handle).unwrap();
        session.remove_document(doc(2)).unwrap();
        assert!(session.document(doc(2)).is_err());
    }

    #[test]
    fn references_resolve_across_documents() {
        let mut session = session();
        let id = ObjectId::from_u128(5);
        let mut target = archetype();
        target.id = Some(id);
        session.create_document(doc(3), target, None).unwrap();
        assert_eq!(session.resolve_reference(id).map(|(d, _)| d), Some(doc(3)));
        assert!(session.resolve_reference(ObjectId::from_u128(6)).is_none());
    }
}
