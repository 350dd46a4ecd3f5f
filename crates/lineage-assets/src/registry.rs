//! Document registry
//!
//! Provides [`DocumentRegistry`], the map from each document to its
//! declared base document.

use crate::error::AssetError;
use indexmap::IndexMap;
use lineage_core::DocumentId;
use std::collections::HashSet;

/// Known documents and their declared bases, in registration order
#[derive(Debug, Default, Clone)]
pub struct DocumentRegistry {
    bases: IndexMap<DocumentId, Option<DocumentId>>,
}

impl DocumentRegistry {
    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document with an optional base
    ///
    /// # Errors
    /// - `DuplicateDocument` if the id is already registered
    /// - `UnknownDocument` if the base is not registered
    /// - `CyclicBase` if the document is its own base
    pub fn register(&mut self, document: DocumentId, base: Option<DocumentId>) -> Result<(), AssetError> {
        if self.bases.contains_key(&document) {
            return Err(AssetError::DuplicateDocument(document));
        }
        if let Some(base) = base {
            if base == document {
                return Err(AssetError::CyclicBase { document, base });
            }
            if !self.bases.contains_key(&base) {
                return Err(AssetError::UnknownDocument(base));
            }
        }
        self.bases.insert(document, base);
        Ok(())
    }

    /// Remove a document; documents deriving from it lose their base
    pub fn unregister(&mut self, document: DocumentId) -> bool {
        if self.bases.shift_remove(&document).is_none() {
            return false;
        }
        for base in self.bases.values_mut() {
            if *base == Some(document) {
                *base = None;
            }
        }
        true
    }

    /// Declared base of a document
    #[inline]
    #[must_use]
    pub fn base_of(&self, document: DocumentId) -> Option<DocumentId> {
        self.bases.get(&document).copied().flatten()
    }

    /// Documents declaring `document` as their base
    #[must_use]
    pub fn derived_of(&self, document: DocumentId) -> Vec<DocumentId> {
        self.bases
            .iter()
            .filter(|(_, base)| **base == Some(document))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Every document deriving directly or transitively from `touched`,
    /// bases before the documents that derive from them
    ///
    /// Documents in `touched` appear only when they derive from another
    /// touched document.
    #[must_use]
    pub fn derived_closure(&self, touched: &[DocumentId]) -> Vec<DocumentId> {
        let mut reached: HashSet<DocumentId> = touched.iter().copied().collect();
        let mut order = Vec::new();
        let mut frontier: Vec<DocumentId> = touched.to_vec();
        while let Some(document) = frontier.pop() {
            for derived in self.derived_of(document) {
                if !order.contains(&derived) {
                    order.push(derived);
                }
                if reached.insert(derived) {
                    frontier.push(derived);
                }
            }
        }
        // registration order puts bases before derived documents
        order.sort_by_key(|id| self.bases.get_index_of(id));
        order
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, document: DocumentId) -> bool {
        self.bases.contains_key(&document)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bases.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    /// Documents with their bases, in registration order
    pub fn iter(&self) -> impl Iterator<Item = (DocumentId, Option<DocumentId>)> + '_ {
        self.bases.iter().map(|(id, base)| (*id, *base))
    }
}
