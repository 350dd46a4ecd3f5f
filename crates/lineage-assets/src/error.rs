//! Error types for asset documents and sessions

use lineage_core::DocumentId;
use lineage_graph::GraphError;
use lineage_transactions::TransactionError;

/// Asset layer errors
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    /// Node graph error
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// Transaction API misuse or replay failure
    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),

    /// Document not loaded in the session
    #[error("unknown document {0}")]
    UnknownDocument(DocumentId),

    /// Document id already in use
    #[error("document {0} already loaded")]
    DuplicateDocument(DocumentId),

    /// Base chain would loop back to the document
    #[error("document {document} cannot derive from {base}: cyclic base chain")]
    CyclicBase {
        document: DocumentId,
        base: DocumentId,
    },

    /// Member is declared non-overridable
    #[error("member at '{path}' is not overridable")]
    NotOverridable { path: String },

    /// Invalid session configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl AssetError {
    /// Non-overridable error for a displayable path
    #[inline]
    pub fn not_overridable(path: impl ToString) -> Self {
        Self::NotOverridable {
            path: path.to_string(),
        }
    }

    /// Check if the caller can recover (stale address or transient stack state)
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Graph(err) => err.is_recoverable(),
            Self::Transaction(err) => err.is_recoverable(),
            _ => false,
        }
    }
}
