//! Error types for the node graph

use crate::node::NodeId;
use lineage_core::{DescriptorError, ItemId};

/// Node graph errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    /// A member or item along the path no longer exists
    #[error("path not found: '{path}'")]
    PathNotFound { path: String },

    /// Value incompatible with the declared type
    #[error("type mismatch at '{at}': expected {expected}, found {found}")]
    TypeMismatch {
        expected: String,
        found: String,
        at: String,
    },

    /// Type name not registered
    #[error("unknown type: {0}")]
    UnknownType(String),

    /// Stale or removed item id
    #[error("item {id} not found in container")]
    ItemNotFound { id: ItemId },

    /// Node id refers to a destroyed node
    #[error("stale node id {0}")]
    StaleNode(NodeId),

    /// Structural operation on a non-container
    #[error("node {0} is not a container")]
    NotAContainer(NodeId),

    /// Two elements of one container would share an id
    #[error("duplicate item id {0}")]
    DuplicateItemId(ItemId),

    /// Two dictionary entries would share a key
    #[error("duplicate dictionary key '{0}'")]
    DuplicateKey(String),

    /// Insert or remove on a fixed-size array
    #[error("array of length {len} cannot change size")]
    FixedSize { len: usize },

    /// Position outside the container
    #[error("index {index} out of bounds (len {len})")]
    IndexOutOfBounds { index: usize, len: usize },
}

impl GraphError {
    /// Path-not-found error for a displayable path
    #[inline]
    pub fn path_not_found(path: impl ToString) -> Self {
        Self::PathNotFound {
            path: path.to_string(),
        }
    }

    /// Check if the caller can recover by re-resolving from the root
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::PathNotFound { .. } | Self::ItemNotFound { .. } | Self::StaleNode(_)
        )
    }
}

impl From<DescriptorError> for GraphError {
    fn from(err: DescriptorError) -> Self {
        match err {
            DescriptorError::TypeMismatch {
                expected,
                found,
                at,
            } => Self::TypeMismatch {
                expected,
                found,
                at,
            },
            DescriptorError::UnknownType(name) => Self::UnknownType(name),
            other => Self::UnknownType(other.to_string()),
        }
    }
}
