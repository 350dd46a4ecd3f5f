//! Error types for the transaction stack

/// Transaction API errors
///
/// Every variant except `Replay` is a precondition violation detected before
/// any state changed.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    /// `push_operation`, `commit` or `rollback` while idle
    #[error("no active transaction")]
    NoActiveTransaction,

    /// Handle does not name the innermost open transaction
    #[error("transaction handle mismatch: innermost is #{expected}, got #{given}")]
    TransactionMismatch { expected: u64, given: u64 },

    /// Undo stack is empty
    #[error("nothing to undo")]
    NothingToUndo,

    /// Redo stack is empty
    #[error("nothing to redo")]
    NothingToRedo,

    /// Undo or redo requested while a transaction is recording
    #[error("cannot undo or redo while {depth} transaction(s) are open")]
    TransactionInProgress { depth: usize },

    /// The replay target rejected an operation
    #[error("replay failed: {source}")]
    Replay {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl TransactionError {
    /// Wrap a replay target error
    #[inline]
    pub fn replay(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Replay {
            source: Box::new(err),
        }
    }

    /// Check if the stack is unchanged and the call can simply be retried later
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NothingToUndo | Self::NothingToRedo | Self::TransactionInProgress { .. }
        )
    }
}
