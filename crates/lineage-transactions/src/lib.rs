//! Lineage Transactions
//!
//! Reversible edit history for the lineage workspace.
//!
//! # Overview
//!
//! - **TransactionStack**: nested transactions, undo/redo, coalescing and
//!   bounded history, generic over the operation record
//! - **Replay**: the target operations are applied to and reverted from
//! - **DirtiableManager**: per-document "unsaved changes" tracking driven by
//!   commits, undos and save points
//!
//! # Example
//!
//! ```rust
//! use lineage_transactions::{CoalesceConfig, Operation, Replay, TransactionStack};
//!
//! #[derive(Debug, Clone)]
//! struct Set { old: i64, new: i64 }
//! impl Operation for Set {}
//!
//! struct Counter(i64);
//! impl Replay<Set> for Counter {
//!     type Error = std::convert::Infallible;
//!     fn apply(&mut self, op: &Set) -> Result<(), Self::Error> { self.0 = op.new; Ok(()) }
//!     fn revert(&mut self, op: &Set) -> Result<(), Self::Error> { self.0 = op.old; Ok(()) }
//! }
//!
//! let mut stack = TransactionStack::new(100, CoalesceConfig::default());
//! let mut counter = Counter(0);
//!
//! let tx = stack.begin();
//! stack.push_operation(Set { old: counter.0, new: 5 }).unwrap();
//! counter.0 = 5;
//! stack.commit(tx).unwrap();
//!
//! stack.undo(&mut counter).unwrap();
//! assert_eq!(counter.0, 0);
//! ```

#![warn(missing_docs)]

pub mod dirtiable;
pub mod error;
pub mod operation;
pub mod stack;

// Re-exports
pub use dirtiable::{Dirtiable, DirtiableId, DirtiableManager};
pub use error::TransactionError;
pub use operation::{Operation, Replay, Transaction, TransactionHandle, TransactionId};
pub use stack::{CoalesceConfig, TransactionStack};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for transactional editing
    pub use crate::{
        CoalesceConfig, DirtiableId, Operation, Replay, TransactionError, TransactionHandle,
        TransactionStack,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
