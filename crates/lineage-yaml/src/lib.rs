//! Lineage YAML
//!
//! Human-readable persisted form of asset documents.
//!
//! # Overview
//!
//! - **save**: document → YAML text, with override markers on member keys,
//!   item ids on collection entries and deletion records
//! - **load**: YAML text → document plus a [`LoadReport`]; regions that do
//!   not fit their declared type are kept as unloadable placeholders
//!
//! Saving a loaded document reproduces the saved text byte for byte,
//! placeholders included.
//!
//! # Example
//!
//! ```yaml
//! !Character
//! Id: 000000000000000000000000000000aa
//! Name: Hero
//! Health*: 40
//! Inventory:
//!   '00000000000000000000000000000001': a
//!   '00000000000000000000000000000002*!': B2
//!   '00000000000000000000000000000009': ~(Deleted)
//! Stats:
//!   0000000000000000000000000000000b~~str: 5
//! Target: !ref 000000000000000000000000000000aa
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod format;
pub mod load;
pub mod save;

// Re-exports
pub use error::YamlError;
pub use load::{load, load_path, load_with, LoadOptions, LoadReport};
pub use save::{save, save_path, to_yaml};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for document persistence
    pub use crate::{load, load_with, save, LoadOptions, LoadReport, YamlError};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
