//! Error types for YAML persistence

use lineage_assets::AssetError;
use lineage_core::DescriptorError;
use lineage_graph::GraphError;

/// Load and save errors
///
/// `UnknownType`, `UnknownMember`, `InvalidItemKey` and `Mismatch` describe
/// one region of a document. With unloadable regions allowed they become placeholders
/// instead of failing the load.
#[derive(Debug, thiserror::Error)]
pub enum YamlError {
    /// Text is not well-formed YAML
    #[error("YAML syntax error: {0}")]
    Syntax(#[from] serde_yaml::Error),

    /// Document could not be written as YAML
    #[error("YAML emit error: {0}")]
    Emit(serde_yaml::Error),

    /// Root tag names no registered type
    #[error("unknown root type '{0}'")]
    UnknownRootType(String),

    /// Root is not a tagged object mapping
    #[error("invalid document root: {0}")]
    InvalidRoot(String),

    /// Nested tag names no registered type
    #[error("unknown type '{tag}' at '{at}'")]
    UnknownType { tag: String, at: String },

    /// Mapping key names no member of the object's type
    #[error("'{type_name}' has no member '{member}' (at '{at}')")]
    UnknownMember {
        type_name: String,
        member: String,
        at: String,
    },

    /// Collection key is not `<itemid><markers>` (or the dictionary form)
    #[error("invalid item key '{key}' at '{at}'")]
    InvalidItemKey { key: String, at: String },

    /// YAML shape does not fit the declared type
    #[error("type mismatch at '{at}': expected {expected}, found {found}")]
    Mismatch {
        expected: String,
        found: String,
        at: String,
    },

    /// Schema lookup failed
    #[error("descriptor error: {0}")]
    Descriptor(#[from] DescriptorError),

    /// Graph construction failed
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// Document assembly failed
    #[error("asset error: {0}")]
    Asset(#[from] AssetError),

    /// File access failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl YamlError {
    /// Unknown-type error at a displayable location
    #[inline]
    pub fn unknown_type(tag: impl Into<String>, at: impl ToString) -> Self {
        Self::UnknownType {
            tag: tag.into(),
            at: at.to_string(),
        }
    }

    /// Unknown-member error at a displayable location
    #[inline]
    pub fn unknown_member(
        type_name: impl Into<String>,
        member: impl Into<String>,
        at: impl ToString,
    ) -> Self {
        Self::UnknownMember {
            type_name: type_name.into(),
            member: member.into(),
            at: at.to_string(),
        }
    }

    /// Invalid-key error at a displayable location
    #[inline]
    pub fn invalid_item_key(key: impl Into<String>, at: impl ToString) -> Self {
        Self::InvalidItemKey {
            key: key.into(),
            at: at.to_string(),
        }
    }

    /// Mismatch error at a displayable location
    #[inline]
    pub fn mismatch(expected: impl Into<String>, found: impl Into<String>, at: impl ToString) -> Self {
        Self::Mismatch {
            expected: expected.into(),
            found: found.into(),
            at: at.to_string(),
        }
    }

    /// Check if the error is confined to one region of the document
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnknownType { .. }
                | Self::UnknownMember { .. }
                | Self::InvalidItemKey { .. }
                | Self::Mismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_errors_are_recoverable() {
        assert!(YamlError::unknown_type("Blaster", "Weapon").is_recoverable());
        assert!(YamlError::invalid_item_key("nope", "Inventory").is_recoverable());
        assert!(YamlError::mismatch("int", "string", "Health").is_recoverable());
        assert!(YamlError::unknown_member("Character", "Mana", "").is_recoverable());
        assert!(!YamlError::UnknownRootType("Dragon".into()).is_recoverable());
        assert!(!YamlError::InvalidRoot("untagged".into()).is_recoverable());
    }

    #[test]
    fn mismatch_message_names_location() {
        let err = YamlError::mismatch("int", "string", "Allies.Health");
        assert_eq!(
            err.to_string(),
            "type mismatch at 'Allies.Health': expected int, found string"
        );
    }
}
