//! Session configuration

use crate::error::AssetError;
use lineage_transactions::CoalesceConfig;
use serde::{Deserialize, Serialize};

/// Settings of an [`AssetSession`](crate::AssetSession)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Committed transactions kept for undo (0 = unbounded)
    pub undo_capacity: usize,
    /// Merging of consecutive mergeable transactions
    pub coalesce: CoalesceConfig,
    /// Re-synchronize derived documents as part of each outermost commit
    pub auto_propagate: bool,
    /// Keep unparsable regions as placeholders instead of failing the load
    pub allow_unloadable: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            undo_capacity: 100,
            coalesce: CoalesceConfig::default(),
            auto_propagate: true,
            allow_unloadable: true,
        }
    }
}

impl SessionConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from YAML; missing fields keep their defaults
    ///
    /// # Errors
    /// Returns `Config` for malformed YAML or mistyped fields
    pub fn from_yaml_str(yaml: &str) -> Result<Self, AssetError> {
        serde_yaml::from_str(yaml).map_err(|e| AssetError::Config(e.to_string()))
    }

    /// With undo capacity
    #[inline]
    #[must_use]
    pub fn with_undo_capacity(mut self, capacity: usize) -> Self {
        self.undo_capacity = capacity;
        self
    }

    /// With coalescing policy
    #[inline]
    #[must_use]
    pub fn with_coalesce(mut self, coalesce: CoalesceConfig) -> Self {
        self.coalesce = coalesce;
        self
    }

    /// With automatic propagation on commit
    #[inline]
    #[must_use]
    pub fn with_auto_propagate(mut self, enabled: bool) -> Self {
        self.auto_propagate = enabled;
        self
    }

    /// With unloadable placeholders allowed or rejected
    #[inline]
    #[must_use]
    pub fn with_allow_unloadable(mut self, allowed: bool) -> Self {
        self.allow_unloadable = allowed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = SessionConfig::from_yaml_str("undo_capacity: 5\ncoalesce:\n  window_ms: 50\n").unwrap();
        assert_eq!(config.undo_capacity, 5);
        assert_eq!(config.coalesce.window_ms, 50);
        assert!(config.coalesce.enabled);
        assert!(config.auto_propagate);
    }

    #[test]
    fn mistyped_field_is_config_error() {
        let err = SessionConfig::from_yaml_str("auto_propagate: often").unwrap_err();
        assert!(matches!(err, AssetError::Config(_)));
    }

    #[test]
    fn builders_override_defaults() {
        let config = SessionConfig::new()
            .with_undo_capacity(0)
            .with_coalesce(CoalesceConfig::disabled())
            .with_auto_propagate(false);
        assert_eq!(config.undo_capacity, 0);
        assert!(!config.coalesce.enabled);
        assert!(!config.auto_propagate);
        assert!(config.allow_unloadable);
    }
}
