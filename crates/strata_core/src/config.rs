//! Append stack configuration.

use crate::error::{CoreError, CoreResult};

/// Default number of layers an `AppendStack` retains.
pub const DEFAULT_MAX_LAYERS: usize = 10;

/// Default number of items per layer.
pub const DEFAULT_MAX_LENGTH: usize = 100;

/// Sizing for an `AppendStack`.
///
/// A stack retains at most `max_layers * max_length` items. Both values
/// are part of the stack's snapshot, and merges refuse snapshots whose
/// configuration differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackConfig {
    /// Maximum number of layers retained before the oldest is pruned.
    pub max_layers: usize,

    /// Capacity of each layer.
    pub max_length: usize,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            max_layers: DEFAULT_MAX_LAYERS,
            max_length: DEFAULT_MAX_LENGTH,
        }
    }
}

impl StackConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of retained layers.
    #[must_use]
    pub const fn max_layers(mut self, value: usize) -> Self {
        self.max_layers = value;
        self
    }

    /// Sets the capacity of each layer.
    #[must_use]
    pub const fn max_length(mut self, value: usize) -> Self {
        self.max_length = value;
        self
    }

    /// Checks that both limits are non-zero.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidConfig` if either limit is zero.
    pub fn validate(&self) -> CoreResult<()> {
        if self.max_layers == 0 {
            return Err(CoreError::invalid_config("max_layers must be at least 1"));
        }
        if self.max_length == 0 {
            return Err(CoreError::invalid_config("max_length must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = StackConfig::default();
        assert_eq!(config.max_layers, 10);
        assert_eq!(config.max_length, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_pattern() {
        let config = StackConfig::new().max_layers(2).max_length(3);
        assert_eq!(config.max_layers, 2);
        assert_eq!(config.max_length, 3);
    }

    #[test]
    fn zero_limits_rejected() {
        assert!(matches!(
            StackConfig::new().max_layers(0).validate(),
            Err(CoreError::InvalidConfig { .. })
        ));
        assert!(matches!(
            StackConfig::new().max_length(0).validate(),
            Err(CoreError::InvalidConfig { .. })
        ));
    }
}
