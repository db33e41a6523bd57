//! Engine configuration.

/// Default maximum nesting depth of the transaction stack.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Emit an `ActionEvent` and a tracing span per perform call.
    pub instrument: bool,
    /// Deepest allowed transaction nesting.
    pub max_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            instrument: true,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set instrument flag.
    pub fn instrument(mut self, value: bool) -> Self {
        self.instrument = value;
        self
    }

    /// Set max_depth. Zero is raised to one so a root frame can always open.
    pub fn max_depth(mut self, value: usize) -> Self {
        self.max_depth = value.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.instrument);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::new().instrument(false).max_depth(0);
        assert!(!config.instrument);
        assert_eq!(config.max_depth, 1);
    }
}
