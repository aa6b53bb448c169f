//! Engine configuration

use serde::Deserialize;

/// Switches controlling how values are encoded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Do not attach method tables to encoded mappings.
    pub skip_methods: bool,
    /// Reject `#[tether(standalone)]` mappings nested inside other mappings.
    pub reject_nested_standalone: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            skip_methods: false,
            reject_nested_standalone: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config() {
        let config: EngineConfig = serde_json::from_str(r#"{"skip_methods": true}"#).unwrap();
        assert!(config.skip_methods);
        assert!(config.reject_nested_standalone);
    }
}
