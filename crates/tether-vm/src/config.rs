use serde::Deserialize;

/// Limits applied by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Maximum number of nested calls (host and script frames alike).
    pub max_call_depth: usize,
    /// Maximum number of values on the shared value stack.
    pub max_stack: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 200,
            max_stack: 1_000_000,
        }
    }
}
