//! Error types for the runtime

use crate::value::ValueType;

/// Result type for runtime operations
pub type VmResult<T> = Result<T, VmError>;

/// Errors raised by the runtime.
///
/// Raising an error inside a native function is done by returning one of
/// these; the runtime unwinds the frame and hands it to the caller.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VmError {
    /// Error raised with a plain message
    #[error("{0}")]
    Runtime(String),

    /// Invalid argument passed to a function
    #[error("bad argument #{position} to '{function}' ({message})")]
    Argument {
        /// 1-based argument position
        position: usize,
        /// Name of the function that rejected the argument
        function: String,
        /// Human readable reason
        message: String,
    },

    /// Attempt to call something that is not a function
    #[error("attempt to call a {0} value")]
    NotCallable(ValueType),

    /// Attempt to index something that has no fields
    #[error("attempt to index a {0} value")]
    NotIndexable(ValueType),

    /// Table keys cannot be nil or NaN
    #[error("table index is {0}")]
    InvalidKey(&'static str),

    /// Call depth exceeded the configured limit
    #[error("stack overflow (call depth exceeds {0})")]
    StackOverflow(usize),

    /// `require` could not find a loader
    #[error("module '{0}' not found")]
    ModuleNotFound(String),

    /// A native function panicked inside a protected call
    #[error("native function panicked: {0}")]
    Panic(String),
}

impl VmError {
    /// Create a runtime error from any message
    pub fn runtime(message: impl Into<String>) -> Self {
        VmError::Runtime(message.into())
    }
}

impl From<String> for VmError {
    fn from(s: String) -> Self {
        VmError::Runtime(s)
    }
}

impl From<&str> for VmError {
    fn from(s: &str) -> Self {
        VmError::Runtime(s.to_string())
    }
}
