//! Error types for the engine
//!
//! Three families:
//! - [`ConfigError`]: binding mistakes detected at setup time. These are
//!   raised as panics by the registry and the tag cache.
//! - [`ConversionError`]: recoverable encode/decode failures carrying the
//!   dotted path of the value that failed.
//! - [`Error`]: what host code sees when calling into the runtime.

use std::fmt;

use tether_vm::VmError;
use thiserror::Error;

/// Result type for host-side calls into the runtime
pub type Result<T> = std::result::Result<T, Error>;

/// Setup-time configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The host type is already registered
    #[error("type [{name}:{uuid}] already exists")]
    DuplicateClass {
        /// Display name of the rejected registration
        name: String,
        /// UUID of the rejected registration
        uuid: String,
    },

    /// Another host type already owns the accessor derived from this UUID
    #[error("accessor {accessor} for [{name}:{uuid}] is already owned by {owner}")]
    DuplicateAccessor {
        /// Generated accessor name
        accessor: String,
        /// Display name of the rejected registration
        name: String,
        /// UUID of the rejected registration
        uuid: String,
        /// Display name of the existing owner
        owner: String,
    },

    /// A field annotation contains a directive the tag parser does not know
    #[error("unknown tag directive `{directive}` on field `{field}`")]
    UnknownDirective {
        /// Field carrying the annotation
        field: String,
        /// Offending directive
        directive: String,
    },
}

/// Which way a conversion was going
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Script value to host value
    Decoding,
    /// Host value to script value
    Encoding,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Decoding => f.write_str("decoding"),
            Direction::Encoding => f.write_str("encoding"),
        }
    }
}

/// Reason a conversion failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionErrorKind {
    /// The destination cannot be written (the instance is borrowed)
    #[error("{type_name} is not addressable: instance is already borrowed")]
    NotAddressable {
        /// Host type of the destination
        type_name: String,
    },

    /// A class handle of another host type was supplied
    #[error("class type mismatch: expected {expected}, got {found}")]
    ClassTypeMismatch {
        /// Expected class
        expected: String,
        /// Class (or payload type) actually found
        found: String,
    },

    /// The host class was never registered with this engine
    #[error("class {type_name} is not registered")]
    ClassNotRegistered {
        /// Host type
        type_name: String,
    },

    /// A required field is missing from the source table
    #[error("field {field} not found")]
    FieldNotFound {
        /// Script-side field name
        field: String,
    },

    /// The value has the wrong shape or is out of range
    #[error("cannot convert {from} to {to}{}", detail_suffix(.detail))]
    TypeConvert {
        /// Source type name
        from: String,
        /// Destination type name
        to: String,
        /// Optional parser or range detail
        detail: Option<String>,
    },

    /// A channel destination received something other than a channel
    #[error("channel expected, got {found}")]
    ChannelType {
        /// Script type found
        found: String,
    },

    /// Function values are never converted generically
    #[error("function type {type_name} is not supported")]
    FuncNotSupported {
        /// Host type
        type_name: String,
    },

    /// A plain struct that does not opt into table mapping
    #[error("{type_name} is not mappable to a table")]
    ObjectNotMappable {
        /// Host type
        type_name: String,
    },

    /// A host shape the engine has no conversion for
    #[error("unsupported type {type_name}")]
    UnsupportedType {
        /// Host type
        type_name: String,
    },

    /// A standalone mapping was encoded inside another mapping
    #[error("{type_name} must stand alone and cannot be nested in another mapping")]
    StandaloneNested {
        /// Host type
        type_name: String,
    },
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail
        .as_ref()
        .map(|d| format!(" ({})", d))
        .unwrap_or_default()
}

/// A failed encode or decode.
///
/// The path is rendered once, where the failure happened, and displays as
/// `decoding <Args.2.Name> fail: <reason>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionError {
    /// Conversion direction
    pub direction: Direction,
    /// Dotted path of the failing value, empty at the root
    pub path: String,
    /// What went wrong
    pub kind: ConversionErrorKind,
}

impl ConversionError {
    /// Check whether this is a [`ConversionErrorKind::FuncNotSupported`]
    pub fn is_func_not_supported(&self) -> bool {
        matches!(self.kind, ConversionErrorKind::FuncNotSupported { .. })
    }
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{} fail: {}", self.direction, self.kind)
        } else {
            write!(f, "{} <{}> fail: {}", self.direction, self.path, self.kind)
        }
    }
}

impl std::error::Error for ConversionError {}

impl From<ConversionError> for VmError {
    fn from(e: ConversionError) -> Self {
        VmError::Runtime(e.to_string())
    }
}

/// Errors returned to host code calling into the runtime
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The runtime raised an error
    #[error(transparent)]
    Runtime(#[from] VmError),

    /// Arguments or results could not be converted
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_error_display() {
        let err = ConversionError {
            direction: Direction::Decoding,
            path: "Args.2.Name".to_string(),
            kind: ConversionErrorKind::TypeConvert {
                from: "number".to_string(),
                to: "String".to_string(),
                detail: None,
            },
        };
        assert_eq!(
            err.to_string(),
            "decoding <Args.2.Name> fail: cannot convert number to String"
        );

        let root = ConversionError {
            direction: Direction::Encoding,
            path: String::new(),
            kind: ConversionErrorKind::UnsupportedType {
                type_name: "[u8; 4]".to_string(),
            },
        };
        assert_eq!(root.to_string(), "encoding fail: unsupported type [u8; 4]");
    }

    #[test]
    fn test_type_convert_detail() {
        let kind = ConversionErrorKind::TypeConvert {
            from: "string".to_string(),
            to: "i32".to_string(),
            detail: Some("invalid digit found in string".to_string()),
        };
        assert_eq!(
            kind.to_string(),
            "cannot convert string to i32 (invalid digit found in string)"
        );
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::DuplicateClass {
            name: "Point".to_string(),
            uuid: "1234".to_string(),
        };
        assert_eq!(err.to_string(), "type [Point:1234] already exists");
    }
}
