//! Host type capabilities
//!
//! Every convertible host type declares a [`Kind`]. The encoder and the
//! decoder check kinds in the same fixed priority order, which keeps the
//! two directions inverse to each other:
//!
//! Class, Mapping, PassThrough, Pointer, Slice, Map, Int, Uint, Float,
//! String, Bool, Channel, Func, Struct, Unsupported.
//!
//! The last three kinds are rejected centrally before any impl runs.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use tether_vm::{Channel, Function, Table, UserData, Value};

use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::error::{ConversionError, ConversionErrorKind};
use crate::invoke::Call;
use crate::methods::Methods;
use crate::tags::{FieldTag, FieldTags};

// ============================================================================
// Kinds
// ============================================================================

/// Shape of a host type, in dispatch priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Registered opaque class, projected by handle (`Object<T>`)
    Class,
    /// Struct converted to and from a table field by field
    Mapping,
    /// Runtime values passed through without conversion
    PassThrough,
    /// `Option<T>`
    Pointer,
    /// Sequences
    Slice,
    /// Associative containers
    Map,
    /// Signed integers
    Int,
    /// Unsigned integers
    Uint,
    /// Floating point numbers
    Float,
    /// Strings
    String,
    /// Booleans
    Bool,
    /// Builtin channels
    Channel,
    /// Host functions, never converted
    Func,
    /// Plain structs that did not opt into a mapping
    Struct,
    /// Everything else
    Unsupported,
}

impl Kind {
    /// Kinds the engine refuses to convert
    pub fn rejection(self, type_name: &str) -> Option<ConversionErrorKind> {
        let type_name = type_name.to_string();
        match self {
            Kind::Func => Some(ConversionErrorKind::FuncNotSupported { type_name }),
            Kind::Struct => Some(ConversionErrorKind::ObjectNotMappable { type_name }),
            Kind::Unsupported => Some(ConversionErrorKind::UnsupportedType { type_name }),
            _ => None,
        }
    }
}

// ============================================================================
// Conversion traits
// ============================================================================

/// A host type known to the engine
pub trait HostType {
    /// Dispatch kind
    const KIND: Kind;

    /// Name used in error messages
    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Conversion from a script value.
///
/// Implementations for composite types decode their parts through
/// [`Decoder::decode`] so that kind checks and trace segments apply at
/// every level.
pub trait Decode: HostType + Sized {
    /// Value used for a nil function argument, when the type has one
    fn zero() -> Option<Self> {
        None
    }

    /// Decode a fresh value
    fn decode(de: &mut Decoder<'_>, src: &Value) -> Result<Self, ConversionError>;

    /// Decode into an existing value
    fn decode_into(&mut self, de: &mut Decoder<'_>, src: &Value) -> Result<(), ConversionError> {
        *self = Self::decode(de, src)?;
        Ok(())
    }
}

/// Conversion to a script value
pub trait Encode: HostType {
    /// Encode `self`
    fn encode(&self, en: &mut Encoder<'_>) -> Result<Value, ConversionError>;
}

/// A struct converted to and from a table, field by field.
///
/// Implemented by `#[derive(TableMapping)]`.
pub trait TableMapping: HostType + Default + 'static {
    /// Refuse to be nested inside another mapping
    const STANDALONE: bool = false;

    /// `(field, raw annotation)` for every field, in declaration order
    fn raw_tags() -> &'static [(&'static str, &'static str)];

    /// Parsed tags, cached per type
    fn tags() -> Arc<[FieldTag]> {
        FieldTags::of::<Self>(Self::raw_tags())
    }

    /// Write every non-skipped field into `table`
    fn encode_fields(&self, en: &mut Encoder<'_>, table: &Table) -> Result<(), ConversionError>;

    /// Read every non-skipped field from `table`
    fn decode_fields(&mut self, de: &mut Decoder<'_>, table: &Table) -> Result<(), ConversionError>;

    /// Methods callable on encoded tables
    fn methods() -> Methods<Self> {
        Methods::new()
    }
}

/// A type that can be the receiver of a [`Methods`] entry.
///
/// The receiver is argument #1 of the script call. Implemented by both
/// derives.
pub trait Receiver: Sized + 'static {
    /// Run `f` with a shared view of the receiver
    fn with_receiver<R>(call: &Call<'_>, f: impl FnOnce(&Self) -> R) -> tether_vm::VmResult<R>;

    /// Run `f` with an exclusive view of the receiver
    fn with_receiver_mut<R>(
        call: &Call<'_>,
        f: impl FnOnce(&mut Self) -> R,
    ) -> tether_vm::VmResult<R>;
}

// ============================================================================
// Standard types
// ============================================================================

macro_rules! host_kind {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl HostType for $ty {
                const KIND: Kind = Kind::$kind;
            }
        )*
    };
}

host_kind! {
    i8 => Int, i16 => Int, i32 => Int, i64 => Int, isize => Int,
    u8 => Uint, u16 => Uint, u32 => Uint, u64 => Uint, usize => Uint,
    f32 => Float, f64 => Float,
    bool => Bool,
    str => String,
    Value => PassThrough,
    Table => PassThrough,
    Function => PassThrough,
    UserData => PassThrough,
    Channel => Channel,
}

impl HostType for String {
    const KIND: Kind = Kind::String;

    fn type_name() -> &'static str {
        "String"
    }
}

impl<T: HostType + ?Sized> HostType for &T {
    const KIND: Kind = T::KIND;

    fn type_name() -> &'static str {
        T::type_name()
    }
}

impl<T: HostType + ?Sized> HostType for Box<T> {
    const KIND: Kind = T::KIND;

    fn type_name() -> &'static str {
        T::type_name()
    }
}

impl<T> HostType for Option<T> {
    const KIND: Kind = Kind::Pointer;
}

impl<T> HostType for Vec<T> {
    const KIND: Kind = Kind::Slice;
}

impl<T> HostType for [T] {
    const KIND: Kind = Kind::Slice;
}

impl<K, V, S> HostType for HashMap<K, V, S> {
    const KIND: Kind = Kind::Map;
}

impl<K, V> HostType for BTreeMap<K, V> {
    const KIND: Kind = Kind::Map;
}

// ============================================================================
// Host functions
// ============================================================================

/// A host-side callback stored in a struct.
///
/// Host functions are never converted: encoding or decoding one fails with
/// `FuncNotSupported`, and mappings leave such fields out. Use
/// [`Binding`](crate::Binding) to expose a function to scripts.
pub struct HostFn<A, R>(Option<Rc<dyn Fn(A) -> R>>);

impl<A, R> HostFn<A, R> {
    /// Wrap a closure
    pub fn new(f: impl Fn(A) -> R + 'static) -> Self {
        HostFn(Some(Rc::new(f)))
    }

    /// Call the function if one is set
    pub fn call(&self, args: A) -> Option<R> {
        self.0.as_ref().map(|f| f(args))
    }

    /// Whether a function is set
    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }
}

impl<A, R> Default for HostFn<A, R> {
    fn default() -> Self {
        HostFn(None)
    }
}

impl<A, R> Clone for HostFn<A, R> {
    fn clone(&self) -> Self {
        HostFn(self.0.clone())
    }
}

impl<A, R> fmt::Debug for HostFn<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HostFn").field(&self.is_set()).finish()
    }
}

impl<A, R> HostType for HostFn<A, R> {
    const KIND: Kind = Kind::Func;
}

impl<A, R> Decode for HostFn<A, R> {
    fn decode(de: &mut Decoder<'_>, _src: &Value) -> Result<Self, ConversionError> {
        Err(de.reject::<Self>())
    }
}

impl<A, R> Encode for HostFn<A, R> {
    fn encode(&self, en: &mut Encoder<'_>) -> Result<Value, ConversionError> {
        Err(en.reject::<Self>())
    }
}

// ============================================================================
// Fixed-size arrays
// ============================================================================

impl<T, const N: usize> HostType for [T; N] {
    const KIND: Kind = Kind::Unsupported;
}

impl<T, const N: usize> Decode for [T; N] {
    fn decode(de: &mut Decoder<'_>, _src: &Value) -> Result<Self, ConversionError> {
        Err(de.reject::<Self>())
    }
}

impl<T, const N: usize> Encode for [T; N] {
    fn encode(&self, en: &mut Encoder<'_>) -> Result<Value, ConversionError> {
        Err(en.reject::<Self>())
    }
}
