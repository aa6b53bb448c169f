//! Decoder: script values to host values
//!
//! [`Decoder::decode`] is the single entry point for every level of a
//! conversion. It rejects the function, plain-struct and unsupported kinds
//! before delegating to the type's [`Decode`] impl, and every composite impl
//! recurses through it again.

use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{BuildHasher, Hash};

use tether_vm::{Channel, Function, Table, UserData, Value};

use crate::engine::Engine;
use crate::error::{ConversionError, ConversionErrorKind, Direction};
use crate::host::{Decode, HostType, Kind, TableMapping};
use crate::object::{handle_type_name, Class, Object};
use crate::tags::FieldTag;
use crate::trace::Trace;

/// Converts script values into host values.
pub struct Decoder<'a> {
    engine: &'a Engine,
    trace: Trace,
}

impl<'a> Decoder<'a> {
    /// Create a decoder rooted at an empty path
    pub fn new(engine: &'a Engine) -> Self {
        Self {
            engine,
            trace: Trace::new(),
        }
    }

    /// The engine this decoder resolves classes against
    pub fn engine(&self) -> &'a Engine {
        self.engine
    }

    /// Decode a fresh `T`
    pub fn decode<T: Decode>(&mut self, src: &Value) -> Result<T, ConversionError> {
        if let Some(kind) = T::KIND.rejection(T::type_name()) {
            return Err(self.error(kind));
        }
        T::decode(self, src)
    }

    /// Decode into an existing `T`
    pub fn decode_into<T: Decode>(&mut self, src: &Value, dst: &mut T) -> Result<(), ConversionError> {
        if let Some(kind) = T::KIND.rejection(T::type_name()) {
            return Err(self.error(kind));
        }
        dst.decode_into(self, src)
    }

    /// Run `f` with `segment` appended to the path
    pub fn scoped<R>(&mut self, segment: impl fmt::Display, f: impl FnOnce(&mut Self) -> R) -> R {
        let mark = self.trace.len();
        self.trace.push(segment);
        let out = f(self);
        self.trace.truncate(mark);
        out
    }

    /// Build an error at the current path
    pub fn error(&self, kind: ConversionErrorKind) -> ConversionError {
        ConversionError {
            direction: Direction::Decoding,
            path: self.trace.render(),
            kind,
        }
    }

    /// `src` has the wrong script type for `to`
    pub fn type_error(&self, src: &Value, to: &str) -> ConversionError {
        self.error(ConversionErrorKind::TypeConvert {
            from: src.type_name().to_string(),
            to: to.to_string(),
            detail: None,
        })
    }

    fn convert_error(&self, src: &Value, to: &str, detail: impl fmt::Display) -> ConversionError {
        self.error(ConversionErrorKind::TypeConvert {
            from: src.type_name().to_string(),
            to: to.to_string(),
            detail: Some(detail.to_string()),
        })
    }

    /// The rejection error for a kind that is never decoded
    pub fn reject<T: HostType + ?Sized>(&self) -> ConversionError {
        let kind = T::KIND
            .rejection(T::type_name())
            .unwrap_or_else(|| ConversionErrorKind::UnsupportedType {
                type_name: T::type_name().to_string(),
            });
        self.error(kind)
    }

    fn expect_table(&self, src: &Value, to: &str) -> Result<Table, ConversionError> {
        match src {
            Value::Table(t) => Ok(t.clone()),
            other => Err(self.type_error(other, to)),
        }
    }

    // ========================================================================
    // Mappings and classes
    // ========================================================================

    /// Decode a table into the fields of a mapping
    pub fn decode_mapping<M: TableMapping>(&mut self, src: &Value, dst: &mut M) -> Result<(), ConversionError> {
        let table = self.expect_table(src, M::type_name())?;
        dst.decode_fields(self, &table)
    }

    /// Read one mapping field.
    ///
    /// Skipped and function fields are never read. A missing value is
    /// tolerated for optional fields and leaves `dst` untouched.
    pub fn read_field<F: Decode>(
        &mut self,
        table: &Table,
        tag: &FieldTag,
        dst: &mut F,
    ) -> Result<(), ConversionError> {
        if tag.skip || F::KIND == Kind::Func {
            return Ok(());
        }
        let value = table.get(&tag.name);
        if value.is_nil() {
            if tag.optional {
                return Ok(());
            }
            return Err(self.error(ConversionErrorKind::FieldNotFound {
                field: tag.name.clone(),
            }));
        }
        self.scoped(&tag.name, |de| de.decode_into(&value, dst))
    }

    pub(crate) fn decode_object<T: Class>(&mut self, src: &Value) -> Result<Object<T>, ConversionError> {
        let descriptor = self
            .engine
            .registry()
            .lookup(TypeId::of::<T>())
            .ok_or_else(|| {
                self.error(ConversionErrorKind::ClassNotRegistered {
                    type_name: std::any::type_name::<T>().to_string(),
                })
            })?;
        let ud = match src {
            Value::UserData(ud) => ud,
            other => return Err(self.type_error(other, &descriptor.name)),
        };
        ud.payload::<Object<T>>().cloned().ok_or_else(|| {
            self.error(ConversionErrorKind::ClassTypeMismatch {
                expected: descriptor.name.clone(),
                found: handle_type_name(ud),
            })
        })
    }
}

// ============================================================================
// Numbers
// ============================================================================

macro_rules! decode_integer {
    ($($ty:ty),*) => {
        $(
            impl Decode for $ty {
                fn zero() -> Option<Self> {
                    Some(0)
                }

                fn decode(de: &mut Decoder<'_>, src: &Value) -> Result<Self, ConversionError> {
                    match src {
                        Value::Number(n) => {
                            let t = n.trunc();
                            // MAX rounds up to 2^BITS for the widest types, so
                            // the upper bound is exclusive and exact.
                            let upper = (<$ty>::MAX / 2 + 1) as f64 * 2.0;
                            if t.is_finite() && t >= <$ty>::MIN as f64 && t < upper {
                                Ok(t as $ty)
                            } else {
                                Err(de.convert_error(src, stringify!($ty), format_args!("{} is out of range", n)))
                            }
                        }
                        Value::String(s) => s
                            .trim()
                            .parse::<$ty>()
                            .map_err(|e| de.convert_error(src, stringify!($ty), e)),
                        other => Err(de.type_error(other, stringify!($ty))),
                    }
                }
            }
        )*
    };
}

decode_integer!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

macro_rules! decode_float {
    ($($ty:ty),*) => {
        $(
            impl Decode for $ty {
                fn zero() -> Option<Self> {
                    Some(0.0)
                }

                fn decode(de: &mut Decoder<'_>, src: &Value) -> Result<Self, ConversionError> {
                    match src {
                        Value::Number(n) => {
                            let v = *n as $ty;
                            if n.is_finite() && v.is_infinite() {
                                Err(de.convert_error(src, stringify!($ty), format_args!("{} is out of range", n)))
                            } else {
                                Ok(v)
                            }
                        }
                        Value::String(s) => s
                            .trim()
                            .parse::<$ty>()
                            .map_err(|e| de.convert_error(src, stringify!($ty), e)),
                        other => Err(de.type_error(other, stringify!($ty))),
                    }
                }
            }
        )*
    };
}

decode_float!(f32, f64);

// ============================================================================
// Strings and booleans
// ============================================================================

impl Decode for String {
    fn zero() -> Option<Self> {
        Some(String::new())
    }

    fn decode(de: &mut Decoder<'_>, src: &Value) -> Result<Self, ConversionError> {
        match src {
            Value::String(s) => Ok(s.to_string()),
            other => Err(de.type_error(other, "String")),
        }
    }
}

impl Decode for bool {
    fn zero() -> Option<Self> {
        Some(false)
    }

    fn decode(de: &mut Decoder<'_>, src: &Value) -> Result<Self, ConversionError> {
        match src {
            Value::Bool(b) => Ok(*b),
            other => Err(de.type_error(other, "bool")),
        }
    }
}

// ============================================================================
// Pointers
// ============================================================================

impl<T: Decode> Decode for Option<T> {
    fn zero() -> Option<Self> {
        Some(None)
    }

    fn decode(de: &mut Decoder<'_>, src: &Value) -> Result<Self, ConversionError> {
        if src.is_nil() {
            return Ok(None);
        }
        de.decode::<T>(src).map(Some)
    }
}

impl<T: Decode> Decode for Box<T> {
    fn zero() -> Option<Self> {
        T::zero().map(Box::new)
    }

    fn decode(de: &mut Decoder<'_>, src: &Value) -> Result<Self, ConversionError> {
        de.decode::<T>(src).map(Box::new)
    }

    fn decode_into(&mut self, de: &mut Decoder<'_>, src: &Value) -> Result<(), ConversionError> {
        de.decode_into(src, &mut **self)
    }
}

// ============================================================================
// Collections
// ============================================================================

impl<T: Decode> Decode for Vec<T> {
    fn zero() -> Option<Self> {
        Some(Vec::new())
    }

    /// Reads the keys `1..=n` by position. A hole decodes as nil, so
    /// `Option` elements come back as `None` and strict elements fail.
    fn decode(de: &mut Decoder<'_>, src: &Value) -> Result<Self, ConversionError> {
        let table = de.expect_table(src, Self::type_name())?;
        let len = table
            .sequence_len()
            .ok_or_else(|| de.convert_error(src, Self::type_name(), "table is not a sequence"))?;
        let mut out = Vec::with_capacity(len);
        for i in 0..len {
            let value = table.get_index(i as i64 + 1);
            out.push(de.scoped(i, |de| de.decode::<T>(&value))?);
        }
        Ok(out)
    }
}

impl<K, V, S> Decode for HashMap<K, V, S>
where
    K: Decode + Eq + Hash,
    V: Decode,
    S: BuildHasher + Default,
{
    fn zero() -> Option<Self> {
        Some(HashMap::default())
    }

    fn decode(de: &mut Decoder<'_>, src: &Value) -> Result<Self, ConversionError> {
        let table = de.expect_table(src, Self::type_name())?;
        let mut out = HashMap::with_hasher(S::default());
        for (key, value) in table.pairs() {
            let k = de.scoped("key", |de| de.decode::<K>(&key))?;
            let v = de.scoped("value", |de| de.decode::<V>(&value))?;
            out.insert(k, v);
        }
        Ok(out)
    }
}

impl<K, V> Decode for BTreeMap<K, V>
where
    K: Decode + Ord,
    V: Decode,
{
    fn zero() -> Option<Self> {
        Some(BTreeMap::new())
    }

    fn decode(de: &mut Decoder<'_>, src: &Value) -> Result<Self, ConversionError> {
        let table = de.expect_table(src, Self::type_name())?;
        let mut out = BTreeMap::new();
        for (key, value) in table.pairs() {
            let k = de.scoped("key", |de| de.decode::<K>(&key))?;
            let v = de.scoped("value", |de| de.decode::<V>(&value))?;
            out.insert(k, v);
        }
        Ok(out)
    }
}

// ============================================================================
// Runtime values
// ============================================================================

impl Decode for Value {
    fn zero() -> Option<Self> {
        Some(Value::Nil)
    }

    fn decode(_de: &mut Decoder<'_>, src: &Value) -> Result<Self, ConversionError> {
        Ok(src.clone())
    }
}

impl Decode for Table {
    fn decode(de: &mut Decoder<'_>, src: &Value) -> Result<Self, ConversionError> {
        de.expect_table(src, "table")
    }
}

impl Decode for Function {
    fn decode(de: &mut Decoder<'_>, src: &Value) -> Result<Self, ConversionError> {
        match src {
            Value::Function(f) => Ok(f.clone()),
            other => Err(de.type_error(other, "function")),
        }
    }
}

impl Decode for UserData {
    fn decode(de: &mut Decoder<'_>, src: &Value) -> Result<Self, ConversionError> {
        match src {
            Value::UserData(ud) => Ok(ud.clone()),
            other => Err(de.type_error(other, "userdata")),
        }
    }
}

impl Decode for Channel {
    fn decode(de: &mut Decoder<'_>, src: &Value) -> Result<Self, ConversionError> {
        match src {
            Value::Channel(ch) => Ok(ch.clone()),
            other => Err(de.error(ConversionErrorKind::ChannelType {
                found: other.type_name().to_string(),
            })),
        }
    }

    fn decode_into(&mut self, de: &mut Decoder<'_>, src: &Value) -> Result<(), ConversionError> {
        if src.is_nil() {
            return Ok(());
        }
        *self = Self::decode(de, src)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_vm::Vm;

    fn engine() -> Engine {
        Engine::new(Vm::new())
    }

    #[test]
    fn test_numeric_coercion() {
        let engine = engine();
        let mut de = Decoder::new(&engine);
        assert_eq!(de.decode::<i32>(&Value::string("42")).unwrap(), 42);
        assert_eq!(de.decode::<i32>(&Value::Number(-7.9)).unwrap(), -7);
        assert_eq!(de.decode::<f64>(&Value::string(" 2.5 ")).unwrap(), 2.5);
        assert!(de.decode::<i32>(&Value::string("abc")).is_err());
        assert!(de.decode::<u8>(&Value::Number(256.0)).is_err());
        assert!(de.decode::<u32>(&Value::Number(-1.0)).is_err());
        assert!(de.decode::<i64>(&Value::Number(f64::NAN)).is_err());
        assert!(de.decode::<f32>(&Value::Number(1e300)).is_err());
        assert!(de.decode::<i32>(&Value::Bool(true)).is_err());
    }

    #[test]
    fn test_integer_bounds() {
        let engine = engine();
        let mut de = Decoder::new(&engine);
        let two_63 = 9_223_372_036_854_775_808.0;
        let two_64 = 18_446_744_073_709_551_616.0;

        assert_eq!(de.decode::<i64>(&Value::Number(-two_63)).unwrap(), i64::MIN);
        assert!(de.decode::<i64>(&Value::Number(two_63)).is_err());
        assert!(de.decode::<isize>(&Value::Number(two_63)).is_err());
        assert!(de.decode::<i64>(&Value::Number(-two_63 * 2.0)).is_err());
        assert_eq!(
            de.decode::<u64>(&Value::Number(two_64 / 2.0)).unwrap(),
            1 << 63
        );
        assert!(de.decode::<u64>(&Value::Number(two_64)).is_err());
        assert!(de.decode::<usize>(&Value::Number(two_64)).is_err());
        assert_eq!(de.decode::<u8>(&Value::Number(255.9)).unwrap(), 255);
        assert_eq!(de.decode::<i8>(&Value::Number(-128.0)).unwrap(), -128);
        assert!(de.decode::<i8>(&Value::Number(128.0)).is_err());
        assert_eq!(de.decode::<u32>(&Value::Number(-0.5)).unwrap(), 0);
        assert!(de.decode::<i32>(&Value::Number(f64::INFINITY)).is_err());
        assert!(de.decode::<u64>(&Value::Number(f64::NEG_INFINITY)).is_err());

        let err = de.decode::<i64>(&Value::Number(two_63)).unwrap_err();
        assert!(matches!(err.kind, ConversionErrorKind::TypeConvert { .. }));
    }

    #[test]
    fn test_strict_scalars() {
        let engine = engine();
        let mut de = Decoder::new(&engine);
        assert_eq!(de.decode::<String>(&Value::string("hi")).unwrap(), "hi");
        assert!(de.decode::<String>(&Value::Number(1.0)).is_err());
        assert!(de.decode::<bool>(&Value::Bool(true)).unwrap());
        let err = de.decode::<bool>(&Value::Nil).unwrap_err();
        assert_eq!(err.to_string(), "decoding fail: cannot convert nil to bool");
    }

    #[test]
    fn test_option_and_box() {
        let engine = engine();
        let mut de = Decoder::new(&engine);
        assert_eq!(de.decode::<Option<i32>>(&Value::Nil).unwrap(), None);
        assert_eq!(de.decode::<Option<i32>>(&Value::Number(3.0)).unwrap(), Some(3));
        assert_eq!(*de.decode::<Box<String>>(&Value::string("b")).unwrap(), "b");
    }

    #[test]
    fn test_slice_path_on_failure() {
        let engine = engine();
        let t = Table::new();
        t.push(1);
        t.push("2");
        t.push(true);
        let mut de = Decoder::new(&engine);
        let err = de.decode::<Vec<i32>>(&Value::Table(t)).unwrap_err();
        assert_eq!(err.path, "2");
        assert_eq!(
            err.to_string(),
            "decoding <2> fail: cannot convert boolean to i32"
        );
    }

    #[test]
    fn test_slice_holes() {
        let engine = engine();
        let t = Table::new();
        t.push(1);
        t.raw_set(3, 3).unwrap();
        let mut de = Decoder::new(&engine);
        let out = de.decode::<Vec<Option<i32>>>(&Value::Table(t.clone())).unwrap();
        assert_eq!(out, vec![Some(1), None, Some(3)]);

        let err = de.decode::<Vec<i32>>(&Value::Table(t.clone())).unwrap_err();
        assert_eq!(err.path, "1");

        t.set("name", "x");
        let err = de.decode::<Vec<Option<i32>>>(&Value::Table(t)).unwrap_err();
        assert!(matches!(
            err.kind,
            ConversionErrorKind::TypeConvert { ref detail, .. }
                if detail.as_deref() == Some("table is not a sequence")
        ));
    }

    #[test]
    fn test_map_decoding() {
        let engine = engine();
        let t = Table::new();
        t.set("a", 1);
        t.set("b", 2);
        let mut de = Decoder::new(&engine);
        let map = de.decode::<BTreeMap<String, u8>>(&Value::Table(t.clone())).unwrap();
        assert_eq!(map.get("a"), Some(&1));
        assert_eq!(map.len(), 2);

        t.set("c", "x");
        let err = de.decode::<HashMap<String, u8>>(&Value::Table(t)).unwrap_err();
        assert_eq!(err.path, "value");
    }

    #[test]
    fn test_channel_nil_is_noop() {
        let engine = engine();
        let mut de = Decoder::new(&engine);
        let mut ch = Channel::new(1);
        let original = ch.clone();
        de.decode_into(&Value::Nil, &mut ch).unwrap();
        assert!(ch.ptr_eq(&original));

        let err = de.decode::<Channel>(&Value::Number(1.0)).unwrap_err();
        assert_eq!(
            err.kind,
            ConversionErrorKind::ChannelType {
                found: "number".to_string()
            }
        );
    }

    #[test]
    fn test_rejected_kinds() {
        let engine = engine();
        let mut de = Decoder::new(&engine);
        let err = de.decode::<[u8; 2]>(&Value::Nil).unwrap_err();
        assert!(matches!(err.kind, ConversionErrorKind::UnsupportedType { .. }));
        let err = de
            .decode::<crate::HostFn<i32, i32>>(&Value::Nil)
            .unwrap_err();
        assert!(err.is_func_not_supported());
    }

    #[test]
    fn test_scoped_restores_path() {
        let engine = engine();
        let mut de = Decoder::new(&engine);
        let result: Result<i32, _> = de.scoped("outer", |de| {
            de.scoped("inner", |de| de.decode::<i32>(&Value::Nil))
        });
        assert_eq!(result.unwrap_err().path, "outer.inner");
        assert!(de.trace.is_empty());
    }
}
