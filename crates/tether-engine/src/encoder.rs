//! Encoder: host values to script values
//!
//! The mirror image of the decoder. Mappings become plain tables (with a
//! shared method table attached when the type declares methods), class
//! instances become userdata handles that are reused for as long as the
//! script keeps them alive.

use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use tether_vm::{Channel, Function, Table, UserData, Value};

use crate::engine::Engine;
use crate::error::{ConversionError, ConversionErrorKind, Direction};
use crate::host::{Encode, HostType, TableMapping};
use crate::invoke::native_function;
use crate::object::{Class, Object};
use crate::tags::FieldTag;
use crate::trace::Trace;

/// Converts host values into script values.
pub struct Encoder<'a> {
    engine: &'a Engine,
    trace: Trace,
    /// Set while the fields of a mapping are being written
    in_mapping: bool,
}

impl<'a> Encoder<'a> {
    /// Create an encoder rooted at an empty path
    pub fn new(engine: &'a Engine) -> Self {
        Self {
            engine,
            trace: Trace::new(),
            in_mapping: false,
        }
    }

    /// The engine this encoder resolves classes against
    pub fn engine(&self) -> &'a Engine {
        self.engine
    }

    /// Encode any value
    pub fn encode<T: Encode + ?Sized>(&mut self, value: &T) -> Result<Value, ConversionError> {
        if let Some(kind) = T::KIND.rejection(T::type_name()) {
            return Err(self.error(kind));
        }
        value.encode(self)
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
            direction: Direction::Encoding,
            path: self.trace.render(),
            kind,
        }
    }

    /// The rejection error for a kind that is never encoded
    pub fn reject<T: HostType + ?Sized>(&self) -> ConversionError {
        let kind = T::KIND
            .rejection(T::type_name())
            .unwrap_or_else(|| ConversionErrorKind::UnsupportedType {
                type_name: T::type_name().to_string(),
            });
        self.error(kind)
    }

    // ========================================================================
    // Mappings and classes
    // ========================================================================

    /// Write one mapping field.
    ///
    /// Function fields are left out of the table, as are values that
    /// encode to nil.
    pub fn write_field<F: Encode + ?Sized>(
        &mut self,
        table: &Table,
        tag: &FieldTag,
        value: &F,
    ) -> Result<(), ConversionError> {
        if tag.skip {
            return Ok(());
        }
        match self.scoped(&tag.name, |en| en.encode(value)) {
            Ok(v) => {
                table.set(&tag.name, v);
                Ok(())
            }
            Err(e) if e.is_func_not_supported() => {
                tracing::trace!(field = %tag.name, "omitting function field");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Encode a mapping as a fresh table
    pub fn encode_mapping<M: TableMapping>(&mut self, value: &M) -> Result<Value, ConversionError> {
        let engine = self.engine;
        let config = engine.config();
        if M::STANDALONE && self.in_mapping && config.reject_nested_standalone {
            return Err(self.error(ConversionErrorKind::StandaloneNested {
                type_name: M::type_name().to_string(),
            }));
        }

        let table = Table::new();
        let outer = std::mem::replace(&mut self.in_mapping, true);
        let written = value.encode_fields(self, &table);
        self.in_mapping = outer;
        written?;

        if !config.skip_methods {
            if let Some(metatable) = self.mapping_metatable::<M>() {
                table.set_metatable(Some(metatable));
            }
        }
        Ok(Value::Table(table))
    }

    /// Method table shared by every encoded `M`, built on first use
    fn mapping_metatable<M: TableMapping>(&self) -> Option<Table> {
        let registry = self.engine.registry();
        if let Some(cached) = registry.mapping_metatable(TypeId::of::<M>()) {
            return cached;
        }

        let methods = M::methods();
        let metatable = if methods.is_empty() {
            None
        } else {
            let index = Table::new();
            for (name, body) in methods.into_entries() {
                let function = native_function(self.engine.handle(), &name, body, false);
                index.set(&name, function);
            }
            let metatable = Table::new();
            metatable.set("__index", index);
            metatable.set("__name", M::type_name());
            Some(metatable)
        };
        registry.cache_mapping_metatable(TypeId::of::<M>(), metatable.clone());
        metatable
    }

    pub(crate) fn encode_object<T: Class>(&mut self, object: &Object<T>) -> Result<Value, ConversionError> {
        let descriptor = self
            .engine
            .registry()
            .lookup(TypeId::of::<T>())
            .ok_or_else(|| {
                self.error(ConversionErrorKind::ClassNotRegistered {
                    type_name: std::any::type_name::<T>().to_string(),
                })
            })?;

        if let Some(handle) = object.cached_handle() {
            let current = handle
                .metatable()
                .is_some_and(|mt| mt.ptr_eq(&descriptor.metatable));
            if current {
                return Ok(Value::UserData(handle));
            }
        }

        let handle = UserData::with_metatable(object.clone(), descriptor.metatable.clone());
        object.cache_handle(&handle);
        tracing::trace!(class = %descriptor.name, "created class handle");
        Ok(Value::UserData(handle))
    }

    fn encode_slice<T: Encode>(&mut self, items: &[T]) -> Result<Value, ConversionError> {
        let table = Table::with_capacity(items.len(), 0);
        for (i, item) in items.iter().enumerate() {
            let value = self.scoped(i, |en| en.encode(item))?;
            // integer keys are always valid
            let _ = table.raw_set(Value::Number((i + 1) as f64), value);
        }
        Ok(Value::Table(table))
    }

    fn encode_entries<'v, K, V, I>(&mut self, entries: I) -> Result<Value, ConversionError>
    where
        K: Encode + 'v,
        V: Encode + 'v,
        I: Iterator<Item = (&'v K, &'v V)>,
    {
        let table = Table::new();
        for (k, v) in entries {
            let key = self.scoped("key", |en| en.encode(k))?;
            let value = self.scoped("value", |en| en.encode(v))?;
            let from = key.type_name();
            table.raw_set(key, value).map_err(|e| {
                self.error(ConversionErrorKind::TypeConvert {
                    from: from.to_string(),
                    to: "table key".to_string(),
                    detail: Some(e.to_string()),
                })
            })?;
        }
        Ok(Value::Table(table))
    }
}

// ============================================================================
// Scalars
// ============================================================================

macro_rules! encode_number {
    ($($ty:ty),*) => {
        $(
            impl Encode for $ty {
                fn encode(&self, _en: &mut Encoder<'_>) -> Result<Value, ConversionError> {
                    Ok(Value::Number(*self as f64))
                }
            }
        )*
    };
}

encode_number!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl Encode for bool {
    fn encode(&self, _en: &mut Encoder<'_>) -> Result<Value, ConversionError> {
        Ok(Value::Bool(*self))
    }
}

impl Encode for str {
    fn encode(&self, _en: &mut Encoder<'_>) -> Result<Value, ConversionError> {
        Ok(Value::string(self))
    }
}

impl Encode for String {
    fn encode(&self, _en: &mut Encoder<'_>) -> Result<Value, ConversionError> {
        Ok(Value::string(self))
    }
}

// ============================================================================
// Pointers
// ============================================================================

impl<T: Encode + ?Sized> Encode for &T {
    fn encode(&self, en: &mut Encoder<'_>) -> Result<Value, ConversionError> {
        en.encode(*self)
    }
}

impl<T: Encode + ?Sized> Encode for Box<T> {
    fn encode(&self, en: &mut Encoder<'_>) -> Result<Value, ConversionError> {
        en.encode(&**self)
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode(&self, en: &mut Encoder<'_>) -> Result<Value, ConversionError> {
        match self {
            Some(v) => en.encode(v),
            None => Ok(Value::Nil),
        }
    }
}

// ============================================================================
// Collections
// ============================================================================

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, en: &mut Encoder<'_>) -> Result<Value, ConversionError> {
        en.encode_slice(self)
    }
}

impl<T: Encode> Encode for [T] {
    fn encode(&self, en: &mut Encoder<'_>) -> Result<Value, ConversionError> {
        en.encode_slice(self)
    }
}

impl<K: Encode, V: Encode, S> Encode for HashMap<K, V, S> {
    fn encode(&self, en: &mut Encoder<'_>) -> Result<Value, ConversionError> {
        en.encode_entries(self.iter())
    }
}

impl<K: Encode, V: Encode> Encode for BTreeMap<K, V> {
    fn encode(&self, en: &mut Encoder<'_>) -> Result<Value, ConversionError> {
        en.encode_entries(self.iter())
    }
}

// ============================================================================
// Runtime values
// ============================================================================

macro_rules! encode_passthrough {
    ($($ty:ty => $variant:ident),*) => {
        $(
            impl Encode for $ty {
                fn encode(&self, _en: &mut Encoder<'_>) -> Result<Value, ConversionError> {
                    Ok(Value::$variant(self.clone()))
                }
            }
        )*
    };
}

encode_passthrough!(
    Table => Table,
    Function => Function,
    UserData => UserData,
    Channel => Channel
);

impl Encode for Value {
    fn encode(&self, _en: &mut Encoder<'_>) -> Result<Value, ConversionError> {
        Ok(self.clone())
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
    fn test_scalars() {
        let engine = engine();
        let mut en = Encoder::new(&engine);
        assert_eq!(en.encode(&7u8).unwrap(), Value::Number(7.0));
        assert_eq!(en.encode(&1.5f32).unwrap(), Value::Number(1.5));
        assert_eq!(en.encode("hi").unwrap(), Value::string("hi"));
        assert_eq!(en.encode(&String::from("s")).unwrap(), Value::string("s"));
        assert_eq!(en.encode(&true).unwrap(), Value::Bool(true));
        assert_eq!(en.encode(&None::<i32>).unwrap(), Value::Nil);
        assert_eq!(en.encode(&Some(2i64)).unwrap(), Value::Number(2.0));
    }

    #[test]
    fn test_sequences() {
        let engine = engine();
        let mut en = Encoder::new(&engine);
        let value = en.encode(&vec!["a", "b"]).unwrap();
        let table = value.as_table().unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get_index(2), Value::string("b"));

        let value = en.encode(&[1u8, 2, 3][..]).unwrap();
        assert_eq!(value.as_table().unwrap().len(), 3);
    }

    #[test]
    fn test_maps() {
        let engine = engine();
        let mut en = Encoder::new(&engine);
        let mut map = BTreeMap::new();
        map.insert("x".to_string(), 1);
        map.insert("y".to_string(), 2);
        let value = en.encode(&map).unwrap();
        assert_eq!(value.as_table().unwrap().get("y"), Value::Number(2.0));

        let mut bad = HashMap::new();
        bad.insert(None::<i32>, 1);
        let err = en.encode(&bad).unwrap_err();
        assert!(matches!(err.kind, ConversionErrorKind::TypeConvert { .. }));
    }

    #[test]
    fn test_nested_path() {
        let engine = engine();
        let mut en = Encoder::new(&engine);
        let nested = vec![vec![crate::HostFn::<(), ()>::default()]];
        let err = en.encode(&nested).unwrap_err();
        assert_eq!(err.path, "0.0");
        assert!(err.is_func_not_supported());
    }

    #[test]
    fn test_arrays_unsupported() {
        let engine = engine();
        let mut en = Encoder::new(&engine);
        let err = en.encode(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err.kind, ConversionErrorKind::UnsupportedType { .. }));
        assert_eq!(
            err.to_string(),
            "encoding fail: unsupported type [i32; 3]"
        );
    }

    #[test]
    fn test_passthrough_identity() {
        let engine = engine();
        let mut en = Encoder::new(&engine);
        let table = Table::new();
        let value = en.encode(&table).unwrap();
        assert!(value.as_table().unwrap().ptr_eq(&table));
    }
}
