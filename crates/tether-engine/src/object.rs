//! Shared class instances
//!
//! An [`Object<T>`] is the host-side handle to an instance of a registered
//! class. Encoding it produces a userdata whose payload is another clone of
//! the same object, so script-side field writes are visible to the host and
//! the other way around.

use std::cell::{BorrowError, BorrowMutError, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use tether_vm::{UserData, Value, WeakUserData};

use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::error::ConversionError;
use crate::host::{Decode, Encode, HostType, Kind, Receiver};
use crate::methods::Methods;

struct ObjectInner<T> {
    value: RefCell<T>,
    /// Last userdata handed to the runtime
    handle: RefCell<WeakUserData>,
}

/// Shared, interior-mutable instance of a class
pub struct Object<T>(Rc<ObjectInner<T>>);

impl<T> Object<T> {
    /// Wrap a value
    pub fn new(value: T) -> Self {
        Object(Rc::new(ObjectInner {
            value: RefCell::new(value),
            handle: RefCell::new(WeakUserData::default()),
        }))
    }

    /// Borrow the instance.
    ///
    /// # Panics
    ///
    /// Panics if the instance is mutably borrowed.
    pub fn borrow(&self) -> Ref<'_, T> {
        self.0.value.borrow()
    }

    /// Mutably borrow the instance.
    ///
    /// # Panics
    ///
    /// Panics if the instance is already borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.0.value.borrow_mut()
    }

    /// Borrow the instance, failing if it is mutably borrowed
    pub fn try_borrow(&self) -> Result<Ref<'_, T>, BorrowError> {
        self.0.value.try_borrow()
    }

    /// Mutably borrow the instance, failing if it is already borrowed
    pub fn try_borrow_mut(&self) -> Result<RefMut<'_, T>, BorrowMutError> {
        self.0.value.try_borrow_mut()
    }

    /// Check whether two handles refer to the same instance
    pub fn ptr_eq(&self, other: &Object<T>) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn cached_handle(&self) -> Option<UserData> {
        self.0.handle.borrow().upgrade()
    }

    pub(crate) fn cache_handle(&self, handle: &UserData) {
        *self.0.handle.borrow_mut() = handle.downgrade();
    }
}

impl<T> Clone for Object<T> {
    fn clone(&self) -> Self {
        Object(Rc::clone(&self.0))
    }
}

impl<T: fmt::Debug> fmt::Debug for Object<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.value.try_borrow() {
            Ok(value) => f.debug_tuple("Object").field(&*value).finish(),
            Err(_) => f.write_str("Object(<borrowed>)"),
        }
    }
}

impl<T: Class> HostType for Object<T> {
    const KIND: Kind = Kind::Class;
}

impl<T: Class> Decode for Object<T> {
    fn decode(de: &mut Decoder<'_>, src: &Value) -> Result<Self, ConversionError> {
        de.decode_object(src)
    }
}

impl<T: Class> Encode for Object<T> {
    fn encode(&self, en: &mut Encoder<'_>) -> Result<Value, ConversionError> {
        en.encode_object(self)
    }
}

// ============================================================================
// Classes
// ============================================================================

/// A struct projected into the runtime by handle.
///
/// Implemented by `#[derive(Class)]`. Instances travel as [`Object<Self>`];
/// a bare value of the type is never converted.
pub trait Class: Receiver + Sized + 'static {
    /// `(field, raw annotation)` for every field, in declaration order
    fn raw_tags() -> &'static [(&'static str, &'static str)];

    /// Typed getters and setters, in declaration order
    fn fields() -> Vec<FieldAccessor<Self>>;

    /// Methods callable on instances
    fn methods() -> Methods<Self> {
        Methods::new()
    }
}

/// Reads and writes one field of a class instance
pub struct FieldAccessor<T> {
    /// Rust field name, matched against the parsed tags
    pub field: &'static str,
    /// Encode the current value
    pub get: fn(&T, &mut Encoder<'_>) -> Result<Value, ConversionError>,
    /// Decode a script value into the field
    pub set: fn(&mut T, &mut Decoder<'_>, &Value) -> Result<(), ConversionError>,
}

impl<T> Clone for FieldAccessor<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for FieldAccessor<T> {}

/// Display name of the value behind a handle, for mismatch errors
pub(crate) fn handle_type_name(handle: &UserData) -> String {
    match handle.metamethod("__name") {
        Value::String(name) => name.to_string(),
        _ => handle.payload_type_name().to_string(),
    }
}
