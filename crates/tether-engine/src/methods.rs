//! Method tables
//!
//! [`Methods<T>`] collects the methods a mapping or class exposes. Each
//! entry is compiled once into a native body; the receiver is argument #1
//! of the script call (`obj:name(...)`), positional arguments start at #2.
//!
//! The receiver helpers at the bottom are what the derives plug into
//! [`Receiver`]: mappings receive a decoded copy of the table (written back
//! after a mutating call), classes borrow the shared instance.

use std::marker::PhantomData;

use tether_vm::{Value, VmError, VmResult};

use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::host::{Decode, Receiver, TableMapping};
use crate::invoke::{body, Body, Call, IntoReturns};
use crate::object::{handle_type_name, Class, Object};

/// Named methods of `T`, in registration order
pub struct Methods<T> {
    entries: Vec<(String, Body)>,
    _marker: PhantomData<fn(T)>,
}

impl<T> Methods<T> {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Registered names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Number of methods
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no method is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_entries(self) -> Vec<(String, Body)> {
        self.entries
    }
}

impl<T> Default for Methods<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Receiver> Methods<T> {
    /// Add a method taking `&T`
    pub fn method<M, F: MethodRef<T, M>>(mut self, name: impl Into<String>, f: F) -> Self {
        self.entries
            .push((name.into(), body(move |call| f.invoke(call))));
        self
    }

    /// Add a method taking `&mut T`
    pub fn method_mut<M, F: MethodMut<T, M>>(mut self, name: impl Into<String>, f: F) -> Self {
        self.entries
            .push((name.into(), body(move |call| f.invoke(call))));
        self
    }
}

/// `Fn(&T, A1, .., An) -> R` usable as a method
pub trait MethodRef<T, Marker>: 'static {
    /// Decode the arguments, call with the receiver, push the results
    fn invoke(&self, call: &mut Call<'_>) -> VmResult<usize>;
}

/// `Fn(&mut T, A1, .., An) -> R` usable as a method
pub trait MethodMut<T, Marker>: 'static {
    /// Decode the arguments, call with the receiver, push the results
    fn invoke(&self, call: &mut Call<'_>) -> VmResult<usize>;
}

// Arguments are decoded before the receiver is borrowed, so decoding a
// handle of the same instance cannot conflict with the borrow.
macro_rules! method {
    ($($arg:ident: $ty:ident = $pos:literal),*) => {
        impl<T, Func, R, $($ty),*> MethodRef<T, fn(&T, $($ty),*) -> R> for Func
        where
            T: Receiver,
            Func: Fn(&T, $($ty),*) -> R + 'static,
            R: IntoReturns,
            $($ty: Decode,)*
        {
            fn invoke(&self, call: &mut Call<'_>) -> VmResult<usize> {
                $(let $arg = call.arg::<$ty>($pos)?;)*
                let out = T::with_receiver(call, |this| self(this, $($arg),*))?;
                call.ret(out)
            }
        }

        impl<T, Func, R, $($ty),*> MethodMut<T, fn(&mut T, $($ty),*) -> R> for Func
        where
            T: Receiver,
            Func: Fn(&mut T, $($ty),*) -> R + 'static,
            R: IntoReturns,
            $($ty: Decode,)*
        {
            fn invoke(&self, call: &mut Call<'_>) -> VmResult<usize> {
                $(let $arg = call.arg::<$ty>($pos)?;)*
                let out = T::with_receiver_mut(call, |this| self(this, $($arg),*))?;
                call.ret(out)
            }
        }
    };
}

method!();
method!(a1: A1 = 2);
method!(a1: A1 = 2, a2: A2 = 3);
method!(a1: A1 = 2, a2: A2 = 3, a3: A3 = 4);
method!(a1: A1 = 2, a2: A2 = 3, a3: A3 = 4, a4: A4 = 5);
method!(a1: A1 = 2, a2: A2 = 3, a3: A3 = 4, a4: A4 = 5, a5: A5 = 6);
method!(a1: A1 = 2, a2: A2 = 3, a3: A3 = 4, a4: A4 = 5, a5: A5 = 6, a6: A6 = 7);
method!(a1: A1 = 2, a2: A2 = 3, a3: A3 = 4, a4: A4 = 5, a5: A5 = 6, a6: A6 = 7, a7: A7 = 8);

// ============================================================================
// Receivers
// ============================================================================

fn decode_receiver<T: TableMapping>(call: &Call<'_>) -> VmResult<(tether_vm::Table, T)> {
    let table = call.vm().check_table(1)?;
    let mut this = T::default();
    Decoder::new(call.engine())
        .decode_mapping(&Value::Table(table.clone()), &mut this)
        .map_err(|e| call.arg_error(1, e.to_string()))?;
    Ok((table, this))
}

/// Receiver of a mapping method: a copy decoded from the table
pub fn mapping_receiver<T: TableMapping, R>(
    call: &Call<'_>,
    f: impl FnOnce(&T) -> R,
) -> VmResult<R> {
    let (_, this) = decode_receiver::<T>(call)?;
    Ok(f(&this))
}

/// Receiver of a mutating mapping method; changes are written back
pub fn mapping_receiver_mut<T: TableMapping, R>(
    call: &Call<'_>,
    f: impl FnOnce(&mut T) -> R,
) -> VmResult<R> {
    let (table, mut this) = decode_receiver::<T>(call)?;
    let out = f(&mut this);
    this.encode_fields(&mut Encoder::new(call.engine()), &table)?;
    Ok(out)
}

fn receiver_object<T: Class>(call: &Call<'_>) -> VmResult<Object<T>> {
    let found = match call.vm().arg(1) {
        Value::UserData(ud) => match ud.payload::<Object<T>>() {
            Some(object) => return Ok(object.clone()),
            None => handle_type_name(&ud),
        },
        other => other.type_name().to_string(),
    };
    let wanted = call.engine().class_name::<T>();
    Err(call.arg_error(1, format!("{} expected, got {}", wanted, found)))
}

fn borrowed<T: Class>(call: &Call<'_>) -> VmError {
    VmError::runtime(format!(
        "{} instance is already borrowed",
        call.engine().class_name::<T>()
    ))
}

/// Receiver of a class method: the shared instance behind arg #1
pub fn class_receiver<T: Class, R>(call: &Call<'_>, f: impl FnOnce(&T) -> R) -> VmResult<R> {
    let object = receiver_object::<T>(call)?;
    let this = object.try_borrow().map_err(|_| borrowed::<T>(call))?;
    Ok(f(&this))
}

/// Receiver of a mutating class method
pub fn class_receiver_mut<T: Class, R>(
    call: &Call<'_>,
    f: impl FnOnce(&mut T) -> R,
) -> VmResult<R> {
    let object = receiver_object::<T>(call)?;
    let mut this = object.try_borrow_mut().map_err(|_| borrowed::<T>(call))?;
    Ok(f(&mut this))
}
