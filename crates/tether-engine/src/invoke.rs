//! Function invocation adapter
//!
//! Host functions become runtime [`Function`]s through [`Binding`]. The
//! argument list of a binding is decoded from the current frame, the return
//! value is encoded back through [`IntoReturns`]. The reverse direction,
//! calling script functions from the host, lives in [`crate::script`] and
//! uses [`IntoArgs`] and [`FromReturns`].

use std::fmt;
use std::rc::Rc;

use tether_vm::{Function, Value, Vm, VmError, VmResult};

use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::engine::{Engine, EngineHandle};
use crate::error::ConversionError;
use crate::host::{Decode, Encode};

/// Type-erased native body shared by bindings and methods
pub(crate) type Body = Rc<dyn Fn(&mut Call<'_>) -> VmResult<usize>>;

pub(crate) fn body<F>(f: F) -> Body
where
    F: Fn(&mut Call<'_>) -> VmResult<usize> + 'static,
{
    Rc::new(f)
}

/// Wrap a body into a runtime function that rebuilds its engine per call
pub(crate) fn native_function(
    handle: EngineHandle,
    name: &str,
    body: Body,
    errors_as_values: bool,
) -> Function {
    Function::new(name, move |vm: &Vm| {
        let engine = handle.upgrade(vm)?;
        let mut call = Call::new(&engine, vm, errors_as_values);
        body(&mut call)
    })
}

// ============================================================================
// Call context
// ============================================================================

/// The frame of a native call, with typed access to arguments and results.
pub struct Call<'a> {
    engine: &'a Engine,
    vm: &'a Vm,
    errors_as_values: bool,
}

impl<'a> Call<'a> {
    pub(crate) fn new(engine: &'a Engine, vm: &'a Vm, errors_as_values: bool) -> Self {
        Self {
            engine,
            vm,
            errors_as_values,
        }
    }

    /// The runtime
    pub fn vm(&self) -> &'a Vm {
        self.vm
    }

    /// The engine the function was bound with
    pub fn engine(&self) -> &'a Engine {
        self.engine
    }

    /// Number of arguments
    pub fn top(&self) -> usize {
        self.vm.top()
    }

    /// Raw arguments in order
    pub fn args(&self) -> Vec<Value> {
        self.vm.args()
    }

    /// Decode argument `n` (1-based).
    ///
    /// Nil maps to the type's zero value when it has one.
    pub fn arg<T: Decode>(&self, n: usize) -> VmResult<T> {
        let value = self.vm.arg(n);
        if value.is_nil() {
            if let Some(zero) = T::zero() {
                return Ok(zero);
            }
        }
        Decoder::new(self.engine)
            .decode::<T>(&value)
            .map_err(|e| self.vm.arg_error(n, e.to_string()))
    }

    /// Argument error for position `n`
    pub fn arg_error(&self, n: usize, message: impl Into<String>) -> VmError {
        self.vm.arg_error(n, message)
    }

    /// Encode and push one result
    pub fn push<T: Encode + ?Sized>(&self, value: &T) -> VmResult<()> {
        let value = Encoder::new(self.engine).encode(value)?;
        self.vm.push(value);
        Ok(())
    }

    /// Push a list of results and return how many were pushed
    pub fn ret<R: IntoReturns>(&self, values: R) -> VmResult<usize> {
        values.push_returns(self)
    }

    /// Whether `Err` returns are reported as trailing values
    pub fn errors_as_values(&self) -> bool {
        self.errors_as_values
    }
}

// ============================================================================
// Returns
// ============================================================================

/// A host value list returned to the runtime.
///
/// `()` pushes nothing, any [`Encode`] type pushes one value and tuples
/// push one value per element. `Result<T, E>` pushes `T`'s values or raises
/// the error, see [`Binding::errors_as_values`] for the other convention.
pub trait IntoReturns {
    /// Declared number of outputs, excluding the error slot of a `Result`
    const COUNT: usize;

    /// Push the values on the frame
    fn push_returns(self, call: &Call<'_>) -> VmResult<usize>;
}

impl IntoReturns for () {
    const COUNT: usize = 0;

    fn push_returns(self, _call: &Call<'_>) -> VmResult<usize> {
        Ok(0)
    }
}

impl<T: Encode> IntoReturns for T {
    const COUNT: usize = 1;

    fn push_returns(self, call: &Call<'_>) -> VmResult<usize> {
        call.push(&self)?;
        Ok(1)
    }
}

impl<T: IntoReturns, E: fmt::Display> IntoReturns for Result<T, E> {
    const COUNT: usize = T::COUNT;

    fn push_returns(self, call: &Call<'_>) -> VmResult<usize> {
        match self {
            Ok(values) => {
                let pushed = values.push_returns(call)?;
                if call.errors_as_values() {
                    call.vm().push(Value::Nil);
                    return Ok(pushed + 1);
                }
                Ok(pushed)
            }
            Err(e) if call.errors_as_values() => {
                for _ in 0..T::COUNT {
                    call.vm().push(Value::Nil);
                }
                call.vm().push(Value::string(e.to_string()));
                Ok(T::COUNT + 1)
            }
            Err(e) => Err(VmError::runtime(e.to_string())),
        }
    }
}

/// Results of a script call decoded into host values
pub trait FromReturns: Sized {
    /// Number of results requested from the runtime
    const COUNT: usize;

    /// Decode the results, missing ones read as nil
    fn from_returns(de: &mut Decoder<'_>, values: &[Value]) -> Result<Self, ConversionError>;
}

impl FromReturns for () {
    const COUNT: usize = 0;

    fn from_returns(_de: &mut Decoder<'_>, _values: &[Value]) -> Result<Self, ConversionError> {
        Ok(())
    }
}

impl<T: Decode> FromReturns for T {
    const COUNT: usize = 1;

    fn from_returns(de: &mut Decoder<'_>, values: &[Value]) -> Result<Self, ConversionError> {
        let value = values.first().cloned().unwrap_or_default();
        de.scoped("ret1", |de| de.decode(&value))
    }
}

/// Host values passed as arguments to a script call
pub trait IntoArgs {
    /// Encode every argument into `out`
    fn into_args(self, en: &mut Encoder<'_>, out: &mut Vec<Value>) -> Result<(), ConversionError>;
}

impl IntoArgs for () {
    fn into_args(self, _en: &mut Encoder<'_>, _out: &mut Vec<Value>) -> Result<(), ConversionError> {
        Ok(())
    }
}

macro_rules! tuple_lists {
    ($count:literal; $($name:ident $idx:tt $pos:literal),+) => {
        impl<$($name: Encode),+> IntoReturns for ($($name,)+) {
            const COUNT: usize = $count;

            fn push_returns(self, call: &Call<'_>) -> VmResult<usize> {
                $(call.push(&self.$idx)?;)+
                Ok($count)
            }
        }

        impl<$($name: Decode),+> FromReturns for ($($name,)+) {
            const COUNT: usize = $count;

            fn from_returns(de: &mut Decoder<'_>, values: &[Value]) -> Result<Self, ConversionError> {
                Ok(($(
                    {
                        let value = values.get($idx).cloned().unwrap_or_default();
                        de.scoped(concat!("ret", $pos), |de| de.decode::<$name>(&value))?
                    },
                )+))
            }
        }

        impl<$($name: Encode),+> IntoArgs for ($($name,)+) {
            fn into_args(self, en: &mut Encoder<'_>, out: &mut Vec<Value>) -> Result<(), ConversionError> {
                $(out.push(en.scoped(concat!("arg", $pos), |en| en.encode(&self.$idx))?);)+
                Ok(())
            }
        }
    };
}

tuple_lists!(1; A 0 1);
tuple_lists!(2; A 0 1, B 1 2);
tuple_lists!(3; A 0 1, B 1 2, C 2 3);
tuple_lists!(4; A 0 1, B 1 2, C 2 3, D 3 4);
tuple_lists!(5; A 0 1, B 1 2, C 2 3, D 3 4, E 4 5);
tuple_lists!(6; A 0 1, B 1 2, C 2 3, D 3 4, E 4 5, F 5 6);
tuple_lists!(7; A 0 1, B 1 2, C 2 3, D 3 4, E 4 5, F 5 6, G 6 7);
tuple_lists!(8; A 0 1, B 1 2, C 2 3, D 3 4, E 4 5, F 5 6, G 6 7, H 7 8);

// ============================================================================
// Host functions
// ============================================================================

/// A host closure callable from the runtime.
///
/// Implemented for `Fn(A1, .., An) -> R` with up to eight arguments, where
/// every argument is [`Decode`] and `R` is [`IntoReturns`]. `Marker` only
/// disambiguates the arities.
pub trait HostFunction<Marker>: 'static {
    /// Decode the arguments, call, push the results
    fn invoke(&self, call: &mut Call<'_>) -> VmResult<usize>;
}

macro_rules! host_function {
    ($($arg:ident: $ty:ident = $pos:literal),*) => {
        impl<Func, R, $($ty),*> HostFunction<fn($($ty),*) -> R> for Func
        where
            Func: Fn($($ty),*) -> R + 'static,
            R: IntoReturns,
            $($ty: Decode,)*
        {
            fn invoke(&self, call: &mut Call<'_>) -> VmResult<usize> {
                $(let $arg = call.arg::<$ty>($pos)?;)*
                let out = self($($arg),*);
                call.ret(out)
            }
        }
    };
}

host_function!();
host_function!(a1: A1 = 1);
host_function!(a1: A1 = 1, a2: A2 = 2);
host_function!(a1: A1 = 1, a2: A2 = 2, a3: A3 = 3);
host_function!(a1: A1 = 1, a2: A2 = 2, a3: A3 = 3, a4: A4 = 4);
host_function!(a1: A1 = 1, a2: A2 = 2, a3: A3 = 3, a4: A4 = 4, a5: A5 = 5);
host_function!(a1: A1 = 1, a2: A2 = 2, a3: A3 = 3, a4: A4 = 4, a5: A5 = 5, a6: A6 = 6);
host_function!(a1: A1 = 1, a2: A2 = 2, a3: A3 = 3, a4: A4 = 4, a5: A5 = 5, a6: A6 = 6, a7: A7 = 7);
host_function!(a1: A1 = 1, a2: A2 = 2, a3: A3 = 3, a4: A4 = 4, a5: A5 = 5, a6: A6 = 6, a7: A7 = 7, a8: A8 = 8);

/// A named host function ready to be installed in the runtime.
#[derive(Clone)]
pub struct Binding {
    name: String,
    body: Body,
    errors_as_values: bool,
}

impl Binding {
    /// Bind a typed closure
    pub fn new<M, F: HostFunction<M>>(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            body: body(move |call| f.invoke(call)),
            errors_as_values: false,
        }
    }

    /// Bind a closure that works on the call frame directly
    pub fn call<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Call<'_>) -> VmResult<usize> + 'static,
    {
        Self {
            name: name.into(),
            body: body(f),
            errors_as_values: false,
        }
    }

    /// Report `Err` returns as trailing values instead of raising.
    ///
    /// A `Result<T, E>` return then always yields `T`'s arity plus one
    /// values: the results followed by nil, or nils followed by the message.
    pub fn errors_as_values(mut self) -> Self {
        self.errors_as_values = true;
        self
    }

    /// Name used in argument errors
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Build the runtime function
    pub fn into_function(self, engine: &Engine) -> Function {
        tracing::trace!(name = %self.name, errors_as_values = self.errors_as_values, "binding function");
        native_function(engine.handle(), &self.name, self.body, self.errors_as_values)
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("name", &self.name)
            .field("errors_as_values", &self.errors_as_values)
            .finish()
    }
}
