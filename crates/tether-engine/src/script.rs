//! Script functions called from the host

use std::fmt;
use std::marker::PhantomData;

use tether_vm::{Function, Value};

use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::engine::Engine;
use crate::error::{ConversionError, Error};
use crate::host::{Decode, Encode, HostType, Kind};
use crate::invoke::{FromReturns, IntoArgs};

/// A runtime function with a typed host signature.
///
/// `A` is a tuple of arguments (`()` for none), `R` the expected results.
/// Every call is protected: runtime errors, host panics inside native
/// functions and result conversion failures all come back as [`Error`].
pub struct ScriptFunction<A, R> {
    engine: Engine,
    function: Function,
    receiver: Option<Value>,
    _signature: PhantomData<fn(A) -> R>,
}

impl<A, R> ScriptFunction<A, R> {
    /// Wrap a runtime function
    pub fn new(engine: &Engine, function: Function) -> Self {
        Self {
            engine: engine.clone(),
            function,
            receiver: None,
            _signature: PhantomData,
        }
    }

    /// Prepend `receiver` to every call, as in `receiver:method(...)`
    pub fn bind(mut self, receiver: Value) -> Self {
        self.receiver = Some(receiver);
        self
    }

    /// The wrapped function
    pub fn function(&self) -> &Function {
        &self.function
    }
}

impl<A: IntoArgs, R: FromReturns> ScriptFunction<A, R> {
    /// Call the function
    pub fn call(&self, args: A) -> Result<R, Error> {
        let mut values = Vec::new();
        if let Some(receiver) = &self.receiver {
            values.push(receiver.clone());
        }
        args.into_args(&mut Encoder::new(&self.engine), &mut values)?;

        let results = self.engine.vm().pcall(
            &Value::Function(self.function.clone()),
            &values,
            Some(R::COUNT),
        )?;
        let out = R::from_returns(&mut Decoder::new(&self.engine), &results)?;
        Ok(out)
    }

    /// Turn into a plain host closure
    pub fn into_fn(self) -> impl Fn(A) -> Result<R, Error> {
        move |args| self.call(args)
    }
}

impl<A, R> Clone for ScriptFunction<A, R> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            function: self.function.clone(),
            receiver: self.receiver.clone(),
            _signature: PhantomData,
        }
    }
}

impl<A, R> fmt::Debug for ScriptFunction<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptFunction")
            .field("function", &self.function)
            .field("bound", &self.receiver.is_some())
            .finish()
    }
}

impl<A, R> HostType for ScriptFunction<A, R> {
    const KIND: Kind = Kind::PassThrough;
}

impl<A, R> Decode for ScriptFunction<A, R> {
    fn decode(de: &mut Decoder<'_>, src: &Value) -> Result<Self, ConversionError> {
        match src {
            Value::Function(function) => Ok(Self::new(de.engine(), function.clone())),
            other => Err(de.type_error(other, "function")),
        }
    }
}

impl<A, R> Encode for ScriptFunction<A, R> {
    fn encode(&self, _en: &mut Encoder<'_>) -> Result<Value, ConversionError> {
        Ok(Value::Function(self.function.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_vm::{Vm, VmError};

    #[test]
    fn test_call_and_decode() {
        let vm = Vm::new();
        vm.register("add", |vm| {
            let a = vm.arg(1).as_number().unwrap_or_default();
            let b = vm.arg(2).as_number().unwrap_or_default();
            vm.push(a + b);
            Ok(1)
        });
        let engine = Engine::new(vm);
        let add: ScriptFunction<(i32, i32), i64> = engine.global_function("add").unwrap();
        assert_eq!(add.call((2, 3)).unwrap(), 5);

        let add = add.into_fn();
        assert_eq!(add((10, -4)).unwrap(), 6);
    }

    #[test]
    fn test_runtime_error() {
        let vm = Vm::new();
        vm.register("fail", |_| Err(VmError::runtime("nope")));
        let engine = Engine::new(vm);
        let fail: ScriptFunction<(), ()> = engine.global_function("fail").unwrap();
        assert_eq!(
            fail.call(()).unwrap_err(),
            Error::Runtime(VmError::runtime("nope"))
        );
    }

    #[test]
    fn test_result_decode_error() {
        let vm = Vm::new();
        vm.register("word", |vm| {
            vm.push("word");
            Ok(1)
        });
        let engine = Engine::new(vm);
        let word: ScriptFunction<(), f64> = engine.global_function("word").unwrap();
        match word.call(()).unwrap_err() {
            Error::Conversion(e) => assert_eq!(e.path, "ret1"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bound_receiver() {
        let vm = Vm::new();
        vm.register("first", |vm| {
            let first = vm.arg(1);
            vm.push(first);
            Ok(1)
        });
        let engine = Engine::new(vm);
        let first: ScriptFunction<(i32,), String> = engine.global_function("first").unwrap();
        let bound = first.bind(Value::string("self"));
        assert_eq!(bound.call((1,)).unwrap(), "self");
    }
}
