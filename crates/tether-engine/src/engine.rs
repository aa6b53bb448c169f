//! Engine façade
//!
//! An [`Engine`] ties a runtime to the registry its classes are defined in
//! and to the encoding switches. It is cheap to clone; every clone shares
//! the same runtime and registry.
//!
//! Functions installed in the runtime only keep a weak reference to the
//! registry, so the runtime never keeps the engine alive. Calling such a
//! function after the last engine clone is dropped raises
//! `engine has been dropped`.

use std::any::TypeId;
use std::fmt;
use std::rc::Rc;

use tether_vm::{Function, Value, Vm, VmError, VmResult};

use crate::class::{self, ClassSpec};
use crate::config::EngineConfig;
use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::error::{ConversionError, Result};
use crate::host::{Decode, Encode};
use crate::invoke::Binding;
use crate::module::Module;
use crate::object::Class;
use crate::registry::{ClassDescriptor, Registry, WeakRegistry};
use crate::script::ScriptFunction;

/// Marshaling engine bound to one runtime.
#[derive(Clone)]
pub struct Engine {
    vm: Vm,
    registry: Registry,
    config: Rc<EngineConfig>,
}

impl Engine {
    /// Create an engine with a fresh registry and the default config
    pub fn new(vm: Vm) -> Self {
        Self::with_config(vm, EngineConfig::default())
    }

    /// Create an engine with a fresh registry
    pub fn with_config(vm: Vm, config: EngineConfig) -> Self {
        Self::with_registry(vm, Registry::new(), config)
    }

    /// Create an engine over an existing registry
    pub fn with_registry(vm: Vm, registry: Registry, config: EngineConfig) -> Self {
        Self {
            vm,
            registry,
            config: Rc::new(config),
        }
    }

    /// The runtime
    pub fn vm(&self) -> &Vm {
        &self.vm
    }

    /// The type registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encoding switches
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ========================================================================
    // Conversion
    // ========================================================================

    /// Encode a host value
    pub fn encode<T: Encode + ?Sized>(&self, value: &T) -> std::result::Result<Value, ConversionError> {
        Encoder::new(self).encode(value)
    }

    /// Decode a script value
    pub fn decode<T: Decode>(&self, value: &Value) -> std::result::Result<T, ConversionError> {
        Decoder::new(self).decode(value)
    }

    /// Decode a script value into an existing host value
    pub fn decode_into<T: Decode>(
        &self,
        value: &Value,
        dst: &mut T,
    ) -> std::result::Result<(), ConversionError> {
        Decoder::new(self).decode_into(value, dst)
    }

    // ========================================================================
    // Bindings
    // ========================================================================

    /// Register a class and install its accessor table.
    ///
    /// # Panics
    ///
    /// Panics if the type or its UUID is already registered.
    pub fn define_class<T: Class>(&self, spec: ClassSpec<T>) -> Rc<ClassDescriptor> {
        class::define(self, spec)
    }

    /// Display name of a class, or its Rust name when unregistered
    pub fn class_name<T: 'static>(&self) -> String {
        self.registry
            .lookup(TypeId::of::<T>())
            .map(|descriptor| descriptor.name.clone())
            .unwrap_or_else(|| std::any::type_name::<T>().to_string())
    }

    /// Build a runtime function from a binding
    pub fn function(&self, binding: Binding) -> Function {
        binding.into_function(self)
    }

    /// Install a binding as a global under its name
    pub fn set_global_function(&self, binding: Binding) {
        let name = binding.name().to_string();
        self.vm.set_global(&name, self.function(binding));
    }

    /// Wrap a runtime function with a typed signature
    pub fn script_function<A, R>(&self, function: Function) -> ScriptFunction<A, R> {
        ScriptFunction::new(self, function)
    }

    /// Look up a global function with a typed signature
    pub fn global_function<A, R>(&self, name: &str) -> Result<ScriptFunction<A, R>> {
        Ok(self.global(name)?)
    }

    /// Decode a global
    pub fn global<T: Decode>(&self, name: &str) -> std::result::Result<T, ConversionError> {
        let value = self.vm.get_global(name);
        Decoder::new(self).scoped(name, |de| de.decode(&value))
    }

    /// Encode a value into a global
    pub fn set_global<T: Encode + ?Sized>(
        &self,
        name: &str,
        value: &T,
    ) -> std::result::Result<(), ConversionError> {
        let value = Encoder::new(self).scoped(name, |en| en.encode(value))?;
        self.vm.set_global(name, value);
        Ok(())
    }

    /// Make a module available to `require`
    pub fn preload(&self, module: Module) {
        let handle = self.handle();
        let name = module.name().to_string();
        let module = Rc::new(module);
        let loader = Function::new(format!("require:{}", name), move |vm: &Vm| {
            let engine = handle.upgrade(vm)?;
            let table = module.load(&engine);
            tracing::debug!(module = module.name(), "loaded module");
            vm.push(table);
            Ok(1)
        });
        self.vm.preload(&name, loader);
    }

    pub(crate) fn handle(&self) -> EngineHandle {
        EngineHandle {
            registry: self.registry.downgrade(),
            config: Rc::clone(&self.config),
        }
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("classes", &self.registry.len())
            .field("config", &self.config)
            .finish()
    }
}

/// What a native function keeps to rebuild its engine
#[derive(Clone)]
pub(crate) struct EngineHandle {
    registry: WeakRegistry,
    config: Rc<EngineConfig>,
}

impl EngineHandle {
    pub(crate) fn upgrade(&self, vm: &Vm) -> VmResult<Engine> {
        let registry = self
            .registry
            .upgrade()
            .ok_or_else(|| VmError::runtime("engine has been dropped"))?;
        Ok(Engine {
            vm: vm.clone(),
            registry,
            config: Rc::clone(&self.config),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_globals_round_trip() {
        let engine = Engine::new(Vm::new());
        engine.set_global("answer", &42u32).unwrap();
        assert_eq!(engine.vm().get_global("answer"), Value::Number(42.0));
        assert_eq!(engine.global::<u32>("answer").unwrap(), 42);

        let err = engine.global::<String>("answer").unwrap_err();
        assert_eq!(err.path, "answer");
    }

    #[test]
    fn test_dropped_engine() {
        let vm = Vm::new();
        let engine = Engine::new(vm.clone());
        engine.set_global_function(Binding::new("one", || 1));
        drop(engine);
        let err = vm.call(&vm.get_global("one"), &[], None).unwrap_err();
        assert_eq!(err, VmError::runtime("engine has been dropped"));
    }

    #[test]
    fn test_shared_registry() {
        let vm = Vm::new();
        let engine = Engine::new(vm.clone());
        let other = Engine::with_registry(vm, engine.registry().clone(), EngineConfig::default());
        assert!(other.registry().ptr_eq(engine.registry()));
    }
}
