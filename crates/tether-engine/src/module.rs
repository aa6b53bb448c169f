//! Modules loadable with `require`

use std::any::TypeId;
use std::fmt;
use std::rc::Rc;

use tether_vm::{Table, VmResult};

use crate::class::ClassSpec;
use crate::engine::Engine;
use crate::invoke::{Binding, Call, HostFunction};
use crate::object::Class;
use crate::registry::ClassDescriptor;

type ClassLoader = Rc<dyn Fn(&Engine) -> Rc<ClassDescriptor>>;

fn class_loader<F>(f: F) -> ClassLoader
where
    F: Fn(&Engine) -> Rc<ClassDescriptor> + 'static,
{
    Rc::new(f)
}

/// A named set of functions and classes.
///
/// Installed with [`Engine::preload`]; the module table is built the first
/// time a script requires it.
pub struct Module {
    name: String,
    functions: Vec<Binding>,
    classes: Vec<ClassLoader>,
}

impl Module {
    /// Create an empty module
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
            classes: Vec::new(),
        }
    }

    /// Name passed to `require`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a typed function
    pub fn function<M, F: HostFunction<M>>(self, name: &str, f: F) -> Self {
        self.binding(Binding::new(name, f))
    }

    /// Add a function working on the call frame directly
    pub fn call_function<F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&mut Call<'_>) -> VmResult<usize> + 'static,
    {
        self.binding(Binding::call(name, f))
    }

    /// Add a prepared binding
    pub fn binding(mut self, binding: Binding) -> Self {
        self.functions.push(binding);
        self
    }

    /// Add a class, exported under its display name.
    ///
    /// The class is defined when the module loads, unless the engine
    /// already knows it.
    pub fn class<T: Class>(mut self, spec: ClassSpec<T>) -> Self {
        self.classes.push(class_loader(move |engine| {
            match engine.registry().lookup(TypeId::of::<T>()) {
                Some(descriptor) => descriptor,
                None => engine.define_class(spec.clone()),
            }
        }));
        self
    }

    /// Build the module table
    pub fn load(&self, engine: &Engine) -> Table {
        let table = Table::new();
        for binding in &self.functions {
            table.set(binding.name(), binding.clone().into_function(engine));
        }
        for loader in &self.classes {
            let descriptor = loader(engine);
            table.set(&descriptor.name, descriptor.metatable.clone());
        }
        table
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("functions", &self.functions)
            .field("classes", &self.classes.len())
            .finish()
    }
}
