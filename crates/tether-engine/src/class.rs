//! Class projector
//!
//! Registers a [`Class`] type and builds its accessor table: the metatable
//! shared by every handle of the class. Field accessors and method functions
//! are resolved once here, so `__index` and `__newindex` are a hash lookup
//! plus one typed conversion.

use std::any::{type_name, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tether_vm::{Function, Value, Vm, VmResult};

use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::engine::Engine;
use crate::error::ConversionErrorKind;
use crate::invoke::{native_function, Binding, HostFunction};
use crate::object::{handle_type_name, Class, FieldAccessor, Object};
use crate::registry::ClassDescriptor;
use crate::tags::FieldTags;

/// Registration parameters of a class.
pub struct ClassSpec<T> {
    uuid: String,
    name: String,
    statics: Vec<Binding>,
    _marker: PhantomData<fn(T)>,
}

impl<T: Class> ClassSpec<T> {
    /// `uuid` identifies the class across processes, `name` is shown to
    /// scripts
    pub fn new(uuid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            name: name.into(),
            statics: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Add a function to the accessor table
    pub fn static_fn<M, F: HostFunction<M>>(self, name: &str, f: F) -> Self {
        self.static_binding(Binding::new(name, f))
    }

    /// Add a prepared binding to the accessor table
    pub fn static_binding(mut self, binding: Binding) -> Self {
        self.statics.push(binding);
        self
    }

    /// Add the `new` static
    pub fn constructor<M, F: HostFunction<M>>(self, f: F) -> Self {
        self.static_fn("new", f)
    }

    /// Class UUID
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> Clone for ClassSpec<T> {
    fn clone(&self) -> Self {
        Self {
            uuid: self.uuid.clone(),
            name: self.name.clone(),
            statics: self.statics.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for ClassSpec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassSpec")
            .field("uuid", &self.uuid)
            .field("name", &self.name)
            .field("statics", &self.statics)
            .finish()
    }
}

/// Precomputed per-class lookup tables
struct ClassLayout<T> {
    name: String,
    fields: FxHashMap<String, FieldAccessor<T>>,
    methods: FxHashMap<String, Function>,
}

impl<T: Class> ClassLayout<T> {
    fn build(engine: &Engine, name: &str) -> Self {
        let tags = FieldTags::of::<T>(T::raw_tags());
        let mut fields = FxHashMap::default();
        for accessor in T::fields() {
            let tag = tags.iter().find(|tag| tag.field == accessor.field);
            match tag {
                Some(tag) if tag.skip => {}
                Some(tag) => {
                    fields.insert(tag.name.clone(), accessor);
                }
                None => {
                    fields.insert(accessor.field.to_string(), accessor);
                }
            }
        }

        let methods = T::methods()
            .into_entries()
            .into_iter()
            .map(|(method, body)| {
                let function = native_function(engine.handle(), &method, body, false);
                (method, function)
            })
            .collect();

        Self {
            name: name.to_string(),
            fields,
            methods,
        }
    }

    /// Argument #1 must be a handle of exactly `T`
    fn receiver(&self, vm: &Vm) -> VmResult<Object<T>> {
        let found = match vm.arg(1) {
            Value::UserData(ud) => match ud.payload::<Object<T>>() {
                Some(object) => return Ok(object.clone()),
                None => handle_type_name(&ud),
            },
            other => other.type_name().to_string(),
        };
        Err(vm.arg_error(1, format!("{} expected, got {}", self.name, found)))
    }

    fn index(&self, engine: &Engine, vm: &Vm) -> VmResult<usize> {
        let object = self.receiver(vm)?;
        let key = vm.check_string(2)?;

        if let Some(field) = self.fields.get(&*key) {
            let mut en = Encoder::new(engine);
            let value = en.scoped(&*key, |en| match object.try_borrow() {
                Ok(this) => (field.get)(&*this, en),
                Err(_) => Err(en.error(ConversionErrorKind::NotAddressable {
                    type_name: self.name.clone(),
                })),
            })?;
            vm.push(value);
            return Ok(1);
        }
        if let Some(method) = self.methods.get(&*key) {
            vm.push(method.clone());
            return Ok(1);
        }
        Err(vm.runtime_error(format!("element {} not found.", key)))
    }

    fn new_index(&self, engine: &Engine, vm: &Vm) -> VmResult<usize> {
        let object = self.receiver(vm)?;
        let key = vm.check_string(2)?;
        let value = vm.arg(3);

        if let Some(field) = self.fields.get(&*key) {
            let mut de = Decoder::new(engine);
            de.scoped(&*key, |de| match object.try_borrow_mut() {
                Ok(mut this) => (field.set)(&mut *this, de, &value),
                Err(_) => Err(de.error(ConversionErrorKind::NotAddressable {
                    type_name: self.name.clone(),
                })),
            })?;
            return Ok(0);
        }
        if self.methods.contains_key(&*key) {
            return Err(vm.runtime_error(format!("method {} is not assignable.", key)));
        }
        Err(vm.runtime_error(format!("element {} not found.", key)))
    }
}

/// Register `T` and install its accessor table.
///
/// # Panics
///
/// Panics if `T` or the UUID is already registered, or if a field tag is
/// malformed.
pub(crate) fn define<T: Class>(engine: &Engine, spec: ClassSpec<T>) -> Rc<ClassDescriptor> {
    let accessor = ClassDescriptor::accessor_name(&spec.uuid);
    let (metatable, _) = engine.vm().new_type_metatable(&accessor);
    let descriptor = engine.registry().define(ClassDescriptor {
        uuid: spec.uuid.clone(),
        name: spec.name.clone(),
        type_id: TypeId::of::<T>(),
        type_name: type_name::<T>(),
        accessor: accessor.clone(),
        metatable: metatable.clone(),
    });

    let layout = Rc::new(ClassLayout::<T>::build(engine, &spec.name));

    let handle = engine.handle();
    let index = {
        let layout = Rc::clone(&layout);
        Function::new("__index", move |vm: &Vm| {
            let engine = handle.upgrade(vm)?;
            layout.index(&engine, vm)
        })
    };
    let handle = engine.handle();
    let new_index = Function::new("__newindex", move |vm: &Vm| {
        let engine = handle.upgrade(vm)?;
        layout.new_index(&engine, vm)
    });

    metatable.set("__index", index);
    metatable.set("__newindex", new_index);
    metatable.set("__name", spec.name.as_str());
    metatable.set("__uuid", spec.uuid.as_str());
    for binding in spec.statics {
        let name = binding.name().to_string();
        metatable.set(&name, binding.into_function(engine));
    }
    engine.vm().set_global(&accessor, metatable);

    tracing::debug!(
        class = %descriptor.name,
        uuid = %descriptor.uuid,
        accessor = %descriptor.accessor,
        "defined class"
    );
    descriptor
}
