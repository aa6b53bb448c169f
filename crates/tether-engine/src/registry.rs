//! Type registry
//!
//! Maps host type identity to the class descriptor it was registered
//! with. One registry belongs to one engine/runtime pair and is handed to
//! every encoder, decoder and binding explicitly.

use std::any::TypeId;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;
use sha2::{Digest, Sha256};
use tether_vm::Table;

use crate::error::ConfigError;

/// Prefix of every generated accessor name
pub const ACCESSOR_PREFIX: &str = "TETHERMETA";

/// Metadata of a registered class.
#[derive(Debug, Clone)]
pub struct ClassDescriptor {
    /// Stable cross-process identity
    pub uuid: String,
    /// Script-visible class name
    pub name: String,
    /// Host type identity
    pub type_id: TypeId,
    /// Rust type name, for diagnostics
    pub type_name: &'static str,
    /// Generated accessor-table name, derived from the UUID
    pub accessor: String,
    /// The accessor table itself
    pub metatable: Table,
}

impl ClassDescriptor {
    /// Derive the accessor name for a UUID
    pub fn accessor_name(uuid: &str) -> String {
        let digest = Sha256::digest(uuid.as_bytes());
        format!("{}{}", ACCESSOR_PREFIX, hex::encode_upper(&digest[..16]))
    }
}

#[derive(Default)]
struct TypeRegistry {
    classes: FxHashMap<TypeId, Rc<ClassDescriptor>>,
    accessors: FxHashMap<String, TypeId>,
    /// Method tables of mappings, `None` when the mapping has no methods
    mapping_metatables: FxHashMap<TypeId, Option<Table>>,
}

/// Shared handle to a type registry.
#[derive(Clone, Default)]
pub struct Registry(Rc<RefCell<TypeRegistry>>);

/// Non-owning handle to a [`Registry`]
#[derive(Clone)]
pub struct WeakRegistry(Weak<RefCell<TypeRegistry>>);

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class.
    ///
    /// # Panics
    ///
    /// Panics if the host type or the accessor name is already registered.
    pub fn define(&self, descriptor: ClassDescriptor) -> Rc<ClassDescriptor> {
        self.try_define(descriptor).unwrap_or_else(|e| panic!("{}", e))
    }

    /// Register a class, reporting conflicts instead of panicking
    pub fn try_define(&self, descriptor: ClassDescriptor) -> Result<Rc<ClassDescriptor>, ConfigError> {
        let mut inner = self.0.borrow_mut();
        if inner.classes.contains_key(&descriptor.type_id) {
            return Err(ConfigError::DuplicateClass {
                name: descriptor.name,
                uuid: descriptor.uuid,
            });
        }
        if let Some(owner) = inner.accessors.get(&descriptor.accessor) {
            let owner = inner
                .classes
                .get(owner)
                .map(|d| d.name.clone())
                .unwrap_or_default();
            return Err(ConfigError::DuplicateAccessor {
                accessor: descriptor.accessor,
                name: descriptor.name,
                uuid: descriptor.uuid,
                owner,
            });
        }

        let descriptor = Rc::new(descriptor);
        inner
            .accessors
            .insert(descriptor.accessor.clone(), descriptor.type_id);
        inner.classes.insert(descriptor.type_id, descriptor.clone());
        Ok(descriptor)
    }

    /// Look up the descriptor of a host type
    pub fn lookup(&self, type_id: TypeId) -> Option<Rc<ClassDescriptor>> {
        self.0.borrow().classes.get(&type_id).cloned()
    }

    /// Look up a descriptor by accessor name
    pub fn lookup_accessor(&self, accessor: &str) -> Option<Rc<ClassDescriptor>> {
        let inner = self.0.borrow();
        let type_id = inner.accessors.get(accessor)?;
        inner.classes.get(type_id).cloned()
    }

    /// Check whether `T` is registered
    pub fn is_defined<T: 'static>(&self) -> bool {
        self.0.borrow().classes.contains_key(&TypeId::of::<T>())
    }

    /// Number of registered classes
    pub fn len(&self) -> usize {
        self.0.borrow().classes.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All registered descriptors
    pub fn descriptors(&self) -> Vec<Rc<ClassDescriptor>> {
        self.0.borrow().classes.values().cloned().collect()
    }

    pub(crate) fn mapping_metatable(&self, type_id: TypeId) -> Option<Option<Table>> {
        self.0.borrow().mapping_metatables.get(&type_id).cloned()
    }

    pub(crate) fn cache_mapping_metatable(&self, type_id: TypeId, metatable: Option<Table>) {
        self.0
            .borrow_mut()
            .mapping_metatables
            .insert(type_id, metatable);
    }

    /// Create a non-owning handle
    pub fn downgrade(&self) -> WeakRegistry {
        WeakRegistry(Rc::downgrade(&self.0))
    }

    /// Check whether two handles refer to the same registry
    pub fn ptr_eq(&self, other: &Registry) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl WeakRegistry {
    /// Upgrade to a strong handle if the registry is still alive
    pub fn upgrade(&self) -> Option<Registry> {
        self.0.upgrade().map(Registry)
    }
}
