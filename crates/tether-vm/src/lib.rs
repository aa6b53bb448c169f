//! Tether VM - minimal embedded scripting runtime
//!
//! This crate provides the runtime primitives the Tether engine marshals
//! values through: a value stack with call frames, tables with metatables,
//! userdata, channels, globals, protected calls and module preloading.
//!
//! There is no parser or bytecode. A script function is a [`Function`]
//! whose body is a native closure following the stack calling convention.
//!
//! # Example
//!
//! ```ignore
//! use tether_vm::{Vm, Value};
//!
//! let vm = Vm::new();
//! vm.register("add", |vm| {
//!     let a = vm.arg(1).as_number().unwrap_or_default();
//!     let b = vm.arg(2).as_number().unwrap_or_default();
//!     vm.push(a + b);
//!     Ok(1)
//! });
//! let out = vm.call(&vm.get_global("add"), &[1.into(), 2.into()], Some(1))?;
//! ```

#![warn(missing_docs)]

pub mod channel;
pub mod config;
pub mod error;
pub mod function;
pub mod state;
pub mod table;
pub mod userdata;
pub mod value;

pub use channel::Channel;
pub use config::VmConfig;
pub use error::{VmError, VmResult};
pub use function::{Function, NativeFn};
pub use state::Vm;
pub use table::Table;
pub use userdata::{UserData, WeakUserData};
pub use value::{Value, ValueType};
