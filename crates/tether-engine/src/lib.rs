//! Tether Engine - value marshaling and dynamic binding
//!
//! This crate moves values between Rust and the Tether runtime in both
//! directions and exposes Rust functions and types to scripts:
//!
//! - **Tags** ([`tags`]): per-field directives (`-`, `option`, `name=<x>`)
//!   parsed once per type and cached.
//! - **Registry** ([`registry`]): the classes known to an engine, keyed by
//!   host type and by a SHA-256 derived accessor name.
//! - **Decoder / Encoder**: kind-dispatched conversion with a dotted error
//!   path (`decoding <Args.2.Name> fail: ...`).
//! - **Invocation** ([`Binding`], [`ScriptFunction`]): typed host functions
//!   callable from scripts and typed script functions callable from Rust.
//! - **Classes** ([`Object`], [`ClassSpec`]): opaque projection by handle,
//!   with field access and methods resolved through an accessor table.
//!
//! # Example
//!
//! ```ignore
//! use tether_engine::{Binding, Engine, TableMapping};
//! use tether_engine::vm::Vm;
//!
//! #[derive(Default, TableMapping)]
//! struct Point {
//!     x: f64,
//!     #[tether("option")]
//!     y: f64,
//! }
//!
//! let engine = Engine::new(Vm::new());
//! engine.set_global_function(Binding::new("norm", |p: Point| p.x.hypot(p.y)));
//! ```

#![warn(missing_docs)]

extern crate self as tether_engine;

pub mod class;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod host;
pub mod invoke;
pub mod methods;
pub mod module;
pub mod object;
pub mod registry;
pub mod script;
pub mod tags;
pub mod trace;

pub use tether_native::{Class, TableMapping};
pub use tether_vm as vm;

pub use class::ClassSpec;
pub use config::EngineConfig;
pub use decoder::Decoder;
pub use encoder::Encoder;
pub use engine::Engine;
pub use error::{ConfigError, ConversionError, ConversionErrorKind, Direction, Error, Result};
pub use host::{Decode, Encode, HostFn, HostType, Kind, Receiver};
pub use invoke::{Binding, Call, FromReturns, HostFunction, IntoArgs, IntoReturns};
pub use methods::{MethodMut, MethodRef, Methods};
pub use module::Module;
pub use object::{FieldAccessor, Object};
pub use registry::{ClassDescriptor, Registry, WeakRegistry, ACCESSOR_PREFIX};
pub use script::ScriptFunction;
pub use tags::{FieldTag, FieldTags};
pub use trace::Trace;

// Traits share their names with the derives re-exported above; macros and
// types live in separate namespaces.
pub use host::TableMapping;
pub use object::Class;
