//! Tether Standard Library
//!
//! Native modules for the Tether engine. Install with
//! [`Engine::preload`](tether_engine::Engine::preload) and load from scripts
//! with `require("std")`.

#![warn(missing_docs)]

pub mod time;

use tether_engine::{Module, Object};

pub use time::{time_class, Time, TimeError, TIME_UUID};

/// Name of the standard module
pub const MODULE_NAME: &str = "std";

/// The `std` module: `now()` and the `Time` class
pub fn module() -> Module {
    tracing::trace!(module = MODULE_NAME, "building module");
    Module::new(MODULE_NAME)
        .function("now", || Object::new(Time::now()))
        .class(time_class())
}
