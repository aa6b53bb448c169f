// tether-native: derive macros for the Tether marshaling engine
//
// Provides:
// - #[derive(TableMapping)] - Converts a struct to and from a script table
// - #[derive(Class)] - Projects a struct as an opaque script class
//
// Example:
// ```
// use tether_engine::{Class, TableMapping};
//
// #[derive(Default, TableMapping)]
// struct Config {
//     host: String,
//     #[tether("option")]
//     port: u16,
//     #[tether("-")]
//     cache: Vec<u8>,
// }
//
// #[derive(Class)]
// #[tether(methods = point_methods)]
// struct Point {
//     x: f64,
//     y: f64,
// }
// ```

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod attrs;
mod class;
mod mapping;

/// Derives table conversion for a struct with named fields.
///
/// Generates implementations of `HostType`, `TableMapping`, `Encode`,
/// `Decode` and `Receiver`. The struct must implement `Default`, which is
/// the starting point of every decode.
///
/// Field annotations are carried verbatim to the runtime tag parser:
///
/// ```ignore
/// #[derive(Default, TableMapping)]
/// #[tether(standalone, methods = user_methods)]
/// struct User {
///     #[tether("name=login")]
///     name: String,
///     #[tether("option")]
///     email: Option<String>,
///     #[tether("-")]
///     session: Vec<u8>,
/// }
/// ```
///
/// Fields annotated with `-` are left out of the generated code entirely, so
/// their types need not be convertible.
///
/// Every field is required unless tagged `option`, whatever its type. An
/// `Option<T>` field holding `None` encodes as an absent key, so decoding
/// that table back fails with `FieldNotFound` unless the field carries the
/// `option` tag.
#[proc_macro_derive(TableMapping, attributes(tether))]
pub fn derive_table_mapping(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    mapping::expand_table_mapping(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derives the opaque class projection for a struct with named fields.
///
/// Generates an implementation of `Class` with one field accessor per
/// non-skipped field, plus `Receiver` so the type can be used with
/// `Methods`. The struct itself is marked as a plain struct kind: it is
/// projected only through `Object<T>`, and converting it by value fails.
///
/// ```ignore
/// #[derive(Class)]
/// #[tether(methods = counter_methods)]
/// struct Counter {
///     value: i64,
/// }
///
/// fn counter_methods() -> Methods<Counter> {
///     Methods::new().method_mut("inc", |c: &mut Counter, by: i64| c.value += by)
/// }
/// ```
#[proc_macro_derive(Class, attributes(tether))]
pub fn derive_class(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    class::expand_class(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
