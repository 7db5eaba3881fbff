//! Procedural macros for tola-datahash
//!
//! Provides `#[derive(Reflect)]`, which describes a type to the hashing engine.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod reflect;

/// Derive `Typed`, `Reflect` and the matching access trait.
///
/// # Container options
///
/// `#[reflect(...)]` on the type declares capabilities:
///
/// | option        | requires                  | used when                  |
/// |---------------|---------------------------|----------------------------|
/// | `hash_writer` | `impl HashWriter`         | always                     |
/// | `binary`      | `impl MarshalBinary`      | `binary` option or tag     |
/// | `text`        | `impl MarshalText`        | `text` option or tag       |
/// | `json`        | `impl serde::Serialize`   | `json` option or tag       |
/// | `display`     | `impl Display`            | `string` option or tag     |
/// | `opaque`      | at least one of the above | hide the structure         |
///
/// # Field options
///
/// - `#[reflect(skip)]` leaves the field out entirely; its type need not
///   implement `Reflect`.
/// - `#[tag(datahash = "set,ignorezero")]` attaches a runtime tag, read under
///   the hasher's configured tag key.
///
/// ```ignore
/// #[derive(Reflect)]
/// struct Order {
///     id: u64,
///     #[tag(datahash = "set")]
///     items: Vec<String>,
///     #[tag(datahash = "-")]
///     updated_at: i64,
/// }
/// ```
#[proc_macro_derive(Reflect, attributes(reflect, tag))]
pub fn derive_reflect(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    reflect::expand(input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}
