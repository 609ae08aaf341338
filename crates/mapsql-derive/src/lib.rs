//! Derive macros for mapsql
//!
//! Provides `#[derive(FromRow)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod from_row;

/// Derive `FromRow` trait for a struct.
///
/// # Example
///
/// ```ignore
/// use mapsql::FromRow;
///
/// #[derive(FromRow)]
/// struct User {
///     id: i64,
///     username: String,
///     #[orm(column = "email_address")]
///     email: Option<String>,
///     #[orm(skip)]
///     cached_score: u32,
/// }
/// ```
///
/// # Generated
///
/// - `COLUMNS: &'static [&'static str]` - the columns this struct accepts
/// - `fn from_row(row: &mapsql::Row)` - reads each field with `Row::try_get`
///
/// # Attributes
///
/// - `#[orm(column = "name")]` - Map field to a different column name
/// - `#[orm(skip)]` - Not read from the row; filled with `Default::default()`
#[proc_macro_derive(FromRow, attributes(orm))]
pub fn derive_from_row(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    from_row::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
