//! Procedural macros for ModelMeta.
//!
//! `#[derive(Model)]` builds the static descriptor table the registry reads,
//! and the field accessors the binder and projector use.
//!
//! # Attributes
//!
//! - `#[model(table_name = "...")]` on the struct: explicit table name.
//! - `#[model("key:value;flag")]` on a field: identity and relationship
//!   annotations (`primary_key`, `column`, `foreignkey`,
//!   `associationforeignkey`, `many2many`, `polymorphic`, `embedded`,
//!   `embedded_prefix`).
//! - `#[sql("...")]` on a field: storage settings (`type`, `size`,
//!   `not null`, `unique`, `default`, ...). `#[sql("-")]` ignores the field.
//! - `#[model(skip)]` on a field: ignore the field.
//! - `#[model(flatten)]` on a field: anonymous embedding, same as the
//!   `embedded` tag. Field names never imply embedding.
//!
//! Every field type that is not ignored must implement `Shaped` and
//! `Bindable`; nested model types must also implement `Default`.
//!
//! ```ignore
//! use modelmeta::Model;
//!
//! #[derive(Model, Default)]
//! struct User {
//!     id: i64,
//!     #[model("column:user_name")]
//!     name: String,
//!     emails: Vec<Email>,
//! }
//!
//! #[derive(Model, Default)]
//! struct Email {
//!     id: i64,
//!     user_id: i64,
//!     address: String,
//! }
//! ```

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod model_derive;

/// Derive `Model`, `Record`, `Shaped` and `Bindable` for a struct.
#[proc_macro_derive(Model, attributes(model, sql))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let def = match model_derive::parse_model(&input) {
        Ok(def) => def,
        Err(e) => return e.to_compile_error().into(),
    };

    model_derive::generate_model_impl(&def).into()
}
