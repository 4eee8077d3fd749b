//! ModelMeta: schema metadata for Rust record types.
//!
//! `modelmeta` is the facade crate. It re-exports the core types, the
//! `#[derive(Model)]` macro, and provides [`Context`], the session-level owner
//! of a metadata [`Registry`].
//!
//! # Quick Start
//!
//! ```ignore
//! use modelmeta::prelude::*;
//!
//! #[derive(Model, Default)]
//! struct User {
//!     id: i64,
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
//!
//! let cx = Context::default();
//! let users = cx.resolve::<User>();
//! assert_eq!(users.storage_name, "users");
//!
//! let (_, emails) = users.relationships().next().unwrap();
//! assert_eq!(emails.kind, RelationshipKind::OneToMany);
//! assert_eq!(emails.foreign_key_columns, vec!["user_id"]);
//! ```
//!
//! # Binding
//!
//! ```ignore
//! let mut user = User::default();
//! cx.bind(&mut user, "id", "42")?;
//! assert_eq!(user.id, 42);
//! ```

extern crate self as modelmeta;

pub mod context;

pub use context::Context;
pub use modelmeta_core::*;
pub use modelmeta_core::decodable;
pub use modelmeta_macros::Model;

/// Commonly used items.
pub mod prelude {
    pub use crate::context::Context;
    pub use modelmeta_core::{
        Bindable, BoundField, Decode, DecodeError, Error, FieldDescriptor, Model, ModelMetadata,
        Readiness, Record, Registry, RegistryConfig, Relationship, RelationshipKind, Result,
        Shaped, Value, decodable,
    };
    pub use modelmeta_macros::Model;
}
