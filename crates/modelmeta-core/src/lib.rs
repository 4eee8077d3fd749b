//! Core types and traits for ModelMeta.
//!
//! `modelmeta-core` turns record types into schema descriptions: column names,
//! primary keys, and relationships to other record types, inferred from each
//! type's shape and per-field annotations.
//!
//! # Role In The Architecture
//!
//! - **Descriptor tables**: `#[derive(Model)]` (in `modelmeta-macros`) emits one
//!   static [`ModelShape`] per type. No runtime reflection is involved.
//! - **Registry**: [`Registry`] resolves and caches [`ModelMetadata`] per type,
//!   safely under concurrent first use and across mutually referential types.
//! - **Resolver**: classifies fields as columns, embedded structs, or
//!   relationships, and wires foreign keys and join tables.
//! - **Binding**: [`project`] and [`bind`] read and write fields of live
//!   records through [`Bindable`] handles, with a [`Decode`] hook for custom
//!   column types.
//!
//! # Who Uses This Crate
//!
//! - `modelmeta-macros` generates the [`Model`], [`Record`], [`Shaped`] and
//!   [`Bindable`] implementations defined here.
//! - SQL generators, migrators and association loaders consume
//!   [`ModelMetadata`] and [`Relationship`].
//!
//! Most applications should use the `modelmeta` facade.

pub mod bindable;
pub mod binder;
pub mod config;
pub mod error;
pub mod field;
pub mod metadata;
pub mod naming;
pub mod projector;
pub mod registry;
pub mod relationship;
mod resolver;
pub mod shape;
pub mod tags;
pub mod value;

pub use bindable::{Bindable, Decode};
pub use binder::{bind, bind_path};
pub use config::{RegistryConfig, TableNameHandler};
pub use error::{ConvertError, DecodeError, Error, Result};
pub use field::FieldDescriptor;
pub use metadata::ModelMetadata;
pub use naming::{default_table_name, pluralize, singularize, to_storage_name};
pub use projector::{BoundField, project};
pub use registry::{Readiness, Registry};
pub use relationship::{JoinTable, JoinTableSide, Polymorphic, Relationship, RelationshipKind};
pub use shape::{FieldDecl, Model, ModelShape, ModelType, Record, Shaped, TypeShape};
pub use tags::{FieldSettings, TagSettings, parse_tag_settings};
pub use value::Value;
