//! Static descriptor tables and the traits the derive implements.
//!
//! Every model type carries one `static` [`ModelShape`] emitted by
//! `#[derive(Model)]`. The registry reads these tables instead of inspecting
//! values at runtime. Related types are referenced through [`ModelType`],
//! which stores a function pointer to the related table, so two types can
//! name each other without compile-time recursion.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Serialize, Serializer};

use crate::bindable::Bindable;

/// How a field's Rust type participates in the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeShape {
    /// Plain storable value (numbers, text, bytes, JSON, ...).
    Scalar,
    /// Storable value with a custom decode hook.
    Decoder,
    /// Recognized date/time type.
    Temporal,
    /// A nested model.
    Record(ModelType),
    /// A collection of nested models.
    Sequence(ModelType),
}

impl TypeShape {
    /// True for shapes stored directly in a column.
    pub const fn is_storable(&self) -> bool {
        matches!(
            self,
            TypeShape::Scalar | TypeShape::Decoder | TypeShape::Temporal
        )
    }
}

/// Maps a Rust type to its [`TypeShape`].
///
/// Implemented for the primitive column types in this crate, for every
/// `#[derive(Model)]` type, and transparently through `Option`, `Box` and
/// `Vec`.
pub trait Shaped {
    /// The schema shape of `Self`.
    fn type_shape() -> TypeShape;
}

/// One field declaration in a [`ModelShape`].
#[derive(Debug, Clone, Copy)]
pub struct FieldDecl {
    /// Declared Rust field name.
    pub name: &'static str,
    /// Raw model annotation (`#[model("...")]`).
    pub model_tag: &'static str,
    /// Raw storage annotation (`#[sql("...")]`).
    pub sql_tag: &'static str,
    /// Explicit ignore marker.
    pub ignored: bool,
    /// Anonymous embedding marker (`#[model(flatten)]`).
    pub anonymous: bool,
    /// Shape of the field's type.
    pub shape: fn() -> TypeShape,
}

fn scalar_shape() -> TypeShape {
    TypeShape::Scalar
}

impl FieldDecl {
    /// Declare a field with the given shape function.
    pub const fn new(name: &'static str, shape: fn() -> TypeShape) -> Self {
        Self {
            name,
            model_tag: "",
            sql_tag: "",
            ignored: false,
            anonymous: false,
            shape,
        }
    }

    /// Declare an ignored field. Its type is never inspected.
    pub const fn ignored(name: &'static str) -> Self {
        let mut decl = Self::new(name, scalar_shape);
        decl.ignored = true;
        decl
    }

    /// Attach the model annotation.
    pub const fn model_tag(mut self, tag: &'static str) -> Self {
        self.model_tag = tag;
        self
    }

    /// Attach the storage annotation.
    pub const fn sql_tag(mut self, tag: &'static str) -> Self {
        self.sql_tag = tag;
        self
    }

    /// Mark as anonymously embedded. The resolver treats it like `EMBEDDED`.
    pub const fn anonymous(mut self, value: bool) -> Self {
        self.anonymous = value;
        self
    }
}

/// Static description of a model type.
#[derive(Debug)]
pub struct ModelShape {
    /// Rust type name.
    pub name: &'static str,
    /// Explicit table name override (`#[model(table_name = "...")]`).
    pub table_name: Option<&'static str>,
    /// Declared fields in order.
    pub fields: &'static [FieldDecl],
}

impl ModelShape {
    /// Describe a model.
    pub const fn new(name: &'static str, fields: &'static [FieldDecl]) -> Self {
        Self {
            name,
            table_name: None,
            fields,
        }
    }

    /// Set the explicit table name.
    pub const fn table_name(mut self, name: &'static str) -> Self {
        self.table_name = Some(name);
        self
    }
}

/// Identity of a model type, usable as a cache key.
#[derive(Clone, Copy)]
pub struct ModelType {
    id: TypeId,
    shape: fn() -> &'static ModelShape,
}

impl ModelType {
    /// Identity of `M`.
    pub fn of<M: Model>() -> Self {
        Self {
            id: TypeId::of::<M>(),
            shape: M::shape,
        }
    }

    /// The `TypeId` of the model.
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// The model's static descriptor table.
    pub fn shape(&self) -> &'static ModelShape {
        (self.shape)()
    }

    /// The model's Rust type name.
    pub fn name(&self) -> &'static str {
        self.shape().name
    }
}

impl PartialEq for ModelType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ModelType {}

impl Hash for ModelType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ModelType").field(&self.name()).finish()
    }
}

impl Serialize for ModelType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// A live record whose fields can be addressed by declared name.
///
/// Object safe; the binder and projector work on `&mut dyn Record`.
pub trait Record {
    /// Identity of the record's model type.
    fn record_type(&self) -> ModelType;

    /// Every non-ignored field, in declaration order.
    fn slots(&self) -> Vec<(&'static str, &dyn Bindable)>;

    /// Every non-ignored field, mutably, in declaration order.
    fn slots_mut(&mut self) -> Vec<(&'static str, &mut dyn Bindable)>;
}

/// A model type. Implemented by `#[derive(Model)]`.
pub trait Model: Record + Shaped + Sized + 'static {
    /// The type's static descriptor table.
    fn shape() -> &'static ModelShape;

    /// Identity of the type.
    fn model_type() -> ModelType {
        ModelType::of::<Self>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_decl_builder() {
        const DECL: FieldDecl = FieldDecl::new("team_id", scalar_shape)
            .model_tag("foreignkey:team_id")
            .sql_tag("not null")
            .anonymous(true);
        assert_eq!(DECL.name, "team_id");
        assert_eq!(DECL.model_tag, "foreignkey:team_id");
        assert_eq!(DECL.sql_tag, "not null");
        assert_eq!((DECL.shape)(), TypeShape::Scalar);
        assert!(!DECL.ignored);
        assert!(DECL.anonymous);
        assert!(!FieldDecl::new("team", scalar_shape).anonymous);
    }

    #[test]
    fn test_ignored_decl() {
        let decl = FieldDecl::ignored("cache");
        assert!(decl.ignored);
        assert_eq!((decl.shape)(), TypeShape::Scalar);
    }

    #[test]
    fn test_storable_shapes() {
        assert!(TypeShape::Scalar.is_storable());
        assert!(TypeShape::Decoder.is_storable());
        assert!(TypeShape::Temporal.is_storable());
    }
}
