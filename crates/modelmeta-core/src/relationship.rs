//! Relationship metadata.
//!
//! Relationships are inferred from field shapes and annotations when a model
//! is resolved, and stored on the relationship-bearing [`FieldDescriptor`].
//! Key lists are always oriented from the declaring model: `local_*` names
//! fields of the model that declares the relationship, `foreign_*` names
//! fields of the related model.
//!
//! [`FieldDescriptor`]: crate::field::FieldDescriptor

use std::sync::Arc;

use serde::Serialize;

use crate::field::FieldDescriptor;
use crate::shape::ModelType;

/// The type of relationship between two models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RelationshipKind {
    /// One-to-one: `User` has one `Profile`, the key lives on `Profile`.
    OneToOne,
    /// Many-to-one: many `Email`s belong to one `User`, the key lives on `Email`.
    ManyToOne,
    /// One-to-many: one `User` has many `Email`s.
    OneToMany,
    /// Many-to-many: `Person`s speak many `Language`s via a join table.
    ManyToMany,
    /// One-to-many where the related side also stores the owner's type.
    PolymorphicOneToMany,
}

impl RelationshipKind {
    /// True when the related side holds the foreign key.
    pub const fn key_on_related(&self) -> bool {
        matches!(
            self,
            RelationshipKind::OneToOne
                | RelationshipKind::OneToMany
                | RelationshipKind::PolymorphicOneToMany
        )
    }
}

/// Discriminator wiring of a polymorphic relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Polymorphic {
    /// Declared name of the discriminator field on the related model.
    pub type_field: &'static str,
    /// Storage name of the discriminator column.
    pub type_column: String,
    /// Value owners write into the discriminator column.
    pub value: String,
}

/// One side of a synthesized join table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinTableSide {
    /// The model this side points at.
    pub model: ModelType,
    /// Key columns on the model's own table.
    pub key_columns: Vec<String>,
    /// Matching columns in the join table (e.g. `person_id`).
    pub join_columns: Vec<String>,
}

/// Synthesized association table for a many-to-many relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinTable {
    /// Join table name.
    pub name: String,
    /// The declaring model's side.
    pub source: JoinTableSide,
    /// The related model's side.
    pub destination: JoinTableSide,
}

/// How one model connects to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relationship {
    /// Kind of relationship.
    pub kind: RelationshipKind,
    /// The related model.
    pub related: ModelType,
    /// Participating fields of the declaring model (declared names).
    pub local_key_fields: Vec<&'static str>,
    /// Storage names of `local_key_fields`.
    pub local_key_columns: Vec<String>,
    /// Participating fields of the related model (declared names).
    pub foreign_key_fields: Vec<&'static str>,
    /// Storage names of `foreign_key_fields`.
    pub foreign_key_columns: Vec<String>,
    /// Discriminator, for polymorphic relationships.
    pub polymorphic: Option<Polymorphic>,
    /// Join table, for many-to-many relationships.
    pub join_table: Option<JoinTable>,
}

impl Relationship {
    /// Relationship of `kind` pairing `local` fields with `foreign` fields.
    pub fn new(
        kind: RelationshipKind,
        related: ModelType,
        local: &[Arc<FieldDescriptor>],
        foreign: &[Arc<FieldDescriptor>],
    ) -> Self {
        Self {
            kind,
            related,
            local_key_fields: local.iter().map(|f| f.declared_name).collect(),
            local_key_columns: local.iter().map(|f| f.storage_name.clone()).collect(),
            foreign_key_fields: foreign.iter().map(|f| f.declared_name).collect(),
            foreign_key_columns: foreign.iter().map(|f| f.storage_name.clone()).collect(),
            polymorphic: None,
            join_table: None,
        }
    }

    /// Attach discriminator wiring.
    pub fn with_polymorphic(mut self, polymorphic: Polymorphic) -> Self {
        self.polymorphic = Some(polymorphic);
        self
    }

    /// Attach a join table.
    pub fn with_join_table(mut self, join_table: JoinTable) -> Self {
        self.join_table = Some(join_table);
        self
    }

    /// Whether this is a polymorphic relationship.
    pub fn is_polymorphic(&self) -> bool {
        self.polymorphic.is_some()
    }
}
