//! Resolved per-model schema description.

use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::field::FieldDescriptor;
use crate::naming::{IDENTITY_COLUMN, to_storage_name};
use crate::relationship::Relationship;
use crate::shape::ModelType;

/// Schema of one model type: storage name, ordered fields, primary keys.
///
/// Shared through `Arc` by every caller of the registry and never mutated
/// once published. The only field state that can change after publication is
/// [`FieldDescriptor::is_foreign_key`], set by relationship resolution on
/// other models.
#[derive(Debug, Clone, Serialize)]
pub struct ModelMetadata {
    /// Identity of the model; `None` for non-record shapes.
    pub model_type: Option<ModelType>,
    /// Rust type name.
    pub type_name: &'static str,
    /// Table name, before any per-call override or table-name handler.
    pub storage_name: String,
    /// Whether `storage_name` came from the type's own table name override.
    pub explicit_storage_name: bool,
    fields: Vec<Arc<FieldDescriptor>>,
    #[serde(serialize_with = "serialize_key_columns")]
    primary_keys: Vec<Arc<FieldDescriptor>>,
}

fn serialize_key_columns<S: Serializer>(
    keys: &[Arc<FieldDescriptor>],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(keys.iter().map(|f| f.storage_name.as_str()))
}

impl ModelMetadata {
    /// Metadata with no fields, for inputs that are not records.
    pub fn empty(type_name: &'static str) -> Self {
        Self {
            model_type: None,
            type_name,
            storage_name: to_storage_name(type_name),
            explicit_storage_name: false,
            fields: Vec::new(),
            primary_keys: Vec::new(),
        }
    }

    /// Placeholder for a model whose construction has not produced fields yet.
    pub(crate) fn placeholder(model_type: ModelType, storage_name: String) -> Self {
        Self {
            model_type: Some(model_type),
            type_name: model_type.name(),
            storage_name,
            explicit_storage_name: model_type.shape().table_name.is_some(),
            fields: Vec::new(),
            primary_keys: Vec::new(),
        }
    }

    pub(crate) fn new(
        model_type: ModelType,
        storage_name: String,
        fields: Vec<Arc<FieldDescriptor>>,
    ) -> Self {
        let primary_keys = fields
            .iter()
            .filter(|f| f.is_primary_key)
            .cloned()
            .collect();
        Self {
            model_type: Some(model_type),
            type_name: model_type.name(),
            storage_name,
            explicit_storage_name: model_type.shape().table_name.is_some(),
            fields,
            primary_keys,
        }
    }

    /// Same metadata with `extra` appended after the existing fields.
    pub(crate) fn extended(&self, extra: Vec<FieldDescriptor>) -> Self {
        let mut next = self.clone();
        next.fields.extend(extra.into_iter().map(Arc::new));
        next
    }

    /// All fields in order: scalar and promoted fields first, then
    /// relationship-bearing fields in declaration order.
    pub fn fields(&self) -> &[Arc<FieldDescriptor>] {
        &self.fields
    }

    /// Primary-key fields, in field order. Same descriptors as in
    /// [`fields`](Self::fields).
    pub fn primary_keys(&self) -> &[Arc<FieldDescriptor>] {
        &self.primary_keys
    }

    /// The first primary key, else the field stored as `id`.
    pub fn primary_field(&self) -> Option<&Arc<FieldDescriptor>> {
        self.primary_keys.first().or_else(|| {
            self.fields
                .iter()
                .find(|f| f.is_scalar_storable && f.storage_name == IDENTITY_COLUMN)
        })
    }

    /// Look up a field by declared name, storage name, or any spelling that
    /// normalizes to its storage name.
    pub fn field_by_name(&self, name: &str) -> Option<&Arc<FieldDescriptor>> {
        find_field(&self.fields, name)
    }

    /// Relationship-bearing fields with their relationships.
    pub fn relationships(&self) -> impl Iterator<Item = (&Arc<FieldDescriptor>, &Relationship)> {
        self.fields
            .iter()
            .filter_map(|f| f.relationship.as_ref().map(|r| (f, r)))
    }

    /// Storable column names, in field order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.is_scalar_storable && !f.is_ignored)
            .map(|f| f.storage_name.as_str())
    }
}

/// Find a field by exact declared name, exact storage name, or normalized
/// storage name.
pub(crate) fn find_field<'a>(
    fields: &'a [Arc<FieldDescriptor>],
    name: &str,
) -> Option<&'a Arc<FieldDescriptor>> {
    fields
        .iter()
        .find(|f| f.declared_name == name || f.storage_name == name)
        .or_else(|| {
            let normalized = to_storage_name(name);
            fields.iter().find(|f| f.storage_name == normalized)
        })
}
