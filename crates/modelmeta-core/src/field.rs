//! Field descriptors: one logical column of a resolved model.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Serialize, Serializer};

use crate::relationship::Relationship;
use crate::tags::FieldSettings;

/// Metadata about one field of a model.
///
/// A descriptor is exactly one of: scalar-storable, relationship-bearing, or
/// ignored (explicitly, or because its relationship could not be inferred).
/// Fields of embedded structs appear as promoted descriptors with a longer
/// [`path_names`](Self::path_names); the embedding field itself never does.
#[derive(Debug, Serialize)]
pub struct FieldDescriptor {
    /// Storage column name.
    pub storage_name: String,
    /// Declared Rust field name.
    pub declared_name: &'static str,
    /// Member names from the record root to the value.
    pub path_names: Vec<&'static str>,
    /// Part of the primary key.
    pub is_primary_key: bool,
    /// Stored directly in a column.
    pub is_scalar_storable: bool,
    /// Not stored and not a relationship.
    pub is_ignored: bool,
    /// The field's type has a custom decode hook.
    pub has_decode_hook: bool,
    /// A `DEFAULT` was declared.
    pub has_default_value: bool,
    /// Set when another field's relationship uses this one as its key.
    #[serde(serialize_with = "serialize_flag")]
    is_foreign_key: AtomicBool,
    /// Parsed annotations.
    pub settings: Arc<FieldSettings>,
    /// Relationship wiring, for relationship-bearing fields.
    pub relationship: Option<Relationship>,
}

fn serialize_flag<S: Serializer>(flag: &AtomicBool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_bool(flag.load(Ordering::Acquire))
}

impl FieldDescriptor {
    /// A descriptor for the declared field `name`.
    ///
    /// Flags start cleared; the resolver sets them.
    pub fn new(
        declared_name: &'static str,
        storage_name: impl Into<String>,
        settings: Arc<FieldSettings>,
    ) -> Self {
        Self {
            storage_name: storage_name.into(),
            declared_name,
            path_names: vec![declared_name],
            is_primary_key: false,
            is_scalar_storable: false,
            is_ignored: false,
            has_decode_hook: false,
            has_default_value: settings.has_default(),
            is_foreign_key: AtomicBool::new(false),
            settings,
            relationship: None,
        }
    }

    /// Whether a relationship uses this field as a foreign key.
    pub fn is_foreign_key(&self) -> bool {
        self.is_foreign_key.load(Ordering::Acquire)
    }

    /// Flag this field as a foreign key.
    ///
    /// Relationship resolution on *another* model may set this on a field
    /// that is already shared, so the flag is atomic.
    pub(crate) fn mark_foreign_key(&self) {
        self.is_foreign_key.store(true, Ordering::Release);
    }

    /// True for relationship-bearing fields.
    pub fn is_relationship(&self) -> bool {
        self.relationship.is_some()
    }

    /// Copy of this descriptor reached through the embedding field `parent`.
    ///
    /// The copy starts without the foreign-key flag: only relationships of
    /// the embedding model flag it.
    pub(crate) fn promoted(&self, parent: &'static str, prefix: Option<&str>) -> Self {
        let mut promoted = self.clone();
        promoted.is_foreign_key = AtomicBool::new(false);
        promoted.path_names.insert(0, parent);
        if let Some(prefix) = prefix {
            promoted.storage_name = format!("{prefix}{}", self.storage_name);
        }
        promoted
    }
}

impl Clone for FieldDescriptor {
    fn clone(&self) -> Self {
        Self {
            storage_name: self.storage_name.clone(),
            declared_name: self.declared_name,
            path_names: self.path_names.clone(),
            is_primary_key: self.is_primary_key,
            is_scalar_storable: self.is_scalar_storable,
            is_ignored: self.is_ignored,
            has_decode_hook: self.has_decode_hook,
            has_default_value: self.has_default_value,
            is_foreign_key: AtomicBool::new(self.is_foreign_key()),
            settings: Arc::clone(&self.settings),
            relationship: self.relationship.clone(),
        }
    }
}
