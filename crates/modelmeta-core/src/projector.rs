//! Instance field projector.
//!
//! [`project`] pairs every field descriptor of a model with an addressable
//! handle into one live record. Views borrow the record mutably, so they can
//! not outlive a mutation made behind their back; project again after any
//! direct change to the record.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::bindable::Bindable;
use crate::binder;
use crate::error::Result;
use crate::field::FieldDescriptor;
use crate::metadata::ModelMetadata;
use crate::shape::Record;
use crate::value::Value;

/// One field descriptor bound to one record.
pub struct BoundField<'r> {
    pub(crate) descriptor: Arc<FieldDescriptor>,
    pub(crate) slot: Option<&'r mut dyn Bindable>,
    pub(crate) is_blank: bool,
}

impl<'r> BoundField<'r> {
    fn attached(descriptor: Arc<FieldDescriptor>, slot: &'r mut dyn Bindable) -> Self {
        let is_blank = slot.is_blank();
        Self {
            descriptor,
            slot: Some(slot),
            is_blank,
        }
    }

    fn detached(descriptor: Arc<FieldDescriptor>) -> Self {
        Self {
            descriptor,
            slot: None,
            is_blank: true,
        }
    }

    /// The field's descriptor.
    pub fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    /// True when the value equals its type's zero value, or there is no value.
    pub fn is_blank(&self) -> bool {
        self.is_blank
    }

    /// Whether the view points into a real record.
    pub fn is_attached(&self) -> bool {
        self.slot.is_some()
    }

    /// Current value, if attached.
    pub fn value(&self) -> Option<Value> {
        self.slot.as_deref().map(Bindable::to_value)
    }

    /// Bind `value` into the field. See [`binder::bind`].
    pub fn set(&mut self, value: impl Into<Value>) -> Result<()> {
        binder::bind(self, value)
    }
}

impl fmt::Debug for BoundField<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundField")
            .field("field", &self.descriptor.storage_name)
            .field("attached", &self.is_attached())
            .field("is_blank", &self.is_blank)
            .finish()
    }
}

/// Map every field of `metadata` to a view into `record`, keyed by storage
/// name.
///
/// With no record, or a record of another model type, every view is
/// detached and blank.
pub fn project<'r>(
    record: Option<&'r mut dyn Record>,
    metadata: &ModelMetadata,
) -> HashMap<String, BoundField<'r>> {
    let mut views = HashMap::with_capacity(metadata.fields().len());

    match record {
        Some(record) if Some(record.record_type()) == metadata.model_type => {
            collect(record, 0, metadata.fields(), &mut views);
        }
        Some(record) => {
            tracing::debug!(
                expected = metadata.type_name,
                actual = record.record_type().name(),
                "projecting a record of another model; views are detached"
            );
        }
        None => {}
    }

    for descriptor in metadata.fields() {
        views
            .entry(descriptor.storage_name.clone())
            .or_insert_with(|| BoundField::detached(Arc::clone(descriptor)));
    }
    views
}

fn collect<'r>(
    record: &'r mut dyn Record,
    depth: usize,
    wanted: &[Arc<FieldDescriptor>],
    views: &mut HashMap<String, BoundField<'r>>,
) {
    for (name, slot) in record.slots_mut() {
        let here: Vec<&Arc<FieldDescriptor>> = wanted
            .iter()
            .filter(|d| d.path_names.get(depth) == Some(&name))
            .collect();
        let Some(first) = here.first() else {
            continue;
        };

        if first.path_names.len() > depth + 1 {
            let nested: Vec<Arc<FieldDescriptor>> = here.into_iter().cloned().collect();
            if let Some(inner) = slot.as_record_mut() {
                collect(inner, depth + 1, &nested, views);
            }
        } else {
            views.insert(
                first.storage_name.clone(),
                BoundField::attached(Arc::clone(first), slot),
            );
        }
    }
}
