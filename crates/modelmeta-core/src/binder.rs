//! Field value binder.
//!
//! Binding writes one runtime [`Value`] into one field of a live record:
//!
//! 1. no addressable slot → [`Error::InvalidTarget`];
//! 2. the field's type has a [`Decode`](crate::bindable::Decode) hook → the
//!    hook gets the raw value and its error comes back as [`Error::Decode`];
//! 3. otherwise the generic conversion runs, failing with
//!    [`Error::Inconvertible`].
//!
//! On success the field's blank flag is recomputed. There is no rollback
//! across several fields; callers that need it must snapshot the record.

use crate::bindable::Bindable;
use crate::error::{Error, Result};
use crate::field::FieldDescriptor;
use crate::projector::BoundField;
use crate::shape::Record;
use crate::value::Value;

/// Bind `value` into a projected field and refresh its blank flag.
pub fn bind(field: &mut BoundField<'_>, value: impl Into<Value>) -> Result<()> {
    let name = &field.descriptor.storage_name;
    let Some(slot) = field.slot.as_deref_mut() else {
        return Err(Error::InvalidTarget {
            field: name.clone(),
            reason: "no addressable value in the projected record",
        });
    };
    let is_blank = write_slot(slot, name, value.into())?;
    field.is_blank = is_blank;
    Ok(())
}

/// Bind `value` into the field `descriptor` names, following its path
/// through embedded records. Returns the new blank flag.
pub fn bind_path(
    record: &mut dyn Record,
    descriptor: &FieldDescriptor,
    value: impl Into<Value>,
) -> Result<bool> {
    let Some(slot) = locate(record, &descriptor.path_names) else {
        return Err(Error::InvalidTarget {
            field: descriptor.storage_name.clone(),
            reason: "record has no field at this path",
        });
    };
    write_slot(slot, &descriptor.storage_name, value.into())
}

fn locate<'r>(record: &'r mut dyn Record, path: &[&'static str]) -> Option<&'r mut dyn Bindable> {
    let (first, rest) = path.split_first()?;
    let (_, slot) = record
        .slots_mut()
        .into_iter()
        .find(|(name, _)| name == first)?;
    if rest.is_empty() {
        return Some(slot);
    }
    locate(slot.as_record_mut()?, rest)
}

fn write_slot(slot: &mut dyn Bindable, field: &str, value: Value) -> Result<bool> {
    if let Some(hook) = slot.decoder() {
        hook.decode(value).map_err(|source| Error::Decode {
            field: field.to_string(),
            source,
        })?;
    } else {
        slot.assign(value).map_err(|e| Error::Inconvertible {
            field: field.to_string(),
            from: e.from,
            to: e.to,
        })?;
    }
    Ok(slot.is_blank())
}
