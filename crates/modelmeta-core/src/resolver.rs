//! Relationship resolver.
//!
//! Walks a model's descriptor table and classifies every field:
//!
//! - storable types (scalars, temporal types, types with a decode hook)
//!   become columns;
//! - nested records flagged `EMBEDDED` (or marked `#[model(flatten)]`) have
//!   their columns flattened into the parent, keeping explicit primary keys;
//! - other nested records and collections of records become relationships,
//!   resolved in pass two once the model's own field list is published.
//!
//! Foreign keys are found from explicit `FOREIGNKEY` / `ASSOCIATIONFOREIGNKEY`
//! annotations first, then by the `<Owner><Key>` naming convention. A field
//! whose relationship cannot be inferred is kept, flagged ignored.

use std::slice;
use std::sync::Arc;

use crate::field::FieldDescriptor;
use crate::metadata::{ModelMetadata, find_field};
use crate::naming::{IDENTITY_COLUMN, foreign_key_name, to_storage_name};
use crate::registry::{Readiness, Registry};
use crate::relationship::{JoinTable, JoinTableSide, Polymorphic, Relationship, RelationshipKind};
use crate::shape::{FieldDecl, ModelType, TypeShape};
use crate::tags::FieldSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cardinality {
    Single,
    Many,
}

/// A relationship-bearing field waiting for pass two.
#[derive(Debug)]
pub(crate) struct Deferred {
    declared_name: &'static str,
    storage_name: String,
    settings: Arc<FieldSettings>,
    related: ModelType,
    cardinality: Cardinality,
}

/// Output of pass one: the model's own fields and its deferred units.
pub(crate) struct PassOne {
    pub(crate) fields: Vec<Arc<FieldDescriptor>>,
    pub(crate) deferred: Vec<Deferred>,
}

/// Pass one: storable and embedded fields, primary keys.
pub(crate) fn pass_one(registry: &Registry, model_type: ModelType) -> PassOne {
    let shape = model_type.shape();
    let mut fields: Vec<FieldDescriptor> = Vec::with_capacity(shape.fields.len());
    let mut deferred = Vec::new();

    for decl in shape.fields {
        if decl.ignored {
            continue;
        }
        let settings = Arc::new(FieldSettings::parse(decl.model_tag, decl.sql_tag));
        if settings.ignored {
            continue;
        }
        let storage_name = settings
            .column
            .clone()
            .unwrap_or_else(|| to_storage_name(decl.name));

        match (decl.shape)() {
            shape @ (TypeShape::Scalar | TypeShape::Decoder | TypeShape::Temporal) => {
                let mut field = FieldDescriptor::new(decl.name, storage_name, settings);
                field.is_scalar_storable = true;
                field.is_primary_key = field.settings.primary_key;
                field.has_decode_hook = shape == TypeShape::Decoder;
                push_column(model_type, &mut fields, field);
            }
            TypeShape::Record(nested) if settings.embedded || decl.anonymous => {
                embed(registry, model_type, decl, &settings, nested, &mut fields);
            }
            TypeShape::Record(related) => deferred.push(Deferred {
                declared_name: decl.name,
                storage_name,
                settings,
                related,
                cardinality: Cardinality::Single,
            }),
            TypeShape::Sequence(related) => deferred.push(Deferred {
                declared_name: decl.name,
                storage_name,
                settings,
                related,
                cardinality: Cardinality::Many,
            }),
        }
    }

    if !fields.iter().any(|f| f.is_primary_key) {
        if let Some(id) = fields.iter_mut().find(|f| {
            f.is_scalar_storable
                && (f.declared_name == IDENTITY_COLUMN || f.storage_name == IDENTITY_COLUMN)
        }) {
            id.is_primary_key = true;
        }
    }

    PassOne {
        fields: fields.into_iter().map(Arc::new).collect(),
        deferred,
    }
}

/// Append a column unless another column already uses its storage name.
fn push_column(model_type: ModelType, fields: &mut Vec<FieldDescriptor>, field: FieldDescriptor) {
    if let Some(existing) = fields.iter().find(|f| f.storage_name == field.storage_name) {
        tracing::warn!(
            model = model_type.name(),
            column = %field.storage_name,
            kept = ?existing.path_names,
            dropped = ?field.path_names,
            "duplicate column name; later field dropped"
        );
        return;
    }
    fields.push(field);
}

fn embed(
    registry: &Registry,
    model_type: ModelType,
    decl: &FieldDecl,
    settings: &FieldSettings,
    nested: ModelType,
    fields: &mut Vec<FieldDescriptor>,
) {
    // Always the pass-one snapshot: own and embedded columns, never
    // relationship fields, whatever state the nested entry is in.
    let nested_meta = registry.resolve_model(nested, Readiness::Partial);
    let prefix = settings.embedded_prefix.as_deref();
    let columns = nested_meta
        .fields()
        .iter()
        .filter(|sub| sub.is_scalar_storable && !sub.is_ignored);
    for sub in columns {
        let mut promoted = sub.promoted(decl.name, prefix);
        // Only annotated keys carry over; an implicit `id` key is re-derived
        // for the parent.
        if promoted.is_primary_key && !promoted.settings.primary_key {
            promoted.is_primary_key = false;
        }
        push_column(model_type, fields, promoted);
    }
    tracing::trace!(
        field = decl.name,
        embedded = nested.name(),
        promoted = nested_meta.fields().len(),
        "embedded fields promoted"
    );
}

/// Pass two: resolve one relationship-bearing field of `owner`.
pub(crate) fn resolve_deferred(
    registry: &Registry,
    owner_type: ModelType,
    owner: &ModelMetadata,
    unit: Deferred,
) -> FieldDescriptor {
    let related = registry.resolve_model(unit.related, Readiness::Partial);
    let settings = &unit.settings;

    let relationship = match unit.cardinality {
        Cardinality::Many => match &settings.many2many {
            Some(join_table) => many_to_many(owner_type, owner, &related, &unit, join_table),
            None => owned_by_owner(owner, &related, &unit, RelationshipKind::OneToMany),
        },
        Cardinality::Single if settings.polymorphic.is_some() => {
            owned_by_owner(owner, &related, &unit, RelationshipKind::OneToOne)
        }
        Cardinality::Single => owned_by_owner(owner, &related, &unit, RelationshipKind::OneToOne)
            .or_else(|| belongs_to(owner, &related, &unit)),
    };

    let mut field = FieldDescriptor::new(unit.declared_name, unit.storage_name, unit.settings);
    match relationship {
        Some(relationship) => {
            tracing::trace!(
                model = owner.type_name,
                field = field.declared_name,
                related = related.type_name,
                kind = ?relationship.kind,
                "relationship resolved"
            );
            field.relationship = Some(relationship);
        }
        None => {
            tracing::debug!(
                model = owner.type_name,
                field = field.declared_name,
                related = related.type_name,
                "relationship could not be inferred; field ignored"
            );
            field.is_ignored = true;
        }
    }
    field
}

/// Inputs of one foreign-key search.
struct KeySearch<'a> {
    /// Name the convention prepends to referenced key names.
    prefix: &'a str,
    /// Explicit `FOREIGNKEY` names, looked up on `holder`.
    foreign_keys: &'a [String],
    /// Explicit `ASSOCIATIONFOREIGNKEY` names, looked up on `target`.
    association_keys: &'a [String],
    /// Fields that may hold the foreign key.
    holder: &'a [Arc<FieldDescriptor>],
    /// Model whose keys are referenced.
    target: &'a ModelMetadata,
}

impl KeySearch<'_> {
    /// Pairs of (foreign-key field on the holder, referenced field on the target).
    fn pairs(&self) -> Vec<(Arc<FieldDescriptor>, Arc<FieldDescriptor>)> {
        let target_fields = self.target.fields();

        let (foreign_keys, association_keys): (Vec<String>, Vec<String>) =
            if self.foreign_keys.is_empty() {
                let referenced: Vec<&Arc<FieldDescriptor>> = if self.association_keys.is_empty() {
                    self.target.primary_keys().iter().collect()
                } else {
                    self.association_keys
                        .iter()
                        .filter_map(|key| find_field(target_fields, key))
                        .collect()
                };
                referenced
                    .into_iter()
                    .map(|f| {
                        (
                            foreign_key_name(self.prefix, f.declared_name),
                            f.declared_name.to_string(),
                        )
                    })
                    .unzip()
            } else if self.association_keys.is_empty() {
                let mut association: Vec<String> = self
                    .foreign_keys
                    .iter()
                    .filter_map(|key| strip_name_prefix(key, self.prefix))
                    .filter(|rest| find_field(target_fields, rest).is_some())
                    .collect();
                if association.is_empty() && self.foreign_keys.len() == 1 {
                    association.extend(
                        self.target
                            .primary_field()
                            .map(|f| f.declared_name.to_string()),
                    );
                }
                (self.foreign_keys.to_vec(), association)
            } else if self.foreign_keys.len() == self.association_keys.len() {
                (self.foreign_keys.to_vec(), self.association_keys.to_vec())
            } else {
                return Vec::new();
            };

        foreign_keys
            .iter()
            .zip(&association_keys)
            .filter_map(|(foreign_key, association_key)| {
                let holder = find_field(self.holder, foreign_key)?;
                let referenced = find_field(target_fields, association_key)?;
                Some((Arc::clone(holder), Arc::clone(referenced)))
            })
            .collect()
    }
}

/// `"UserId"` with prefix `"User"` → `"id"`, compared in storage form.
fn strip_name_prefix(name: &str, prefix: &str) -> Option<String> {
    let name = to_storage_name(name);
    let prefix = to_storage_name(prefix);
    name.strip_prefix(prefix.as_str())
        .and_then(|rest| rest.strip_prefix('_'))
        .filter(|rest| !rest.is_empty())
        .map(str::to_string)
}

/// Relationships whose key lives on the related model: has-one, has-many
/// and their polymorphic variants.
fn owned_by_owner(
    owner: &ModelMetadata,
    related: &ModelMetadata,
    unit: &Deferred,
    kind: RelationshipKind,
) -> Option<Relationship> {
    if let Some(prefix) = &unit.settings.polymorphic {
        let kind = match kind {
            RelationshipKind::OneToMany => RelationshipKind::PolymorphicOneToMany,
            other => other,
        };
        return polymorphic(owner, related, unit, prefix, kind);
    }

    let pairs = KeySearch {
        prefix: owner.type_name,
        foreign_keys: &unit.settings.foreign_keys,
        association_keys: &unit.settings.association_foreign_keys,
        holder: related.fields(),
        target: owner,
    }
    .pairs();
    if pairs.is_empty() {
        return None;
    }

    let (foreign, local): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
    for field in &foreign {
        field.mark_foreign_key();
    }
    Some(Relationship::new(kind, unit.related, &local, &foreign))
}

/// Many-to-one: the key lives on the declaring model.
fn belongs_to(
    owner: &ModelMetadata,
    related: &ModelMetadata,
    unit: &Deferred,
) -> Option<Relationship> {
    let pairs = KeySearch {
        prefix: unit.declared_name,
        foreign_keys: &unit.settings.foreign_keys,
        association_keys: &unit.settings.association_foreign_keys,
        holder: owner.fields(),
        target: related,
    }
    .pairs();
    if pairs.is_empty() {
        return None;
    }

    let (local, foreign): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
    for field in &local {
        field.mark_foreign_key();
    }
    Some(Relationship::new(
        RelationshipKind::ManyToOne,
        unit.related,
        &local,
        &foreign,
    ))
}

/// Both `<Prefix>Id` and `<Prefix>Type` must exist on the related model.
fn polymorphic(
    owner: &ModelMetadata,
    related: &ModelMetadata,
    unit: &Deferred,
    prefix: &str,
    kind: RelationshipKind,
) -> Option<Relationship> {
    let type_field = find_field(related.fields(), &format!("{prefix}Type"))?;
    let id_field = find_field(related.fields(), &format!("{prefix}Id"))?;
    let owner_key = owner.primary_field()?;

    type_field.mark_foreign_key();
    id_field.mark_foreign_key();

    let relationship = Relationship::new(
        kind,
        unit.related,
        slice::from_ref(owner_key),
        slice::from_ref(id_field),
    );
    Some(relationship.with_polymorphic(Polymorphic {
        type_field: type_field.declared_name,
        type_column: type_field.storage_name.clone(),
        value: owner.storage_name.clone(),
    }))
}

fn many_to_many(
    owner_type: ModelType,
    owner: &ModelMetadata,
    related: &ModelMetadata,
    unit: &Deferred,
    join_table: &str,
) -> Option<Relationship> {
    let settings = &unit.settings;
    let local = keys_or_primary(owner, &settings.foreign_keys);
    let foreign = keys_or_primary(related, &settings.association_foreign_keys);
    if local.is_empty() || foreign.is_empty() {
        return None;
    }

    let source = join_side(
        owner_type,
        owner.type_name,
        &local,
        settings.raw.get("JOINTABLE_FOREIGNKEY"),
    );
    let destination = join_side(
        unit.related,
        related.type_name,
        &foreign,
        settings.raw.get("ASSOCIATION_JOINTABLE_FOREIGNKEY"),
    );

    let relationship =
        Relationship::new(RelationshipKind::ManyToMany, unit.related, &local, &foreign);
    Some(relationship.with_join_table(JoinTable {
        name: join_table.to_string(),
        source,
        destination,
    }))
}

fn keys_or_primary(metadata: &ModelMetadata, names: &[String]) -> Vec<Arc<FieldDescriptor>> {
    if names.is_empty() {
        return metadata.primary_keys().to_vec();
    }
    names
        .iter()
        .filter_map(|name| find_field(metadata.fields(), name))
        .cloned()
        .collect()
}

/// Join columns are `<type>_<key column>` unless listed explicitly.
fn join_side(
    model: ModelType,
    type_name: &str,
    keys: &[Arc<FieldDescriptor>],
    explicit: Option<&str>,
) -> JoinTableSide {
    let explicit: Vec<&str> = explicit
        .map(|list| list.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();
    let type_name = to_storage_name(type_name);

    JoinTableSide {
        model,
        key_columns: keys.iter().map(|key| key.storage_name.clone()).collect(),
        join_columns: keys
            .iter()
            .enumerate()
            .map(|(idx, key)| match explicit.get(idx) {
                Some(column) => to_storage_name(column),
                None => format!("{type_name}_{}", key.storage_name),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_name_prefix() {
        assert_eq!(strip_name_prefix("UserId", "User"), Some("id".to_string()));
        assert_eq!(strip_name_prefix("user_uuid", "User"), Some("uuid".to_string()));
        assert_eq!(strip_name_prefix("UserProfileId", "UserProfile"), Some("id".to_string()));
        assert_eq!(strip_name_prefix("OwnerId", "User"), None);
        assert_eq!(strip_name_prefix("User", "User"), None);
    }
}
