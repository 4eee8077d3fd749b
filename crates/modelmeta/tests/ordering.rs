use modelmeta::prelude::*;

#[derive(Model, Default)]
struct Owner {
    id: i64,
    name: String,
    pets: Vec<Pet>,
}

#[derive(Model, Default)]
struct Pet {
    id: i64,
    owner_id: i64,
    owner: Option<Box<Owner>>,
}

// An embedded type pointing back at the model that embeds it.
#[derive(Model, Default)]
struct Folder {
    id: i64,
    #[model("embedded")]
    meta: FolderMeta,
}

#[derive(Model, Default)]
struct FolderMeta {
    parent_id: i64,
    parent: Option<Box<Folder>>,
}

#[derive(Model, Default)]
struct Kennel {
    name: String,
    #[model("embedded;embedded_prefix:keeper_")]
    keeper: Owner,
}

#[derive(Model, Default)]
struct Timestamps {
    id: i64,
    created_at: i64,
}

#[derive(Model, Default)]
struct Ledger {
    id: i64,
    #[model(flatten)]
    stamps: Timestamps,
}

type FieldSummary = (String, Option<RelationshipKind>, bool, bool);

fn summary(meta: &ModelMetadata) -> Vec<FieldSummary> {
    meta.fields()
        .iter()
        .map(|f| {
            (
                f.storage_name.clone(),
                f.relationship.as_ref().map(|r| r.kind),
                f.is_foreign_key(),
                f.is_primary_key,
            )
        })
        .collect()
}

#[test]
fn belongs_to_and_has_many_do_not_depend_on_request_order() {
    let owner_first = Registry::new();
    let owners_a = owner_first.resolve::<Owner>();
    let pets_a = owner_first.resolve::<Pet>();

    let pet_first = Registry::new();
    let pets_b = pet_first.resolve::<Pet>();
    let owners_b = pet_first.resolve::<Owner>();

    assert_eq!(summary(&owners_a), summary(&owners_b));
    assert_eq!(summary(&pets_a), summary(&pets_b));

    let pets = owners_b.field_by_name("pets").unwrap();
    assert_eq!(pets.relationship.as_ref().unwrap().kind, RelationshipKind::OneToMany);
    let owner = pets_b.field_by_name("owner").unwrap();
    assert_eq!(owner.relationship.as_ref().unwrap().kind, RelationshipKind::ManyToOne);
    assert_eq!(
        pets_b.fields().iter().filter(|f| f.storage_name == "id").count(),
        1
    );
}

#[test]
fn embedded_back_reference_resolves_in_either_order() {
    let outer_first = Registry::new();
    let folders_a = outer_first.resolve::<Folder>();
    let meta_a = outer_first.resolve::<FolderMeta>();

    let inner_first = Registry::new();
    let meta_b = inner_first.resolve::<FolderMeta>();
    let folders_b = inner_first.resolve::<Folder>();

    assert_eq!(summary(&folders_a), summary(&folders_b));
    assert_eq!(summary(&meta_a), summary(&meta_b));

    let parent = meta_a.field_by_name("parent").unwrap();
    let parent = parent.relationship.as_ref().unwrap();
    assert_eq!(parent.kind, RelationshipKind::ManyToOne);
    assert_eq!(parent.local_key_columns, vec!["parent_id"]);
    assert_eq!(parent.foreign_key_columns, vec!["id"]);

    assert_eq!(folders_a.columns().collect::<Vec<_>>(), vec!["id", "parent_id"]);
    assert!(folders_a.field_by_name("parent").is_none());
}

#[test]
fn partial_requests_return_the_pass_one_snapshot() {
    let registry = Registry::new();
    let full = registry.resolve::<Owner>();
    let partial = registry.resolve_model(Owner::model_type(), Readiness::Partial);

    assert_eq!(full.fields().len(), 3);
    assert_eq!(partial.fields().len(), 2);
    assert!(partial.fields().iter().all(|f| f.is_scalar_storable));
}

#[test]
fn embedding_promotes_columns_only() {
    let warm = Registry::new();
    warm.resolve::<Owner>();
    let kennels_warm = warm.resolve::<Kennel>();

    let cold = Registry::new();
    let kennels_cold = cold.resolve::<Kennel>();

    assert_eq!(summary(&kennels_warm), summary(&kennels_cold));
    assert_eq!(
        kennels_cold.columns().collect::<Vec<_>>(),
        vec!["name", "keeper_id", "keeper_name"]
    );
    assert!(kennels_cold.field_by_name("pets").is_none());
    assert_eq!(kennels_cold.relationships().count(), 0);
}

#[test]
fn duplicate_promoted_column_is_dropped() {
    let registry = Registry::new();
    let ledgers = registry.resolve::<Ledger>();

    assert_eq!(ledgers.columns().collect::<Vec<_>>(), vec!["id", "created_at"]);
    let id = ledgers.field_by_name("id").unwrap();
    assert_eq!(id.path_names, vec!["id"]);
    assert!(id.is_primary_key);
}
