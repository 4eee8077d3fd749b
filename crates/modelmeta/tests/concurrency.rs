use std::sync::{Arc, Barrier};
use std::thread;

use modelmeta::prelude::*;

#[derive(Model, Default, Debug)]
struct Author {
    id: i64,
    name: String,
    books: Vec<Book>,
}

#[derive(Model, Default, Debug)]
struct Book {
    id: i64,
    author_id: i64,
    title: String,
    author: Option<Author>,
    reviews: Vec<Review>,
}

#[derive(Model, Default, Debug)]
struct Review {
    id: i64,
    book_id: i64,
    stars: i32,
}

const THREADS: usize = 16;

fn kind_of(meta: &ModelMetadata, field: &str) -> RelationshipKind {
    meta.field_by_name(field)
        .and_then(|f| f.relationship.as_ref())
        .map(|r| r.kind)
        .unwrap_or_else(|| panic!("{field} has no relationship"))
}

#[test]
fn concurrent_first_requests_share_one_instance() {
    let registry = Registry::new();
    let barrier = Barrier::new(THREADS);

    let results: Vec<Arc<ModelMetadata>> = thread::scope(|s| {
        let registry = &registry;
        let barrier = &barrier;
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(move || {
                    barrier.wait();
                    registry.resolve::<Author>()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let first = &results[0];
    assert!(results.iter().all(|m| Arc::ptr_eq(m, first)));
    assert_eq!(registry.len(), 3);
}

#[test]
fn concurrent_cyclic_requests_complete() {
    let registry = Registry::new();
    let barrier = Barrier::new(THREADS);

    let results: Vec<Arc<ModelMetadata>> = thread::scope(|s| {
        let registry = &registry;
        let barrier = &barrier;
        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                s.spawn(move || {
                    barrier.wait();
                    match i % 3 {
                        0 => registry.resolve::<Author>(),
                        1 => registry.resolve::<Book>(),
                        _ => registry.resolve::<Review>(),
                    }
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for meta in &results {
        match meta.type_name {
            "Author" => assert!(Arc::ptr_eq(meta, &registry.resolve::<Author>())),
            "Book" => assert!(Arc::ptr_eq(meta, &registry.resolve::<Book>())),
            "Review" => assert!(Arc::ptr_eq(meta, &registry.resolve::<Review>())),
            other => panic!("unexpected model {other}"),
        }
    }

    let authors = registry.resolve::<Author>();
    let books = registry.resolve::<Book>();
    assert_eq!(kind_of(&authors, "books"), RelationshipKind::OneToMany);
    assert_eq!(kind_of(&books, "author"), RelationshipKind::ManyToOne);
    assert_eq!(kind_of(&books, "reviews"), RelationshipKind::OneToMany);
    assert!(books.field_by_name("author_id").unwrap().is_foreign_key());
    assert!(registry.resolve::<Review>().field_by_name("book_id").unwrap().is_foreign_key());
}

#[test]
fn repeated_requests_return_the_cached_instance() {
    let registry = Registry::new();
    let first = registry.resolve::<Review>();
    for _ in 0..10 {
        assert!(Arc::ptr_eq(&first, &registry.resolve::<Review>()));
    }
    assert_eq!(registry.len(), 1);
}

#[test]
fn shared_registry_is_process_wide() {
    let a = Registry::shared();
    let b = Registry::shared();
    assert!(Arc::ptr_eq(&a, &b));

    let cx = Context::shared();
    assert!(Arc::ptr_eq(cx.registry(), &a));
    let via_context = cx.resolve::<Review>();
    assert!(Arc::ptr_eq(&via_context, &a.resolve::<Review>()));
}
