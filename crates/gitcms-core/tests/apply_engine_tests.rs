//! Change application engine tests
//!
//! ## Scenarios Covered
//!
//! 1. Idempotent create
//! 2. Upsert on update
//! 3. Idempotent delete
//! 4. Identity preservation on update
//! 5. Order-sensitive batches
//! 6. Singleton replace-only semantics

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{array_state, items, singleton_state};
use gitcms_core::{
    apply_changes, group_by_collection, CollectionKind, Edit, Operation, SnapshotContent,
};
use serde_json::json;

#[test]
fn test_create_of_existing_id_does_not_duplicate() {
    // GIVEN a collection holding v1
    let state = array_state(CollectionKind::Videos, vec![json!({"id": "v1"})]);

    // WHEN a create for v1 is applied
    let edits = vec![Edit::create(
        CollectionKind::Videos,
        json!({"id": "v1", "title": "X"}),
    )];
    let next = apply_changes(state, &group_by_collection(&edits)).unwrap();

    // THEN there is still exactly one, unchanged v1
    assert_eq!(items(&next, CollectionKind::Videos), vec![json!({"id": "v1"})]);
}

#[test]
fn test_update_of_missing_id_inserts() {
    let state = array_state(CollectionKind::Videos, vec![]);

    let edits = vec![Edit::update(
        CollectionKind::Videos,
        json!({"id": "v9", "name": "New"}),
    )];
    let next = apply_changes(state, &group_by_collection(&edits)).unwrap();

    assert_eq!(
        items(&next, CollectionKind::Videos),
        vec![json!({"id": "v9", "name": "New"})]
    );
}

#[test]
fn test_delete_of_missing_id_is_noop() {
    let state = array_state(CollectionKind::Videos, vec![json!({"id": "a"})]);

    let edits = vec![Edit::delete(CollectionKind::Videos, "zzz")];
    let next = apply_changes(state, &group_by_collection(&edits)).unwrap();

    assert_eq!(items(&next, CollectionKind::Videos), vec![json!({"id": "a"})]);
}

#[test]
fn test_update_never_rewrites_identifier() {
    // GIVEN an update whose data carries no id
    let state = array_state(
        CollectionKind::Coaches,
        vec![json!({"id": "coach-1", "name": "Old"})],
    );
    let edits = vec![Edit::new(
        CollectionKind::Coaches,
        Operation::Update,
        "coach-1",
        json!({"name": "New"}),
    )];

    let next = apply_changes(state, &group_by_collection(&edits)).unwrap();

    // THEN the record keeps its id
    assert_eq!(
        items(&next, CollectionKind::Coaches),
        vec![json!({"id": "coach-1", "name": "New"})]
    );
}

#[test]
fn test_batch_order_is_respected() {
    // create v2, update v1, delete v2 against [v1]
    let state = array_state(CollectionKind::Videos, vec![json!({"id": "v1"})]);
    let edits = vec![
        Edit::create(CollectionKind::Videos, json!({"id": "v2"})),
        Edit::update(
            CollectionKind::Videos,
            json!({"id": "v1", "title": "Updated"}),
        ),
        Edit::delete(CollectionKind::Videos, "v2"),
    ];

    let next = apply_changes(state, &group_by_collection(&edits)).unwrap();

    assert_eq!(
        items(&next, CollectionKind::Videos),
        vec![json!({"id": "v1", "title": "Updated"})]
    );
}

#[test]
fn test_reordered_batch_gives_different_result() {
    // delete before create leaves v2 in place
    let state = array_state(CollectionKind::Videos, vec![json!({"id": "v1"})]);
    let edits = vec![
        Edit::delete(CollectionKind::Videos, "v2"),
        Edit::create(CollectionKind::Videos, json!({"id": "v2"})),
    ];

    let next = apply_changes(state, &group_by_collection(&edits)).unwrap();

    assert_eq!(
        items(&next, CollectionKind::Videos),
        vec![json!({"id": "v1"}), json!({"id": "v2"})]
    );
}

#[test]
fn test_singleton_create_and_delete_are_ignored() {
    let original = json!({"headline": "About us"});
    let state = singleton_state(CollectionKind::About, original.clone());

    let edits = vec![
        Edit::create(CollectionKind::About, json!({"headline": "Replaced?"})),
        Edit::delete(CollectionKind::About, ""),
    ];
    let next = apply_changes(state, &group_by_collection(&edits)).unwrap();

    assert_eq!(
        next.get(CollectionKind::About).unwrap().content,
        SnapshotContent::Singleton(original)
    );
}

#[test]
fn test_singleton_update_replaces_whole_document() {
    let state = singleton_state(
        CollectionKind::Sponsorships,
        json!({"tiers": ["gold"], "contact": "a@b.c"}),
    );

    let edits = vec![Edit::update(
        CollectionKind::Sponsorships,
        json!({"tiers": ["silver"]}),
    )];
    let next = apply_changes(state, &group_by_collection(&edits)).unwrap();

    assert_eq!(
        next.get(CollectionKind::Sponsorships).unwrap().content,
        SnapshotContent::Singleton(json!({"tiers": ["silver"]}))
    );
}

#[test]
fn test_edits_across_collections_apply_independently() {
    let state = array_state(CollectionKind::Videos, vec![json!({"id": "v1"})]).with_snapshot(
        gitcms_core::CollectionSnapshot::new(
            CollectionKind::Events,
            gitcms_core::VersionToken::new("events-0"),
            SnapshotContent::Array(vec![]),
        ),
    );
    let edits = vec![
        Edit::create(CollectionKind::Events, json!({"id": "e1"})),
        Edit::delete(CollectionKind::Videos, "v1"),
    ];

    let next = apply_changes(state, &group_by_collection(&edits)).unwrap();

    assert!(items(&next, CollectionKind::Videos).is_empty());
    assert_eq!(items(&next, CollectionKind::Events), vec![json!({"id": "e1"})]);
}
