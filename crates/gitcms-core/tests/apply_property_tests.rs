//! Property tests for the change application engine and the cleaner

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{array_state, items};
use gitcms_core::{
    apply_changes, group_by_collection, prune_dangling_references, CollectionKind, Document,
    Edit, Operation,
};
use proptest::prelude::*;
use serde_json::json;
use std::collections::{BTreeSet, HashSet};

fn arb_id() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["a", "b", "c", "d", "e"]).prop_map(str::to_string)
}

fn arb_edit() -> impl Strategy<Value = Edit> {
    (
        arb_id(),
        prop_oneof![
            Just(Operation::Create),
            Just(Operation::Update),
            Just(Operation::Delete)
        ],
        0u32..100,
    )
        .prop_map(|(id, operation, rev)| match operation {
            Operation::Delete => Edit::delete(CollectionKind::Videos, id),
            op => Edit::new(
                CollectionKind::Videos,
                op,
                id.clone(),
                json!({"id": id, "rev": rev}),
            ),
        })
}

fn arb_collection() -> impl Strategy<Value = Vec<Document>> {
    prop::collection::btree_set(arb_id(), 0..5)
        .prop_map(|ids| ids.into_iter().map(|id| json!({"id": id})).collect())
}

fn ids_of(docs: &[Document]) -> Vec<String> {
    docs.iter()
        .filter_map(|d| d["id"].as_str().map(str::to_string))
        .collect()
}

proptest! {
    #[test]
    fn prop_ids_stay_unique(start in arb_collection(), edits in prop::collection::vec(arb_edit(), 0..20)) {
        let state = array_state(CollectionKind::Videos, start);
        let next = apply_changes(state, &group_by_collection(&edits)).unwrap();

        let ids = ids_of(&items(&next, CollectionKind::Videos));
        let unique: HashSet<_> = ids.iter().collect();
        prop_assert_eq!(ids.len(), unique.len());
    }

    #[test]
    fn prop_replaying_creates_and_deletes_is_idempotent(
        start in arb_collection(),
        ids in prop::collection::vec(arb_id(), 1..6),
        delete in any::<bool>(),
    ) {
        let edits: Vec<Edit> = ids
            .iter()
            .map(|id| if delete {
                Edit::delete(CollectionKind::Videos, id.clone())
            } else {
                Edit::create(CollectionKind::Videos, json!({"id": id}))
            })
            .collect();
        let grouped = group_by_collection(&edits);

        let once = apply_changes(array_state(CollectionKind::Videos, start), &grouped).unwrap();
        let twice = apply_changes(once.clone(), &grouped).unwrap();

        prop_assert_eq!(items(&once, CollectionKind::Videos), items(&twice, CollectionKind::Videos));
    }

    #[test]
    fn prop_update_keeps_pre_image_ids(start in arb_collection(), id in arb_id()) {
        let before: BTreeSet<String> = ids_of(&start).into_iter().collect();
        let edits = vec![Edit::update(CollectionKind::Videos, json!({"id": id.clone(), "x": 1}))];

        let next = apply_changes(array_state(CollectionKind::Videos, start), &group_by_collection(&edits)).unwrap();
        let after: BTreeSet<String> = ids_of(&items(&next, CollectionKind::Videos)).into_iter().collect();

        let mut expected = before.clone();
        expected.insert(id);
        prop_assert_eq!(after, expected);
    }

    #[test]
    fn prop_pruning_is_idempotent(
        refs in prop::collection::vec(arb_id(), 0..8),
        valid in prop::collection::btree_set(arb_id(), 0..5),
    ) {
        let state = array_state(
            CollectionKind::BuildOrders,
            vec![json!({"id": "bo-1", "videoIds": refs})],
        );

        let once = prune_dangling_references(state, &valid);
        let twice = prune_dangling_references(once.clone(), &valid);
        prop_assert_eq!(&once, &twice);

        let remaining = items(&once, CollectionKind::BuildOrders)[0]["videoIds"].clone();
        for id in remaining.as_array().unwrap() {
            prop_assert!(valid.contains(id.as_str().unwrap()));
        }
    }
}
