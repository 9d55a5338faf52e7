// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Integration tests for the mode 2 dual writer
//!
//! These tests drive `DualWriterMode2` end to end over two in-memory stores
//! holding `ConfigMap` objects, and check the cross-store guarantees callers
//! rely on during a migration.
//!
//! Run with: cargo test --test dualwriter_integration

mod common;

use common::{config_map, labelled, names, value, RecordingStorage};
use dualwrite::accessor::ObjectAccessor;
use dualwrite::context::RequestContext;
use dualwrite::dualwriter::DualWriterMode2;
use dualwrite::labels::ORIGIN_KEY_LABEL;
use dualwrite::memory::{InMemoryStorage, StorageOperation};
use dualwrite::selector::{LabelSelector, Operator, Requirement};
use dualwrite::storage::{
    CreateOptions, DefaultUpdatedObjectInfo, DeleteOptions, GetOptions, ListOptions, Storage,
    UpdateFn, UpdateOptions, ValidateObject, ValidateObjectUpdate,
};
use dualwrite::storage_errors::Result;
use k8s_openapi::api::core::v1::ConfigMap;
use std::collections::BTreeSet;
use std::sync::Arc;

type Legacy = InMemoryStorage<ConfigMap>;
type Unified = RecordingStorage<InMemoryStorage<ConfigMap>>;
type Writer = DualWriterMode2<ConfigMap, Legacy, Unified>;

// ============================================================================
// Helper Functions
// ============================================================================

fn writer() -> Writer {
    DualWriterMode2::new(
        InMemoryStorage::new("legacy"),
        RecordingStorage::new(InMemoryStorage::new("unified")),
    )
}

fn unified(w: &Writer) -> &InMemoryStorage<ConfigMap> {
    w.storage().inner()
}

async fn create(w: &Writer, cm: ConfigMap) -> Result<ConfigMap> {
    w.create(
        &RequestContext::new(),
        cm,
        &ValidateObject::none(),
        &CreateOptions::default(),
    )
    .await
}

async fn get(w: &Writer, name: &str) -> Result<ConfigMap> {
    w.get(&RequestContext::new(), name, &GetOptions::default())
        .await
}

async fn list(w: &Writer) -> Result<Vec<ConfigMap>> {
    w.list(&RequestContext::new(), &ListOptions::default())
        .await
        .map(|l| l.items)
}

fn origin_keys_of(selector: &LabelSelector) -> BTreeSet<String> {
    let requirement = &selector.requirements()[0];
    assert_eq!(requirement.key(), ORIGIN_KEY_LABEL);
    assert_eq!(requirement.operator(), Operator::In);
    requirement.values().clone()
}

// ============================================================================
// Create / Get
// ============================================================================

#[tokio::test]
async fn test_create_then_get_returns_origin_key() {
    let w = writer();

    create(&w, config_map("a", Some("k1"), "1")).await.unwrap();
    let fetched = get(&w, "a").await.unwrap();

    assert_eq!(fetched.origin_key(), Some("k1"));
}

#[tokio::test]
async fn test_create_consistency_across_stores() {
    let w = writer();
    let mut cm = labelled(config_map("a", Some("k1"), "1"), "app", "web");
    cm.metadata
        .annotations
        .get_or_insert_with(Default::default)
        .insert("owner".to_string(), "alice".to_string());

    let created = create(&w, cm).await.unwrap();

    // Served from the new store
    let fetched = get(&w, "a").await.unwrap();
    assert_eq!(fetched.metadata.labels, created.metadata.labels);
    assert_eq!(fetched.metadata.annotations, created.metadata.annotations);
    assert_eq!(fetched.metadata.uid, created.metadata.uid);

    // Served from the legacy store once the new store loses the object
    unified(&w).fail_always(StorageOperation::Get);
    let fallback = get(&w, "a").await.unwrap();
    assert_eq!(fallback.metadata.labels, created.metadata.labels);
    assert_eq!(fallback.metadata.annotations, created.metadata.annotations);
}

#[tokio::test]
async fn test_get_fallback_returns_legacy_object_unmodified() {
    let w = writer();
    let seeded = w.legacy().seed(config_map("a", Some("k1"), "legacy")).await.unwrap();

    assert_eq!(get(&w, "a").await.unwrap(), seeded);

    unified(&w).seed(config_map("a", Some("k1"), "unified")).await.unwrap();
    unified(&w).fail_next(StorageOperation::Get);
    assert_eq!(get(&w, "a").await.unwrap(), seeded);
}

#[tokio::test]
async fn test_get_missing_in_both_stores_is_not_found() {
    let w = writer();
    let err = get(&w, "missing").await.unwrap_err();
    assert!(err.is_not_found());
}

// ============================================================================
// List Reconciliation
// ============================================================================

#[tokio::test]
async fn test_list_reconciliation_scenario() {
    let w = writer();
    w.legacy().seed(config_map("a", Some("k1"), "legacy-a")).await.unwrap();
    w.legacy().seed(config_map("b", Some("k2"), "legacy-b")).await.unwrap();
    unified(&w)
        .seed(labelled(config_map("a", Some("k1"), "unified-a"), "x", "1"))
        .await
        .unwrap();

    let items = list(&w).await.unwrap();

    assert_eq!(names(&items), vec!["a", "b"]);
    assert_eq!(items[0].metadata.labels.as_ref().unwrap()["x"], "1");
    assert_eq!(value(&items[1]), "legacy-b");

    let calls = w.storage().list_calls();
    assert_eq!(calls.len(), 1);
    let keys = origin_keys_of(calls[0].label_selector.as_ref().unwrap());
    assert_eq!(keys, BTreeSet::from(["k1".to_string(), "k2".to_string()]));
}

#[tokio::test]
async fn test_list_output_matches_legacy_shape() {
    let w = writer();
    let legacy_rows = [("d", "k4"), ("a", "k1"), ("c", "k3"), ("b", "k2")];
    for (name, key) in legacy_rows {
        w.legacy().seed(config_map(name, Some(key), "legacy")).await.unwrap();
    }
    for (name, key) in [("b", "k2"), ("d", "k4"), ("zz", "k1"), ("e", "k5")] {
        unified(&w).seed(config_map(name, Some(key), "unified")).await.unwrap();
    }

    let items = list(&w).await.unwrap();

    assert_eq!(names(&items), vec!["a", "b", "c", "d"]);
    let values: Vec<&str> = items.iter().map(value).collect();
    assert_eq!(values, vec!["legacy", "unified", "legacy", "unified"]);
}

#[tokio::test]
async fn test_empty_legacy_list_short_circuits() {
    let w = writer();
    unified(&w).seed(config_map("a", Some("k1"), "unified")).await.unwrap();

    let items = list(&w).await.unwrap();

    assert!(items.is_empty());
    assert!(w.storage().list_calls().is_empty());
    assert_eq!(unified(&w).calls(StorageOperation::List), 0);
}

// ============================================================================
// Update
// ============================================================================

#[tokio::test]
async fn test_update_keeps_new_store_identity() {
    let w = writer();
    create(&w, labelled(config_map("a", Some("k1"), "1"), "app", "web"))
        .await
        .unwrap();
    let before = unified(&w).snapshot().await.remove(0);

    let info = UpdateFn::new(|old: Option<&ConfigMap>| -> Result<ConfigMap> {
        let mut next = old.cloned().unwrap_or_default();
        next.data = Some([("v".to_string(), "2".to_string())].into());
        Ok(next)
    });
    let (updated, created) = w
        .update(
            &RequestContext::new(),
            "a",
            &info,
            &ValidateObject::none(),
            &ValidateObjectUpdate::none(),
            false,
            &UpdateOptions::default(),
        )
        .await
        .unwrap();

    assert!(!created);
    assert_eq!(value(&updated), "2");
    assert_eq!(updated.metadata.uid, before.metadata.uid);
    assert_eq!(updated.metadata.labels, before.metadata.labels);
    assert_eq!(updated.origin_key(), Some("k1"));
    assert_eq!(value(&w.legacy().snapshot().await[0]), "2");
    assert_eq!(value(&get(&w, "a").await.unwrap()), "2");
}

#[tokio::test]
async fn test_get_modify_update_round_trip() {
    let w = writer();
    create(&w, config_map("a", Some("k1"), "1")).await.unwrap();

    let mut fetched = get(&w, "a").await.unwrap();
    fetched.data = Some([("v".to_string(), "2".to_string())].into());

    let (updated, created) = w
        .update(
            &RequestContext::new(),
            "a",
            &DefaultUpdatedObjectInfo::new(fetched),
            &ValidateObject::none(),
            &ValidateObjectUpdate::none(),
            false,
            &UpdateOptions::default(),
        )
        .await
        .unwrap();

    assert!(!created);
    assert_eq!(value(&updated), "2");
    assert_eq!(value(&w.legacy().snapshot().await[0]), "2");
    assert_eq!(value(&get(&w, "a").await.unwrap()), "2");
}

// ============================================================================
// Delete / DeleteCollection
// ============================================================================

#[tokio::test]
async fn test_delete_tolerates_new_store_backend_error() {
    let w = writer();
    create(&w, config_map("a", Some("k1"), "1")).await.unwrap();
    let legacy_copy = w.legacy().snapshot().await.remove(0);
    unified(&w).fail_next(StorageOperation::Delete);

    let (deleted, _) = w
        .delete(
            &RequestContext::new(),
            "a",
            &ValidateObject::none(),
            &DeleteOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(deleted, legacy_copy);
    assert!(w.legacy().is_empty().await);
}

#[tokio::test]
async fn test_delete_collection_selector_is_exactly_the_deleted_keys() {
    let w = writer();
    for (name, key, tier) in [
        ("a", "k1", "front"),
        ("b", "k2", "back"),
        ("c", "k3", "front"),
        ("d", "k4", "front"),
    ] {
        create(&w, labelled(config_map(name, Some(key), "1"), "tier", tier))
            .await
            .unwrap();
    }
    // Deleted from legacy but carries no origin key
    w.legacy()
        .seed(labelled(config_map("e", None, "1"), "tier", "front"))
        .await
        .unwrap();
    let front = LabelSelector::from(Requirement::new("tier", Operator::Equals, ["front"]).unwrap());

    let deleted = w
        .delete_collection(
            &RequestContext::new(),
            &ValidateObject::none(),
            &DeleteOptions::default(),
            &ListOptions::with_selector(front),
        )
        .await
        .unwrap();

    assert_eq!(names(&deleted.items), vec!["a", "c", "d", "e"]);
    let calls = w.storage().delete_collection_calls();
    assert_eq!(calls.len(), 1);
    let keys = origin_keys_of(calls[0].label_selector.as_ref().unwrap());
    let expected: BTreeSet<String> = deleted
        .items
        .iter()
        .filter_map(|cm| cm.origin_key().map(str::to_string))
        .collect();
    assert_eq!(keys, expected);
    assert_eq!(names(&unified(&w).snapshot().await), vec!["b"]);
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_stay_consistent() {
    let w = Arc::new(writer());

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let w = Arc::clone(&w);
            tokio::spawn(async move {
                let name = format!("cm-{i:02}");
                let key = format!("key-{i:02}");
                create(&w, config_map(&name, Some(&key), "1")).await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let items = list(&w).await.unwrap();

    assert_eq!(items.len(), 16);
    assert_eq!(w.legacy().len().await, 16);
    assert_eq!(unified(&w).len().await, 16);
    assert!(items.iter().all(|cm| cm.origin_key().is_some()));
}
