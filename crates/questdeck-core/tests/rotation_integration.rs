//! Integration tests for the user read path: rotate-if-stale, then hide
//! completed items.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::Duration;
use common::*;
use questdeck_core::{Category, LocalCache, MemoryStore, SnapshotKey, SnapshotStore};

fn ids(items: &[questdeck_core::Challenge]) -> Vec<String> {
    items.iter().map(|c| c.id.clone()).collect()
}

#[test]
fn first_read_materializes_a_full_snapshot() {
    let catalog = Arc::new(seeded_catalog(&["a", "b", "c", "d"], &["w1", "w2", "w3", "w4"], &["u1"]));
    let store = Arc::new(MemoryStore::new());
    let svc = service(catalog, store.clone());
    let now = at(2024, 1, 3, 9);

    let daily = svc.get_visible_challenges_at("u1", Category::Daily, now);
    let weekly = svc.get_visible_challenges_at("u1", Category::Weekly, now);
    assert_eq!(daily.len(), 2);
    assert_eq!(weekly.len(), 3);
    assert!(daily.iter().all(|c| c.category == Category::Daily));
    assert!(weekly.iter().all(|c| c.category == Category::Weekly));

    let cached = LocalCache::new(store).load("u1", Category::Daily).unwrap().unwrap();
    assert_eq!(ids(&cached.items), ids(&daily));
    assert_eq!(cached.timestamp, now);
    assert!(cached.has_unique_ids());
}

#[test]
fn daily_snapshot_is_stable_within_a_day_and_rotates_after() {
    let catalog = Arc::new(seeded_catalog(&["a", "b", "c", "d", "e", "f"], &[], &["u1"]));
    let store = Arc::new(MemoryStore::new());
    let svc = service(catalog, store.clone());
    let cache = LocalCache::new(store);

    let morning = at(2024, 1, 3, 7);
    let first = svc.get_visible_challenges_at("u1", Category::Daily, morning);
    let evening = svc.get_visible_challenges_at("u1", Category::Daily, at(2024, 1, 3, 22));
    assert_eq!(ids(&first), ids(&evening));
    assert_eq!(cache.load("u1", Category::Daily).unwrap().unwrap().timestamp, morning);

    let later = at(2024, 1, 5, 7);
    svc.get_visible_challenges_at("u1", Category::Daily, later);
    assert_eq!(cache.load("u1", Category::Daily).unwrap().unwrap().timestamp, later);
}

#[test]
fn weekly_snapshot_waits_for_monday() {
    let catalog = Arc::new(seeded_catalog(&[], &["w1", "w2", "w3", "w4", "w5"], &["u1"]));
    let store = Arc::new(MemoryStore::new());
    let svc = service(catalog, store.clone());
    let cache = LocalCache::new(store);

    let taken = at(2023, 12, 31, 9);
    svc.get_visible_challenges_at("u1", Category::Weekly, taken);

    // Ten days later, on a Wednesday.
    let wednesday = taken + Duration::days(10);
    svc.get_visible_challenges_at("u1", Category::Weekly, wednesday);
    assert_eq!(cache.load("u1", Category::Weekly).unwrap().unwrap().timestamp, taken);

    let monday = at(2024, 1, 15, 9);
    svc.get_visible_challenges_at("u1", Category::Weekly, monday);
    assert_eq!(cache.load("u1", Category::Weekly).unwrap().unwrap().timestamp, monday);
}

#[test]
fn small_pool_fills_what_it_can() {
    let catalog = Arc::new(seeded_catalog(&["only"], &[], &["u1"]));
    let svc = service(catalog, Arc::new(MemoryStore::new()));
    let now = at(2024, 1, 3, 9);

    assert_eq!(ids(&svc.get_visible_challenges_at("u1", Category::Daily, now)), vec!["only"]);
    assert!(svc.get_visible_challenges_at("u1", Category::Weekly, now).is_empty());
}

#[test]
fn completed_items_hide_but_keep_their_slot() {
    let catalog = Arc::new(seeded_catalog(&["a", "b", "c"], &[], &["u1"]));
    let store = Arc::new(MemoryStore::new());
    let svc = service(catalog.clone(), store.clone());
    let now = at(2024, 1, 3, 9);

    let shown = svc.get_visible_challenges_at("u1", Category::Daily, now);
    catalog.record_completion("u1", &shown[0].id, now).unwrap();
    let after = svc.get_visible_challenges_at("u1", Category::Daily, now + Duration::hours(1));
    assert_eq!(ids(&after), vec![shown[1].id.clone()]);

    catalog.record_completion("u1", &shown[1].id, now).unwrap();
    assert!(svc
        .get_visible_challenges_at("u1", Category::Daily, now + Duration::hours(2))
        .is_empty());

    let cached = LocalCache::new(store).load("u1", Category::Daily).unwrap().unwrap();
    assert_eq!(ids(&cached.items), ids(&shown));
}

#[test]
fn corrupt_snapshot_triggers_fresh_rotation() {
    let catalog = Arc::new(seeded_catalog(&["a", "b", "c"], &[], &["u1"]));
    let store = Arc::new(MemoryStore::new());
    store
        .put(&SnapshotKey::new("u1", Category::Daily), "{\"items\": 12")
        .unwrap();
    let svc = service(catalog, store.clone());
    let now = at(2024, 1, 3, 9);

    assert_eq!(svc.get_visible_challenges_at("u1", Category::Daily, now).len(), 2);
    let cached = LocalCache::new(store).load("u1", Category::Daily).unwrap().unwrap();
    assert_eq!(cached.timestamp, now);
}

#[test]
fn catalog_outage_keeps_stale_snapshot() {
    let catalog = Arc::new(FlakyCatalog::new(seeded_catalog(&["a", "b", "c"], &[], &["u1"])));
    let store = Arc::new(MemoryStore::new());
    let svc = service(catalog.clone(), store.clone());

    let day_one = at(2024, 1, 3, 9);
    let shown = svc.get_visible_challenges_at("u1", Category::Daily, day_one);

    catalog.pools_down.store(true, Ordering::SeqCst);
    let day_two = svc.get_visible_challenges_at("u1", Category::Daily, at(2024, 1, 4, 9));
    assert_eq!(ids(&day_two), ids(&shown));
    let cached = LocalCache::new(store).load("u1", Category::Daily).unwrap().unwrap();
    assert_eq!(cached.timestamp, day_one);
}

#[test]
fn catalog_outage_without_snapshot_degrades_to_empty() {
    let catalog = Arc::new(FlakyCatalog::new(seeded_catalog(&["a", "b"], &[], &["u1"])));
    catalog.pools_down.store(true, Ordering::SeqCst);
    let store = Arc::new(MemoryStore::new());
    let svc = service(catalog, store.clone());

    assert!(svc
        .get_visible_challenges_at("u1", Category::Daily, at(2024, 1, 3, 9))
        .is_empty());
    assert!(store.is_empty());
}

#[test]
fn completion_outage_degrades_to_empty() {
    let catalog = Arc::new(FlakyCatalog::new(seeded_catalog(&["a", "b"], &[], &["u1"])));
    catalog.completions_down.store(true, Ordering::SeqCst);
    let svc = service(catalog, Arc::new(MemoryStore::new()));

    assert!(svc
        .get_visible_challenges_at("u1", Category::Daily, at(2024, 1, 3, 9))
        .is_empty());
}

#[test]
fn failed_write_still_serves_the_fresh_draw() {
    let catalog = Arc::new(seeded_catalog(&["a", "b", "c"], &[], &["u1"]));
    let store = Arc::new(FlakyStore::default());
    store.fail_writes_for("u1");
    let svc = service(catalog, store.clone());

    let shown = svc.get_visible_challenges_at("u1", Category::Daily, at(2024, 1, 3, 9));
    assert_eq!(shown.len(), 2);
    assert!(store.inner.is_empty());
}

#[test]
fn unreadable_store_is_treated_as_absent() {
    let catalog = Arc::new(seeded_catalog(&["a", "b", "c"], &[], &["u1"]));
    let store = Arc::new(FlakyStore::default());
    store.fail_reads_for("u1");
    let svc = service(catalog, store.clone());

    let shown = svc.get_visible_challenges_at("u1", Category::Daily, at(2024, 1, 3, 9));
    assert_eq!(shown.len(), 2);
    assert_eq!(store.inner.len(), 1);
}
