//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use questdeck_core::{
    CachedSelection, Catalog, CatalogDb, CatalogError, Category, Challenge, ChallengeId,
    ChallengePatch, ChallengeService, LocalCache, MemoryStore, PropagationConfig, RotationConfig,
    SnapshotKey, SnapshotStore, StaticAdmins, StoreError, UserId,
};

pub const ADMIN: &str = "admin";

pub fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

pub fn challenge(id: &str, category: Category) -> Challenge {
    Challenge {
        id: id.to_string(),
        title: format!("Title {id}"),
        text: format!("Text {id}"),
        category,
        character: "fox".to_string(),
        allows_drawing: false,
        created_at: at(2024, 1, 1, 0),
    }
}

pub fn selection(user_id: &str, category: Category, ids: &[&str], ts: DateTime<Utc>) -> CachedSelection {
    CachedSelection::new(
        user_id,
        category,
        ids.iter().map(|id| challenge(id, category)).collect(),
        ts,
    )
}

pub fn item_ids(selection: &CachedSelection) -> Vec<String> {
    selection.items.iter().map(|c| c.id.clone()).collect()
}

/// In-memory catalog seeded with `daily` and `weekly` ids plus non-admin `users`.
pub fn seeded_catalog(daily: &[&str], weekly: &[&str], users: &[&str]) -> CatalogDb {
    let db = CatalogDb::open_memory().unwrap();
    for id in daily {
        db.insert_challenge(&challenge(id, Category::Daily)).unwrap();
    }
    for id in weekly {
        db.insert_challenge(&challenge(id, Category::Weekly)).unwrap();
    }
    for user in users {
        db.add_user(user, false).unwrap();
    }
    db.add_user(ADMIN, true).unwrap();
    db
}

/// UTC day boundary and a fixed seed so tests are reproducible.
pub fn rotation_config() -> RotationConfig {
    RotationConfig {
        utc_offset_minutes: Some(0),
        seed: Some(7),
        ..Default::default()
    }
}

pub fn propagation_config() -> PropagationConfig {
    PropagationConfig {
        max_concurrency: 3,
        seed: Some(11),
    }
}

pub fn service(catalog: Arc<dyn Catalog>, store: Arc<dyn SnapshotStore>) -> ChallengeService {
    ChallengeService::new(
        catalog,
        Arc::new(StaticAdmins::new([ADMIN])),
        LocalCache::new(store),
        rotation_config(),
        propagation_config(),
    )
}

/// Memory store whose reads/writes fail or panic for chosen users.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_reads: Mutex<HashSet<UserId>>,
    pub fail_writes: Mutex<HashSet<UserId>>,
    pub panic_on: Mutex<HashSet<UserId>>,
}

impl FlakyStore {
    pub fn fail_writes_for(&self, user_id: &str) {
        self.fail_writes.lock().unwrap().insert(user_id.to_string());
    }

    pub fn fail_reads_for(&self, user_id: &str) {
        self.fail_reads.lock().unwrap().insert(user_id.to_string());
    }

    pub fn panic_for(&self, user_id: &str) {
        self.panic_on.lock().unwrap().insert(user_id.to_string());
    }
}

impl SnapshotStore for FlakyStore {
    fn get(&self, key: &SnapshotKey) -> Result<Option<String>, StoreError> {
        if self.panic_on.lock().unwrap().contains(&key.user_id) {
            panic!("injected panic for {key}");
        }
        if self.fail_reads.lock().unwrap().contains(&key.user_id) {
            return Err(StoreError::QueryFailed("injected read failure".into()));
        }
        self.inner.get(key)
    }

    fn put(&self, key: &SnapshotKey, payload: &str) -> Result<(), StoreError> {
        if self.fail_writes.lock().unwrap().contains(&key.user_id) {
            return Err(StoreError::Locked);
        }
        self.inner.put(key, payload)
    }

    fn keys(&self) -> Result<Vec<SnapshotKey>, StoreError> {
        self.inner.keys()
    }
}

/// Memory store that records how many reads overlap and the order of
/// writes. Every read sleeps for `read_delay`, longer for chosen users.
#[derive(Default)]
pub struct ObservedStore {
    pub inner: MemoryStore,
    pub read_delay: Duration,
    slow: Mutex<HashMap<UserId, Duration>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    writes: Mutex<Vec<UserId>>,
}

impl ObservedStore {
    pub fn with_read_delay(read_delay: Duration) -> Self {
        Self {
            read_delay,
            ..Default::default()
        }
    }

    pub fn slow_for(&self, user_id: &str, delay: Duration) {
        self.slow.lock().unwrap().insert(user_id.to_string(), delay);
    }

    /// Most reads ever in flight at once.
    pub fn peak_reads(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Users in the order their writes landed.
    pub fn write_order(&self) -> Vec<UserId> {
        self.writes.lock().unwrap().clone()
    }
}

impl SnapshotStore for ObservedStore {
    fn get(&self, key: &SnapshotKey) -> Result<Option<String>, StoreError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        let delay = self
            .slow
            .lock()
            .unwrap()
            .get(&key.user_id)
            .copied()
            .unwrap_or(self.read_delay);
        thread::sleep(delay);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.inner.get(key)
    }

    fn put(&self, key: &SnapshotKey, payload: &str) -> Result<(), StoreError> {
        self.inner.put(key, payload)?;
        self.writes.lock().unwrap().push(key.user_id.clone());
        Ok(())
    }

    fn keys(&self) -> Result<Vec<SnapshotKey>, StoreError> {
        self.inner.keys()
    }
}

/// Catalog wrapper whose queries can be switched off.
pub struct FlakyCatalog {
    pub inner: CatalogDb,
    pub pools_down: AtomicBool,
    pub users_down: AtomicBool,
    pub completions_down: AtomicBool,
}

impl FlakyCatalog {
    pub fn new(inner: CatalogDb) -> Self {
        Self {
            inner,
            pools_down: AtomicBool::new(false),
            users_down: AtomicBool::new(false),
            completions_down: AtomicBool::new(false),
        }
    }

    fn check(flag: &AtomicBool) -> Result<(), CatalogError> {
        if flag.load(Ordering::SeqCst) {
            Err(CatalogError::QueryFailed("injected outage".into()))
        } else {
            Ok(())
        }
    }
}

impl Catalog for FlakyCatalog {
    fn list_by_category(&self, category: Category) -> Result<Vec<Challenge>, CatalogError> {
        Self::check(&self.pools_down)?;
        self.inner.list_by_category(category)
    }

    fn list_user_ids(&self) -> Result<Vec<UserId>, CatalogError> {
        Self::check(&self.users_down)?;
        self.inner.list_user_ids()
    }

    fn get_completed_ids(&self, user_id: &str) -> Result<HashSet<ChallengeId>, CatalogError> {
        Self::check(&self.completions_down)?;
        self.inner.get_completed_ids(user_id)
    }

    fn get_challenge(&self, challenge_id: &str) -> Result<Option<Challenge>, CatalogError> {
        self.inner.get_challenge(challenge_id)
    }

    fn update_challenge(
        &self,
        challenge_id: &str,
        patch: &ChallengePatch,
    ) -> Result<Challenge, CatalogError> {
        self.inner.update_challenge(challenge_id, patch)
    }

    fn delete_challenge(&self, challenge_id: &str) -> Result<bool, CatalogError> {
        self.inner.delete_challenge(challenge_id)
    }
}
