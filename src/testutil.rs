//! In-memory doubles for the provider, cache, quota, and record store seams.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::cache::AddressCache;
use crate::models::{GeoPoint, PlaceRecord};
use crate::provider::{GeocodeOutcome, GeocodeProvider, ProviderError};
use crate::quota::QuotaTracker;
use crate::search::RecordQuery;
use crate::store::RecordStore;

/// Provider double with scripted per-address outcomes. Unscripted addresses
/// fail with a transient error.
#[derive(Default)]
pub struct ScriptedProvider {
    outcomes: Mutex<HashMap<String, GeocodeOutcome>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn stub_match(&self, address: &str, point: GeoPoint) {
        self.outcomes
            .lock()
            .unwrap()
            .insert(address.to_string(), GeocodeOutcome::Match(point));
    }

    pub fn stub_no_match(&self, address: &str) {
        self.outcomes
            .lock()
            .unwrap()
            .insert(address.to_string(), GeocodeOutcome::NoMatch);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GeocodeProvider for ScriptedProvider {
    async fn resolve(&self, address: &str) -> Result<GeocodeOutcome, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcomes
            .lock()
            .unwrap()
            .get(address)
            .copied()
            .ok_or_else(|| ProviderError::Rejected("scripted transient failure".to_string()))
    }
}

/// Cache double; TTLs are recorded but never expire within a test.
#[derive(Default)]
pub struct TestCache {
    entries: Mutex<HashMap<String, GeoPoint>>,
    gets: AtomicUsize,
}

impl TestCache {
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AddressCache for TestCache {
    async fn get(&self, address: &str) -> Option<GeoPoint> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.entries.lock().unwrap().get(address).copied()
    }

    async fn set(&self, address: &str, point: GeoPoint, _ttl_seconds: u32) {
        self.entries
            .lock()
            .unwrap()
            .insert(address.to_string(), point);
    }
}

/// Quota double handing out a fixed budget of reservations.
pub struct StubQuota {
    budget: Mutex<u32>,
    checks: AtomicUsize,
    purges: AtomicUsize,
}

impl StubQuota {
    pub fn with_budget(budget: u32) -> Self {
        Self {
            budget: Mutex::new(budget),
            checks: AtomicUsize::new(0),
            purges: AtomicUsize::new(0),
        }
    }

    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }

    pub fn purges(&self) -> usize {
        self.purges.load(Ordering::SeqCst)
    }

    pub fn refill(&self, budget: u32) {
        *self.budget.lock().unwrap() = budget;
    }
}

#[async_trait]
impl QuotaTracker for StubQuota {
    async fn check_and_reserve(&self) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst);
        let mut budget = self.budget.lock().unwrap();
        if *budget == 0 {
            return false;
        }
        *budget -= 1;
        true
    }

    async fn purge_stale(&self) {
        self.purges.fetch_add(1, Ordering::SeqCst);
    }
}

/// Record store double over a plain map; candidate selection reuses the
/// real invariant.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: Mutex<HashMap<String, PlaceRecord>>,
    update_failures: Mutex<Vec<String>>,
}

impl MemoryRecordStore {
    pub fn insert(&self, record: PlaceRecord) {
        self.records
            .lock()
            .unwrap()
            .insert(record.id.clone(), record);
    }

    pub fn get(&self, id: &str) -> Option<PlaceRecord> {
        self.records.lock().unwrap().get(id).cloned()
    }

    /// Make future updates of the given record id fail.
    pub fn fail_updates_for(&self, id: &str) {
        self.update_failures.lock().unwrap().push(id.to_string());
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn find_candidates(&self, limit: usize) -> anyhow::Result<Vec<PlaceRecord>> {
        let records = self.records.lock().unwrap();
        let mut candidates: Vec<PlaceRecord> = records
            .values()
            .filter(|r| r.is_candidate())
            .cloned()
            .collect();
        // Deterministic order for tests
        candidates.sort_by(|a, b| a.id.cmp(&b.id));
        candidates.truncate(limit);
        Ok(candidates)
    }

    async fn update_resolution(
        &self,
        id: &str,
        geo: Option<GeoPoint>,
        geo_invalid_address: bool,
    ) -> anyhow::Result<()> {
        if self.update_failures.lock().unwrap().iter().any(|f| f == id) {
            anyhow::bail!("injected update failure for {}", id);
        }

        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(id)
            .ok_or_else(|| anyhow::anyhow!("no record {}", id))?;
        record.geo = geo;
        record.geo_invalid_address = geo_invalid_address;
        Ok(())
    }

    async fn search(&self, _query: &RecordQuery) -> anyhow::Result<Vec<PlaceRecord>> {
        let records = self.records.lock().unwrap();
        Ok(records.values().cloned().collect())
    }
}
