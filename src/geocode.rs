//! Record-level geocoding.
//!
//! `GeocodingService` turns one record's address into coordinates through a
//! strict priority chain: manual coordinates, then the shared cache, then
//! (quota permitting) the provider. It mutates the record in place and
//! never persists, so the same entry point serves the background worker and
//! direct save paths.
//!
//! Resolution never hard-fails: a down provider or exhausted quota leaves
//! `geo` null and the record retryable, so a containing save operation can
//! always proceed.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::AddressCache;
use crate::models::{PlaceRecord, Resolution};
use crate::provider::{GeocodeOutcome, GeocodeProvider};
use crate::quota::QuotaTracker;
use crate::store::RecordStore;

pub struct GeocodingService {
    provider: Arc<dyn GeocodeProvider>,
    cache: Arc<dyn AddressCache>,
    quota: Arc<dyn QuotaTracker>,
    cache_ttl_seconds: u32,
}

impl GeocodingService {
    pub fn new(
        provider: Arc<dyn GeocodeProvider>,
        cache: Arc<dyn AddressCache>,
        quota: Arc<dyn QuotaTracker>,
        cache_ttl_seconds: u32,
    ) -> Self {
        Self {
            provider,
            cache,
            quota,
            cache_ttl_seconds,
        }
    }

    /// Resolve one record's coordinates, mutating `geo` and
    /// `geo_invalid_address` in place. Persistence is the caller's job.
    pub async fn resolve_record(&self, record: &mut PlaceRecord) -> Resolution {
        // Manually entered coordinates win outright: no cache, no quota,
        // no network.
        if let Some(point) = record.manual_point() {
            record.geo = Some(point);
            record.geo_invalid_address = false;
            return Resolution::Resolved;
        }

        let address = match record.address.as_deref() {
            Some(a) if !a.is_empty() => a.to_string(),
            _ => return Resolution::Deferred,
        };

        if let Some(point) = self.cache.get(&address).await {
            debug!("Cache hit for {:?}", address);
            record.geo = Some(point);
            record.geo_invalid_address = false;
            return Resolution::Resolved;
        }

        if !self.quota.check_and_reserve().await {
            // Not a failure; the record stays a candidate for a later pass.
            record.geo = None;
            record.geo_invalid_address = false;
            return Resolution::Deferred;
        }

        match self.provider.resolve(&address).await {
            Ok(GeocodeOutcome::Match(point)) => {
                record.geo = Some(point);
                record.geo_invalid_address = false;
                self.cache.set(&address, point, self.cache_ttl_seconds).await;
                Resolution::Resolved
            }
            Ok(GeocodeOutcome::NoMatch) => {
                // Definitive: mark the record so no pass ever retries it.
                record.geo = None;
                record.geo_invalid_address = true;
                Resolution::InvalidAddress
            }
            Err(err) => {
                warn!("Provider call failed for {:?}: {}", address, err);
                record.geo = None;
                record.geo_invalid_address = false;
                Resolution::Deferred
            }
        }
    }
}

/// Resolve a record and persist the outcome by identity; the call pattern
/// used by the background pass and by manual record saves alike.
///
/// A persistence failure is logged, not propagated: the record surfaces in
/// a later candidate query. (If the in-memory outcome was `InvalidAddress`
/// the record will be retried once more than strictly necessary; an
/// accepted limitation.)
pub async fn resolve_and_save(
    service: &GeocodingService,
    store: &dyn RecordStore,
    record: &mut PlaceRecord,
) -> Resolution {
    let outcome = service.resolve_record(record).await;

    if let Err(err) = store
        .update_resolution(&record.id, record.geo, record.geo_invalid_address)
        .await
    {
        warn!("Failed to persist resolution for {}: {:#}", record.id, err);
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoPoint;
    use crate::testutil::{ScriptedProvider, StubQuota, TestCache};

    fn service_with(
        provider: Arc<ScriptedProvider>,
        cache: Arc<TestCache>,
        quota: Arc<StubQuota>,
    ) -> GeocodingService {
        GeocodingService::new(provider, cache, quota, 86_400)
    }

    fn record(address: &str) -> PlaceRecord {
        PlaceRecord {
            id: "r1".into(),
            address: Some(address.into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_manual_override_skips_everything() {
        let provider = Arc::new(ScriptedProvider::default());
        let cache = Arc::new(TestCache::default());
        let quota = Arc::new(StubQuota::with_budget(0));
        let service = service_with(provider.clone(), cache.clone(), quota.clone());

        let mut rec = record("123 Main St");
        rec.lat = Some(47.37);
        rec.lng = Some(8.54);

        let outcome = service.resolve_record(&mut rec).await;

        assert_eq!(outcome, Resolution::Resolved);
        assert_eq!(rec.geo, Some(GeoPoint::new(8.54, 47.37)));
        assert!(!rec.geo_invalid_address);
        assert_eq!(provider.calls(), 0);
        assert_eq!(cache.gets(), 0);
        assert_eq!(quota.checks(), 0);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_provider() {
        let provider = Arc::new(ScriptedProvider::default());
        let cache = Arc::new(TestCache::default());
        let quota = Arc::new(StubQuota::with_budget(10));
        cache
            .set("123 Main St", GeoPoint::new(8.54, 47.37), 60)
            .await;
        let service = service_with(provider.clone(), cache, quota);

        let mut rec = record("123 Main St");
        let outcome = service.resolve_record(&mut rec).await;

        assert_eq!(outcome, Resolution::Resolved);
        assert_eq!(rec.geo, Some(GeoPoint::new(8.54, 47.37)));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_quota_exhausted_defers_without_provider_call() {
        let provider = Arc::new(ScriptedProvider::default());
        let service = service_with(
            provider.clone(),
            Arc::new(TestCache::default()),
            Arc::new(StubQuota::with_budget(0)),
        );

        let mut rec = record("123 Main St");
        let outcome = service.resolve_record(&mut rec).await;

        assert_eq!(outcome, Resolution::Deferred);
        assert!(rec.geo.is_none());
        assert!(!rec.geo_invalid_address);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_match_resolves_and_populates_cache() {
        let provider = Arc::new(ScriptedProvider::default());
        provider.stub_match("123 Main St", GeoPoint::new(8.54, 47.37));
        let cache = Arc::new(TestCache::default());
        let service = service_with(
            provider.clone(),
            cache.clone(),
            Arc::new(StubQuota::with_budget(10)),
        );

        let mut rec = record("123 Main St");
        let outcome = service.resolve_record(&mut rec).await;

        assert_eq!(outcome, Resolution::Resolved);
        assert_eq!(rec.geo, Some(GeoPoint::new(8.54, 47.37)));
        assert_eq!(provider.calls(), 1);
        assert_eq!(
            cache.get("123 Main St").await,
            Some(GeoPoint::new(8.54, 47.37))
        );
    }

    #[tokio::test]
    async fn test_no_match_marks_invalid() {
        let provider = Arc::new(ScriptedProvider::default());
        provider.stub_no_match("Nowhere, XX");
        let service = service_with(
            provider,
            Arc::new(TestCache::default()),
            Arc::new(StubQuota::with_budget(10)),
        );

        let mut rec = record("Nowhere, XX");
        let outcome = service.resolve_record(&mut rec).await;

        assert_eq!(outcome, Resolution::InvalidAddress);
        assert!(rec.geo.is_none());
        assert!(rec.geo_invalid_address);
        assert!(!rec.is_candidate());
    }

    #[tokio::test]
    async fn test_transient_error_defers_and_stays_candidate() {
        let provider = Arc::new(ScriptedProvider::default());
        // Unscripted addresses fail with a transport-style error.
        let cache = Arc::new(TestCache::default());
        let service = service_with(
            provider,
            cache.clone(),
            Arc::new(StubQuota::with_budget(10)),
        );

        let mut rec = record("123 Main St");
        let outcome = service.resolve_record(&mut rec).await;

        assert_eq!(outcome, Resolution::Deferred);
        assert!(rec.geo.is_none());
        assert!(!rec.geo_invalid_address);
        assert!(rec.is_candidate());
        assert!(cache.get("123 Main St").await.is_none());
    }
}
