//! Shared address-result cache.
//!
//! Identical addresses show up on many records (and on many instances), so
//! resolved points are kept in a shared TTL'd cache keyed by the verbatim
//! address string. A hit must short-circuit the provider entirely.

use async_trait::async_trait;
use tracing::warn;

use crate::models::GeoPoint;
use crate::scylla::ScyllaClient;

/// Addresses rarely move; one day is plenty.
pub const DEFAULT_TTL_SECONDS: u32 = 86_400;

#[async_trait]
pub trait AddressCache: Send + Sync {
    /// Look up a previously resolved point. Absence just means "resolve via
    /// provider"; it is never an error.
    async fn get(&self, address: &str) -> Option<GeoPoint>;

    /// Store a resolved point with a time-to-live in seconds.
    async fn set(&self, address: &str, point: GeoPoint, ttl_seconds: u32);
}

/// Cache backed by the shared Scylla keyspace; entries expire via row TTL.
pub struct ScyllaAddressCache {
    client: ScyllaClient,
}

impl ScyllaAddressCache {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AddressCache for ScyllaAddressCache {
    async fn get(&self, address: &str) -> Option<GeoPoint> {
        let raw = match self.client.cache_get(address).await {
            Ok(raw) => raw?,
            Err(err) => {
                // A broken cache degrades to a miss, never to a failure.
                warn!("Cache lookup failed for {:?}: {:#}", address, err);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(point) => Some(point),
            Err(err) => {
                warn!("Discarding unparseable cache entry for {:?}: {}", address, err);
                None
            }
        }
    }

    async fn set(&self, address: &str, point: GeoPoint, ttl_seconds: u32) {
        let raw = match serde_json::to_string(&point) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("Failed to serialize point for {:?}: {}", address, err);
                return;
            }
        };

        if let Err(err) = self
            .client
            .cache_set(address, &raw, ttl_seconds as i32)
            .await
        {
            warn!("Cache write failed for {:?}: {:#}", address, err);
        }
    }
}
