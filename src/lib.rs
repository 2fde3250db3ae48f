//! Geofill - rate-limited background geocoding for address-bearing records
//!
//! Resolves record addresses to coordinates through an external provider
//! while honoring shared per-second and per-day request quotas, caching
//! results, and exposing a proximity-aware record query builder.

pub mod cache;
pub mod config;
pub mod elasticsearch;
pub mod geocode;
pub mod models;
pub mod provider;
pub mod quota;
pub mod scylla;
pub mod search;
pub mod store;
pub mod worker;

#[cfg(test)]
pub(crate) mod testutil;

pub use models::{GeoPoint, PlaceRecord, Resolution};
