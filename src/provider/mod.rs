//! Geocoding provider abstraction.

pub mod google;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::GeoPoint;

pub use google::GoogleGeocoder;

/// What a single provider round trip produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeocodeOutcome {
    /// The first candidate point returned by the provider.
    Match(GeoPoint),
    /// The provider explicitly reported zero results for the address.
    /// This is definitive: the address is bad, not the network.
    NoMatch,
}

/// Provider failures. Callers treat every variant the same way, as
/// "transient, retry on a later pass" -- none of them means the address
/// itself is bad.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider rate limit hit")]
    RateLimited,
    #[error("provider rejected the request: {0}")]
    Rejected(String),
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

/// A geocoding provider resolving a free-text address to a point.
///
/// Implementations perform exactly one network round trip per call and do
/// not retry or rate-limit themselves; quota accounting is layered above by
/// the geocoding service.
#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    async fn resolve(&self, address: &str) -> Result<GeocodeOutcome, ProviderError>;
}
