//! Google Geocoding API adapter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{GeocodeOutcome, GeocodeProvider, ProviderError};
use crate::models::GeoPoint;

const DEFAULT_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// Resolves addresses through the Google Geocoding API.
pub struct GoogleGeocoder {
    client: Client,
    endpoint: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Location,
}

#[derive(Debug, Deserialize)]
struct Location {
    lat: f64,
    lng: f64,
}

impl GoogleGeocoder {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, ProviderError> {
        Self::with_endpoint(api_key, DEFAULT_ENDPOINT.to_string(), timeout)
    }

    pub fn with_endpoint(
        api_key: String,
        endpoint: String,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .user_agent("geofill/0.1")
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl GeocodeProvider for GoogleGeocoder {
    async fn resolve(&self, address: &str) -> Result<GeocodeOutcome, ProviderError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("address", address), ("key", self.api_key.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Rejected(format!(
                "http status {}",
                response.status()
            )));
        }

        let body: GeocodeResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        debug!("Provider status {} for address {:?}", body.status, address);

        match body.status.as_str() {
            "OK" => {
                // First candidate wins when the provider is ambiguous.
                let location = body
                    .results
                    .first()
                    .map(|r| &r.geometry.location)
                    .ok_or_else(|| {
                        ProviderError::Malformed("status OK with empty results".to_string())
                    })?;
                Ok(GeocodeOutcome::Match(GeoPoint::new(
                    location.lng,
                    location.lat,
                )))
            }
            "ZERO_RESULTS" => Ok(GeocodeOutcome::NoMatch),
            "OVER_QUERY_LIMIT" => Err(ProviderError::RateLimited),
            other => Err(ProviderError::Rejected(
                body.error_message.unwrap_or_else(|| other.to_string()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_parsing() {
        let raw = r#"{
            "status": "OK",
            "results": [
                { "geometry": { "location": { "lat": 47.37, "lng": 8.54 } } },
                { "geometry": { "location": { "lat": 0.0, "lng": 0.0 } } }
            ]
        }"#;
        let body: GeocodeResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(body.status, "OK");
        assert_eq!(body.results.len(), 2);
        assert_eq!(body.results[0].geometry.location.lng, 8.54);
    }

    #[test]
    fn test_zero_results_parsing() {
        let raw = r#"{ "status": "ZERO_RESULTS", "results": [] }"#;
        let body: GeocodeResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(body.status, "ZERO_RESULTS");
        assert!(body.results.is_empty());
    }
}
