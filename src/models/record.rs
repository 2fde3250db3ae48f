//! Place record structure shared with the Elasticsearch record store.

use serde::{Deserialize, Serialize};

/// Geographic point serialized as a GeoJSON Point.
///
/// GeoJSON coordinate order is longitude before latitude; keep that order
/// everywhere this struct crosses a wire or a store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "type")]
    pub geo_type: GeoType,
    pub coordinates: [f64; 2],
}

/// The only geometry type the record store carries for a place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeoType {
    Point,
}

impl GeoPoint {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self {
            geo_type: GeoType::Point,
            coordinates: [lng, lat],
        }
    }

    pub fn lng(&self) -> f64 {
        self.coordinates[0]
    }

    pub fn lat(&self) -> f64 {
        self.coordinates[1]
    }
}

/// Address-bearing record owned by the external record layer.
///
/// Only the fields the geocoding engine reads or writes are modeled; the
/// candidate query projects down to these, so everything else stays `None`
/// during a background pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaceRecord {
    /// Store document id.
    #[serde(skip)]
    pub id: String,

    /// Free-text address entered by an editor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// Manually entered coordinate overrides. When both are present they
    /// win over address resolution and never cost a provider call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,

    /// Resolved coordinates, null until geocoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo: Option<GeoPoint>,

    /// Set once the provider has definitively reported no match for
    /// `address`; such records are never retried.
    #[serde(default)]
    pub geo_invalid_address: bool,

    /// Display fields owned by the record layer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<String>,
}

impl PlaceRecord {
    /// Whether this record is eligible for background resolution:
    /// a non-empty address, no sticky invalid-address mark, and no
    /// resolved point yet.
    pub fn is_candidate(&self) -> bool {
        self.address.as_deref().is_some_and(|a| !a.is_empty())
            && !self.geo_invalid_address
            && self.geo.is_none()
    }

    /// Manual override coordinates, when both are present.
    pub fn manual_point(&self) -> Option<GeoPoint> {
        match (self.lng, self.lat) {
            (Some(lng), Some(lat)) => Some(GeoPoint::new(lng, lat)),
            _ => None,
        }
    }
}

/// Outcome of resolving one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// `geo` is set, either from manual coordinates, the cache, or the
    /// provider.
    Resolved,
    /// The provider definitively found nothing for the address; the record
    /// is marked and never revisited.
    InvalidAddress,
    /// Quota exhausted or a transient provider/store failure; the record
    /// stays a candidate for a later pass.
    Deferred,
}
