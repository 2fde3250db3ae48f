//! Core data models for the geocoding engine.

pub mod record;

pub use record::{GeoPoint, GeoType, PlaceRecord, Resolution};
