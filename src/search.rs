//! Record query building.
//!
//! `RecordQuery` assembles the Elasticsearch search body for place records,
//! including the proximity predicate. Two store constraints shape it:
//! the nearest-neighbor predicate carries its own distance ordering, so any
//! other requested sort is discarded whenever `near` is present (no matter
//! which builder call came first); and ranked full-text scoring does not
//! combine with the proximity predicate, so text input degrades to a simple
//! case-insensitive pattern match in that case.

use serde_json::{json, Value};

use crate::models::GeoPoint;

const METERS_PER_KILOMETER: f64 = 1000.0;
const METERS_PER_MILE: f64 = 1609.34;

/// Maximum distance for a proximity predicate, in the caller's unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NearDistance {
    Meters(f64),
    Kilometers(f64),
    Miles(f64),
}

impl NearDistance {
    /// Normalize to meters, the store's native unit.
    pub fn meters(&self) -> f64 {
        match self {
            NearDistance::Meters(m) => *m,
            NearDistance::Kilometers(km) => km * METERS_PER_KILOMETER,
            NearDistance::Miles(mi) => mi * METERS_PER_MILE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Builder for a place-record search.
#[derive(Debug, Clone, Default)]
pub struct RecordQuery {
    text: Option<String>,
    near: Option<(GeoPoint, Option<NearDistance>)>,
    sort: Option<(String, SortOrder)>,
    size: Option<usize>,
}

impl RecordQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full-text search over name, address, and tags.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Restrict and order results by proximity to `origin`. Without a
    /// distance cap, results are merely sorted nearest-first.
    pub fn near(mut self, origin: GeoPoint, max: Option<NearDistance>) -> Self {
        self.near = Some((origin, max));
        self
    }

    /// Sort by a field. Ignored whenever a proximity predicate is present.
    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some((field.into(), order));
        self
    }

    pub fn size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    /// Produce the Elasticsearch search body.
    pub fn finalize(&self) -> Value {
        let mut must = Vec::new();
        let mut filter = Vec::new();

        if let Some(ref text) = self.text {
            if self.near.is_some() {
                // Fallback-compatible mode: dumb pattern matches instead of
                // ranked scoring, which can't be combined with the
                // proximity predicate. Same field coverage as the ranked
                // query so adding `near` never hides matches.
                let pattern = format!("*{}*", text);
                let clauses: Vec<Value> = ["name.keyword", "address.keyword", "tags"]
                    .iter()
                    .map(|field| {
                        let mut wildcard = serde_json::Map::new();
                        wildcard.insert(
                            field.to_string(),
                            json!({ "value": pattern, "case_insensitive": true }),
                        );
                        json!({ "wildcard": wildcard })
                    })
                    .collect();
                must.push(json!({
                    "bool": {
                        "should": clauses,
                        "minimum_should_match": 1
                    }
                }));
            } else {
                must.push(json!({
                    "multi_match": {
                        "query": text,
                        "fields": ["name^3", "address", "tags"]
                    }
                }));
            }
        }

        if let Some((origin, max)) = self.near {
            if let Some(max) = max {
                filter.push(json!({
                    "geo_distance": {
                        "distance": format!("{}m", max.meters()),
                        "geo": { "lat": origin.lat(), "lon": origin.lng() }
                    }
                }));
            }
        }

        let query = if must.is_empty() && filter.is_empty() {
            json!({ "match_all": {} })
        } else {
            let mut bool_query = json!({});
            if !must.is_empty() {
                bool_query["must"] = Value::Array(must);
            }
            if !filter.is_empty() {
                bool_query["filter"] = Value::Array(filter);
            }
            json!({ "bool": bool_query })
        };

        let mut body = json!({ "query": query });

        // The proximity predicate implies distance ordering and tolerates
        // no other sort; it wins regardless of builder-call order.
        if let Some((origin, _)) = self.near {
            body["sort"] = json!([{
                "_geo_distance": {
                    "geo": { "lat": origin.lat(), "lon": origin.lng() },
                    "order": "asc",
                    "unit": "m"
                }
            }]);
        } else if let Some((ref field, order)) = self.sort {
            let mut by_field = serde_json::Map::new();
            by_field.insert(field.clone(), json!({ "order": order.as_str() }));
            body["sort"] = json!([by_field]);
        }

        if let Some(size) = self.size {
            body["size"] = json!(size);
        }

        body
    }
}
