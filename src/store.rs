//! Record store access.
//!
//! The record layer owns place documents; this module only reads the
//! geocoding-relevant slice of them and writes resolution results back.

use anyhow::{Context, Result};
use async_trait::async_trait;
use elasticsearch::{SearchParts, UpdateParts};
use serde_json::json;
use tracing::debug;

use crate::elasticsearch::EsClient;
use crate::models::{GeoPoint, PlaceRecord};
use crate::search::RecordQuery;

/// Fields the background pass actually needs; everything else stays home.
const CANDIDATE_FIELDS: &[&str] = &["address", "lat", "lng"];

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch up to `limit` records eligible for background resolution:
    /// non-empty address, not marked invalid, no resolved point yet.
    async fn find_candidates(&self, limit: usize) -> Result<Vec<PlaceRecord>>;

    /// Persist a resolution outcome onto one record by identity.
    async fn update_resolution(
        &self,
        id: &str,
        geo: Option<GeoPoint>,
        geo_invalid_address: bool,
    ) -> Result<()>;

    /// Run a finalized record query and return the matching records.
    async fn search(&self, query: &RecordQuery) -> Result<Vec<PlaceRecord>>;
}

/// Record store backed by the Elasticsearch place index.
pub struct EsRecordStore {
    client: EsClient,
}

impl EsRecordStore {
    pub fn new(client: EsClient) -> Self {
        Self { client }
    }

    async fn run_search(&self, body: serde_json::Value) -> Result<Vec<PlaceRecord>> {
        let response = self
            .client
            .client()
            .search(SearchParts::Index(&[&self.client.index_name]))
            .body(body)
            .send()
            .await
            .context("Record search failed")?;

        let response_body = response.json::<serde_json::Value>().await?;
        let hits = response_body["hits"]["hits"]
            .as_array()
            .map(|a| a.to_vec())
            .unwrap_or_default();

        Ok(hits.into_iter().filter_map(parse_hit).collect())
    }
}

#[async_trait]
impl RecordStore for EsRecordStore {
    async fn find_candidates(&self, limit: usize) -> Result<Vec<PlaceRecord>> {
        let body = json!({
            "query": {
                "bool": {
                    "must": [
                        { "exists": { "field": "address" } }
                    ],
                    "must_not": [
                        { "term": { "address.keyword": "" } },
                        { "term": { "geo_invalid_address": true } },
                        { "exists": { "field": "geo" } }
                    ]
                }
            },
            "size": limit,
            "_source": CANDIDATE_FIELDS
        });

        let candidates = self.run_search(body).await?;
        debug!("Candidate query returned {} records", candidates.len());
        Ok(candidates)
    }

    async fn update_resolution(
        &self,
        id: &str,
        geo: Option<GeoPoint>,
        geo_invalid_address: bool,
    ) -> Result<()> {
        // geo must be written even when None: an explicit null is what keeps
        // the record out of "resolved" territory.
        let body = json!({
            "doc": {
                "geo": geo,
                "geo_invalid_address": geo_invalid_address
            }
        });

        let response = self
            .client
            .client()
            .update(UpdateParts::IndexId(&self.client.index_name, id))
            .body(body)
            .send()
            .await
            .context("Record update failed")?;

        if !response.status_code().is_success() {
            let error_body = response.text().await?;
            anyhow::bail!("Failed to update record {}: {}", id, error_body);
        }

        Ok(())
    }

    async fn search(&self, query: &RecordQuery) -> Result<Vec<PlaceRecord>> {
        self.run_search(query.finalize()).await
    }
}

/// Parse one Elasticsearch hit into a record; the document id lives outside
/// `_source`.
fn parse_hit(hit: serde_json::Value) -> Option<PlaceRecord> {
    let id = hit["_id"].as_str()?.to_string();
    let mut record: PlaceRecord = serde_json::from_value(hit["_source"].clone()).ok()?;
    record.id = id;
    Some(record)
}
