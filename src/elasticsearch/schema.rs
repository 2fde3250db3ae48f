//! Elasticsearch index schema management.

use anyhow::{Context, Result};
use elasticsearch::indices::{IndicesCreateParts, IndicesExistsParts};
use tracing::info;

use super::EsClient;

/// Record mapping embedded at compile time
const PLACES_MAPPING: &str = include_str!("../../schema/places_mapping.json");

/// Create the place-record index with the geocoding mapping.
///
/// The mapping must exist before the worker runs: `geo` has to be a
/// `geo_point` for the proximity predicate, and `geo_invalid_address` a
/// real boolean for the candidate query. An existing index is left alone.
pub async fn create_index(client: &EsClient) -> Result<()> {
    let es = client.client();
    let index_name = &client.index_name;

    let exists = es
        .indices()
        .exists(IndicesExistsParts::Index(&[index_name]))
        .send()
        .await?
        .status_code()
        .is_success();

    if exists {
        info!("Index {} already exists, skipping creation", index_name);
        return Ok(());
    }

    let mapping: serde_json::Value =
        serde_json::from_str(PLACES_MAPPING).context("Failed to parse places_mapping.json")?;

    info!("Creating index: {}", index_name);
    let response = es
        .indices()
        .create(IndicesCreateParts::Index(index_name))
        .body(mapping)
        .send()
        .await
        .context("Failed to create index")?;

    if !response.status_code().is_success() {
        let error_body = response.text().await?;
        anyhow::bail!("Failed to create index: {}", error_body);
    }

    info!("Index {} created successfully", index_name);
    Ok(())
}
