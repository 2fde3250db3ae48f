//! Elasticsearch client and index management for the record store.

mod schema;

pub use schema::create_index;

use anyhow::Result;
use elasticsearch::cluster::ClusterHealthParts;
use elasticsearch::http::transport::{SingleNodeConnectionPool, TransportBuilder};
use elasticsearch::{CountParts, Elasticsearch};
use url::Url;

/// Handle on the place-record index. The daemon builds exactly one and
/// shares it between the record store and index management.
#[derive(Clone)]
pub struct EsClient {
    client: Elasticsearch,
    pub index_name: String,
}

impl EsClient {
    pub async fn new(es_url: &str, index_name: &str) -> Result<Self> {
        let url = Url::parse(es_url)?;
        let conn_pool = SingleNodeConnectionPool::new(url);
        let transport = TransportBuilder::new(conn_pool).disable_proxy().build()?;

        Ok(Self {
            client: Elasticsearch::new(transport),
            index_name: index_name.to_string(),
        })
    }

    pub fn client(&self) -> &Elasticsearch {
        &self.client
    }

    /// Startup probe: fail if the cluster is unhealthy, otherwise report
    /// how many records the index currently holds.
    pub async fn verify_connection(&self) -> Result<u64> {
        let health = self
            .client
            .cluster()
            .health(ClusterHealthParts::None)
            .send()
            .await?;

        if !health.status_code().is_success() {
            anyhow::bail!("Elasticsearch cluster is not healthy");
        }

        let response = self
            .client
            .count(CountParts::Index(&[&self.index_name]))
            .send()
            .await?;

        let body = response.json::<serde_json::Value>().await?;
        Ok(body["count"].as_u64().unwrap_or(0))
    }
}
