//! ScyllaDB client for shared cross-instance state.
//!
//! Holds the address-result cache and the quota request log. Every
//! cooperating process instance points at the same keyspace, so this is the
//! only coordination point between them.

use anyhow::{Context, Result};
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::response::query_result::QueryResult;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct ScyllaClient {
    session: Arc<Session>,
}

impl ScyllaClient {
    pub async fn new(uri: &str) -> Result<Self> {
        info!("Connecting to ScyllaDB at {}...", uri);
        let session: Session = SessionBuilder::new()
            .known_node(uri)
            .build()
            .await
            .context("Failed to connect to ScyllaDB")?;

        let client = Self {
            session: Arc::new(session),
        };

        client.init_schema().await?;
        Ok(client)
    }

    async fn init_schema(&self) -> Result<()> {
        // Create keyspace if not exists
        self.session
            .query_unpaged(
                "CREATE KEYSPACE IF NOT EXISTS geofill
                 WITH REPLICATION = {
                    'class' : 'SimpleStrategy',
                    'replication_factor' : 1
                 }",
                &[],
            )
            .await?;

        // Address -> resolved point cache; rows carry their own TTL
        self.session
            .query_unpaged(
                "CREATE TABLE IF NOT EXISTS geofill.geocode_cache (
                    address text PRIMARY KEY,
                    point text
                )",
                &[],
            )
            .await?;

        // One row per issued provider request, partitioned by UTC day so a
        // whole day can be counted or purged in one partition
        self.session
            .query_unpaged(
                "CREATE TABLE IF NOT EXISTS geofill.quota_requests (
                    day text,
                    ts bigint,
                    id text,
                    PRIMARY KEY (day, ts, id)
                )",
                &[],
            )
            .await?;

        Ok(())
    }

    pub async fn cache_get(&self, address: &str) -> Result<Option<String>> {
        let result: QueryResult = self
            .session
            .query_unpaged(
                "SELECT point FROM geofill.geocode_cache WHERE address = ?",
                (address,),
            )
            .await?;

        if let Ok(rows_result) = result.into_rows_result() {
            if let Some((point,)) = rows_result.maybe_first_row::<(String,)>()? {
                return Ok(Some(point));
            }
        }

        Ok(None)
    }

    pub async fn cache_set(&self, address: &str, point: &str, ttl_seconds: i32) -> Result<()> {
        self.session
            .query_unpaged(
                "INSERT INTO geofill.geocode_cache (address, point) VALUES (?, ?) USING TTL ?",
                (address, point, ttl_seconds),
            )
            .await?;
        Ok(())
    }

    pub async fn quota_insert(&self, day: &str, ts: i64, id: &str, ttl_seconds: i32) -> Result<()> {
        self.session
            .query_unpaged(
                "INSERT INTO geofill.quota_requests (day, ts, id) VALUES (?, ?, ?) USING TTL ?",
                (day, ts, id, ttl_seconds),
            )
            .await?;
        Ok(())
    }

    pub async fn quota_delete(&self, day: &str, ts: i64, id: &str) -> Result<()> {
        self.session
            .query_unpaged(
                "DELETE FROM geofill.quota_requests WHERE day = ? AND ts = ? AND id = ?",
                (day, ts, id),
            )
            .await?;
        Ok(())
    }

    /// Count every request issued on the given UTC day.
    pub async fn quota_count_day(&self, day: &str) -> Result<i64> {
        let result = self
            .session
            .query_unpaged(
                "SELECT COUNT(*) FROM geofill.quota_requests WHERE day = ?",
                (day,),
            )
            .await?;

        Self::first_count(result)
    }

    /// Count requests issued on the given day within `[from_ts, to_ts)`
    /// (millisecond timestamps).
    pub async fn quota_count_range(&self, day: &str, from_ts: i64, to_ts: i64) -> Result<i64> {
        let result = self
            .session
            .query_unpaged(
                "SELECT COUNT(*) FROM geofill.quota_requests
                 WHERE day = ? AND ts >= ? AND ts < ?",
                (day, from_ts, to_ts),
            )
            .await?;

        Self::first_count(result)
    }

    /// Drop an entire day partition from the quota log.
    pub async fn quota_purge_day(&self, day: &str) -> Result<()> {
        self.session
            .query_unpaged("DELETE FROM geofill.quota_requests WHERE day = ?", (day,))
            .await?;
        Ok(())
    }

    fn first_count(result: QueryResult) -> Result<i64> {
        if let Ok(rows_result) = result.into_rows_result() {
            if let Some((count,)) = rows_result.maybe_first_row::<(i64,)>()? {
                return Ok(count);
            }
        }
        Ok(0)
    }
}
