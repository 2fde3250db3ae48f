//! Persistent, instance-shared request quota accounting.
//!
//! The provider enforces per-second and per-day ceilings across every
//! cooperating process instance. Each issued request is recorded as one row
//! in a shared log partitioned by UTC day; availability is judged by
//! counting the current second and day windows.
//!
//! Reservation is insert-then-count: the instance writes its own request
//! row first and only then counts the window. If the count (which includes
//! the new row) exceeds the ceiling, the row is deleted again and the
//! reservation is refused. That way concurrent instances over-admitting in
//! the same window see each other's rows and back off, rather than all
//! passing a stale read-before-write check.
//!
//! This remains best effort: the shared store is eventually consistent and
//! no distributed lock exists, so a narrow over-admission window survives.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::scylla::ScyllaClient;

/// Google's standard free limits.
pub const DEFAULT_PER_SECOND: u32 = 10;
pub const DEFAULT_PER_DAY: u32 = 2_500;

/// Rows outlive their day by a day before the TTL reaps whatever the
/// explicit purge missed.
const ROW_TTL_SECONDS: i32 = 2 * 86_400;

#[async_trait]
pub trait QuotaTracker: Send + Sync {
    /// Reserve one unit of request budget. `false` means "come back later",
    /// never failure; store errors report unavailable so the provider is
    /// not called on guesswork.
    async fn check_and_reserve(&self) -> bool;

    /// Remove log partitions older than the current day window.
    async fn purge_stale(&self);
}

/// The persisted request log the tracker counts against. One implementor
/// per store; the admission logic above it never changes.
#[async_trait]
pub trait QuotaLog: Send + Sync {
    async fn insert(&self, day: &str, ts: i64, id: &str, ttl_seconds: i32) -> Result<()>;
    async fn count_day(&self, day: &str) -> Result<i64>;
    /// Count rows on `day` with timestamps in `[from_ts, to_ts)`.
    async fn count_range(&self, day: &str, from_ts: i64, to_ts: i64) -> Result<i64>;
    async fn delete(&self, day: &str, ts: i64, id: &str) -> Result<()>;
    async fn purge_day(&self, day: &str) -> Result<()>;
}

#[async_trait]
impl QuotaLog for ScyllaClient {
    async fn insert(&self, day: &str, ts: i64, id: &str, ttl_seconds: i32) -> Result<()> {
        self.quota_insert(day, ts, id, ttl_seconds).await
    }

    async fn count_day(&self, day: &str) -> Result<i64> {
        self.quota_count_day(day).await
    }

    async fn count_range(&self, day: &str, from_ts: i64, to_ts: i64) -> Result<i64> {
        self.quota_count_range(day, from_ts, to_ts).await
    }

    async fn delete(&self, day: &str, ts: i64, id: &str) -> Result<()> {
        self.quota_delete(day, ts, id).await
    }

    async fn purge_day(&self, day: &str) -> Result<()> {
        self.quota_purge_day(day).await
    }
}

/// Quota tracker counting admissions against a shared request log.
pub struct LogQuotaTracker {
    log: Arc<dyn QuotaLog>,
    per_second: u32,
    per_day: u32,
}

/// Window coordinates for one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
struct QuotaWindow {
    /// UTC day partition key, `YYYY-MM-DD`.
    day: String,
    /// Millisecond timestamp of the request itself.
    ts: i64,
    /// Start of the wall-clock second bucket containing `ts`.
    second_start: i64,
}

impl QuotaWindow {
    fn at(now: DateTime<Utc>) -> Self {
        let ts = now.timestamp_millis();
        Self {
            day: now.format("%Y-%m-%d").to_string(),
            ts,
            second_start: ts - ts.rem_euclid(1000),
        }
    }

    fn previous_day(now: DateTime<Utc>) -> String {
        (now - chrono::Duration::days(1)).format("%Y-%m-%d").to_string()
    }
}

impl LogQuotaTracker {
    pub fn new(log: Arc<dyn QuotaLog>, per_second: u32, per_day: u32) -> Self {
        Self {
            log,
            per_second,
            per_day,
        }
    }

    async fn try_reserve(&self, window: &QuotaWindow, id: &str) -> Result<bool> {
        self.log
            .insert(&window.day, window.ts, id, ROW_TTL_SECONDS)
            .await?;

        let day_count = self.log.count_day(&window.day).await?;
        if day_count > self.per_day as i64 {
            debug!("Daily quota exhausted ({} issued)", day_count - 1);
            self.rollback(window, id).await;
            return Ok(false);
        }

        let second_count = self
            .log
            .count_range(&window.day, window.second_start, window.second_start + 1000)
            .await?;
        if second_count > self.per_second as i64 {
            debug!("Per-second quota exhausted ({} in window)", second_count - 1);
            self.rollback(window, id).await;
            return Ok(false);
        }

        Ok(true)
    }

    async fn rollback(&self, window: &QuotaWindow, id: &str) {
        if let Err(err) = self.log.delete(&window.day, window.ts, id).await {
            // The orphan row consumes one budget unit until its TTL; the
            // conservative direction for a quota.
            warn!("Failed to roll back quota reservation: {:#}", err);
        }
    }
}

#[async_trait]
impl QuotaTracker for LogQuotaTracker {
    async fn check_and_reserve(&self) -> bool {
        let window = QuotaWindow::at(Utc::now());
        let id = Uuid::new_v4().to_string();

        match self.try_reserve(&window, &id).await {
            Ok(available) => available,
            Err(err) => {
                warn!("Quota store unavailable, deferring: {:#}", err);
                self.rollback(&window, &id).await;
                false
            }
        }
    }

    async fn purge_stale(&self) {
        let yesterday = QuotaWindow::previous_day(Utc::now());
        if let Err(err) = self.log.purge_day(&yesterday).await {
            warn!("Failed to purge quota partition {}: {:#}", yesterday, err);
        }
    }
}
