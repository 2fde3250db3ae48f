//! Background geocoding worker.
//!
//! A self-rescheduling polling loop: each pass pulls at most one second's
//! quota worth of un-geocoded candidates, resolves them strictly one at a
//! time, and persists the outcomes. Sequential processing is deliberate --
//! quota accounting is per call, and a concurrent burst could clear each
//! individual check yet overshoot the provider's per-second ceiling.
//!
//! The delay between passes carries random jitter so multiple instances
//! polling the same store and quota log drift apart instead of stampeding.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::geocode::{resolve_and_save, GeocodingService};
use crate::models::Resolution;
use crate::quota::QuotaTracker;
use crate::store::RecordStore;

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Candidates fetched per pass; the per-second quota ceiling, since a
    /// pass can never usefully resolve more than that.
    pub batch_limit: usize,
    pub base_delay: Duration,
    /// Upper bound of the uniform random addition to `base_delay`.
    pub jitter: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            batch_limit: crate::quota::DEFAULT_PER_SECOND as usize,
            base_delay: Duration::from_secs(10),
            jitter: Duration::from_secs(5),
        }
    }
}

/// What one background pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassStats {
    pub resolved: usize,
    pub invalid: usize,
    pub deferred: usize,
}

impl PassStats {
    pub fn total(&self) -> usize {
        self.resolved + self.invalid + self.deferred
    }
}

pub struct GeocodeWorker {
    service: GeocodingService,
    store: Arc<dyn RecordStore>,
    quota: Arc<dyn QuotaTracker>,
    settings: WorkerSettings,
    cancel: CancellationToken,
}

impl GeocodeWorker {
    pub fn new(
        service: GeocodingService,
        store: Arc<dyn RecordStore>,
        quota: Arc<dyn QuotaTracker>,
        settings: WorkerSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            service,
            store,
            quota,
            settings,
            cancel,
        }
    }

    /// Run passes until the cancellation token fires. Store failures are
    /// logged and rescheduled, never fatal; the loop outlives bad passes.
    pub async fn run(self) {
        let mut purge_day = String::new();

        loop {
            match self.run_pass().await {
                Ok(stats) if stats.total() > 0 => {
                    info!(
                        "Pass complete: {} resolved, {} invalid, {} deferred",
                        stats.resolved, stats.invalid, stats.deferred
                    );
                }
                Ok(_) => debug!("Pass complete: no candidates"),
                Err(err) => warn!("Pass failed, rescheduling: {:#}", err),
            }

            // Bound quota-log growth: drop the previous day's partition the
            // first time we run on a new UTC day.
            let today = Utc::now().format("%Y-%m-%d").to_string();
            if today != purge_day {
                self.quota.purge_stale().await;
                purge_day = today;
            }

            let delay = self.settings.base_delay + random_jitter(self.settings.jitter);
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Geocode worker stopping");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One poll-resolve-persist cycle, strictly sequential per record.
    pub async fn run_pass(&self) -> anyhow::Result<PassStats> {
        let candidates = self.store.find_candidates(self.settings.batch_limit).await?;
        let mut stats = PassStats::default();

        for mut record in candidates {
            match resolve_and_save(&self.service, self.store.as_ref(), &mut record).await {
                Resolution::Resolved => stats.resolved += 1,
                Resolution::InvalidAddress => stats.invalid += 1,
                Resolution::Deferred => stats.deferred += 1,
            }
        }

        Ok(stats)
    }
}

fn random_jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..=max_ms))
}
