//! Background geocoding daemon.
//!
//! Connects to the record store and the shared quota/cache keyspace, then
//! runs the polling worker until interrupted.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use geofill::cache::ScyllaAddressCache;
use geofill::config::Config;
use geofill::elasticsearch::{create_index, EsClient};
use geofill::geocode::GeocodingService;
use geofill::provider::GoogleGeocoder;
use geofill::quota::LogQuotaTracker;
use geofill::scylla::ScyllaClient;
use geofill::store::EsRecordStore;
use geofill::worker::{GeocodeWorker, WorkerSettings};

#[derive(Parser, Debug)]
#[command(name = "geofill")]
#[command(about = "Rate-limited background geocoding worker")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, default_value = "geofill.toml")]
    config: PathBuf,

    /// Elasticsearch URL (overrides config)
    #[arg(long)]
    es_url: Option<String>,

    /// Elasticsearch index name (overrides config)
    #[arg(long)]
    index: Option<String>,

    /// ScyllaDB URL (overrides config)
    #[arg(long)]
    scylla_url: Option<String>,

    /// Create the record index if it does not exist
    #[arg(long)]
    create_index: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut config = if args.config.exists() {
        Config::load_from_file(&args.config)?
    } else {
        info!(
            "No config file at {}, using defaults",
            args.config.display()
        );
        Config::default()
    };
    if let Some(es_url) = args.es_url {
        config.elasticsearch.url = es_url;
    }
    if let Some(index) = args.index {
        config.elasticsearch.index = index;
    }
    if let Some(scylla_url) = args.scylla_url {
        config.scylla.url = scylla_url;
    }

    // Surface a missing credential once, loudly, at startup rather than as
    // a per-pass error flood. The worker still runs: cache hits and manual
    // coordinates resolve without the provider.
    if config.provider.api_key.is_empty() {
        warn!("*** No geocoding provider API key is configured.");
        warn!("*** Set provider.api_key in the config file; without it every");
        warn!("*** provider call will be rejected and addresses will stay unresolved.");
    }

    info!("Connecting to Elasticsearch at {}", config.elasticsearch.url);
    let es_client = EsClient::new(&config.elasticsearch.url, &config.elasticsearch.index).await?;

    if args.create_index {
        create_index(&es_client).await?;
    }

    let doc_count = es_client.verify_connection().await?;
    info!(
        "Connected to index '{}' with {} documents",
        config.elasticsearch.index, doc_count
    );

    let scylla_client = ScyllaClient::new(&config.scylla.url).await?;

    let timeout = Duration::from_secs(config.provider.timeout_seconds);
    let provider = match config.provider.endpoint.clone() {
        Some(endpoint) => {
            GoogleGeocoder::with_endpoint(config.provider.api_key.clone(), endpoint, timeout)?
        }
        None => GoogleGeocoder::new(config.provider.api_key.clone(), timeout)?,
    };

    let cache = Arc::new(ScyllaAddressCache::new(scylla_client.clone()));
    let quota = Arc::new(LogQuotaTracker::new(
        Arc::new(scylla_client),
        config.quota.per_second,
        config.quota.per_day,
    ));
    let store = Arc::new(EsRecordStore::new(es_client));

    let service = GeocodingService::new(
        Arc::new(provider),
        cache,
        quota.clone(),
        config.cache.ttl_seconds,
    );

    let settings = WorkerSettings {
        batch_limit: config.quota.per_second as usize,
        base_delay: Duration::from_secs(config.worker.base_delay_seconds),
        jitter: Duration::from_secs(config.worker.jitter_seconds),
    };

    let cancel = CancellationToken::new();
    let worker = GeocodeWorker::new(service, store, quota, settings, cancel.clone());

    info!("Starting geocode worker");
    let handle = tokio::spawn(worker.run());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    cancel.cancel();
    handle.await?;

    Ok(())
}
