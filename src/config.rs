//! Service configuration loaded from a TOML file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub elasticsearch: EsConfig,
    #[serde(default)]
    pub scylla: ScyllaConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EsConfig {
    #[serde(default = "default_es_url")]
    pub url: String,
    #[serde(default = "default_index")]
    pub index: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScyllaConfig {
    #[serde(default = "default_scylla_url")]
    pub url: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ProviderConfig {
    /// Google Geocoding API key. Empty means unresolvable addresses stay
    /// unresolved; a loud warning fires at startup.
    #[serde(default)]
    pub api_key: String,
    /// Override the provider endpoint (tests, proxies).
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_provider_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QuotaConfig {
    #[serde(default = "default_per_second")]
    pub per_second: u32,
    #[serde(default = "default_per_day")]
    pub per_day: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    #[serde(default = "default_base_delay")]
    pub base_delay_seconds: u64,
    #[serde(default = "default_jitter")]
    pub jitter_seconds: u64,
}

fn default_es_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_index() -> String {
    "places".to_string()
}

fn default_scylla_url() -> String {
    "127.0.0.1".to_string()
}

fn default_provider_timeout() -> u64 {
    10
}

fn default_per_second() -> u32 {
    crate::quota::DEFAULT_PER_SECOND
}

fn default_per_day() -> u32 {
    crate::quota::DEFAULT_PER_DAY
}

fn default_cache_ttl() -> u32 {
    crate::cache::DEFAULT_TTL_SECONDS
}

fn default_base_delay() -> u64 {
    10
}

fn default_jitter() -> u64 {
    5
}

impl Default for EsConfig {
    fn default() -> Self {
        Self {
            url: default_es_url(),
            index: default_index(),
        }
    }
}

impl Default for ScyllaConfig {
    fn default() -> Self {
        Self {
            url: default_scylla_url(),
        }
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            per_second: default_per_second(),
            per_day: default_per_day(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_cache_ttl(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            base_delay_seconds: default_base_delay(),
            jitter_seconds: default_jitter(),
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }
}
