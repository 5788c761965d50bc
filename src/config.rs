use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::prediction::evaluator::TiePolicy;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Hard ceiling on concurrent provider fetches within one sweep.
pub const MAX_CONCURRENT_FETCHES: usize = 8;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub tracker: TrackerConfig,
    pub stats: StatsConfig,
    pub database: DatabaseConfig,
    pub monitoring: MonitoringConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    pub poll_interval_seconds: u64,
    pub reconcile_interval_seconds: u64,
    pub fetch_timeout_seconds: u64,
    pub max_concurrent_fetches: usize,
    #[serde(default)]
    pub tie_policy: TiePolicy,
}

impl TrackerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds.max(1))
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_seconds.max(1))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds.max(1))
    }

    /// Concurrency actually used by a sweep: at least one, never above the ceiling.
    pub fn fetch_concurrency(&self) -> usize {
        self.max_concurrent_fetches.clamp(1, MAX_CONCURRENT_FETCHES)
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 60,
            reconcile_interval_seconds: 300,
            fetch_timeout_seconds: 10,
            max_concurrent_fetches: 4,
            tie_policy: TiePolicy::Strict,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatsConfig {
    pub espn_base_url: String,
    pub requests_per_second: u32,
    pub burst_size: u32,
    pub cache_ttl_seconds: u64,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    pub log_level: String,
    #[serde(default = "default_json_logs")]
    pub json_logs: bool,
}

fn default_json_logs() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub bind: String,
    pub port: u16,
}

impl AppConfig {
    /// Load configuration from a TOML file, then apply environment overrides.
    ///
    /// `.env` is read first so `PROPTRACK_DATABASE_PATH` can live there.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config = Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        if let Ok(db_path) = std::env::var("PROPTRACK_DATABASE_PATH") {
            config.database.path = db_path;
        }

        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }
}
