// src/config/radar.rs
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, time::Duration};

use crate::ingest::fetch::DEFAULT_USER_AGENT;
use crate::ingest::OrchestratorConfig;

pub const DEFAULT_SETTINGS_PATH: &str = "config/radar.json";

pub const ENV_SETTINGS_PATH: &str = "RADAR_SETTINGS_PATH";
pub const ENV_WINDOW_HOURS: &str = "RADAR_WINDOW_HOURS";
pub const ENV_TOP_K: &str = "RADAR_TOP_K";
pub const ENV_WORKERS: &str = "RADAR_WORKERS";
pub const ENV_MAX_ITEMS_PER_SOURCE: &str = "RADAR_MAX_ITEMS_PER_SOURCE";
pub const ENV_USER_AGENT: &str = "RADAR_UA";

fn default_window_hours() -> f64 {
    48.0
}
fn default_top_k() -> usize {
    5
}
fn default_workers() -> usize {
    8
}
fn default_per_source_cap() -> usize {
    50
}
fn default_fetch_timeout_secs() -> u64 {
    25
}
fn default_task_timeout_secs() -> u64 {
    120
}
fn default_min_host_gap_ms() -> u64 {
    700
}
fn default_listing_limit() -> usize {
    20
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarSettings {
    #[serde(default = "default_window_hours")]
    pub window_hours: f64,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_per_source_cap")]
    pub per_source_cap: usize,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Budget for one source task (listing pages fetch many articles).
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,
    #[serde(default = "default_min_host_gap_ms")]
    pub min_host_gap_ms: u64,
    #[serde(default = "default_listing_limit")]
    pub listing_limit: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Pre-sort the batch by (source, article_url) so ties rank the same across runs.
    #[serde(default = "default_true")]
    pub stable_tiebreak: bool,
}

impl Default for RadarSettings {
    fn default() -> Self {
        Self {
            window_hours: default_window_hours(),
            top_k: default_top_k(),
            workers: default_workers(),
            per_source_cap: default_per_source_cap(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            task_timeout_secs: default_task_timeout_secs(),
            min_host_gap_ms: default_min_host_gap_ms(),
            listing_limit: default_listing_limit(),
            user_agent: default_user_agent(),
            stable_tiebreak: true,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl RadarSettings {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        let cfg: RadarSettings = serde_json::from_str(&data)?;
        Ok(cfg.sanitized())
    }

    /// File at `$RADAR_SETTINGS_PATH` (or config/radar.json) if present, then env overrides.
    pub fn load() -> anyhow::Result<Self> {
        let path = env::var(ENV_SETTINGS_PATH).unwrap_or_else(|_| DEFAULT_SETTINGS_PATH.to_string());
        let base = if Path::new(&path).exists() {
            Self::load_from_file(&path)?
        } else {
            Self::default()
        };
        Ok(base.with_env_overrides())
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_parse(ENV_WINDOW_HOURS) {
            self.window_hours = v;
        }
        if let Some(v) = env_parse(ENV_TOP_K) {
            self.top_k = v;
        }
        if let Some(v) = env_parse(ENV_WORKERS) {
            self.workers = v;
        }
        if let Some(v) = env_parse(ENV_MAX_ITEMS_PER_SOURCE) {
            self.per_source_cap = v;
        }
        if let Ok(ua) = env::var(ENV_USER_AGENT) {
            self.user_agent = ua;
        }
        self.sanitized()
    }

    /// Out-of-range values fall back to their defaults.
    pub fn sanitized(mut self) -> Self {
        if !self.window_hours.is_finite() || self.window_hours <= 0.0 {
            self.window_hours = default_window_hours();
        }
        if self.top_k == 0 {
            self.top_k = default_top_k();
        }
        if self.workers == 0 {
            self.workers = default_workers();
        }
        if self.per_source_cap == 0 {
            self.per_source_cap = default_per_source_cap();
        }
        if self.fetch_timeout_secs == 0 {
            self.fetch_timeout_secs = default_fetch_timeout_secs();
        }
        if self.task_timeout_secs == 0 {
            self.task_timeout_secs = default_task_timeout_secs();
        }
        if self.listing_limit == 0 {
            self.listing_limit = default_listing_limit();
        }
        if self.user_agent.trim().is_empty() {
            self.user_agent = default_user_agent();
        }
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn min_host_gap(&self) -> Duration {
        Duration::from_millis(self.min_host_gap_ms)
    }

    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            workers: self.workers,
            per_source_cap: self.per_source_cap,
            task_timeout: Duration::from_secs(self.task_timeout_secs),
        }
    }
}
