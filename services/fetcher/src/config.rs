//! Configuration loading for the fetcher.
//!
//! Loads `fetcher.yaml` from the config directory. Every field has a
//! built-in default, so a missing file or a partial file is fine.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use prayer_common::ZoneCode;

/// Root configuration loaded from `fetcher.yaml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FetcherConfig {
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

/// Upstream provider settings.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://www.e-solat.gov.my".to_string()
}

fn default_user_agent() -> String {
    "hakim-prayer-times".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Fetch loop settings.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Pause after every upstream request, successful or not
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    /// Extra passes over failed zones after the first
    #[serde(default = "default_max_retry")]
    pub max_retry: u32,
    /// Wall-clock limit for one run
    #[serde(default = "default_run_budget_secs")]
    pub run_budget_secs: u64,
    /// Month to fetch, relative to the current one
    #[serde(default)]
    pub relative_month: i32,
    /// Zones to fetch; empty means every known zone
    #[serde(default)]
    pub zones: Vec<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: default_request_delay_ms(),
            max_retry: default_max_retry(),
            run_budget_secs: default_run_budget_secs(),
            relative_month: 0,
            zones: Vec::new(),
        }
    }
}

fn default_request_delay_ms() -> u64 {
    2000
}

fn default_max_retry() -> u32 {
    1
}

fn default_run_budget_secs() -> u64 {
    180
}

impl FetcherConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: FetcherConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        debug!(path = %path.display(), "Loaded fetcher config");
        Ok(config)
    }

    /// Load `fetcher.yaml` from `config_dir`, falling back to defaults when
    /// the file does not exist.
    pub fn load_from_dir(config_dir: &Path) -> Result<Self> {
        let path = config_dir.join("fetcher.yaml");

        if !path.exists() {
            warn!(path = %path.display(), "Fetcher config not found, using defaults");
            return Ok(Self::default());
        }

        Self::load(&path)
    }

    /// The zone set for a run. Malformed codes are skipped with a warning.
    pub fn zone_set(&self) -> BTreeSet<ZoneCode> {
        if self.fetch.zones.is_empty() {
            return ZoneCode::all().into_iter().collect();
        }

        let mut zones = BTreeSet::new();
        for code in &self.fetch.zones {
            match ZoneCode::parse(code.trim()) {
                Ok(zone) => {
                    if !zone.is_known() {
                        warn!(zone = %zone, "Zone is not in the published zone set");
                    }
                    zones.insert(zone);
                }
                Err(e) => warn!(zone = %code, error = %e, "Skipping invalid zone code"),
            }
        }

        info!(count = zones.len(), "Using configured zone subset");
        zones
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.fetch.request_delay_ms)
    }

    pub fn run_budget(&self) -> Duration {
        Duration::from_secs(self.fetch.run_budget_secs)
    }

    /// Worst-case time spent sleeping between requests in one run.
    pub fn worst_case_delay(&self, zone_count: usize) -> Duration {
        let passes = u64::from(self.fetch.max_retry).saturating_add(1);
        let millis = self
            .fetch
            .request_delay_ms
            .saturating_mul(zone_count as u64)
            .saturating_mul(passes);
        Duration::from_millis(millis)
    }

    /// Log a warning when the worst case cannot fit in the run budget.
    /// Returns whether the warning fired.
    pub fn check_capacity(&self, zone_count: usize) -> bool {
        let worst_case = self.worst_case_delay(zone_count);
        let budget = self.run_budget();

        if worst_case > budget {
            warn!(
                zones = zone_count,
                worst_case_secs = worst_case.as_secs(),
                budget_secs = budget.as_secs(),
                "Worst-case run exceeds the run budget; trailing zones may be skipped"
            );
            return true;
        }
        false
    }
}
