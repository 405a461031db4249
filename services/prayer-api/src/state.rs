//! Application state for the prayer-times API.

use std::sync::Arc;

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusHandle;

use storage::{PgPrayerStore, PrayerStore};

/// Shared application state.
pub struct AppState {
    /// Prayer-time store for lookups.
    pub store: Arc<dyn PrayerStore>,

    /// Prometheus handle, when a recorder is installed.
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    /// Connect to PostgreSQL and ensure the schema exists.
    pub async fn connect(database_url: &str, prometheus: Option<PrometheusHandle>) -> Result<Self> {
        let store = PgPrayerStore::connect(database_url).await?;
        store.migrate().await?;

        Ok(Self {
            store: Arc::new(store),
            prometheus,
        })
    }

    /// State over an existing store.
    pub fn with_store(store: Arc<dyn PrayerStore>) -> Self {
        Self {
            store,
            prometheus: None,
        }
    }
}
