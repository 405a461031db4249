//! HTTP client for the e-Solat monthly schedule endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use thiserror::Error;
use tracing::{debug, instrument};

use prayer_common::{UpstreamMonthResponse, ZoneCode};

use crate::config::UpstreamConfig;
use crate::orchestrator::MonthWindow;

/// Ways a single zone fetch can fail. All of them are soft: the zone is
/// retried on the next pass.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Upstream returned HTTP {0}")]
    HttpStatus(u16),

    #[error("Upstream response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Upstream reported status {0:?}")]
    UpstreamStatus(String),

    #[error("Request exceeded the run budget")]
    BudgetExhausted,
}

/// Source of monthly schedules for a zone.
#[async_trait]
pub trait UpstreamSource: Send + Sync {
    /// Fetch one month for one zone. `Ok` only for a successful payload.
    async fn fetch_month(
        &self,
        zone: &ZoneCode,
        window: &MonthWindow,
    ) -> Result<UpstreamMonthResponse, FetchError>;
}

/// Client for the JAKIM e-Solat API.
pub struct EsolatClient {
    client: Client,
    base_url: String,
}

impl EsolatClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, zone: &ZoneCode) -> String {
        format!(
            "{}/index.php?r=esolatApi/takwimsolat&period=duration&zone={}",
            self.base_url, zone
        )
    }
}

#[async_trait]
impl UpstreamSource for EsolatClient {
    #[instrument(skip(self, window), fields(year = window.year, month = window.month))]
    async fn fetch_month(
        &self,
        zone: &ZoneCode,
        window: &MonthWindow,
    ) -> Result<UpstreamMonthResponse, FetchError> {
        let response = self
            .client
            .post(self.url_for(zone))
            .header(header::ACCEPT, "application/json")
            .form(&[
                ("datestart", window.date_start()),
                ("dateend", window.date_end()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let body = response.text().await?;
        let parsed: UpstreamMonthResponse = serde_json::from_str(&body)?;

        if !parsed.is_ok() {
            return Err(FetchError::UpstreamStatus(parsed.status));
        }

        debug!(days = parsed.prayer_time.len(), "Fetched month");
        Ok(parsed)
    }
}
