//! Monthly run scheduling.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Datelike, TimeZone, Utc};
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};

use prayer_common::ZoneCode;

use crate::orchestrator::{FetchOrchestrator, FetchReport};
use crate::server::FetchStatus;

/// The first instant of the next month (day 1, 00:00 UTC) strictly after
/// `now`.
pub fn next_run_after(now: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };

    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .unwrap_or(now + chrono::Duration::days(28))
}

/// Runs the orchestrator once a month and publishes status.
pub struct Scheduler {
    orchestrator: FetchOrchestrator,
    zones: BTreeSet<ZoneCode>,
    relative_month: i32,
    status: Arc<RwLock<FetchStatus>>,
}

impl Scheduler {
    pub fn new(
        orchestrator: FetchOrchestrator,
        zones: BTreeSet<ZoneCode>,
        relative_month: i32,
        status: Arc<RwLock<FetchStatus>>,
    ) -> Self {
        Self {
            orchestrator,
            zones,
            relative_month,
            status,
        }
    }

    /// Run a single fetch cycle now.
    pub async fn run_once(&self) -> FetchReport {
        self.status.write().await.running = true;

        let report = self
            .orchestrator
            .run(&self.zones, self.relative_month, Utc::now())
            .await;

        let mut status = self.status.write().await;
        status.running = false;
        status.runs_completed += 1;
        status.last_report = Some(report.clone());

        report
    }

    /// Run at the start of every month until shutdown.
    pub async fn run_forever(&self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        loop {
            let now = Utc::now();
            let next = next_run_after(now);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);

            self.status.write().await.next_run = Some(next);
            info!(next_run = %next, wait_secs = wait.as_secs(), "Waiting for next scheduled run");

            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Shutting down scheduler");
                    break;
                }
                _ = tokio::time::sleep(wait) => {
                    let report = self.run_once().await;
                    if !report.is_complete() {
                        warn!(failed = report.failed.len(), "Scheduled run left zones unfetched");
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_run_mid_month() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(
            next_run_after(now),
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_next_run_on_boundary_is_next_month() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(
            next_run_after(now),
            Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_next_run_december_rolls_year() {
        let now = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(
            next_run_after(now),
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
        );
    }
}
