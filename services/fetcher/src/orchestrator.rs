//! Multi-zone fetch loop with retry passes.
//!
//! A run fetches one month for every zone. Zones that fail are retried in
//! later passes; each pass takes the set of still-failing zones and returns a
//! new one, so passes share no mutable state.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use prayer_common::ZoneCode;
use storage::IngestQueue;

use crate::upstream::{FetchError, UpstreamSource};

const MAX_RUN_BUDGET: Duration = Duration::from_secs(365 * 24 * 3600);

/// The calendar month a run targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthWindow {
    pub year: i32,
    pub month: u32,
    pub last_day: u32,
}

impl MonthWindow {
    /// The month `relative_month` months away from the month containing
    /// `now` (0 = this month, 1 = next, -1 = previous).
    pub fn from_relative(now: DateTime<Utc>, relative_month: i32) -> Self {
        let index = now.year() * 12 + now.month0() as i32 + relative_month;
        let year = index.div_euclid(12);
        let month = index.rem_euclid(12) as u32 + 1;

        Self {
            year,
            month,
            last_day: last_day_of_month(year, month),
        }
    }

    /// `datestart` form value; the month is not zero-padded.
    pub fn date_start(&self) -> String {
        format!("{}-{}-01", self.year, self.month)
    }

    /// `dateend` form value.
    pub fn date_end(&self) -> String {
        format!("{}-{}-{}", self.year, self.month, self.last_day)
    }
}

fn last_day_of_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

/// Knobs for one run.
#[derive(Debug, Clone, Copy)]
pub struct FetchSettings {
    pub max_retry: u32,
    pub request_delay: Duration,
    pub run_budget: Duration,
}

/// Why a zone attempt failed.
#[derive(Debug)]
pub enum ZoneFailure {
    Upstream(FetchError),
    Enqueue(prayer_common::PrayerError),
}

impl std::fmt::Display for ZoneFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ZoneFailure::Upstream(e) => write!(f, "{}", e),
            ZoneFailure::Enqueue(e) => write!(f, "enqueue failed: {}", e),
        }
    }
}

/// Outcome of one zone attempt within a pass.
#[derive(Debug)]
pub struct ZoneAttempt {
    pub zone: ZoneCode,
    pub result: Result<String, ZoneFailure>,
}

/// Result of one pass: the zones that still need fetching plus every
/// attempt made.
#[derive(Debug)]
pub struct PassResult {
    pub still_failing: BTreeSet<ZoneCode>,
    pub attempts: Vec<ZoneAttempt>,
}

/// Aggregate outcome of a run.
#[derive(Debug, Clone, Serialize)]
pub struct FetchReport {
    pub window: MonthWindow,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub passes_run: u32,
    pub succeeded: BTreeSet<ZoneCode>,
    /// Zones still failing after the last pass, with the last reason
    pub failed: BTreeMap<ZoneCode, String>,
    pub attempts: BTreeMap<ZoneCode, u32>,
    pub budget_exhausted: bool,
}

impl FetchReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Run one pass over `remaining`, serially.
///
/// Sleeps `request_delay` after every request. Zones not reached before
/// `deadline` stay in the returned set without being attempted.
pub async fn run_pass(
    remaining: BTreeSet<ZoneCode>,
    window: &MonthWindow,
    upstream: &dyn UpstreamSource,
    queue: &dyn IngestQueue,
    request_delay: Duration,
    deadline: Instant,
) -> PassResult {
    let mut still_failing = BTreeSet::new();
    let mut attempts = Vec::with_capacity(remaining.len());

    for zone in remaining {
        if Instant::now() >= deadline {
            still_failing.insert(zone);
            continue;
        }

        let result = fetch_and_enqueue(&zone, window, upstream, queue, deadline).await;

        match &result {
            Ok(message_id) => {
                metrics::counter!("fetch_zone_total", "outcome" => "success").increment(1);
                info!(zone = %zone, message_id = %message_id, "Zone fetched and enqueued");
            }
            Err(failure) => {
                let outcome = match failure {
                    ZoneFailure::Upstream(_) => "upstream_error",
                    ZoneFailure::Enqueue(_) => "enqueue_error",
                };
                metrics::counter!("fetch_zone_total", "outcome" => outcome).increment(1);
                warn!(zone = %zone, error = %failure, "Zone attempt failed");
                still_failing.insert(zone.clone());
            }
        }

        attempts.push(ZoneAttempt { zone, result });
        tokio::time::sleep_until(delay_until(Instant::now(), request_delay, deadline)).await;
    }

    PassResult {
        still_failing,
        attempts,
    }
}

/// End of the inter-request pause, never past `deadline`.
fn delay_until(now: Instant, request_delay: Duration, deadline: Instant) -> Instant {
    now.checked_add(request_delay).map_or(deadline, |end| end.min(deadline))
}

/// Run deadline; budgets too large to represent are capped at a year.
fn run_deadline(started: Instant, run_budget: Duration) -> Instant {
    started
        .checked_add(run_budget)
        .unwrap_or_else(|| started + MAX_RUN_BUDGET)
}

async fn fetch_and_enqueue(
    zone: &ZoneCode,
    window: &MonthWindow,
    upstream: &dyn UpstreamSource,
    queue: &dyn IngestQueue,
    deadline: Instant,
) -> Result<String, ZoneFailure> {
    let response = tokio::time::timeout_at(deadline, upstream.fetch_month(zone, window))
        .await
        .map_err(|_| ZoneFailure::Upstream(FetchError::BudgetExhausted))?
        .map_err(ZoneFailure::Upstream)?;

    let body = serde_json::to_string(&response)
        .map_err(|e| ZoneFailure::Upstream(FetchError::Decode(e)))?;

    queue.send(&body).await.map_err(ZoneFailure::Enqueue)
}

/// Drives passes for a whole run and builds the report.
pub struct FetchOrchestrator {
    upstream: Arc<dyn UpstreamSource>,
    queue: Arc<dyn IngestQueue>,
    settings: FetchSettings,
}

impl FetchOrchestrator {
    pub fn new(
        upstream: Arc<dyn UpstreamSource>,
        queue: Arc<dyn IngestQueue>,
        settings: FetchSettings,
    ) -> Self {
        Self {
            upstream,
            queue,
            settings,
        }
    }

    /// Fetch the month `relative_month` away from `now` for every zone.
    #[instrument(skip(self, zones), fields(zones = zones.len()))]
    pub async fn run(
        &self,
        zones: &BTreeSet<ZoneCode>,
        relative_month: i32,
        now: DateTime<Utc>,
    ) -> FetchReport {
        let window = MonthWindow::from_relative(now, relative_month);
        let started_at = Utc::now();
        let started = Instant::now();
        let deadline = run_deadline(started, self.settings.run_budget);

        info!(
            year = window.year,
            month = window.month,
            "Starting fetch run"
        );

        let mut remaining = zones.clone();
        let mut attempts: BTreeMap<ZoneCode, u32> = BTreeMap::new();
        let mut last_error: BTreeMap<ZoneCode, String> = BTreeMap::new();
        let mut succeeded = BTreeSet::new();
        let mut passes_run = 0;

        for pass in 0..=self.settings.max_retry {
            if remaining.is_empty() || Instant::now() >= deadline {
                break;
            }
            if pass > 0 {
                info!(pass = pass + 1, zones = remaining.len(), "Retrying failed zones");
            }

            let result = run_pass(
                remaining,
                &window,
                self.upstream.as_ref(),
                self.queue.as_ref(),
                self.settings.request_delay,
                deadline,
            )
            .await;
            passes_run += 1;

            for attempt in result.attempts {
                *attempts.entry(attempt.zone.clone()).or_default() += 1;
                match attempt.result {
                    Ok(_) => {
                        last_error.remove(&attempt.zone);
                        succeeded.insert(attempt.zone);
                    }
                    Err(failure) => {
                        last_error.insert(attempt.zone, failure.to_string());
                    }
                }
            }

            remaining = result.still_failing;
        }

        let budget_exhausted = !remaining.is_empty() && Instant::now() >= deadline;
        let failed: BTreeMap<ZoneCode, String> = remaining
            .into_iter()
            .map(|zone| {
                let reason = last_error
                    .remove(&zone)
                    .unwrap_or_else(|| "not attempted: run budget exhausted".to_string());
                (zone, reason)
            })
            .collect();

        let elapsed = started.elapsed();
        metrics::histogram!("fetch_run_duration_seconds").record(elapsed.as_secs_f64());

        if failed.is_empty() {
            info!(
                succeeded = succeeded.len(),
                passes = passes_run,
                elapsed_secs = elapsed.as_secs(),
                "Fetch run complete"
            );
        } else {
            warn!(
                succeeded = succeeded.len(),
                failed = failed.len(),
                passes = passes_run,
                budget_exhausted,
                "Fetch run finished with failed zones"
            );
        }

        FetchReport {
            window,
            started_at,
            finished_at: Utc::now(),
            passes_run,
            succeeded,
            failed,
            attempts,
            budget_exhausted,
        }
    }
}
