//! Prayer-time fetcher service.
//!
//! Scrapes monthly schedules for every zone from e-Solat with:
//! - Serial requests with a fixed pause between them
//! - Retry passes over zones that failed
//! - One queue message per successful zone
//! - HTTP status API for monitoring

mod config;
mod orchestrator;
mod scheduler;
mod server;
mod upstream;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use config::FetcherConfig;
use orchestrator::{FetchOrchestrator, FetchSettings};
use scheduler::Scheduler;
use server::{FetchStatus, ServerState};
use storage::{QueueSettings, RedisStreamQueue};
use upstream::EsolatClient;

#[derive(Parser, Debug)]
#[command(name = "fetcher")]
#[command(about = "Monthly prayer-time fetcher")]
struct Args {
    /// Run once and exit (vs waiting for the start of each month)
    #[arg(long)]
    once: bool,

    /// Month to fetch relative to the current one (overrides config)
    #[arg(long, allow_hyphen_values = true)]
    relative_month: Option<i32>,

    /// Redis URL for the ingestion queue
    #[arg(long, env = "REDIS_URL", default_value = "redis://localhost:6379")]
    redis_url: String,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Port for status HTTP server
    #[arg(long, env = "STATUS_PORT", default_value = "8081")]
    status_port: u16,

    /// Configuration directory (contains fetcher.yaml)
    #[arg(long, env = "CONFIG_DIR", default_value = "config")]
    config_dir: PathBuf,

    /// Disable status HTTP server
    #[arg(long)]
    no_status_server: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting prayer-time fetcher");

    let config = FetcherConfig::load_from_dir(&args.config_dir)?;
    let zones = config.zone_set();
    let relative_month = args.relative_month.unwrap_or(config.fetch.relative_month);
    config.check_capacity(zones.len());

    let prometheus = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    let queue = RedisStreamQueue::connect(&args.redis_url, "fetcher", QueueSettings::default())
        .await
        .context("Failed to connect to the ingestion queue")?;
    let upstream = EsolatClient::new(&config.upstream).context("Failed to create HTTP client")?;

    let orchestrator = FetchOrchestrator::new(
        Arc::new(upstream),
        Arc::new(queue),
        FetchSettings {
            max_retry: config.fetch.max_retry,
            request_delay: config.request_delay(),
            run_budget: config.run_budget(),
        },
    );

    let status = Arc::new(RwLock::new(FetchStatus::default()));
    let scheduler = Scheduler::new(orchestrator, zones.clone(), relative_month, status.clone());

    // Shutdown signal
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Start status server (unless disabled or in --once mode)
    if !args.no_status_server && !args.once {
        let server_state = Arc::new(ServerState {
            status: status.clone(),
            zone_count: zones.len(),
            prometheus: Some(prometheus),
        });
        let status_port = args.status_port;
        tokio::spawn(async move {
            if let Err(e) = server::run_server(server_state, status_port).await {
                tracing::error!(error = %e, "Status server failed");
            }
        });
    }

    if args.once {
        // Single run mode
        info!(relative_month, "Running single fetch cycle");
        let report = scheduler.run_once().await;

        let summary = serde_json::json!({
            "message": "Successfully fetched and stored prayer times",
            "succeeded": report.succeeded.len(),
            "failed": report.failed,
            "passes": report.passes_run,
        });
        println!("{}", summary);
    } else {
        // Continuous mode
        info!("Starting monthly schedule");

        // Handle Ctrl+C
        let shutdown_tx_clone = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Received shutdown signal");
            shutdown_tx_clone.send(()).ok();
        });

        scheduler.run_forever(shutdown_tx.subscribe()).await?;
    }

    Ok(())
}
