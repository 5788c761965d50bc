use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tokio::sync::watch;

use prop_tracker::config::AppConfig;
use prop_tracker::db::store::{PredictionStore, UpdateOutcome};
use prop_tracker::monitoring::dashboard::{spawn_dashboard, DashboardState};
use prop_tracker::monitoring::health::HealthState;
use prop_tracker::monitoring::logger;
use prop_tracker::monitoring::metrics::compute_performance;
use prop_tracker::prediction::evaluator::ResultEvaluator;
use prop_tracker::prediction::market::MarketSpec;
use prop_tracker::prediction::models::{Direction, NewPrediction, Prediction};
use prop_tracker::stats::espn::EspnStatsProvider;
use prop_tracker::tracking::scheduler::{run_once, spawn_tracking, Cadence};
use prop_tracker::tracking::Tracker;

#[derive(Debug, Parser)]
#[command(name = "prop-tracker", about = "Track and auto-resolve NBA player-prop predictions")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run both tracking cadences and the read-only API until Ctrl-C.
    Run,
    /// Run a single sweep and exit.
    Sweep {
        /// Sweep every pending prediction instead of only today's.
        #[arg(long)]
        all: bool,
    },
    /// Start tracking a prediction.
    Add {
        #[arg(long)]
        player: String,
        #[arg(long)]
        market: String,
        #[arg(long)]
        line: f64,
        #[arg(long, value_parser = parse_direction)]
        direction: Direction,
        /// Game date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        confidence: Option<f64>,
    },
    /// List tracked predictions.
    List {
        #[arg(long, conflicts_with = "resolved")]
        pending: bool,
        #[arg(long)]
        resolved: bool,
    },
    /// Manually resolve a prediction with an observed value.
    Resolve { id: i64, value: f64 },
    /// Stop tracking a prediction.
    Delete { id: i64 },
    /// Print hit-rate performance.
    Report,
}

fn parse_direction(s: &str) -> Result<Direction, String> {
    Direction::parse(s).ok_or_else(|| format!("expected 'over' or 'under', got '{s}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    logger::init_logging(&config.monitoring)?;

    let store = Arc::new(
        PredictionStore::new(&config.database.path)
            .await
            .with_context(|| format!("Failed to open database {}", config.database.path))?,
    );

    match cli.command {
        Command::Run => run_service(config, store).await,
        Command::Sweep { all } => run_single_sweep(&config, store, all).await,
        Command::Add {
            player,
            market,
            line,
            direction,
            date,
            confidence,
        } => {
            if MarketSpec::parse(&market).is_none() {
                tracing::warn!(market = %market, "Market is not in the catalog; it will never auto-resolve");
            }
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let mut prediction = NewPrediction::new(date, player, market, line, direction);
            prediction.confidence = confidence;
            let id = store.create(&prediction).await?;
            println!("Tracking prediction {id}");
            Ok(())
        }
        Command::List { pending, resolved } => {
            let predictions = if pending {
                store.get_pending().await?
            } else if resolved {
                store.get_resolved().await?
            } else {
                store.get_all().await?
            };
            for prediction in &predictions {
                println!("{}", format_prediction(prediction));
            }
            Ok(())
        }
        Command::Resolve { id, value } => {
            let prediction = store
                .get(id)
                .await?
                .with_context(|| format!("Prediction {id} not found"))?;
            let evaluator = ResultEvaluator::new(config.tracker.tie_policy);
            let outcome = evaluator
                .resolve(prediction.direction, prediction.line, value)
                .context("Observed value must be a finite number")?;
            match store.update_result(id, outcome, value).await? {
                UpdateOutcome::Resolved => println!("Prediction {id} resolved as {outcome}"),
                UpdateOutcome::AlreadyRecorded => {
                    println!("Prediction {id} was already recorded as {outcome}")
                }
            }
            Ok(())
        }
        Command::Delete { id } => {
            if store.delete(id).await? {
                println!("Deleted prediction {id}");
            } else {
                println!("No prediction {id}; nothing to delete");
            }
            Ok(())
        }
        Command::Report => {
            let report = compute_performance(&store).await?;
            println!("{}", report.summary());
            Ok(())
        }
    }
}

/// Run the tracking cadences and the API until Ctrl-C.
async fn run_service(config: AppConfig, store: Arc<PredictionStore>) -> Result<()> {
    let provider = Arc::new(
        EspnStatsProvider::new(&config.stats).context("Failed to build ESPN stats provider")?,
    );
    let tracker = Tracker::new(store.clone(), provider, &config.tracker);
    let health = HealthState::new(tracker.provider_name());

    tracing::info!(
        poll_interval_s = config.tracker.poll_interval_seconds,
        reconcile_interval_s = config.tracker.reconcile_interval_seconds,
        max_concurrent_fetches = config.tracker.fetch_concurrency(),
        tie_policy = ?config.tracker.tie_policy,
        "Prop tracker starting"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let tasks = spawn_tracking(tracker, &config.tracker, health.clone(), shutdown_rx);

    let dashboard_handle = config.dashboard.enabled.then(|| {
        spawn_dashboard(
            DashboardState::new(store.clone(), health),
            &config.dashboard.bind,
            config.dashboard.port,
        )
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown requested, finishing in-flight predictions");

    let _ = shutdown_tx.send(true);
    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Tracking task ended abnormally");
        }
    }

    if let Some(handle) = dashboard_handle {
        handle.abort();
    }
    store.close().await;

    tracing::info!("Prop tracker stopped");
    Ok(())
}

async fn run_single_sweep(config: &AppConfig, store: Arc<PredictionStore>, all: bool) -> Result<()> {
    let provider = Arc::new(
        EspnStatsProvider::new(&config.stats).context("Failed to build ESPN stats provider")?,
    );
    let tracker = Tracker::new(store, provider, &config.tracker);
    let health = HealthState::new(tracker.provider_name());
    let cadence = if all { Cadence::Reconcile } else { Cadence::Live };

    // Held for the duration of the sweep so the receiver never sees a closed channel.
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    match run_once(&tracker, cadence, &health, &shutdown_rx).await {
        Some(report) => {
            println!(
                "Swept {} pending: {} hit, {} miss, {} unavailable, {} errors",
                report.pending,
                report.hits,
                report.misses,
                report.unavailable,
                report.errors()
            );
            Ok(())
        }
        None => anyhow::bail!("Sweep failed; see logs"),
    }
}

fn format_prediction(p: &Prediction) -> String {
    let observed = p
        .observed_value
        .map(|v| format!(" ({v})"))
        .unwrap_or_default();
    format!(
        "#{:<5} {} {:<24} {:<14} {:<5} {:>5}  {}{}",
        p.id, p.date, p.player, p.market, p.direction, p.line, p.status, observed
    )
}
