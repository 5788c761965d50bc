//! Periodic sweep scheduling.
//!
//! Two cadences share one tracker: `Live` polls today's slate quickly,
//! `Reconcile` sweeps every pending prediction on a slower interval. Each
//! cadence runs its sweeps inline, so a cadence never overlaps itself.

use std::time::Duration;

use chrono::{Local, NaiveDate};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::config::TrackerConfig;
use crate::monitoring::health::HealthState;
use crate::monitoring::metrics::{compute_performance, log_performance};
use crate::tracking::sweep::{SweepReport, SweepScope, Tracker};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    /// Fast polling of games on the current date.
    Live,
    /// Slow sweep of everything still pending, any date.
    Reconcile,
}

impl Cadence {
    pub fn scope(&self, today: NaiveDate) -> SweepScope {
        match self {
            Self::Live => SweepScope::Date(today),
            Self::Reconcile => SweepScope::All,
        }
    }

    pub fn interval(&self, config: &TrackerConfig) -> Duration {
        match self {
            Self::Live => config.poll_interval(),
            Self::Reconcile => config.reconcile_interval(),
        }
    }
}

impl std::fmt::Display for Cadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::Reconcile => write!(f, "reconcile"),
        }
    }
}

/// Spawn both cadences. Each task exits once `shutdown` flips to `true`.
pub fn spawn_tracking(
    tracker: Tracker,
    config: &TrackerConfig,
    health: HealthState,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    [Cadence::Live, Cadence::Reconcile]
        .into_iter()
        .map(|cadence| {
            spawn_cadence(
                tracker.clone(),
                cadence,
                cadence.interval(config),
                health.clone(),
                shutdown.clone(),
            )
        })
        .collect()
}

pub fn spawn_cadence(
    tracker: Tracker,
    cadence: Cadence,
    interval: Duration,
    health: HealthState,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(run_cadence(tracker, cadence, interval, health, shutdown))
}

/// Sweep on every tick until shutdown. The first sweep runs immediately.
pub async fn run_cadence(
    tracker: Tracker,
    cadence: Cadence,
    interval: Duration,
    health: HealthState,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(
        %cadence,
        interval_s = interval.as_secs(),
        provider = tracker.provider_name(),
        "Tracking cadence started"
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        if *shutdown.borrow() {
            break;
        }

        run_once(&tracker, cadence, &health, &shutdown).await;
    }

    info!(%cadence, "Tracking cadence stopped");
}

/// One sweep for a cadence, with logging and health bookkeeping.
/// A storage failure skips to the next interval instead of ending the loop.
pub async fn run_once(
    tracker: &Tracker,
    cadence: Cadence,
    health: &HealthState,
    shutdown: &watch::Receiver<bool>,
) -> Option<SweepReport> {
    let scope = cadence.scope(Local::now().date_naive());

    match tracker.sweep(scope, shutdown).await {
        Ok(report) => {
            log_report(cadence, &report);
            health.record_sweep(cadence, &report).await;

            if cadence == Cadence::Reconcile && report.resolved() > 0 {
                match compute_performance(tracker.store()).await {
                    Ok(performance) => log_performance(&performance),
                    Err(e) => warn!(error = %e, "Failed to compute performance"),
                }
            }
            Some(report)
        }
        Err(e) => {
            error!(%cadence, error = %e, "Sweep failed, backing off until next interval");
            health.record_failure(cadence, &e.to_string()).await;
            None
        }
    }
}

fn log_report(cadence: Cadence, report: &SweepReport) {
    if report.pending == 0 {
        return;
    }

    if report.errors() > 0 || report.aborted {
        warn!(
            %cadence,
            pending = report.pending,
            resolved = report.resolved(),
            unavailable = report.unavailable,
            fetch_failures = report.fetch_failures,
            conflicts = report.conflicts,
            not_found = report.not_found,
            storage_failures = report.storage_failures,
            aborted = report.aborted,
            cancelled = report.cancelled,
            duration_ms = report.duration_ms,
            "Sweep finished with errors"
        );
    } else {
        info!(
            %cadence,
            pending = report.pending,
            resolved = report.resolved(),
            unavailable = report.unavailable,
            skipped = report.skipped,
            cancelled = report.cancelled,
            duration_ms = report.duration_ms,
            "Sweep finished"
        );
    }
}
