//! One pass over pending predictions.
//!
//! Flow per prediction:
//! 1. Claim the id (skip if another cadence is working on it)
//! 2. Fetch the observed value from the stats provider, bounded by a timeout
//! 3. Evaluate Hit/Miss once a finite value exists
//! 4. Record the outcome with a single atomic store update

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::TrackerConfig;
use crate::db::store::{PredictionStore, UpdateOutcome};
use crate::error::{FetchError, StoreError};
use crate::prediction::evaluator::ResultEvaluator;
use crate::prediction::models::{Outcome, Prediction};
use crate::stats::{StatQuery, StatsProvider};
use crate::tracking::claims::ClaimSet;

/// Which pending predictions a sweep covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "date")]
pub enum SweepScope {
    /// Predictions for one game date.
    Date(NaiveDate),
    /// Every pending prediction.
    All,
}

/// What happened to one prediction during a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionResult {
    Resolved(Outcome),
    /// Another caller recorded the same outcome first.
    AlreadyRecorded,
    /// Provider had no usable value yet; stays pending.
    Unavailable,
    FetchFailed,
    /// Claimed by a concurrent sweep.
    Skipped,
    Conflict,
    NotFound,
    StorageFailed,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub scope: SweepScope,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub pending: usize,
    pub hits: usize,
    pub misses: usize,
    pub already_recorded: usize,
    pub unavailable: usize,
    pub fetch_failures: usize,
    pub skipped: usize,
    pub conflicts: usize,
    pub not_found: usize,
    pub storage_failures: usize,
    /// Worker tasks that panicked.
    pub task_failures: usize,
    /// Shutdown was signalled before every prediction was attempted.
    pub cancelled: bool,
    /// The store failed mid-sweep; remaining predictions wait for the next one.
    pub aborted: bool,
}

impl SweepReport {
    pub(crate) fn new(scope: SweepScope, pending: usize) -> Self {
        Self {
            scope,
            started_at: Utc::now(),
            duration_ms: 0,
            pending,
            hits: 0,
            misses: 0,
            already_recorded: 0,
            unavailable: 0,
            fetch_failures: 0,
            skipped: 0,
            conflicts: 0,
            not_found: 0,
            storage_failures: 0,
            task_failures: 0,
            cancelled: false,
            aborted: false,
        }
    }

    pub fn resolved(&self) -> usize {
        self.hits + self.misses
    }

    /// Number of predictions that hit an error this sweep.
    pub fn errors(&self) -> usize {
        self.fetch_failures
            + self.conflicts
            + self.not_found
            + self.storage_failures
            + self.task_failures
    }

    fn record(&mut self, result: PredictionResult) {
        match result {
            PredictionResult::Resolved(Outcome::Hit) => self.hits += 1,
            PredictionResult::Resolved(Outcome::Miss) => self.misses += 1,
            PredictionResult::AlreadyRecorded => self.already_recorded += 1,
            PredictionResult::Unavailable => self.unavailable += 1,
            PredictionResult::FetchFailed => self.fetch_failures += 1,
            PredictionResult::Skipped => self.skipped += 1,
            PredictionResult::Conflict => self.conflicts += 1,
            PredictionResult::NotFound => self.not_found += 1,
            PredictionResult::StorageFailed => self.storage_failures += 1,
        }
    }
}

/// Resolves pending predictions against a stats provider.
///
/// Cheap to clone; every clone shares the store, provider and claim set.
#[derive(Clone)]
pub struct Tracker {
    store: Arc<PredictionStore>,
    provider: Arc<dyn StatsProvider>,
    evaluator: ResultEvaluator,
    claims: ClaimSet,
    fetch_timeout: Duration,
    concurrency: usize,
}

impl Tracker {
    pub fn new(
        store: Arc<PredictionStore>,
        provider: Arc<dyn StatsProvider>,
        config: &TrackerConfig,
    ) -> Self {
        Self {
            store,
            provider,
            evaluator: ResultEvaluator::new(config.tie_policy),
            claims: ClaimSet::new(),
            fetch_timeout: config.fetch_timeout(),
            concurrency: config.fetch_concurrency(),
        }
    }

    pub fn store(&self) -> &Arc<PredictionStore> {
        &self.store
    }

    pub fn claims(&self) -> &ClaimSet {
        &self.claims
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Run one sweep over the pending predictions in `scope`.
    ///
    /// Only a failure to list pending predictions is returned as an error;
    /// per-prediction failures are counted in the report.
    pub async fn sweep(
        &self,
        scope: SweepScope,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<SweepReport, StoreError> {
        let start = Instant::now();
        let pending = match scope {
            SweepScope::All => self.store.get_pending().await?,
            SweepScope::Date(date) => self.store.get_pending_for_date(date).await?,
        };

        let mut report = SweepReport::new(scope, pending.len());
        if pending.is_empty() {
            debug!(?scope, "No pending predictions");
            return Ok(report);
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let storage_down = Arc::new(AtomicBool::new(false));
        let mut tasks = JoinSet::new();

        for prediction in pending {
            if *shutdown.borrow() {
                report.cancelled = true;
                break;
            }
            if storage_down.load(Ordering::SeqCst) {
                report.aborted = true;
                break;
            }

            // Waiting for a permit is where the bound on concurrent fetches applies.
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            if *shutdown.borrow() {
                report.cancelled = true;
                break;
            }
            if storage_down.load(Ordering::SeqCst) {
                report.aborted = true;
                break;
            }

            let tracker = self.clone();
            let storage_down = storage_down.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let result = tracker.process(prediction).await;
                if result == PredictionResult::StorageFailed {
                    storage_down.store(true, Ordering::SeqCst);
                }
                result
            });
        }

        // In-flight predictions always run to completion.
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => report.record(result),
                Err(e) => {
                    error!(error = %e, "Sweep worker failed");
                    report.task_failures += 1;
                }
            }
        }

        if storage_down.load(Ordering::SeqCst) {
            report.aborted = true;
        }
        report.duration_ms = start.elapsed().as_millis() as u64;
        Ok(report)
    }

    /// Resolve a single prediction if its value is available.
    pub async fn process(&self, prediction: Prediction) -> PredictionResult {
        let _claim = match self.claims.try_claim(prediction.id) {
            Some(claim) => claim,
            None => {
                debug!(id = prediction.id, "Prediction claimed by another sweep");
                return PredictionResult::Skipped;
            }
        };

        let query = StatQuery::from(&prediction);
        let fetched = tokio::time::timeout(self.fetch_timeout, self.provider.fetch(&query))
            .await
            .unwrap_or_else(|_| Err(FetchError::Timeout(self.fetch_timeout)));

        let fetched = match fetched {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    id = prediction.id,
                    player = %prediction.player,
                    market = %prediction.market,
                    provider = self.provider.name(),
                    error = %e,
                    "Failed to fetch stats"
                );
                return PredictionResult::FetchFailed;
            }
        };

        let observed = match fetched {
            Some(value) => value,
            None => {
                debug!(id = prediction.id, player = %prediction.player, "No stats yet");
                return PredictionResult::Unavailable;
            }
        };

        let outcome = match self
            .evaluator
            .resolve(prediction.direction, prediction.line, observed)
        {
            Some(outcome) => outcome,
            None => {
                warn!(id = prediction.id, observed, "Provider returned a non-finite value");
                return PredictionResult::Unavailable;
            }
        };

        match self
            .store
            .update_result(prediction.id, outcome, observed)
            .await
        {
            Ok(UpdateOutcome::Resolved) => {
                info!(
                    id = prediction.id,
                    player = %prediction.player,
                    market = %prediction.market,
                    line = prediction.line,
                    direction = %prediction.direction,
                    observed,
                    outcome = %outcome,
                    "Prediction resolved"
                );
                PredictionResult::Resolved(outcome)
            }
            Ok(UpdateOutcome::AlreadyRecorded) => PredictionResult::AlreadyRecorded,
            Err(e @ StoreError::Conflict { .. }) => {
                error!(id = prediction.id, error = %e, "Outcome conflict needs manual review");
                PredictionResult::Conflict
            }
            Err(StoreError::NotFound(id)) => {
                warn!(id, "Prediction deleted while being resolved");
                PredictionResult::NotFound
            }
            Err(e) => {
                error!(id = prediction.id, error = %e, "Failed to record outcome");
                PredictionResult::StorageFailed
            }
        }
    }
}
