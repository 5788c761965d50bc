//! Tracker health state.
//!
//! Sweep outcomes per cadence, shared between the tracking tasks and the
//! read-only API. Every fetch failure and storage error shows up here.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::tracking::scheduler::Cadence;
use crate::tracking::sweep::SweepReport;

/// Shared health state updated by the tracking loops.
#[derive(Clone)]
pub struct HealthState {
    inner: Arc<RwLock<HealthData>>,
}

#[derive(Debug, Clone, Serialize)]
struct HealthData {
    status: String,
    provider: String,
    started_at: DateTime<Utc>,
    uptime_seconds: i64,
    cadences: BTreeMap<String, CadenceHealth>,
}

/// Running totals for one cadence.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CadenceHealth {
    pub sweeps: u64,
    pub failed_sweeps: u64,
    pub resolved: u64,
    pub fetch_failures: u64,
    pub conflicts: u64,
    pub storage_failures: u64,
    pub last_sweep_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_report: Option<SweepReport>,
}

impl HealthState {
    pub fn new(provider: &str) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HealthData {
                status: "starting".to_string(),
                provider: provider.to_string(),
                started_at: Utc::now(),
                uptime_seconds: 0,
                cadences: BTreeMap::new(),
            })),
        }
    }

    pub async fn record_sweep(&self, cadence: Cadence, report: &SweepReport) {
        let mut data = self.inner.write().await;
        let entry = data.cadences.entry(cadence.to_string()).or_default();
        entry.sweeps += 1;
        entry.resolved += report.resolved() as u64;
        entry.fetch_failures += report.fetch_failures as u64;
        entry.conflicts += report.conflicts as u64;
        entry.storage_failures += report.storage_failures as u64;
        entry.last_sweep_at = Some(Utc::now());
        entry.last_error = if report.aborted {
            Some("storage failure during sweep".to_string())
        } else if report.pending > 0 && report.fetch_failures == report.pending {
            Some(format!("all {} fetches failed", report.pending))
        } else {
            None
        };
        entry.last_report = Some(report.clone());
        data.status = overall_status(&data.cadences);
    }

    pub async fn record_failure(&self, cadence: Cadence, error: &str) {
        let mut data = self.inner.write().await;
        let entry = data.cadences.entry(cadence.to_string()).or_default();
        entry.sweeps += 1;
        entry.failed_sweeps += 1;
        entry.last_sweep_at = Some(Utc::now());
        entry.last_error = Some(error.to_string());
        data.status = overall_status(&data.cadences);
    }

    pub async fn cadence(&self, cadence: Cadence) -> Option<CadenceHealth> {
        self.inner
            .read()
            .await
            .cadences
            .get(&cadence.to_string())
            .cloned()
    }

    pub async fn to_json(&self) -> serde_json::Value {
        let mut data = self.inner.read().await.clone();
        data.uptime_seconds = (Utc::now() - data.started_at).num_seconds();
        serde_json::to_value(&data).unwrap_or_else(|_| {
            serde_json::json!({"status": "error", "message": "serialization failed"})
        })
    }
}

fn overall_status(cadences: &BTreeMap<String, CadenceHealth>) -> String {
    if cadences.values().any(|c| c.last_error.is_some()) {
        "degraded".to_string()
    } else {
        "ok".to_string()
    }
}
