//! Prediction performance metrics.
//!
//! Hit rate overall and broken down by market, direction and confidence band,
//! computed from the prediction store.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use crate::db::store::PredictionStore;
use crate::error::StoreError;
use crate::prediction::models::{Prediction, Status};

/// Confidence band edges on a 0–100 scale; a score falls in the last band whose edge it reaches.
const CONFIDENCE_BANDS: &[(f64, &str)] = &[
    (0.0, "<55"),
    (55.0, "55-65"),
    (65.0, "65-75"),
    (75.0, "75+"),
];

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    pub total: u64,
    pub pending: u64,
    pub resolved: u64,
    pub hits: u64,
    pub misses: u64,
    /// `None` until something has resolved.
    pub hit_rate: Option<f64>,
    pub by_market: Vec<GroupPerformance>,
    pub by_direction: Vec<GroupPerformance>,
    pub by_confidence: Vec<GroupPerformance>,
    /// One group per game date, oldest first.
    pub by_date: Vec<GroupPerformance>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupPerformance {
    pub key: String,
    pub total: u64,
    pub resolved: u64,
    pub hits: u64,
    pub hit_rate: Option<f64>,
}

impl GroupPerformance {
    fn add(&mut self, prediction: &Prediction) {
        self.total += 1;
        match prediction.status {
            Status::Pending => {}
            Status::Hit => {
                self.resolved += 1;
                self.hits += 1;
            }
            Status::Miss => self.resolved += 1,
        }
        self.hit_rate = ratio(self.hits, self.resolved);
    }
}

impl PerformanceReport {
    /// Format for logs and the CLI.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Predictions: {} ({} pending, {} resolved: {} hit / {} miss, {} hit rate)",
            self.total,
            self.pending,
            self.resolved,
            self.hits,
            self.misses,
            format_rate(self.hit_rate),
        );

        if !self.by_market.is_empty() {
            out.push_str("\nBy market:");
            for group in &self.by_market {
                out.push_str(&format!(
                    "\n  {:<16} {:>4} resolved  {:>6}",
                    group.key,
                    group.resolved,
                    format_rate(group.hit_rate)
                ));
            }
        }

        out
    }
}

/// Compute performance from every stored prediction.
pub async fn compute_performance(store: &PredictionStore) -> Result<PerformanceReport, StoreError> {
    let all = store.get_all().await?;
    Ok(summarize(&all))
}

/// Aggregate a set of predictions.
pub fn summarize(predictions: &[Prediction]) -> PerformanceReport {
    let mut by_market: BTreeMap<String, GroupPerformance> = BTreeMap::new();
    let mut by_direction: BTreeMap<String, GroupPerformance> = BTreeMap::new();
    let mut by_confidence: BTreeMap<String, GroupPerformance> = BTreeMap::new();
    let mut by_date: BTreeMap<String, GroupPerformance> = BTreeMap::new();

    let mut pending = 0u64;
    let mut hits = 0u64;
    let mut misses = 0u64;

    for prediction in predictions {
        match prediction.status {
            Status::Pending => pending += 1,
            Status::Hit => hits += 1,
            Status::Miss => misses += 1,
        }

        group_entry(&mut by_market, &prediction.market).add(prediction);
        group_entry(&mut by_direction, prediction.direction.as_str()).add(prediction);
        group_entry(&mut by_confidence, confidence_band(prediction.confidence)).add(prediction);
        // ISO dates sort chronologically as strings.
        group_entry(&mut by_date, &prediction.date.to_string()).add(prediction);
    }

    let resolved = hits + misses;

    // Best-performing markets first; unresolved markets last.
    let mut by_market: Vec<GroupPerformance> = by_market.into_values().collect();
    by_market.sort_by(|a, b| {
        b.hit_rate
            .unwrap_or(-1.0)
            .total_cmp(&a.hit_rate.unwrap_or(-1.0))
            .then_with(|| a.key.cmp(&b.key))
    });

    PerformanceReport {
        total: predictions.len() as u64,
        pending,
        resolved,
        hits,
        misses,
        hit_rate: ratio(hits, resolved),
        by_market,
        by_direction: by_direction.into_values().collect(),
        by_confidence: by_confidence.into_values().collect(),
        by_date: by_date.into_values().collect(),
    }
}

pub fn log_performance(report: &PerformanceReport) {
    info!(
        total = report.total,
        pending = report.pending,
        resolved = report.resolved,
        hits = report.hits,
        misses = report.misses,
        hit_rate = report.hit_rate.unwrap_or(0.0),
        "Performance summary"
    );
}

fn group_entry<'a>(
    groups: &'a mut BTreeMap<String, GroupPerformance>,
    key: &str,
) -> &'a mut GroupPerformance {
    groups
        .entry(key.to_string())
        .or_insert_with(|| GroupPerformance {
            key: key.to_string(),
            ..Default::default()
        })
}

fn confidence_band(confidence: Option<f64>) -> &'static str {
    match confidence {
        Some(score) if score.is_finite() => CONFIDENCE_BANDS
            .iter()
            .rev()
            .find(|(edge, _)| score >= *edge)
            .map(|(_, label)| *label)
            .unwrap_or(CONFIDENCE_BANDS[0].1),
        _ => "unscored",
    }
}

fn ratio(hits: u64, resolved: u64) -> Option<f64> {
    (resolved > 0).then(|| hits as f64 / resolved as f64)
}

fn format_rate(rate: Option<f64>) -> String {
    rate.map(|r| format!("{:.1}%", r * 100.0))
        .unwrap_or_else(|| "N/A".to_string())
}
