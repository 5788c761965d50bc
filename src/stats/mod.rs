pub mod espn;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;

use crate::error::FetchError;
use crate::prediction::models::Prediction;

/// What a tracked prediction asks a stats provider for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatQuery {
    pub player: String,
    pub market: String,
    pub date: NaiveDate,
}

impl From<&Prediction> for StatQuery {
    fn from(prediction: &Prediction) -> Self {
        Self {
            player: prediction.player.clone(),
            market: prediction.market.clone(),
            date: prediction.date,
        }
    }
}

/// Source of observed stat values for tracked predictions.
#[async_trait]
pub trait StatsProvider: Send + Sync {
    /// Fetch the final value for the player's market on the given date.
    ///
    /// `Ok(None)` means "not available yet" (game not final, no box score
    /// line); the prediction stays pending and is retried next sweep.
    async fn fetch(&self, query: &StatQuery) -> Result<Option<f64>, FetchError>;

    /// Human-readable name of this provider.
    fn name(&self) -> &str;
}
