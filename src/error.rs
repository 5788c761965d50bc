use std::time::Duration;

use thiserror::Error;

use crate::prediction::models::Status;

/// Failures raised by the prediction store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("prediction {0} not found")]
    NotFound(i64),

    /// A resolved prediction must never flip to the other outcome.
    #[error("prediction {id} already resolved as {recorded}, refusing to record {attempted}")]
    Conflict {
        id: i64,
        recorded: Status,
        attempted: Status,
    },

    #[error("invalid prediction record: {0}")]
    InvalidRecord(String),

    #[error("storage unavailable: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(String),
}

/// Failures raised by a stats provider. All of them are recoverable: the
/// prediction stays pending and is retried on the next sweep.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("malformed provider response: {0}")]
    Malformed(String),

    #[error("player {player} not found in any game on {date}")]
    PlayerNotFound { player: String, date: String },

    #[error("unknown market: {0}")]
    UnknownMarket(String),

    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),
}
