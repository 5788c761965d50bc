use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::error::StoreError;
use crate::prediction::models::{Direction, NewPrediction, Outcome, Prediction, Status};

type StoreResult<T> = std::result::Result<T, StoreError>;

macro_rules! select_predictions {
    ($tail:literal) => {
        concat!(
            "SELECT id, date, player, market, line, direction, status, observed_value, ",
            "confidence, created_at, resolved_at FROM predictions ",
            $tail
        )
    };
}

/// SQLite-backed prediction store. Every operation is a single statement.
pub struct PredictionStore {
    pool: SqlitePool,
}

/// Raw row as persisted; converted into [`Prediction`] on read.
#[derive(Debug, Clone, FromRow)]
struct PredictionRow {
    id: i64,
    date: String,
    player: String,
    market: String,
    line: f64,
    direction: String,
    status: String,
    observed_value: Option<f64>,
    confidence: Option<f64>,
    created_at: Option<String>,
    resolved_at: Option<String>,
}

/// What `update_result` actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The prediction moved from Pending to its terminal status.
    Resolved,
    /// The same terminal status was already recorded; nothing changed.
    AlreadyRecorded,
}

impl PredictionStore {
    pub async fn new(database_path: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{database_path}"))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        // Every in-memory connection is its own database, so pin exactly one.
        let pool = if database_path == ":memory:" {
            SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Duration::from_secs(5))
                .connect_with(options)
                .await?
        };

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    /// Close the pool. Later operations fail with a storage error.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn migrate(&self) -> StoreResult<()> {
        let migration_sql = include_str!("../../migrations/001_init.sql");
        // sqlx runs one statement per call
        for statement in migration_sql.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| StoreError::Migration(format!("{e}: {trimmed}")))?;
            }
        }
        Ok(())
    }

    /// Insert a new Pending prediction and return its id.
    pub async fn create(&self, prediction: &NewPrediction) -> StoreResult<i64> {
        if !prediction.line.is_finite() {
            return Err(StoreError::InvalidRecord(format!(
                "line must be finite, got {}",
                prediction.line
            )));
        }
        if prediction.player.trim().is_empty() || prediction.market.trim().is_empty() {
            return Err(StoreError::InvalidRecord(
                "player and market must not be empty".to_string(),
            ));
        }

        let result = sqlx::query(
            "INSERT INTO predictions (date, player, market, line, direction, status, confidence)
             VALUES (?, ?, ?, ?, ?, 'Pending', ?)",
        )
        .bind(prediction.date.to_string())
        .bind(prediction.player.trim())
        .bind(prediction.market.trim())
        .bind(prediction.line)
        .bind(prediction.direction.as_str())
        .bind(prediction.confidence)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!(id, player = %prediction.player, market = %prediction.market, "Prediction created");
        Ok(id)
    }

    pub async fn get(&self, id: i64) -> StoreResult<Option<Prediction>> {
        let row = sqlx::query_as::<_, PredictionRow>(select_predictions!("WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Prediction::try_from).transpose()
    }

    /// All Pending predictions. Order is unspecified.
    pub async fn get_pending(&self) -> StoreResult<Vec<Prediction>> {
        let rows = sqlx::query_as::<_, PredictionRow>(select_predictions!("WHERE status = 'Pending'"))
            .fetch_all(&self.pool)
            .await?;
        into_predictions(rows)
    }

    /// Pending predictions for a single game date.
    pub async fn get_pending_for_date(&self, date: NaiveDate) -> StoreResult<Vec<Prediction>> {
        let rows = sqlx::query_as::<_, PredictionRow>(select_predictions!(
            "WHERE status = 'Pending' AND date = ?"
        ))
        .bind(date.to_string())
        .fetch_all(&self.pool)
        .await?;
        into_predictions(rows)
    }

    /// Hit and Miss predictions, oldest resolution first.
    pub async fn get_resolved(&self) -> StoreResult<Vec<Prediction>> {
        let rows = sqlx::query_as::<_, PredictionRow>(select_predictions!(
            "WHERE status IN ('Hit', 'Miss') ORDER BY resolved_at, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        into_predictions(rows)
    }

    pub async fn get_all(&self) -> StoreResult<Vec<Prediction>> {
        let rows = sqlx::query_as::<_, PredictionRow>(select_predictions!("ORDER BY date, id"))
            .fetch_all(&self.pool)
            .await?;
        into_predictions(rows)
    }

    /// Record the outcome of a prediction.
    ///
    /// Pending records are resolved in one conditional UPDATE. Repeating the
    /// recorded outcome is a no-op; a different outcome is a conflict and the
    /// stored result is left untouched.
    pub async fn update_result(
        &self,
        id: i64,
        outcome: Outcome,
        observed_value: f64,
    ) -> StoreResult<UpdateOutcome> {
        if !observed_value.is_finite() {
            return Err(StoreError::InvalidRecord(format!(
                "observed value must be finite, got {observed_value}"
            )));
        }

        let attempted = Status::from(outcome);
        let result = sqlx::query(
            "UPDATE predictions SET status = ?, observed_value = ?, resolved_at = ?
             WHERE id = ? AND status = 'Pending'",
        )
        .bind(attempted.as_str())
        .bind(observed_value)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(UpdateOutcome::Resolved);
        }

        // Nothing changed: either the id is gone or it is already terminal,
        // and terminal states never change, so this read is stable.
        let recorded: Option<(String,)> =
            sqlx::query_as("SELECT status FROM predictions WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        let recorded = match recorded {
            Some((status,)) => parse_status(&status)?,
            None => return Err(StoreError::NotFound(id)),
        };

        if recorded == attempted {
            Ok(UpdateOutcome::AlreadyRecorded)
        } else {
            Err(StoreError::Conflict {
                id,
                recorded,
                attempted,
            })
        }
    }

    /// Remove a prediction. Absent ids are a no-op; returns whether a row was removed.
    pub async fn delete(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM predictions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn into_predictions(rows: Vec<PredictionRow>) -> StoreResult<Vec<Prediction>> {
    rows.into_iter().map(Prediction::try_from).collect()
}

fn parse_status(s: &str) -> StoreResult<Status> {
    Status::parse(s).ok_or_else(|| StoreError::InvalidRecord(format!("unknown status '{s}'")))
}

fn parse_timestamp(s: Option<&str>) -> Option<DateTime<Utc>> {
    s.and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

impl TryFrom<PredictionRow> for Prediction {
    type Error = StoreError;

    fn try_from(row: PredictionRow) -> StoreResult<Self> {
        let date = NaiveDate::from_str(&row.date)
            .map_err(|e| StoreError::InvalidRecord(format!("bad date '{}': {e}", row.date)))?;
        let direction = Direction::parse(&row.direction).ok_or_else(|| {
            StoreError::InvalidRecord(format!("unknown direction '{}'", row.direction))
        })?;
        let status = parse_status(&row.status)?;

        Ok(Prediction {
            id: row.id,
            date,
            player: row.player,
            market: row.market,
            line: row.line,
            direction,
            status,
            observed_value: row.observed_value,
            confidence: row.confidence,
            created_at: parse_timestamp(row.created_at.as_deref()),
            resolved_at: parse_timestamp(row.resolved_at.as_deref()),
        })
    }
}
