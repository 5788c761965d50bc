use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Which side of the line the prediction backs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Over,
    Under,
}

/// Lifecycle state of a tracked prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Pending,
    Hit,
    Miss,
}

/// Terminal resolution of a prediction. `Status` minus `Pending`, so a write
/// can never move a record back to pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Hit,
    Miss,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Over => "Over",
            Self::Under => "Under",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "over" | "o" | "more" => Some(Self::Over),
            "under" | "u" | "less" => Some(Self::Under),
            _ => None,
        }
    }
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Hit => "Hit",
            Self::Miss => "Miss",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(Self::Pending),
            "Hit" => Some(Self::Hit),
            "Miss" => Some(Self::Miss),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl From<Outcome> for Status {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Hit => Self::Hit,
            Outcome::Miss => Self::Miss,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Status::from(*self).fmt(f)
    }
}

/// A prediction selected for tracking, before the store assigns an id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPrediction {
    pub date: NaiveDate,
    pub player: String,
    pub market: String,
    pub line: f64,
    pub direction: Direction,
    /// Externally computed score carried for reporting only.
    pub confidence: Option<f64>,
}

impl NewPrediction {
    pub fn new(
        date: NaiveDate,
        player: impl Into<String>,
        market: impl Into<String>,
        line: f64,
        direction: Direction,
    ) -> Self {
        Self {
            date,
            player: player.into(),
            market: market.into(),
            line,
            direction,
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// A tracked prediction as stored.
///
/// `observed_value` is `Some` exactly when `status` is not `Pending`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: i64,
    pub date: NaiveDate,
    pub player: String,
    pub market: String,
    pub line: f64,
    pub direction: Direction,
    pub status: Status,
    pub observed_value: Option<f64>,
    pub confidence: Option<f64>,
    pub created_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Prediction {
    pub fn is_pending(&self) -> bool {
        self.status == Status::Pending
    }
}
