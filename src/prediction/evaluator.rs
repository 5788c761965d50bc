//! Hit/Miss decision for a resolved stat line.
//!
//! Strict inequality is canonical: a value exactly on the line is a push at a
//! sportsbook, so it counts as a Miss for both Over and Under. `Inclusive`
//! exists for parity with older tracking sheets that used `>=` / `<=`.

use serde::Deserialize;

use crate::prediction::models::{Direction, Outcome};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TiePolicy {
    /// Over hits on `observed > line`, Under on `observed < line`.
    #[default]
    Strict,
    /// Over hits on `observed >= line`, Under on `observed <= line`.
    Inclusive,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResultEvaluator {
    tie_policy: TiePolicy,
}

impl ResultEvaluator {
    pub fn new(tie_policy: TiePolicy) -> Self {
        Self { tie_policy }
    }

    pub fn tie_policy(&self) -> TiePolicy {
        self.tie_policy
    }

    /// Decide Hit/Miss. Callers must not pass a non-finite value; use
    /// [`ResultEvaluator::resolve`] when the value comes from outside.
    pub fn evaluate(&self, direction: Direction, line: f64, observed: f64) -> Outcome {
        let hit = match (direction, self.tie_policy) {
            (Direction::Over, TiePolicy::Strict) => observed > line,
            (Direction::Under, TiePolicy::Strict) => observed < line,
            (Direction::Over, TiePolicy::Inclusive) => observed >= line,
            (Direction::Under, TiePolicy::Inclusive) => observed <= line,
        };

        if hit {
            Outcome::Hit
        } else {
            Outcome::Miss
        }
    }

    /// Like [`ResultEvaluator::evaluate`], but returns `None` for NaN or
    /// infinite values, which leaves the prediction pending.
    pub fn resolve(&self, direction: Direction, line: f64, observed: f64) -> Option<Outcome> {
        if !observed.is_finite() || !line.is_finite() {
            return None;
        }
        Some(self.evaluate(direction, line, observed))
    }
}

/// Evaluate with the canonical strict policy.
pub fn evaluate(direction: Direction, line: f64, observed: f64) -> Outcome {
    ResultEvaluator::default().evaluate(direction, line, observed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_over_hits_only_above_line() {
        assert_eq!(evaluate(Direction::Over, 20.0, 21.0), Outcome::Hit);
        assert_eq!(evaluate(Direction::Over, 20.0, 20.0), Outcome::Miss);
        assert_eq!(evaluate(Direction::Over, 20.5, 20.0), Outcome::Miss);
    }

    #[test]
    fn test_under_hits_only_below_line() {
        assert_eq!(evaluate(Direction::Under, 20.0, 19.0), Outcome::Hit);
        assert_eq!(evaluate(Direction::Under, 20.0, 20.0), Outcome::Miss);
        assert_eq!(evaluate(Direction::Under, 20.0, 27.0), Outcome::Miss);
    }

    #[test]
    fn test_inclusive_policy_counts_ties_as_hits() {
        let evaluator = ResultEvaluator::new(TiePolicy::Inclusive);
        assert_eq!(evaluator.evaluate(Direction::Over, 20.0, 20.0), Outcome::Hit);
        assert_eq!(evaluator.evaluate(Direction::Under, 20.0, 20.0), Outcome::Hit);
        assert_eq!(evaluator.evaluate(Direction::Over, 20.0, 19.0), Outcome::Miss);
    }

    #[test]
    fn test_non_finite_values_are_not_resolvable() {
        let evaluator = ResultEvaluator::default();
        assert_eq!(evaluator.resolve(Direction::Over, 20.0, f64::NAN), None);
        assert_eq!(evaluator.resolve(Direction::Under, 20.0, f64::INFINITY), None);
        assert_eq!(evaluator.resolve(Direction::Under, f64::NAN, 3.0), None);
        assert_eq!(evaluator.resolve(Direction::Under, 10.0, 8.0), Some(Outcome::Hit));
    }
}
