//! Declarative market catalog.
//!
//! A market identifier ("Points", "PTS+REB", "Pts+Rebs+Asts", "3-PT Made")
//! maps to the list of base box-score stats it sums. Providers look up each
//! component and add them; no per-market formulas.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StatKind {
    Points,
    Rebounds,
    Assists,
    Steals,
    Blocks,
    Turnovers,
    ThreesMade,
}

impl StatKind {
    /// Column label used by box-score tables.
    pub fn box_label(&self) -> &'static str {
        match self {
            Self::Points => "PTS",
            Self::Rebounds => "REB",
            Self::Assists => "AST",
            Self::Steals => "STL",
            Self::Blocks => "BLK",
            Self::Turnovers => "TO",
            Self::ThreesMade => "3PT",
        }
    }
}

/// Single-stat aliases. Matched against one `+`-separated token.
const STAT_ALIASES: &[(StatKind, &[&str])] = &[
    (StatKind::Points, &["points", "pts", "pt", "p"]),
    (StatKind::Rebounds, &["rebounds", "rebs", "reb", "r"]),
    (StatKind::Assists, &["assists", "asts", "ast", "a"]),
    (StatKind::Steals, &["steals", "stls", "stl", "s"]),
    (StatKind::Blocks, &["blocks", "blks", "blk", "blocked shots", "b"]),
    (StatKind::Turnovers, &["turnovers", "tos", "to", "tov"]),
    (
        StatKind::ThreesMade,
        &["3-pt made", "3pt made", "3-pointers made", "threes", "3pm", "3ptm", "3pt"],
    ),
];

/// Whole-market shorthands that don't use `+`.
const COMBO_ALIASES: &[(&str, &[StatKind])] = &[
    ("pra", &[StatKind::Points, StatKind::Rebounds, StatKind::Assists]),
    ("pr", &[StatKind::Points, StatKind::Rebounds]),
    ("pa", &[StatKind::Points, StatKind::Assists]),
    ("ra", &[StatKind::Rebounds, StatKind::Assists]),
    ("stocks", &[StatKind::Steals, StatKind::Blocks]),
];

/// A market resolved to its summed components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketSpec {
    pub name: String,
    pub components: Vec<StatKind>,
}

impl MarketSpec {
    /// Parse a market identifier. Returns `None` for markets outside the catalog.
    pub fn parse(market: &str) -> Option<Self> {
        let normalized = normalize(market);
        if normalized.is_empty() {
            return None;
        }

        if let Some((_, components)) = COMBO_ALIASES.iter().find(|(alias, _)| *alias == normalized) {
            return Some(Self {
                name: market.trim().to_string(),
                components: components.to_vec(),
            });
        }

        let components = normalized
            .split('+')
            .map(|token| lookup_stat(token.trim()))
            .collect::<Option<Vec<_>>>()?;

        Some(Self {
            name: market.trim().to_string(),
            components,
        })
    }

    /// Sum the components using a per-stat lookup. `None` if any component is missing.
    pub fn total<F>(&self, mut value_of: F) -> Option<f64>
    where
        F: FnMut(StatKind) -> Option<f64>,
    {
        self.components
            .iter()
            .try_fold(0.0, |acc, stat| value_of(*stat).map(|v| acc + v))
    }
}

fn lookup_stat(token: &str) -> Option<StatKind> {
    STAT_ALIASES
        .iter()
        .find(|(_, aliases)| aliases.contains(&token))
        .map(|(stat, _)| *stat)
}

fn normalize(market: &str) -> String {
    market
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace(" + ", "+")
}
