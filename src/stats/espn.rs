//! ESPN box-score stats provider.
//!
//! Resolves a player's stat line from ESPN's public NBA scoreboard and game
//! summary endpoints. Only final games produce a value; anything in progress
//! reports "not available yet".

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::NaiveDate;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::config::StatsConfig;
use crate::error::FetchError;
use crate::prediction::market::{MarketSpec, StatKind};
use crate::stats::{StatQuery, StatsProvider};

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Name suffixes ignored when matching players.
const NAME_SUFFIXES: &[&str] = &["jr", "sr", "ii", "iii", "iv"];

pub struct EspnStatsProvider {
    client: reqwest::Client,
    base_url: String,
    limiter: Arc<Limiter>,
    cache_ttl: Duration,
    scoreboards: Mutex<HashMap<NaiveDate, Cached<Vec<GameRef>>>>,
    box_scores: Mutex<HashMap<String, Cached<BoxScore>>>,
}

struct Cached<T> {
    fetched_at: Instant,
    value: T,
}

#[derive(Debug, Clone)]
struct GameRef {
    id: String,
    completed: bool,
}

/// One player's line from a game summary, keyed by column label.
#[derive(Debug, Clone)]
struct PlayerLine {
    did_not_play: bool,
    stats: HashMap<String, String>,
}

impl PlayerLine {
    fn value(&self, stat: StatKind) -> Option<f64> {
        self.stats
            .get(stat.box_label())
            .and_then(|cell| parse_stat_cell(cell))
    }
}

#[derive(Debug, Clone, Default)]
struct BoxScore {
    /// Fetched after the game went final.
    complete: bool,
    /// Normalized display name → line.
    players: HashMap<String, PlayerLine>,
}

impl EspnStatsProvider {
    pub fn new(config: &StatsConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds.max(1)))
            .user_agent("prop-tracker/0.1")
            .build()?;

        Ok(Self {
            client,
            base_url: config.espn_base_url.trim_end_matches('/').to_string(),
            limiter: create_rate_limiter(config.requests_per_second, config.burst_size),
            cache_ttl: Duration::from_secs(config.cache_ttl_seconds),
            scoreboards: Mutex::new(HashMap::new()),
            box_scores: Mutex::new(HashMap::new()),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        self.limiter.until_ready().await;

        let url = format!("{}/{path}", self.base_url);
        let response = self.client.get(&url).query(query).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                url,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| FetchError::Malformed(format!("{path}: {e}")))
    }

    async fn scoreboard(&self, date: NaiveDate) -> Result<Vec<GameRef>, FetchError> {
        if let Some(games) = self.cached_scoreboard(date).await {
            return Ok(games);
        }

        let dates = date.format("%Y%m%d").to_string();
        let scoreboard: EspnScoreboard = self
            .get_json("scoreboard", &[("dates", dates.as_str())])
            .await?;

        let games: Vec<GameRef> = scoreboard
            .events
            .into_iter()
            .map(|event| {
                let completed = event
                    .status
                    .as_ref()
                    .or_else(|| event.competitions.iter().find_map(|c| c.status.as_ref()))
                    .and_then(|s| s.status_type.as_ref())
                    .map(|t| t.completed)
                    .unwrap_or(false);
                GameRef {
                    id: event.id,
                    completed,
                }
            })
            .collect();

        debug!(%date, games = games.len(), "ESPN scoreboard fetched");

        self.scoreboards.lock().await.insert(
            date,
            Cached {
                fetched_at: Instant::now(),
                value: games.clone(),
            },
        );
        Ok(games)
    }

    async fn cached_scoreboard(&self, date: NaiveDate) -> Option<Vec<GameRef>> {
        let cache = self.scoreboards.lock().await;
        cache
            .get(&date)
            .filter(|c| c.fetched_at.elapsed() < self.cache_ttl)
            .map(|c| c.value.clone())
    }

    async fn box_score(&self, game: &GameRef) -> Result<BoxScore, FetchError> {
        {
            let cache = self.box_scores.lock().await;
            if let Some(cached) = cache.get(&game.id) {
                // Final box scores do not change; a live one is stale once the game ends.
                let fresh = !game.completed && cached.fetched_at.elapsed() < self.cache_ttl;
                if cached.value.complete || fresh {
                    return Ok(cached.value.clone());
                }
            }
        }

        let summary: EspnSummary = self
            .get_json("summary", &[("event", game.id.as_str())])
            .await?;
        let box_score = summary.into_box_score(game.completed);

        self.box_scores.lock().await.insert(
            game.id.clone(),
            Cached {
                fetched_at: Instant::now(),
                value: box_score.clone(),
            },
        );
        Ok(box_score)
    }
}

#[async_trait]
impl StatsProvider for EspnStatsProvider {
    #[instrument(skip(self, query), fields(player = %query.player, market = %query.market, date = %query.date))]
    async fn fetch(&self, query: &StatQuery) -> Result<Option<f64>, FetchError> {
        let market = MarketSpec::parse(&query.market)
            .ok_or_else(|| FetchError::UnknownMarket(query.market.clone()))?;
        let wanted = normalize_name(&query.player);

        let games = self.scoreboard(query.date).await?;
        let mut summary_error = None;

        for game in &games {
            // One broken summary must not hide players from the rest of the slate.
            let box_score = match self.box_score(game).await {
                Ok(box_score) => box_score,
                Err(e) => {
                    warn!(game_id = %game.id, error = %e, "Failed to load game summary");
                    summary_error = Some(e);
                    continue;
                }
            };
            let line = match box_score.players.get(&wanted) {
                Some(line) => line,
                None => continue,
            };

            if !game.completed {
                debug!(game_id = %game.id, "Game not final yet");
                return Ok(None);
            }
            if line.did_not_play {
                debug!(game_id = %game.id, "Player did not play");
                return Ok(None);
            }

            return match market.total(|stat| line.value(stat)) {
                Some(total) => Ok(Some(total)),
                None => Err(FetchError::Malformed(format!(
                    "box score for game {} is missing a column for {}",
                    game.id, market.name
                ))),
            };
        }

        if let Some(e) = summary_error {
            return Err(e);
        }

        // Rosters only show up in a summary once the game starts.
        if games.iter().any(|game| !game.completed) {
            debug!("Player not listed yet, games still to finish");
            return Ok(None);
        }

        Err(FetchError::PlayerNotFound {
            player: query.player.clone(),
            date: query.date.to_string(),
        })
    }

    fn name(&self) -> &str {
        "espn_box_score"
    }
}

// === Helper Functions ===

fn create_rate_limiter(requests_per_second: u32, burst_size: u32) -> Arc<Limiter> {
    let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(burst_size).unwrap_or(rps);

    let quota = Quota::per_second(rps).allow_burst(burst);
    Arc::new(RateLimiter::direct(quota))
}

/// Lowercase, drop punctuation and generational suffixes.
/// "Jaren Jackson Jr." and "jaren jackson" compare equal.
pub fn normalize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c == '-' { ' ' } else { c })
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    cleaned
        .split_whitespace()
        .filter(|token| !NAME_SUFFIXES.contains(token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a box-score cell. Made-attempted cells ("3-7") yield the made count.
fn parse_stat_cell(cell: &str) -> Option<f64> {
    let head = match cell.split_once('-') {
        Some((made, _)) if !made.is_empty() => made,
        _ => cell,
    };
    head.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

// --- ESPN API Response Types ---

#[derive(Debug, Deserialize)]
struct EspnScoreboard {
    #[serde(default)]
    events: Vec<EspnEvent>,
}

#[derive(Debug, Deserialize)]
struct EspnEvent {
    id: String,
    #[serde(default)]
    status: Option<EspnStatus>,
    #[serde(default)]
    competitions: Vec<EspnCompetition>,
}

#[derive(Debug, Deserialize)]
struct EspnCompetition {
    #[serde(default)]
    status: Option<EspnStatus>,
}

#[derive(Debug, Deserialize)]
struct EspnStatus {
    #[serde(rename = "type", default)]
    status_type: Option<EspnStatusType>,
}

#[derive(Debug, Deserialize)]
struct EspnStatusType {
    #[serde(default)]
    completed: bool,
}

#[derive(Debug, Deserialize)]
struct EspnSummary {
    #[serde(default)]
    boxscore: Option<EspnBoxscore>,
}

#[derive(Debug, Deserialize)]
struct EspnBoxscore {
    #[serde(default)]
    players: Vec<EspnTeamPlayers>,
}

#[derive(Debug, Deserialize)]
struct EspnTeamPlayers {
    #[serde(default)]
    statistics: Vec<EspnStatBlock>,
}

#[derive(Debug, Deserialize)]
struct EspnStatBlock {
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    names: Vec<String>,
    #[serde(default)]
    athletes: Vec<EspnAthleteLine>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EspnAthleteLine {
    athlete: EspnAthlete,
    #[serde(default)]
    stats: Vec<String>,
    #[serde(default)]
    did_not_play: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EspnAthlete {
    display_name: String,
}

impl EspnSummary {
    fn into_box_score(self, complete: bool) -> BoxScore {
        let mut players = HashMap::new();
        let blocks = self
            .boxscore
            .into_iter()
            .flat_map(|b| b.players)
            .flat_map(|team| team.statistics);

        for block in blocks {
            let labels = if block.labels.is_empty() {
                block.names
            } else {
                block.labels
            };

            for line in block.athletes {
                let stats = labels
                    .iter()
                    .cloned()
                    .zip(line.stats.into_iter())
                    .collect::<HashMap<_, _>>();
                let did_not_play = line.did_not_play || stats.is_empty();
                players.insert(
                    normalize_name(&line.athlete.display_name),
                    PlayerLine {
                        did_not_play,
                        stats,
                    },
                );
            }
        }

        BoxScore { complete, players }
    }
}
