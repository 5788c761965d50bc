//! ESPN provider tests against a mocked scoreboard and summary API.

use chrono::NaiveDate;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use prop_tracker::config::StatsConfig;
use prop_tracker::error::FetchError;
use prop_tracker::stats::espn::EspnStatsProvider;
use prop_tracker::stats::{StatQuery, StatsProvider};

fn config(base_url: String) -> StatsConfig {
    StatsConfig {
        espn_base_url: base_url,
        requests_per_second: 100,
        burst_size: 100,
        cache_ttl_seconds: 30,
        request_timeout_seconds: 5,
    }
}

fn query(player: &str, market: &str) -> StatQuery {
    StatQuery {
        player: player.to_string(),
        market: market.to_string(),
        date: NaiveDate::from_ymd_opt(2025, 1, 29).unwrap(),
    }
}

fn scoreboard(completed: bool) -> serde_json::Value {
    json!({
        "events": [{
            "id": "401705001",
            "status": { "type": { "completed": completed } }
        }]
    })
}

fn summary() -> serde_json::Value {
    json!({
        "boxscore": {
            "players": [
                {
                    "statistics": [{
                        "labels": ["MIN", "FG", "3PT", "REB", "AST", "STL", "BLK", "TO", "PTS"],
                        "athletes": [
                            {
                                "athlete": { "displayName": "Anthony Edwards" },
                                "stats": ["38", "11-22", "4-11", "6", "5", "2", "1", "3", "31"]
                            },
                            {
                                "athlete": { "displayName": "Bench Guy" },
                                "stats": [],
                                "didNotPlay": true
                            }
                        ]
                    }]
                },
                {
                    "statistics": [{
                        "labels": ["MIN", "FG", "3PT", "REB", "AST", "STL", "BLK", "TO", "PTS"],
                        "athletes": [{
                            "athlete": { "displayName": "Jaren Jackson Jr." },
                            "stats": ["33", "8-15", "2-5", "7", "1", "1", "3", "2", "22"]
                        }]
                    }]
                }
            ]
        }
    })
}

async fn mock_game(server: &MockServer, completed: bool) {
    Mock::given(method("GET"))
        .and(path("/scoreboard"))
        .and(query_param("dates", "20250129"))
        .respond_with(ResponseTemplate::new(200).set_body_json(scoreboard(completed)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/summary"))
        .and(query_param("event", "401705001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(summary()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn final_game_returns_single_stat() {
    let server = MockServer::start().await;
    mock_game(&server, true).await;
    let provider = EspnStatsProvider::new(&config(server.uri())).unwrap();

    let value = provider.fetch(&query("Anthony Edwards", "Points")).await.unwrap();
    assert_eq!(value, Some(31.0));

    let threes = provider.fetch(&query("Anthony Edwards", "3PM")).await.unwrap();
    assert_eq!(threes, Some(4.0));
}

#[tokio::test]
async fn combo_market_sums_components() {
    let server = MockServer::start().await;
    mock_game(&server, true).await;
    let provider = EspnStatsProvider::new(&config(server.uri())).unwrap();

    let pra = provider.fetch(&query("Anthony Edwards", "PRA")).await.unwrap();
    assert_eq!(pra, Some(42.0));
}

#[tokio::test]
async fn player_names_match_loosely() {
    let server = MockServer::start().await;
    mock_game(&server, true).await;
    let provider = EspnStatsProvider::new(&config(server.uri())).unwrap();

    let rebounds = provider.fetch(&query("jaren jackson", "Rebounds")).await.unwrap();
    assert_eq!(rebounds, Some(7.0));
}

#[tokio::test]
async fn game_in_progress_is_not_available() {
    let server = MockServer::start().await;
    mock_game(&server, false).await;
    let provider = EspnStatsProvider::new(&config(server.uri())).unwrap();

    let value = provider.fetch(&query("Anthony Edwards", "Points")).await.unwrap();
    assert_eq!(value, None);
}

#[tokio::test]
async fn did_not_play_is_not_available() {
    let server = MockServer::start().await;
    mock_game(&server, true).await;
    let provider = EspnStatsProvider::new(&config(server.uri())).unwrap();

    let value = provider.fetch(&query("Bench Guy", "Points")).await.unwrap();
    assert_eq!(value, None);
}

#[tokio::test]
async fn unknown_player_is_an_error() {
    let server = MockServer::start().await;
    mock_game(&server, true).await;
    let provider = EspnStatsProvider::new(&config(server.uri())).unwrap();

    let err = provider.fetch(&query("Nobody Atall", "Points")).await.unwrap_err();
    assert!(matches!(err, FetchError::PlayerNotFound { .. }));
}

#[tokio::test]
async fn unknown_market_fails_before_any_request() {
    let server = MockServer::start().await;
    let provider = EspnStatsProvider::new(&config(server.uri())).unwrap();

    let err = provider
        .fetch(&query("Anthony Edwards", "Double Doubles"))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::UnknownMarket(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn upstream_error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/scoreboard"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let provider = EspnStatsProvider::new(&config(server.uri())).unwrap();

    let err = provider.fetch(&query("Anthony Edwards", "Points")).await.unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 503, .. }));
}

#[tokio::test]
async fn scoreboard_is_cached_between_fetches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/scoreboard"))
        .respond_with(ResponseTemplate::new(200).set_body_json(scoreboard(true)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/summary"))
        .respond_with(ResponseTemplate::new(200).set_body_json(summary()))
        .expect(1)
        .mount(&server)
        .await;
    let provider = EspnStatsProvider::new(&config(server.uri())).unwrap();

    provider.fetch(&query("Anthony Edwards", "Points")).await.unwrap();
    provider.fetch(&query("Anthony Edwards", "Assists")).await.unwrap();
    server.verify().await;
}

fn two_game_scoreboard() -> serde_json::Value {
    json!({
        "events": [
            { "id": "1", "status": { "type": { "completed": true } } },
            { "id": "2", "status": { "type": { "completed": true } } }
        ]
    })
}

async fn mock_slate_with_broken_first_summary(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/scoreboard"))
        .respond_with(ResponseTemplate::new(200).set_body_json(two_game_scoreboard()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/summary"))
        .and(query_param("event", "1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/summary"))
        .and(query_param("event", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(summary()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn broken_summary_does_not_hide_other_games() {
    let server = MockServer::start().await;
    mock_slate_with_broken_first_summary(&server).await;
    let provider = EspnStatsProvider::new(&config(server.uri())).unwrap();

    let value = provider.fetch(&query("Anthony Edwards", "Points")).await.unwrap();
    assert_eq!(value, Some(31.0));
}

#[tokio::test]
async fn broken_summary_is_reported_when_player_is_elsewhere() {
    let server = MockServer::start().await;
    mock_slate_with_broken_first_summary(&server).await;
    let provider = EspnStatsProvider::new(&config(server.uri())).unwrap();

    // Might be in game 1, so this is a failed fetch rather than a missing player.
    let err = provider.fetch(&query("Nobody Atall", "Points")).await.unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 404, .. }));
}

#[tokio::test]
async fn unlisted_player_waits_while_games_are_unfinished() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/scoreboard"))
        .respond_with(ResponseTemplate::new(200).set_body_json(scoreboard(false)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/summary"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "boxscore": { "players": [] } })))
        .mount(&server)
        .await;
    let provider = EspnStatsProvider::new(&config(server.uri())).unwrap();

    let value = provider.fetch(&query("Anthony Edwards", "Points")).await.unwrap();
    assert_eq!(value, None);
}
