//! Read-only results API for presentation layers.
//!
//! Serves stored predictions, performance and tracker health as JSON. There
//! are no write routes; filters travel with each request.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use chrono::NaiveDate;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::db::store::PredictionStore;
use crate::error::StoreError;
use crate::monitoring::health::HealthState;
use crate::monitoring::metrics::compute_performance;
use crate::prediction::models::{Prediction, Status};

/// Shared state accessible by all route handlers.
#[derive(Clone)]
pub struct DashboardState {
    store: Arc<PredictionStore>,
    health: HealthState,
}

impl DashboardState {
    pub fn new(store: Arc<PredictionStore>, health: HealthState) -> Self {
        Self { store, health }
    }
}

/// Optional filters for `/api/predictions`.
#[derive(Debug, Default, Deserialize)]
pub struct PredictionFilter {
    pub date: Option<NaiveDate>,
    pub market: Option<String>,
    pub player: Option<String>,
    pub status: Option<Status>,
}

impl PredictionFilter {
    pub fn matches(&self, prediction: &Prediction) -> bool {
        self.date.map_or(true, |d| prediction.date == d)
            && self.status.map_or(true, |s| prediction.status == s)
            && self
                .market
                .as_deref()
                .map_or(true, |m| prediction.market.eq_ignore_ascii_case(m))
            && self
                .player
                .as_deref()
                .map_or(true, |p| prediction.player.eq_ignore_ascii_case(p))
    }
}

pub fn router(state: DashboardState) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/performance", get(performance_handler))
        .route("/api/predictions", get(predictions_handler))
        .route("/api/predictions/pending", get(pending_handler))
        .route("/api/predictions/resolved", get(resolved_handler))
        .route("/api/predictions/{id}", get(prediction_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the API on an already bound listener until the task is aborted.
pub async fn serve(listener: TcpListener, state: DashboardState) {
    if let Err(e) = axum::serve(listener, router(state)).await {
        warn!(error = %e, "Dashboard server error");
    }
}

/// Spawn the API server. Returns a handle that can be aborted.
pub fn spawn_dashboard(state: DashboardState, bind: &str, port: u16) -> JoinHandle<()> {
    let addr = format!("{bind}:{port}");

    tokio::spawn(async move {
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => {
                info!(addr = %addr, "Dashboard server listening");
                l
            }
            Err(e) => {
                warn!(error = %e, addr = %addr, "Failed to bind dashboard server");
                return;
            }
        };

        serve(listener, state).await;
    })
}

// -- Route Handlers --

fn store_error(e: StoreError) -> Response {
    warn!(error = %e, "Dashboard query failed");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(serde_json::json!({"error": e.to_string()})),
    )
        .into_response()
}

async fn health_handler(State(state): State<DashboardState>) -> impl IntoResponse {
    Json(state.health.to_json().await)
}

async fn performance_handler(State(state): State<DashboardState>) -> Response {
    match compute_performance(&state.store).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => store_error(e),
    }
}

async fn predictions_handler(
    State(state): State<DashboardState>,
    Query(filter): Query<PredictionFilter>,
) -> Response {
    match state.store.get_all().await {
        Ok(all) => {
            let matching: Vec<Prediction> =
                all.into_iter().filter(|p| filter.matches(p)).collect();
            Json(matching).into_response()
        }
        Err(e) => store_error(e),
    }
}

async fn pending_handler(State(state): State<DashboardState>) -> Response {
    match state.store.get_pending().await {
        Ok(pending) => Json(pending).into_response(),
        Err(e) => store_error(e),
    }
}

async fn resolved_handler(State(state): State<DashboardState>) -> Response {
    match state.store.get_resolved().await {
        Ok(resolved) => Json(resolved).into_response(),
        Err(e) => store_error(e),
    }
}

async fn prediction_handler(
    State(state): State<DashboardState>,
    Path(id): Path<i64>,
) -> Response {
    match state.store.get(id).await {
        Ok(Some(prediction)) => Json(prediction).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": format!("prediction {id} not found")})),
        )
            .into_response(),
        Err(e) => store_error(e),
    }
}
