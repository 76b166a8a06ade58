//! HTTP surface of the backend.
//!
//! Every route except `/metrics` is counted and timed by [`track_requests`], keyed by the
//! matched route template so path parameters do not explode label cardinality.

pub mod health;
pub mod simulation;
pub mod stocks;

use crate::state::AppState;
use axum::extract::{MatchedPath, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use chrono::Local;
use std::time::Instant;
use tower_http::trace::TraceLayer;

pub const METRICS_PATH: &str = "/metrics";

pub(crate) fn now_timestamp() -> String {
    Local::now().to_rfc3339()
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::home))
        .route("/api/health", get(health::health))
        .route(METRICS_PATH, get(health::metrics))
        .route("/api/simulate-traffic", post(simulation::simulate_traffic))
        .route("/api/stop-simulation", post(simulation::stop_simulation))
        .route(
            "/api/emergency-simulation",
            post(simulation::emergency_simulation),
        )
        .route("/api/toggle-auto-mode", post(simulation::toggle_auto_mode))
        .route("/api/simulation-status", get(simulation::simulation_status))
        .route("/api/stock-data", get(stocks::stock_data))
        .route("/api/stock-price/:symbol", get(stocks::stock_price))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            track_requests,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn track_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    if endpoint == METRICS_PATH {
        return next.run(request).await;
    }

    let method = request.method().as_str().to_string();
    let started = Instant::now();
    let response = next.run(request).await;
    state.metrics.record_request(
        &method,
        &endpoint,
        response.status().as_u16(),
        started.elapsed(),
    );
    response
}
