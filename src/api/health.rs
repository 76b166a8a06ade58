use crate::api::now_timestamp;
use crate::error::AppError;
use crate::state::{AppState, SERVICE_NAME};
use crate::telemetry::METRICS_CONTENT_TYPE;
use crate::traffic::{SimulationState, TrafficLevel};
use axum::extract::State;
use axum::http::header;
use axum::response::{Html, IntoResponse};
use axum::Json;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub hostname: String,
    pub timestamp: String,
    pub uptime_seconds: u64,
    pub traffic_simulation: bool,
    pub traffic_level: TrafficLevel,
}

pub fn build_health_response(
    hostname: &str,
    uptime: Duration,
    simulation: SimulationState,
) -> HealthResponse {
    HealthResponse {
        status: "ok",
        service: SERVICE_NAME,
        hostname: hostname.to_string(),
        timestamp: now_timestamp(),
        uptime_seconds: uptime.as_secs(),
        traffic_simulation: simulation.active,
        traffic_level: simulation.level,
    }
}

pub async fn home(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        "<h1>Stock monitoring backend</h1><p>Server: {}</p><p>Status: ok</p>",
        state.hostname
    ))
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(build_health_response(
        &state.hostname,
        state.started_at.elapsed(),
        state.traffic.get_state(),
    ))
}

pub async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state.metrics.render(&state.traffic)?;
    Ok(([(header::CONTENT_TYPE, METRICS_CONTENT_TYPE)], body))
}
