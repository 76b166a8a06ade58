use crate::api::now_timestamp;
use crate::error::AppError;
use crate::state::AppState;
use crate::traffic::TrafficLevel;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use chrono::{FixedOffset, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SCENARIO: &str = "manual";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SimulateTrafficArgs {
    pub scenario: Option<String>,
    pub traffic_level: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct EmergencySimulationArgs {
    pub emergency_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SimulateTrafficResponse {
    pub success: bool,
    pub message: String,
    pub scenario: String,
    pub traffic_level: TrafficLevel,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct StopSimulationResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct EmergencySimulationResponse {
    pub success: bool,
    pub message: String,
    pub emergency_type: &'static str,
    pub traffic_level: TrafficLevel,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct SimulationStatusResponse {
    pub active: bool,
    pub traffic_level: TrafficLevel,
    pub emergency_mode: bool,
    pub auto_mode_enabled: bool,
    pub baseline_active: bool,
    pub current_time: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct ToggleAutoModeResponse {
    pub success: bool,
    pub auto_mode_enabled: bool,
    pub message: String,
    pub timestamp: String,
}

/// Unwraps a JSON body. `FeatureDisabled` wins over any body rejection.
fn accept_body<T>(
    state: &AppState,
    body: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    if !state.traffic.is_enabled() {
        return Err(AppError::FeatureDisabled);
    }
    body.map(|Json(args)| args)
        .map_err(|rejection| AppError::InvalidArgument(rejection.body_text()))
}

pub async fn simulate_traffic(
    State(state): State<AppState>,
    body: Result<Json<SimulateTrafficArgs>, JsonRejection>,
) -> Result<Json<SimulateTrafficResponse>, AppError> {
    let args = accept_body(&state, body)?;
    let scenario = args
        .scenario
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_SCENARIO.to_string());

    let simulation = state
        .traffic
        .set_level_request(args.traffic_level.as_deref())
        .await?;

    let message = if simulation.active {
        format!("traffic simulation started: {scenario}")
    } else {
        format!("traffic simulation stopped: {scenario}")
    };

    Ok(Json(SimulateTrafficResponse {
        success: true,
        message,
        scenario,
        traffic_level: simulation.level,
        timestamp: now_timestamp(),
    }))
}

pub async fn stop_simulation(State(state): State<AppState>) -> Json<StopSimulationResponse> {
    state.traffic.stop().await;
    Json(StopSimulationResponse {
        success: true,
        message: "traffic simulation stopped".to_string(),
        timestamp: now_timestamp(),
    })
}

pub async fn emergency_simulation(
    State(state): State<AppState>,
    body: Result<Json<EmergencySimulationArgs>, JsonRejection>,
) -> Result<Json<EmergencySimulationResponse>, AppError> {
    let args = accept_body(&state, body)?;
    let requested = args.emergency_type.unwrap_or_default();
    let (kind, simulation) = state.traffic.trigger_emergency(&requested).await?;

    Ok(Json(EmergencySimulationResponse {
        success: true,
        message: format!("emergency simulation started: {}", kind.as_str()),
        emergency_type: kind.as_str(),
        traffic_level: simulation.level,
        timestamp: now_timestamp(),
    }))
}

pub async fn simulation_status(State(state): State<AppState>) -> Json<SimulationStatusResponse> {
    let simulation = state.traffic.get_state();
    let market_offset = FixedOffset::east_opt(state.market_hours.utc_offset_hours * 3_600);
    let current_time = match market_offset {
        Some(offset) => Utc::now().with_timezone(&offset).format("%H:%M:%S").to_string(),
        None => Utc::now().format("%H:%M:%S").to_string(),
    };

    Json(SimulationStatusResponse {
        active: simulation.active,
        traffic_level: simulation.level,
        emergency_mode: simulation.emergency,
        auto_mode_enabled: simulation.auto_mode,
        baseline_active: state.traffic.baseline_active(),
        current_time,
        timestamp: now_timestamp(),
    })
}

pub async fn toggle_auto_mode(
    State(state): State<AppState>,
) -> Result<Json<ToggleAutoModeResponse>, AppError> {
    let enabled = state.traffic.toggle_auto_mode().await?;
    let message = if enabled {
        "auto mode enabled"
    } else {
        "auto mode disabled"
    };

    Ok(Json(ToggleAutoModeResponse {
        success: true,
        auto_mode_enabled: enabled,
        message: message.to_string(),
        timestamp: now_timestamp(),
    }))
}
