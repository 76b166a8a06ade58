use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Local;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("traffic simulation is disabled")]
    FeatureDisabled,
    #[error("invalid traffic level: {0}")]
    InvalidLevel(String),
    #[error("unknown emergency type: {0}")]
    UnknownEmergency(String),
    #[error("Unknown symbol")]
    UnknownSymbol(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("market data upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("{label} generator did not stop within {timeout_ms}ms")]
    GeneratorJoinTimeout { label: &'static str, timeout_ms: u64 },
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::FeatureDisabled => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvalidLevel(_)
            | Self::UnknownEmergency(_)
            | Self::UnknownSymbol(_)
            | Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            Self::FeatureDisabled
            | Self::InvalidLevel(_)
            | Self::UnknownEmergency(_)
            | Self::InvalidArgument(_) => json!({
                "success": false,
                "message": self.to_string(),
                "timestamp": Local::now().to_rfc3339(),
            }),
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
