use crate::config::{MarketHours, ServiceConfig};
use crate::error::AppError;
use crate::market::{PriceChangeTracker, PriceFeed};
use crate::telemetry::MetricsSink;
use crate::traffic::TrafficController;
use std::sync::Arc;
use std::time::Instant;

pub const SERVICE_NAME: &str = "backend";

#[derive(Clone)]
pub struct AppState {
    pub started_at: Instant,
    pub hostname: Arc<str>,
    pub market_hours: MarketHours,
    pub traffic: Arc<TrafficController>,
    pub price_feed: Arc<PriceFeed>,
    pub price_tracker: Arc<PriceChangeTracker>,
    pub metrics: Arc<MetricsSink>,
}

impl AppState {
    pub fn new(config: &ServiceConfig) -> Result<Self, AppError> {
        Ok(Self {
            started_at: Instant::now(),
            hostname: resolve_hostname().into(),
            market_hours: config.market_hours,
            traffic: Arc::new(TrafficController::new(&config.traffic)),
            price_feed: Arc::new(PriceFeed::new(config.market_api.clone())?),
            price_tracker: Arc::new(PriceChangeTracker::new()),
            metrics: Arc::new(MetricsSink::new()?),
        })
    }
}

fn resolve_hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/proc/sys/kernel/hostname").ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
