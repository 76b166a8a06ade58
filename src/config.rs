//! Runtime configuration for the backend.
//!
//! Values are assembled by the CLI in `main.rs` (flags with environment fallbacks) and
//! validated once at startup.

use crate::error::AppError;
use crate::traffic::types::TrafficProfiles;
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8081";
pub const DEFAULT_MARKET_API_URL: &str = "https://openapi.koreainvestment.com:9443";
pub const DEFAULT_MARKET_TIMEOUT_MS: u64 = 3_000;
pub const DEFAULT_JOIN_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_MARKET_OPEN_HOUR: u32 = 9;
pub const DEFAULT_MARKET_CLOSE_HOUR: u32 = 15;
pub const DEFAULT_MARKET_UTC_OFFSET_HOURS: i32 = 9;
const MAX_UTC_OFFSET_HOURS: i32 = 14;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub listen_addr: SocketAddr,
    pub traffic: TrafficConfig,
    pub market_api: MarketApiConfig,
    pub market_hours: MarketHours,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8081)),
            traffic: TrafficConfig::default(),
            market_api: MarketApiConfig::default(),
            market_hours: MarketHours::default(),
        }
    }
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        self.traffic.validate()?;
        self.market_api.validate()?;
        self.market_hours.validate()
    }
}

#[derive(Debug, Clone)]
pub struct TrafficConfig {
    pub simulation_enabled: bool,
    pub auto_mode: bool,
    pub baseline_enabled: bool,
    pub join_timeout: Duration,
    pub profiles: TrafficProfiles,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            simulation_enabled: true,
            auto_mode: false,
            baseline_enabled: true,
            join_timeout: Duration::from_millis(DEFAULT_JOIN_TIMEOUT_MS),
            profiles: TrafficProfiles::default(),
        }
    }
}

impl TrafficConfig {
    fn validate(&self) -> Result<(), AppError> {
        if self.join_timeout.is_zero() {
            return Err(AppError::InvalidArgument(
                "join timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MarketApiConfig {
    pub base_url: String,
    pub app_key: Option<String>,
    pub app_secret: Option<String>,
    pub request_timeout: Duration,
}

impl Default for MarketApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_MARKET_API_URL.to_string(),
            app_key: None,
            app_secret: None,
            request_timeout: Duration::from_millis(DEFAULT_MARKET_TIMEOUT_MS),
        }
    }
}

impl MarketApiConfig {
    /// Key and secret, when both are configured and non-blank.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let key = self.app_key.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
        let secret = self
            .app_secret
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())?;
        Some((key, secret))
    }

    fn validate(&self) -> Result<(), AppError> {
        let base_url = self.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(AppError::InvalidArgument(
                "market API base URL must start with http:// or https://".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(AppError::InvalidArgument(
                "market API timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketHours {
    pub open_hour: u32,
    pub close_hour: u32,
    pub utc_offset_hours: i32,
}

impl Default for MarketHours {
    fn default() -> Self {
        Self {
            open_hour: DEFAULT_MARKET_OPEN_HOUR,
            close_hour: DEFAULT_MARKET_CLOSE_HOUR,
            utc_offset_hours: DEFAULT_MARKET_UTC_OFFSET_HOURS,
        }
    }
}

impl MarketHours {
    fn validate(&self) -> Result<(), AppError> {
        if self.open_hour > 24 || self.close_hour > 24 {
            return Err(AppError::InvalidArgument(
                "market hours must be between 0 and 24".to_string(),
            ));
        }
        if self.open_hour >= self.close_hour {
            return Err(AppError::InvalidArgument(format!(
                "market open hour {} must be before close hour {}",
                self.open_hour, self.close_hour
            )));
        }
        if self.utc_offset_hours.abs() > MAX_UTC_OFFSET_HOURS {
            return Err(AppError::InvalidArgument(format!(
                "market UTC offset must be within +/-{MAX_UTC_OFFSET_HOURS} hours"
            )));
        }
        Ok(())
    }
}
