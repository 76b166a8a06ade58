use clap::{ArgAction, Parser};
use std::net::SocketAddr;
use std::time::Duration;
use stock_monitor_backend::config::{
    MarketApiConfig, MarketHours, ServiceConfig, TrafficConfig, DEFAULT_JOIN_TIMEOUT_MS,
    DEFAULT_LISTEN_ADDR, DEFAULT_MARKET_API_URL, DEFAULT_MARKET_CLOSE_HOUR,
    DEFAULT_MARKET_OPEN_HOUR, DEFAULT_MARKET_TIMEOUT_MS, DEFAULT_MARKET_UTC_OFFSET_HOURS,
};
use stock_monitor_backend::error::AppError;
use stock_monitor_backend::traffic::types::TrafficProfiles;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Stock monitoring backend with CPU traffic simulation
#[derive(Parser)]
#[command(name = "stock-monitor-backend")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Listen address
    #[arg(long, env = "LISTEN_ADDR", default_value = DEFAULT_LISTEN_ADDR)]
    listen: SocketAddr,

    /// Allow traffic simulation requests
    #[arg(long, env = "TRAFFIC_SIMULATION_ENABLED", default_value_t = true, action = ArgAction::Set)]
    simulation_enabled: bool,

    /// Let large price moves adjust the traffic level
    #[arg(long, env = "TRAFFIC_AUTO_MODE", default_value_t = false, action = ArgAction::Set)]
    auto_mode: bool,

    /// Run the always-on baseline load worker
    #[arg(long, env = "TRAFFIC_BASELINE_ENABLED", default_value_t = true, action = ArgAction::Set)]
    baseline_enabled: bool,

    /// How long to wait for a load worker to exit, in milliseconds
    #[arg(long, env = "TRAFFIC_JOIN_TIMEOUT_MS", default_value_t = DEFAULT_JOIN_TIMEOUT_MS)]
    join_timeout_ms: u64,

    /// Market data provider base URL
    #[arg(long, env = "MARKET_API_BASE_URL", default_value = DEFAULT_MARKET_API_URL)]
    market_api_url: String,

    #[arg(long, env = "MARKET_APP_KEY", hide_env_values = true)]
    market_app_key: Option<String>,

    #[arg(long, env = "MARKET_APP_SECRET", hide_env_values = true)]
    market_app_secret: Option<String>,

    /// Provider request timeout, in milliseconds
    #[arg(long, env = "MARKET_API_TIMEOUT_MS", default_value_t = DEFAULT_MARKET_TIMEOUT_MS)]
    market_timeout_ms: u64,

    #[arg(long, env = "MARKET_OPEN_HOUR", default_value_t = DEFAULT_MARKET_OPEN_HOUR)]
    market_open_hour: u32,

    #[arg(long, env = "MARKET_CLOSE_HOUR", default_value_t = DEFAULT_MARKET_CLOSE_HOUR)]
    market_close_hour: u32,

    /// Market-local UTC offset, in hours
    #[arg(
        long = "market-utc-offset",
        env = "MARKET_UTC_OFFSET_HOURS",
        default_value_t = DEFAULT_MARKET_UTC_OFFSET_HOURS,
        allow_negative_numbers = true
    )]
    market_utc_offset_hours: i32,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "LOG_JSON", default_value_t = false, action = ArgAction::Set)]
    log_json: bool,
}

impl Cli {
    fn into_config(self) -> ServiceConfig {
        ServiceConfig {
            listen_addr: self.listen,
            traffic: TrafficConfig {
                simulation_enabled: self.simulation_enabled,
                auto_mode: self.auto_mode,
                baseline_enabled: self.baseline_enabled,
                join_timeout: Duration::from_millis(self.join_timeout_ms),
                profiles: TrafficProfiles::default(),
            },
            market_api: MarketApiConfig {
                base_url: self.market_api_url,
                app_key: self.market_app_key,
                app_secret: self.market_app_secret,
                request_timeout: Duration::from_millis(self.market_timeout_ms),
            },
            market_hours: MarketHours {
                open_hour: self.market_open_hour,
                close_hour: self.market_close_hour,
                utc_offset_hours: self.market_utc_offset_hours,
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());

    if cli.log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let config = cli.into_config();
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        simulation_enabled = config.traffic.simulation_enabled,
        auto_mode = config.traffic.auto_mode,
        baseline_enabled = config.traffic.baseline_enabled,
        "starting stock monitor backend"
    );

    stock_monitor_backend::run(config).await
}
