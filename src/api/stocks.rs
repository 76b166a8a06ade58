use crate::api::now_timestamp;
use crate::error::AppError;
use crate::market::types::{find_listing, MarketStatus, StockListing, StockQuote, STOCK_LISTINGS};
use crate::state::AppState;
use crate::traffic::TrafficLevel;
use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct StockDataResponse {
    pub stocks: Vec<StockQuote>,
    pub timestamp: String,
    pub market_status: MarketStatus,
    pub traffic_level: TrafficLevel,
    pub traffic_simulation: bool,
}

#[derive(Debug, Serialize)]
pub struct StockPriceResponse {
    #[serde(flatten)]
    pub quote: StockQuote,
    pub timestamp: String,
    pub market_status: MarketStatus,
    pub traffic_level: TrafficLevel,
    pub traffic_simulation: bool,
}

/// Prices one listing, records the move and lets it steer the traffic level.
async fn quote_listing(state: &AppState, listing: &StockListing) -> StockQuote {
    let price = state.price_feed.get_price(listing.symbol).await;
    let change = state.price_tracker.observe(listing.symbol, price);
    state
        .traffic
        .auto_adjust(listing.symbol, change.change_percent)
        .await;
    StockQuote::new(listing, price, change.change, change.change_percent)
}

pub async fn stock_data(State(state): State<AppState>) -> Json<StockDataResponse> {
    let stocks = join_all(
        STOCK_LISTINGS
            .iter()
            .map(|listing| quote_listing(&state, listing)),
    )
    .await;
    let simulation = state.traffic.get_state();

    Json(StockDataResponse {
        stocks,
        timestamp: now_timestamp(),
        market_status: MarketStatus::at(&state.market_hours, &Utc::now()),
        traffic_level: simulation.level,
        traffic_simulation: simulation.active,
    })
}

pub async fn stock_price(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<StockPriceResponse>, AppError> {
    let listing = find_listing(&symbol).ok_or(AppError::UnknownSymbol(symbol))?;
    let quote = quote_listing(&state, listing).await;
    let simulation = state.traffic.get_state();

    Ok(Json(StockPriceResponse {
        quote,
        timestamp: now_timestamp(),
        market_status: MarketStatus::at(&state.market_hours, &Utc::now()),
        traffic_level: simulation.level,
        traffic_simulation: simulation.active,
    }))
}
