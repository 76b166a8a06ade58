use crate::config::MarketHours;
use crate::error::AppError;
use chrono::{DateTime, FixedOffset, Offset, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_EXCHANGE: &str = "NAS";
pub const DEFAULT_FALLBACK_PRICE: f64 = 100.0;
pub const FALLBACK_JITTER_RATIO: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StockListing {
    pub symbol: &'static str,
    pub name: &'static str,
    pub exchange: &'static str,
    pub base_price: f64,
}

pub const STOCK_LISTINGS: [StockListing; 4] = [
    StockListing {
        symbol: "AAPL",
        name: "Apple Inc.",
        exchange: DEFAULT_EXCHANGE,
        base_price: 150.25,
    },
    StockListing {
        symbol: "GOOGL",
        name: "Alphabet Inc.",
        exchange: DEFAULT_EXCHANGE,
        base_price: 2_800.50,
    },
    StockListing {
        symbol: "MSFT",
        name: "Microsoft Corporation",
        exchange: DEFAULT_EXCHANGE,
        base_price: 350.75,
    },
    StockListing {
        symbol: "TSLA",
        name: "Tesla, Inc.",
        exchange: DEFAULT_EXCHANGE,
        base_price: 800.00,
    },
];

pub fn find_listing(symbol: &str) -> Option<&'static StockListing> {
    let symbol = symbol.trim();
    STOCK_LISTINGS
        .iter()
        .find(|listing| listing.symbol.eq_ignore_ascii_case(symbol))
}

/// Price used when the provider cannot answer. Plain table lookup with a fixed default.
pub fn fallback_base_price(symbol: &str) -> f64 {
    find_listing(symbol)
        .map(|listing| listing.base_price)
        .unwrap_or(DEFAULT_FALLBACK_PRICE)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockQuote {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
}

impl StockQuote {
    pub fn new(listing: &StockListing, price: f64, change: f64, change_percent: f64) -> Self {
        Self {
            symbol: listing.symbol.to_string(),
            name: listing.name.to_string(),
            price: round_cents(price),
            change: round_cents(change),
            change_percent: round_cents(change_percent),
        }
    }
}

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    Open,
    Closed,
}

impl MarketStatus {
    pub fn at<Tz: TimeZone>(hours: &MarketHours, now: &DateTime<Tz>) -> Self {
        let offset = FixedOffset::east_opt(hours.utc_offset_hours * 3_600)
            .unwrap_or_else(|| Utc.fix());
        let local_hour = now.with_timezone(&offset).hour();
        if (hours.open_hour..hours.close_hour).contains(&local_hour) {
            Self::Open
        } else {
            Self::Closed
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenRequestWire<'a> {
    pub grant_type: &'a str,
    pub appkey: &'a str,
    pub appsecret: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponseWire {
    pub access_token: String,
    pub expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct QuoteResponseWire {
    pub output: Option<QuoteOutputWire>,
}

#[derive(Debug, Deserialize)]
pub struct QuoteOutputWire {
    pub last: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProviderQuote {
    pub price: f64,
}

impl TryFrom<QuoteResponseWire> for ProviderQuote {
    type Error = AppError;

    fn try_from(value: QuoteResponseWire) -> Result<Self, Self::Error> {
        let raw = value
            .output
            .and_then(|output| output.last)
            .map(|last| last.trim().to_string())
            .filter(|last| !last.is_empty())
            .ok_or_else(|| {
                AppError::UpstreamUnavailable("quote payload has no last price".to_string())
            })?;

        let price = raw.parse::<f64>().map_err(|error| {
            AppError::UpstreamUnavailable(format!("quote price '{raw}' is not a number: {error}"))
        })?;
        if !price.is_finite() || price <= 0.0 {
            return Err(AppError::UpstreamUnavailable(format!(
                "quote price must be finite and positive, got {price}"
            )));
        }

        Ok(Self { price })
    }
}
