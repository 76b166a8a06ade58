use crate::config::MarketApiConfig;
use crate::error::AppError;
use crate::market::types::{
    fallback_base_price, find_listing, ProviderQuote, QuoteResponseWire, TokenRequestWire,
    TokenResponseWire, DEFAULT_EXCHANGE, FALLBACK_JITTER_RATIO,
};
use rand::Rng;
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub(crate) const TOKEN_PATH: &str = "/oauth2/tokenP";
pub(crate) const QUOTE_PATH: &str = "/uapi/overseas-price/v1/quotations/price";
const QUOTE_TR_ID: &str = "HHDFS00000300";
const DEFAULT_TOKEN_TTL_SECS: u64 = 86_400;
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

fn token_endpoint(base_url: &str) -> String {
    format!("{}{TOKEN_PATH}", base_url.trim_end_matches('/'))
}

fn quote_endpoint(base_url: &str, exchange: &str, symbol: &str) -> String {
    format!("{}{QUOTE_PATH}", base_url.trim_end_matches('/'))
        + &format!("?AUTH=&EXCD={exchange}&SYMB={}", symbol.to_ascii_uppercase())
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    refresh_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self, now: Instant) -> bool {
        now < self.refresh_at
    }
}

/// Best-effort quote source.
///
/// Talks to the configured provider when credentials are present and otherwise, or on any
/// provider failure, answers with a jittered fallback price.
pub struct PriceFeed {
    client: Client,
    config: MarketApiConfig,
    token: Mutex<Option<AccessToken>>,
}

impl PriceFeed {
    pub fn new(config: MarketApiConfig) -> Result<Self, AppError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            config,
            token: Mutex::new(None),
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.config.credentials().is_some()
    }

    /// Never fails: provider errors degrade to [`fallback_price`].
    pub async fn get_price(&self, symbol: &str) -> f64 {
        match self.fetch_price(symbol).await {
            Ok(price) => price,
            Err(error) => {
                let price = fallback_price(symbol);
                tracing::debug!(symbol, %error, price, "using fallback price");
                price
            }
        }
    }

    pub async fn fetch_price(&self, symbol: &str) -> Result<f64, AppError> {
        let (app_key, app_secret) = self.config.credentials().ok_or_else(|| {
            AppError::UpstreamUnavailable("market API credentials are not configured".to_string())
        })?;
        let token = self.access_token(app_key, app_secret).await?;
        let exchange = find_listing(symbol)
            .map(|listing| listing.exchange)
            .unwrap_or(DEFAULT_EXCHANGE);

        let endpoint = quote_endpoint(&self.config.base_url, exchange, symbol);
        let response = self
            .client
            .get(endpoint)
            .bearer_auth(&token)
            .header("appkey", app_key)
            .header("appsecret", app_secret)
            .header("tr_id", QUOTE_TR_ID)
            .send()
            .await?
            .error_for_status()?;
        let payload = response.json::<QuoteResponseWire>().await?;
        let quote = ProviderQuote::try_from(payload)?;
        Ok(quote.price)
    }

    async fn access_token(&self, app_key: &str, app_secret: &str) -> Result<String, AppError> {
        // Held across the refresh so concurrent quotes share one token request.
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|token| token.is_fresh(Instant::now())) {
            return Ok(token.value.clone());
        }

        let request = TokenRequestWire {
            grant_type: "client_credentials",
            appkey: app_key,
            appsecret: app_secret,
        };
        let response = self
            .client
            .post(token_endpoint(&self.config.base_url))
            .json(&request)
            .send()
            .await?
            .error_for_status()?;
        let payload = response.json::<TokenResponseWire>().await?;

        let value = payload.access_token.trim().to_string();
        if value.is_empty() {
            return Err(AppError::UpstreamUnavailable(
                "token response carried an empty access token".to_string(),
            ));
        }
        let lifetime = Duration::from_secs(payload.expires_in.unwrap_or(DEFAULT_TOKEN_TTL_SECS));
        *cached = Some(AccessToken {
            value: value.clone(),
            refresh_at: Instant::now() + lifetime.saturating_sub(TOKEN_REFRESH_MARGIN),
        });
        tracing::info!(expires_in_secs = lifetime.as_secs(), "market API token refreshed");

        Ok(value)
    }
}

pub fn fallback_price(symbol: &str) -> f64 {
    let base = fallback_base_price(symbol);
    let jitter = rand::thread_rng().gen_range(-FALLBACK_JITTER_RATIO..=FALLBACK_JITTER_RATIO);
    base * (1.0 + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::types::DEFAULT_FALLBACK_PRICE;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    fn within_jitter(price: f64, base: f64) -> bool {
        price.is_finite()
            && price > 0.0
            && (price - base).abs() <= base * FALLBACK_JITTER_RATIO + 1e-9
    }

    fn config_for(base_url: &str) -> MarketApiConfig {
        MarketApiConfig {
            base_url: base_url.to_string(),
            app_key: Some("app-key".to_string()),
            app_secret: Some("app-secret".to_string()),
            request_timeout: Duration::from_secs(2),
        }
    }

    async fn spawn_provider(last: &'static str, token_requests: Arc<AtomicUsize>) -> String {
        let app = Router::new()
            .route(
                TOKEN_PATH,
                post(move || {
                    let token_requests = Arc::clone(&token_requests);
                    async move {
                        token_requests.fetch_add(1, Ordering::SeqCst);
                        Json(json!({ "access_token": "token-1", "expires_in": 86_400 }))
                    }
                }),
            )
            .route(
                QUOTE_PATH,
                get(move || async move { Json(json!({ "output": { "last": last } })) }),
            );

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("ephemeral port should bind");
        let addr = listener.local_addr().expect("bound address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}")
    }

    #[test]
    fn quote_endpoint_uses_exchange_and_uppercase_symbol() {
        let endpoint = quote_endpoint("https://example.test/", "NAS", "aapl");
        assert!(endpoint.starts_with("https://example.test/uapi/overseas-price/"));
        assert!(endpoint.contains("EXCD=NAS"));
        assert!(endpoint.ends_with("SYMB=AAPL"));
    }

    #[test]
    fn token_endpoint_is_correct() {
        assert_eq!(
            token_endpoint("https://example.test"),
            "https://example.test/oauth2/tokenP"
        );
    }

    #[test]
    fn fallback_price_stays_near_base() {
        for _ in 0..200 {
            assert!(within_jitter(fallback_price("GOOGL"), 2_800.50));
            assert!(within_jitter(fallback_price("UNLISTED"), DEFAULT_FALLBACK_PRICE));
        }
    }

    #[test]
    fn token_freshness_respects_refresh_deadline() {
        let now = Instant::now();
        let token = AccessToken {
            value: "t".to_string(),
            refresh_at: now + Duration::from_secs(5),
        };
        assert!(token.is_fresh(now));
        assert!(!token.is_fresh(now + Duration::from_secs(6)));
    }

    #[tokio::test]
    async fn falls_back_without_credentials() {
        let feed = PriceFeed::new(MarketApiConfig::default()).expect("client should build");
        assert!(!feed.has_credentials());

        let price = feed.get_price("AAPL").await;
        assert!(within_jitter(price, 150.25));
    }

    #[tokio::test]
    async fn falls_back_when_upstream_is_unreachable() {
        // nothing listens on the discard port
        let feed = PriceFeed::new(config_for("http://127.0.0.1:9")).expect("client should build");

        assert!(feed.fetch_price("MSFT").await.is_err());
        let price = feed.get_price("MSFT").await;
        assert!(within_jitter(price, 350.75));
    }

    #[tokio::test]
    async fn reads_provider_quote_and_reuses_token() {
        let token_requests = Arc::new(AtomicUsize::new(0));
        let base_url = spawn_provider("187.42", Arc::clone(&token_requests)).await;
        let feed = PriceFeed::new(config_for(&base_url)).expect("client should build");

        assert_eq!(feed.get_price("AAPL").await, 187.42);
        assert_eq!(feed.get_price("TSLA").await, 187.42);
        assert_eq!(token_requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn falls_back_on_malformed_provider_quote() {
        let base_url = spawn_provider("n/a", Arc::new(AtomicUsize::new(0))).await;
        let feed = PriceFeed::new(config_for(&base_url)).expect("client should build");

        let price = feed.get_price("TSLA").await;
        assert!(within_jitter(price, 800.0));
    }
}
