//! CoinGecko-style market data client for prices and price history.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::types::{MarketChartResponse, SimplePriceResponse};
use super::{PriceOracle, RetryPolicy, VolatilityOracle};
use crate::metrics::{average_true_range, Candle};

const COINGECKO_API_BASE: &str = "https://api.coingecko.com/api/v3";
const API_KEY_HEADER: &str = "x-cg-demo-api-key";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const QUOTE_CURRENCY: &str = "usd";

/// Client for price quotes and market-chart history.
pub struct MarketDataClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    /// Pair (e.g., "BTC/USD") to coin id (e.g., "bitcoin")
    coin_ids: HashMap<String, String>,
    retry: RetryPolicy,
}

impl MarketDataClient {
    /// Create a new client against the public API.
    pub fn new(api_key: Option<String>, retry: RetryPolicy) -> Result<Self> {
        Self::with_base_url(COINGECKO_API_BASE.to_string(), api_key, retry)
    }

    /// Create with custom base URL (for testing).
    pub fn with_base_url(
        base_url: String,
        api_key: Option<String>,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url,
            api_key,
            coin_ids: HashMap::new(),
            retry,
        })
    }

    /// Register the coin id used to quote `pair`.
    pub fn with_pair(mut self, pair: impl Into<String>, coin_id: impl Into<String>) -> Self {
        self.coin_ids.insert(pair.into(), coin_id.into());
        self
    }

    fn coin_id(&self, pair: &str) -> Result<&str> {
        self.coin_ids
            .get(pair)
            .map(String::as_str)
            .with_context(|| format!("No coin id configured for pair {}", pair))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str, what: &str) -> Result<T> {
        debug!(url = %url, "Fetching {}", what);

        let mut request = self.client.get(url);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", what))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("{} request failed: {} - {}", what, status, body);
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", what))
    }

    /// Fetch the current price once, without retrying.
    pub async fn fetch_price(&self, coin_id: &str) -> Result<Decimal> {
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies={}",
            self.base_url, coin_id, QUOTE_CURRENCY
        );
        let body: SimplePriceResponse = self.get_json(&url, "price").await?;

        let price = body
            .get(coin_id)
            .and_then(|quotes| quotes.get(QUOTE_CURRENCY))
            .copied()
            .with_context(|| format!("Price response missing {}/{}", coin_id, QUOTE_CURRENCY))?;

        if price <= Decimal::ZERO {
            anyhow::bail!("Non-positive price {} for {}", price, coin_id);
        }
        Ok(price)
    }

    /// Fetch the market-chart price series once, without retrying.
    pub async fn fetch_market_chart(&self, coin_id: &str, days: u32) -> Result<Vec<Decimal>> {
        let url = format!(
            "{}/coins/{}/market_chart?vs_currency={}&days={}",
            self.base_url, coin_id, QUOTE_CURRENCY, days
        );
        let body: MarketChartResponse = self.get_json(&url, "market chart").await?;

        Ok(body.prices.into_iter().map(|(_, price)| price).collect())
    }
}

#[async_trait]
impl PriceOracle for MarketDataClient {
    async fn current_price(&self, pair: &str) -> Result<Decimal> {
        let coin_id = self.coin_id(pair)?;
        self.retry
            .run("current price", move || self.fetch_price(coin_id))
            .await
    }

    async fn historical_prices(&self, pair: &str, days: u32) -> Result<Vec<Decimal>> {
        let coin_id = self.coin_id(pair)?;
        self.retry
            .run("price history", move || self.fetch_market_chart(coin_id, days))
            .await
    }
}

#[async_trait]
impl VolatilityOracle for MarketDataClient {
    async fn average_true_range(&self, pair: &str, days: u32) -> Option<Decimal> {
        let prices = match self.historical_prices(pair, days).await {
            Ok(prices) => prices,
            Err(e) => {
                warn!(pair = pair, error = %e, "Could not fetch history for ATR");
                return None;
            }
        };

        // Only last-trade prices are available: high = low = close
        let candles: Vec<Candle> = prices.into_iter().map(Candle::from_price).collect();
        let atr = average_true_range(&candles);

        if atr.is_none() {
            warn!(pair = pair, points = candles.len(), "Not enough history for ATR");
        }
        atr
    }
}
