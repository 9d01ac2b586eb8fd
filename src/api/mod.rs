//! External collaborators: market data, volatility and trade advice.
//!
//! The trading core only sees the oracle traits below. The HTTP clients
//! retry transient failures themselves, so callers get either a value or
//! a final error (or a safe default) after the retry budget is spent.

mod advisor;
mod market_data;
mod retry;
mod types;

pub use advisor::AdvisorClient;
pub use market_data::MarketDataClient;
pub use retry::RetryPolicy;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::models::Decision;

/// Source of current and historical prices.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Latest price for `pair`.
    async fn current_price(&self, pair: &str) -> Result<Decimal>;

    /// Prices over the last `days`, oldest first.
    async fn historical_prices(&self, pair: &str, days: u32) -> Result<Vec<Decimal>>;
}

/// Source of volatility estimates.
#[async_trait]
pub trait VolatilityOracle: Send + Sync {
    /// Average true range over the last `days`, `None` when unavailable.
    async fn average_true_range(&self, pair: &str, days: u32) -> Option<Decimal>;
}

/// Advisory service choosing the action for a trading cycle.
#[async_trait]
pub trait DecisionOracle: Send + Sync {
    /// Decide on `summary`. Fails closed to `Decision::Skip`.
    async fn decide(&self, summary: &str) -> Decision;
}
