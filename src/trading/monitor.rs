//! Position monitor: refreshes the price and marks open positions to market.
//!
//! Never opens, closes or resizes positions.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{info, warn};

use super::{PeriodicTask, TradingConfig};
use crate::api::PriceOracle;
use crate::store::StateStore;

/// Result of one valuation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Valuation {
    pub price: Decimal,
    pub unrealized_pnl: Decimal,
    pub current_balance: Decimal,
    pub open_positions: usize,
}

/// Periodic price and P&L updater.
pub struct PositionMonitor {
    pair: String,
    interval: Duration,
    store: Arc<StateStore>,
    prices: Arc<dyn PriceOracle>,
}

impl PositionMonitor {
    pub fn new(config: &TradingConfig, store: Arc<StateStore>, prices: Arc<dyn PriceOracle>) -> Self {
        Self {
            pair: config.pair.clone(),
            interval: config.monitor_interval(),
            store,
            prices,
        }
    }

    /// Fetch the latest price and revalue every open position.
    ///
    /// Returns `None` (and leaves the state untouched) when the price
    /// cannot be fetched.
    pub async fn refresh(&self) -> Result<Option<Valuation>> {
        let price = match self.prices.current_price(&self.pair).await {
            Ok(price) => price,
            Err(e) => {
                warn!(pair = %self.pair, error = %e, "Price fetch failed, skipping P&L update");
                return Ok(None);
            }
        };

        let pair = self.pair.as_str();
        let valuation = self
            .store
            .mutate(|state| {
                let unrealized_pnl = state.revalue(pair, price);
                Valuation {
                    price,
                    unrealized_pnl,
                    current_balance: state.portfolio.current_balance,
                    open_positions: state.ongoing_trades.len(),
                }
            })
            .await?;

        info!(
            pair = %self.pair,
            price = %price,
            positions = valuation.open_positions,
            total_pnl = %valuation.unrealized_pnl.round_dp(2),
            current_balance = %valuation.current_balance.round_dp(2),
            "Live P&L updated"
        );

        Ok(Some(valuation))
    }
}

#[async_trait]
impl PeriodicTask for PositionMonitor {
    fn name(&self) -> &'static str {
        "position-monitor"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn tick(&self) -> Result<()> {
        self.refresh().await.map(|_| ())
    }
}
