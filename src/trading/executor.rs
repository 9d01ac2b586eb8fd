//! Execution simulator: closes positions whose stop-loss or take-profit
//! has been reached at the latest known price.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::strategy::evaluate_exits;
use super::{log_closed_trade, PeriodicTask, TradingConfig};
use crate::models::{ClosedTrade, ExitReason};
use crate::store::StateStore;

/// Periodic stop-loss/take-profit checker.
pub struct ExecutionSimulator {
    pair: String,
    interval: Duration,
    store: Arc<StateStore>,
}

impl ExecutionSimulator {
    pub fn new(config: &TradingConfig, store: Arc<StateStore>) -> Self {
        Self {
            pair: config.pair.clone(),
            interval: config.execution_interval(),
            store,
        }
    }

    /// Close every triggered position, stamping the cooldown with `now`.
    ///
    /// All closes of one pass are applied in a single mutation. Triggers are
    /// re-checked inside it so a position already closed elsewhere, or a
    /// price that moved since the snapshot, is handled against live state.
    pub async fn check_triggers_at(&self, now: DateTime<Utc>) -> Result<Vec<ClosedTrade>> {
        let snapshot = self.store.snapshot().await?;
        let Some(price) = snapshot.price(&self.pair) else {
            debug!(pair = %self.pair, "No price yet, skipping trigger check");
            return Ok(Vec::new());
        };

        if evaluate_exits(&snapshot.ongoing_trades, &self.pair, price).is_empty() {
            return Ok(Vec::new());
        }

        let pair = self.pair.as_str();
        let closed = self
            .store
            .mutate(|state| {
                let Some(price) = state.price(pair) else {
                    return Vec::new();
                };

                let triggered: Vec<(String, ExitReason)> =
                    evaluate_exits(&state.ongoing_trades, pair, price)
                        .into_iter()
                        .map(|(p, reason)| (p.trade_id.clone(), reason))
                        .collect();

                triggered
                    .into_iter()
                    .filter_map(|(id, reason)| state.close_position(&id, price, reason, now))
                    .collect::<Vec<_>>()
            })
            .await?;

        for trade in &closed {
            match trade.reason {
                ExitReason::StopLoss => warn!(trade_id = %trade.trade_id, "Stop-loss triggered"),
                _ => debug!(trade_id = %trade.trade_id, reason = %trade.reason, "Exit triggered"),
            }
            log_closed_trade(trade);
        }

        Ok(closed)
    }
}

#[async_trait]
impl PeriodicTask for ExecutionSimulator {
    fn name(&self) -> &'static str {
        "execution-simulator"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn tick(&self) -> Result<()> {
        self.check_triggers_at(Utc::now()).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Position, TradeSide, TradeState};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    const PAIR: &str = "BTC/USD";

    fn position(side: TradeSide, amount: Decimal, stop_loss: Decimal, take_profit: Decimal) -> Position {
        Position::new(PAIR.to_string(), side, dec!(100), amount, stop_loss, take_profit)
    }

    fn store_with(positions: Vec<Position>, price: Option<Decimal>) -> Arc<StateStore> {
        let mut state = TradeState::new(dec!(10000));
        for p in positions {
            state.open_position(p).unwrap();
        }
        if let Some(price) = price {
            state.current_prices.insert(PAIR.to_string(), price);
        }
        Arc::new(StateStore::in_memory(state))
    }

    fn simulator(store: Arc<StateStore>) -> ExecutionSimulator {
        ExecutionSimulator::new(&TradingConfig::default(), store)
    }

    #[tokio::test]
    async fn test_stop_loss_closes_and_realizes() {
        let store = store_with(
            vec![position(TradeSide::Buy, dec!(1000), dec!(95), dec!(105))],
            Some(dec!(95)),
        );
        let now = Utc::now();

        let closed = simulator(store.clone()).check_triggers_at(now).await.unwrap();

        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].reason, ExitReason::StopLoss);
        assert_eq!(closed[0].realized_pnl, dec!(-50));

        let state = store.snapshot().await.unwrap();
        assert!(state.ongoing_trades.is_empty());
        assert_eq!(state.portfolio.opening_balance, dec!(9950));
        assert_eq!(state.portfolio.current_balance, dec!(9950));
        // 9000 after open, + 1000 - 50 on close
        assert_eq!(state.portfolio.available_balance, dec!(9950));
        assert_eq!(state.last_close_at, Some(now));
    }

    #[tokio::test]
    async fn test_batch_close_counts_each_position_once() {
        let store = store_with(
            vec![
                position(TradeSide::Buy, dec!(1000), dec!(90), dec!(110)),
                position(TradeSide::Sell, dec!(500), dec!(130), dec!(110)),
                position(TradeSide::Buy, dec!(200), dec!(80), dec!(150)),
            ],
            Some(dec!(110)),
        );

        let closed = simulator(store.clone()).check_triggers_at(Utc::now()).await.unwrap();

        // long hits TP with +100; short hits TP (price <= 110) with -50
        assert_eq!(closed.len(), 2);
        assert!(closed.iter().all(|c| c.reason == ExitReason::TakeProfit));
        let realized: Decimal = closed.iter().map(|c| c.realized_pnl).sum();
        assert_eq!(realized, dec!(50));

        let state = store.snapshot().await.unwrap();
        assert_eq!(state.ongoing_trades.len(), 1);
        assert_eq!(state.portfolio.opening_balance, dec!(10050));
        // 10000 - 1700 committed, + (1000 + 100) + (500 - 50)
        assert_eq!(state.portfolio.available_balance, dec!(9850));
        assert_eq!(
            state.portfolio.available_balance,
            state.portfolio.opening_balance - state.committed()
        );
    }

    #[tokio::test]
    async fn test_untriggered_positions_stay_open() {
        let store = store_with(
            vec![position(TradeSide::Buy, dec!(1000), dec!(95), dec!(105))],
            Some(dec!(100)),
        );
        let before = store.snapshot().await.unwrap();

        let closed = simulator(store.clone()).check_triggers_at(Utc::now()).await.unwrap();

        assert!(closed.is_empty());
        assert_eq!(store.snapshot().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_no_price_is_a_noop() {
        let store = store_with(
            vec![position(TradeSide::Buy, dec!(1000), dec!(95), dec!(105))],
            None,
        );

        let closed = simulator(store.clone()).check_triggers_at(Utc::now()).await.unwrap();
        assert!(closed.is_empty());
        assert_eq!(store.snapshot().await.unwrap().ongoing_trades.len(), 1);
    }
}
