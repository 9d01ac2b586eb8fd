//! Trading cycle: gate checks, sizing, advisory decision, and opening or
//! closing positions.
//!
//! Cycle steps:
//! 1. Cooldown gate (no oracle calls while active)
//! 2. Capacity gate
//! 3. Price and ATR availability
//! 4. Sizing against the available balance
//! 5. Market summary -> advisory decision
//! 6. BUY/SELL opens, CLOSE_ALL closes everything, SKIP does nothing

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use super::summary::build_summary;
use super::{log_closed_trade, PeriodicTask, PositionSizer, TradingConfig};
use crate::api::{DecisionOracle, PriceOracle, VolatilityOracle};
use crate::metrics::PriceTrend;
use crate::models::{ClosedTrade, Decision, ExitReason, InsufficientFunds, Position, TradeSide};
use crate::store::StateStore;

/// How a trading cycle ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// A position closed too recently
    CooldownActive { remaining: chrono::Duration },
    /// Open positions already at the configured maximum
    AtCapacity { open: usize },
    /// No valid current price in the state
    NoPrice,
    /// Volatility estimate unavailable
    NoVolatility,
    /// Candidate trade could not be funded
    InsufficientFunds(InsufficientFunds),
    /// Advisor chose to skip
    Skipped,
    /// A new position was opened
    Opened(Position),
    /// Every position with a known price was closed
    ClosedAll(Vec<ClosedTrade>),
}

/// Decision-driven trading cycle.
pub struct CycleOrchestrator {
    config: TradingConfig,
    sizer: PositionSizer,
    store: Arc<StateStore>,
    prices: Arc<dyn PriceOracle>,
    volatility: Arc<dyn VolatilityOracle>,
    advisor: Arc<dyn DecisionOracle>,
}

impl CycleOrchestrator {
    pub fn new(
        config: TradingConfig,
        store: Arc<StateStore>,
        prices: Arc<dyn PriceOracle>,
        volatility: Arc<dyn VolatilityOracle>,
        advisor: Arc<dyn DecisionOracle>,
    ) -> Self {
        let sizer = PositionSizer::new(&config);
        Self {
            config,
            sizer,
            store,
            prices,
            volatility,
            advisor,
        }
    }

    /// Run one cycle now.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        self.run_cycle_at(Utc::now()).await
    }

    /// Run one cycle as of `now`.
    pub async fn run_cycle_at(&self, now: DateTime<Utc>) -> Result<CycleOutcome> {
        let state = self.store.snapshot().await?;
        let pair = self.config.pair.as_str();

        if let Some(last_close) = state.last_close_at {
            let elapsed = now - last_close;
            let cooldown = self.config.cooldown();
            if elapsed < cooldown {
                let remaining = cooldown - elapsed;
                info!(
                    remaining_secs = remaining.num_seconds(),
                    "In trade cooldown period. Skipping cycle."
                );
                return Ok(CycleOutcome::CooldownActive { remaining });
            }
        }

        info!("Starting new trading cycle");

        let open = state.ongoing_trades.len();
        if open >= self.config.max_open_trades {
            warn!(open = open, max = self.config.max_open_trades, "Max trades reached. Skipping cycle.");
            return Ok(CycleOutcome::AtCapacity { open });
        }

        let Some(price) = state.price(pair) else {
            error!(pair = pair, "Could not get a valid price, skipping cycle");
            return Ok(CycleOutcome::NoPrice);
        };

        let atr = match self
            .volatility
            .average_true_range(pair, self.config.atr_window_days)
            .await
        {
            Some(atr) if atr > Decimal::ZERO => atr,
            _ => {
                error!(pair = pair, "Could not calculate ATR, skipping cycle");
                return Ok(CycleOutcome::NoVolatility);
            }
        };

        let amount = match self.sizer.size(state.portfolio.available_balance) {
            Ok(amount) => amount,
            Err(e) => {
                warn!(
                    available = %e.available.round_dp(2),
                    required = %e.required.round_dp(2),
                    "Insufficient available balance for trade"
                );
                return Ok(CycleOutcome::InsufficientFunds(e));
            }
        };

        let summary = self.market_summary(price, &state.ongoing_trades).await;
        let decision = self.advisor.decide(&summary).await;
        info!(decision = %decision, price = %price, atr = %atr.round_dp(2), "Advisor decision");

        match decision {
            Decision::Buy => self.open_position(TradeSide::Buy, price, atr, amount).await,
            Decision::Sell => self.open_position(TradeSide::Sell, price, atr, amount).await,
            Decision::Skip => {
                info!("Advisor decided to SKIP this trading cycle");
                Ok(CycleOutcome::Skipped)
            }
            Decision::CloseAll => {
                info!("Advisor decided to CLOSE ALL ongoing trades");
                self.close_all(now).await.map(CycleOutcome::ClosedAll)
            }
        }
    }

    /// Summary text for the advisor. History failures degrade the summary
    /// instead of aborting the cycle.
    async fn market_summary(&self, price: Decimal, positions: &[Position]) -> String {
        let pair = self.config.pair.as_str();
        let days = self.config.trend_window_days;

        let trend = match self.prices.historical_prices(pair, days).await {
            Ok(history) => PriceTrend::from_prices(&history, self.config.high_volatility_pct),
            Err(e) => {
                warn!(pair = pair, error = %e, "Could not fetch price history for summary");
                None
            }
        };

        build_summary(pair, price, trend.as_ref(), days, positions)
    }

    /// Open a position at `price` with ATR-based exit levels.
    async fn open_position(
        &self,
        side: TradeSide,
        price: Decimal,
        atr: Decimal,
        amount: Decimal,
    ) -> Result<CycleOutcome> {
        let levels = self.sizer.levels(price, atr, side);
        let position = Position::new(
            self.config.pair.clone(),
            side,
            price,
            amount,
            levels.stop_loss,
            levels.take_profit,
        );

        let opened = position.clone();
        let (result, available) = self
            .store
            .mutate(move |state| {
                let result = state.open_position(position);
                (result, state.portfolio.available_balance)
            })
            .await?;

        if let Err(e) = result {
            warn!(error = %e, "Balance changed before open, trade dropped");
            return Ok(CycleOutcome::InsufficientFunds(e));
        }

        info!(
            trade_id = %opened.trade_id,
            side = %side,
            pair = %opened.pair,
            price = %price.round_dp(2),
            amount = %amount,
            stop_loss = %opened.stop_loss.round_dp(2),
            take_profit = %opened.take_profit.round_dp(2),
            available = %available.round_dp(2),
            "Opened trade"
        );

        Ok(CycleOutcome::Opened(opened))
    }

    /// Close every position at its pair's current price in one mutation,
    /// then stamp the cooldown.
    async fn close_all(&self, now: DateTime<Utc>) -> Result<Vec<ClosedTrade>> {
        let (closed, unpriced) = self
            .store
            .mutate(|state| {
                let targets: Vec<(String, Option<Decimal>)> = state
                    .ongoing_trades
                    .iter()
                    .map(|t| (t.trade_id.clone(), state.price(&t.pair)))
                    .collect();

                let mut closed = Vec::new();
                let mut unpriced = Vec::new();
                for (id, price) in targets {
                    match price {
                        Some(price) => closed.extend(state.close_position(
                            &id,
                            price,
                            ExitReason::CloseAll,
                            now,
                        )),
                        None => unpriced.push(id),
                    }
                }

                state.last_close_at = Some(now);
                (closed, unpriced)
            })
            .await?;

        for id in &unpriced {
            warn!(trade_id = %id, "No price for trade, left open");
        }
        for trade in &closed {
            log_closed_trade(trade);
        }

        Ok(closed)
    }
}

#[async_trait]
impl PeriodicTask for CycleOrchestrator {
    fn name(&self) -> &'static str {
        "trading-cycle"
    }

    fn interval(&self) -> Duration {
        self.config.cycle_interval()
    }

    fn initial_delay(&self) -> Duration {
        self.config.warmup()
    }

    async fn tick(&self) -> Result<()> {
        let outcome = self.run_cycle().await?;
        debug!(outcome = ?outcome, "Trading cycle finished");
        Ok(())
    }
}
