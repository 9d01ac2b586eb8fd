//! Trading logic: sizing, exit triggers, and the three periodic tasks that
//! share the state store.

mod config;
mod executor;
mod monitor;
mod orchestrator;
mod position_sizer;
mod strategy;
mod summary;

#[cfg(test)]
pub(crate) mod testing;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::models::ClosedTrade;

pub use config::TradingConfig;
pub use executor::ExecutionSimulator;
pub use monitor::PositionMonitor;
pub use orchestrator::CycleOrchestrator;
pub use position_sizer::PositionSizer;

/// A unit of work run on a fixed schedule by the bot.
#[async_trait]
pub trait PeriodicTask: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Time between ticks
    fn interval(&self) -> Duration;

    /// Delay before the first tick
    fn initial_delay(&self) -> Duration {
        Duration::ZERO
    }

    /// Run one iteration. Errors are logged by the scheduler and the task
    /// keeps its schedule.
    async fn tick(&self) -> Result<()>;
}

/// Log a realized close.
pub(crate) fn log_closed_trade(trade: &ClosedTrade) {
    let outcome = if trade.is_profitable() { "PROFIT" } else { "LOSS" };
    info!(
        trade_id = %trade.trade_id,
        pair = %trade.pair,
        side = %trade.side,
        reason = %trade.reason,
        exit_price = %trade.exit_price.round_dp(2),
        pnl = %trade.realized_pnl.round_dp(2),
        pnl_pct = %(trade.return_pct() * rust_decimal::Decimal::ONE_HUNDRED).round_dp(2),
        "Closed trade with {}",
        outcome
    );
}
