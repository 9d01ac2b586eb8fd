//! Trade direction and closed-trade records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of a simulated trade.
///
/// Stored in the state file as `"buy"` (long) or `"sell"` (short).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "BUY",
            TradeSide::Sell => "SELL",
        }
    }

    /// Signed P&L for `units` moved from `entry` to `price`.
    ///
    /// Long profits when price rises, short profits when price falls.
    pub fn pnl(&self, entry: Decimal, price: Decimal, units: Decimal) -> Decimal {
        match self {
            TradeSide::Buy => (price - entry) * units,
            TradeSide::Sell => (entry - price) * units,
        }
    }
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    CloseAll,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::StopLoss => f.write_str("stop-loss"),
            ExitReason::TakeProfit => f.write_str("take-profit"),
            ExitReason::CloseAll => f.write_str("close-all"),
        }
    }
}

/// Record of a position that has been closed and folded into the balances.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub trade_id: String,
    pub pair: String,
    pub side: TradeSide,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub amount: Decimal,
    pub realized_pnl: Decimal,
    pub reason: ExitReason,
    pub closed_at: DateTime<Utc>,
}

impl ClosedTrade {
    /// Realized P&L as a fraction of the committed amount.
    pub fn return_pct(&self) -> Decimal {
        if self.amount.is_zero() {
            return Decimal::ZERO;
        }
        self.realized_pnl / self.amount
    }

    pub fn is_profitable(&self) -> bool {
        self.realized_pnl >= Decimal::ZERO
    }
}
