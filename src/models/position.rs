//! Open position in the simulated account.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::TradeSide;

/// Decimal places kept for stored P&L and exit levels. The state file holds
/// plain JSON numbers, which carry about 15 significant digits.
pub const STORED_SCALE: u32 = 8;

/// Open (ongoing) simulated trade.
///
/// Stop-loss and take-profit are fixed when the position is opened and
/// never recomputed. Only `profit_loss` changes while the position lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Unique identifier, `trade_<uuid>`
    pub trade_id: String,

    /// Instrument pair (e.g., "BTC/USD")
    pub pair: String,

    /// Long ("buy") or short ("sell")
    #[serde(rename = "type")]
    pub side: TradeSide,

    /// Price at which the position was opened
    pub entry_price: Decimal,

    /// Capital committed at open, in quote currency
    pub amount: Decimal,

    pub stop_loss: Decimal,

    pub take_profit: Decimal,

    /// Mark-to-market P&L at the last valuation
    #[serde(default)]
    pub profit_loss: Decimal,

    /// When the position was opened
    pub timestamp: DateTime<Utc>,
}

impl Position {
    /// Create a new position with a fresh identifier.
    pub fn new(
        pair: String,
        side: TradeSide,
        entry_price: Decimal,
        amount: Decimal,
        stop_loss: Decimal,
        take_profit: Decimal,
    ) -> Self {
        Self {
            trade_id: format!("trade_{}", uuid::Uuid::new_v4()),
            pair,
            side,
            entry_price,
            amount,
            stop_loss,
            take_profit,
            profit_loss: Decimal::ZERO,
            timestamp: Utc::now(),
        }
    }

    /// Number of units held: `amount / entry_price`.
    pub fn units(&self) -> Decimal {
        if self.entry_price.is_zero() {
            return Decimal::ZERO;
        }
        self.amount / self.entry_price
    }

    /// P&L if the position were closed at `price`, rounded to `STORED_SCALE`.
    pub fn pnl_at(&self, price: Decimal) -> Decimal {
        self.side
            .pnl(self.entry_price, price, self.units())
            .round_dp(STORED_SCALE)
    }

    /// Revalue the position at `price`, returning the new P&L.
    pub fn update_price(&mut self, price: Decimal) -> Decimal {
        self.profit_loss = self.pnl_at(price);
        self.profit_loss
    }

    /// Last known P&L as a fraction of the committed amount.
    pub fn pnl_pct(&self) -> Decimal {
        if self.amount.is_zero() {
            return Decimal::ZERO;
        }
        self.profit_loss / self.amount
    }
}
