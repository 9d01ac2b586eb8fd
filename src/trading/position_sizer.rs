//! Position sizing and ATR-based stop-loss/take-profit levels.

use rust_decimal::Decimal;

use super::TradingConfig;
use crate::models::{InsufficientFunds, TradeSide, STORED_SCALE};

/// Stop-loss and take-profit prices for a new position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitLevels {
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
}

/// Pure calculator for trade amounts and exit levels.
#[derive(Debug, Clone)]
pub struct PositionSizer {
    risk_fraction: Decimal,
    mult_sl: Decimal,
    mult_tp: Decimal,
    min_trade_size: Decimal,
}

impl PositionSizer {
    /// Create a new position sizer with given config.
    pub fn new(config: &TradingConfig) -> Self {
        Self {
            risk_fraction: config.risk_per_trade,
            mult_sl: config.atr_multiplier_sl,
            mult_tp: config.atr_multiplier_tp,
            min_trade_size: config.min_trade_size,
        }
    }

    /// Trade amount for `available_balance`: `available * risk_fraction`,
    /// rounded to cents.
    ///
    /// Fails when the amount exceeds the available balance or falls below
    /// the minimum trade size.
    pub fn size(&self, available_balance: Decimal) -> Result<Decimal, InsufficientFunds> {
        let amount = (available_balance * self.risk_fraction).round_dp(2);

        let insufficient = InsufficientFunds {
            required: amount.max(self.min_trade_size),
            available: available_balance,
        };

        if amount > available_balance || amount <= Decimal::ZERO {
            return Err(insufficient);
        }
        if amount < self.min_trade_size {
            return Err(insufficient);
        }

        Ok(amount)
    }

    /// Exit levels `atr * multiplier` away from `entry_price`.
    ///
    /// Long: stop below, target above. Short: the reverse.
    pub fn levels(&self, entry_price: Decimal, atr: Decimal, side: TradeSide) -> ExitLevels {
        let sl_distance = atr * self.mult_sl;
        let tp_distance = atr * self.mult_tp;

        let (stop_loss, take_profit) = match side {
            TradeSide::Buy => (entry_price - sl_distance, entry_price + tp_distance),
            TradeSide::Sell => (entry_price + sl_distance, entry_price - tp_distance),
        };

        ExitLevels {
            stop_loss: stop_loss.round_dp(STORED_SCALE),
            take_profit: take_profit.round_dp(STORED_SCALE),
        }
    }
}
