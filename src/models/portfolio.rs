//! Account balances and the shared trading-state document.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{ClosedTrade, ExitReason, Position};

/// Account balances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    /// Realized capital baseline
    pub opening_balance: Decimal,

    /// `opening_balance` plus unrealized P&L of open positions
    pub current_balance: Decimal,

    /// Capital not committed to open positions
    pub available_balance: Decimal,
}

impl Portfolio {
    pub fn new(balance: Decimal) -> Self {
        Self {
            opening_balance: balance,
            current_balance: balance,
            available_balance: balance,
        }
    }

    /// Fold a realized close into the balances.
    fn realize(&mut self, amount: Decimal, pnl: Decimal) {
        self.opening_balance += pnl;
        self.current_balance = self.opening_balance;
        self.available_balance += amount + pnl;
    }
}

/// A trade needs more capital than is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsufficientFunds {
    pub required: Decimal,
    pub available: Decimal,
}

impl std::fmt::Display for InsufficientFunds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "insufficient funds: required ${:.2}, available ${:.2}",
            self.required, self.available
        )
    }
}

impl std::error::Error for InsufficientFunds {}

/// The whole persisted trading state.
///
/// Every change goes through `StateStore::mutate`, so each method here is
/// applied atomically with respect to the other background tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeState {
    /// Latest known price per pair
    #[serde(default)]
    pub current_prices: HashMap<String, Decimal>,

    pub portfolio: Portfolio,

    /// Open positions in opening order
    #[serde(default)]
    pub ongoing_trades: Vec<Position>,

    /// When a position was last closed (cooldown anchor)
    #[serde(default)]
    pub last_close_at: Option<DateTime<Utc>>,
}

impl TradeState {
    /// Fresh state with all balances set to `balance`.
    pub fn new(balance: Decimal) -> Self {
        Self {
            current_prices: HashMap::new(),
            portfolio: Portfolio::new(balance),
            ongoing_trades: Vec::new(),
            last_close_at: None,
        }
    }

    /// Latest valid (positive) price for `pair`.
    pub fn price(&self, pair: &str) -> Option<Decimal> {
        self.current_prices
            .get(pair)
            .copied()
            .filter(|p| *p > Decimal::ZERO)
    }

    /// Sum of the last known P&L of all open positions.
    pub fn unrealized_pnl(&self) -> Decimal {
        self.ongoing_trades.iter().map(|t| t.profit_loss).sum()
    }

    /// Capital committed to open positions.
    pub fn committed(&self) -> Decimal {
        self.ongoing_trades.iter().map(|t| t.amount).sum()
    }

    /// Record a new price and mark every position on `pair` to it.
    ///
    /// Returns the total unrealized P&L after revaluation.
    pub fn revalue(&mut self, pair: &str, price: Decimal) -> Decimal {
        self.current_prices.insert(pair.to_string(), price);

        for trade in self.ongoing_trades.iter_mut().filter(|t| t.pair == pair) {
            trade.update_price(price);
        }

        let total = self.unrealized_pnl();
        self.portfolio.current_balance = self.portfolio.opening_balance + total;
        total
    }

    /// Add a position, debiting its amount from the available balance.
    pub fn open_position(&mut self, position: Position) -> Result<(), InsufficientFunds> {
        let available = self.portfolio.available_balance;
        if position.amount > available || available < Decimal::ZERO {
            return Err(InsufficientFunds {
                required: position.amount,
                available,
            });
        }

        self.portfolio.available_balance -= position.amount;
        self.ongoing_trades.push(position);
        Ok(())
    }

    /// Remove a position and realize its P&L at `price`.
    ///
    /// Returns `None` if no open position has this id.
    pub fn close_position(
        &mut self,
        trade_id: &str,
        price: Decimal,
        reason: ExitReason,
        now: DateTime<Utc>,
    ) -> Option<ClosedTrade> {
        let index = self
            .ongoing_trades
            .iter()
            .position(|t| t.trade_id == trade_id)?;
        let trade = self.ongoing_trades.remove(index);

        let realized_pnl = trade.pnl_at(price);
        self.portfolio.realize(trade.amount, realized_pnl);
        self.last_close_at = Some(now);

        Some(ClosedTrade {
            trade_id: trade.trade_id,
            pair: trade.pair,
            side: trade.side,
            entry_price: trade.entry_price,
            exit_price: price,
            amount: trade.amount,
            realized_pnl,
            reason,
            closed_at: now,
        })
    }
}
