//! Exit rules for open positions.
//!
//! Triggers are evaluated against the latest known price, never against a
//! position's stored P&L, which may be one valuation tick behind.

use rust_decimal::Decimal;

use crate::models::{ExitReason, Position, TradeSide};

/// Check whether `position` should be closed at `price`.
///
/// Stop-loss is checked first, so a price satisfying both levels closes
/// as a stop-loss.
pub fn check_exit(position: &Position, price: Decimal) -> Option<ExitReason> {
    match position.side {
        TradeSide::Buy => {
            if price <= position.stop_loss {
                Some(ExitReason::StopLoss)
            } else if price >= position.take_profit {
                Some(ExitReason::TakeProfit)
            } else {
                None
            }
        }
        TradeSide::Sell => {
            if price >= position.stop_loss {
                Some(ExitReason::StopLoss)
            } else if price <= position.take_profit {
                Some(ExitReason::TakeProfit)
            } else {
                None
            }
        }
    }
}

/// Positions in `positions` that trigger at `price`, in order.
pub fn evaluate_exits<'a>(
    positions: &'a [Position],
    pair: &str,
    price: Decimal,
) -> Vec<(&'a Position, ExitReason)> {
    positions
        .iter()
        .filter(|p| p.pair == pair)
        .filter_map(|p| check_exit(p, price).map(|reason| (p, reason)))
        .collect()
}
