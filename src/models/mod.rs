//! Data models for positions, the portfolio document, and advisory decisions.

mod decision;
mod portfolio;
mod position;
mod trade;

pub use decision::Decision;
pub use portfolio::{InsufficientFunds, TradeState};
pub use position::{Position, STORED_SCALE};
pub use trade::{ClosedTrade, ExitReason, TradeSide};
