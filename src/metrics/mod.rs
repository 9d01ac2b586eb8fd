//! Market statistics: average true range and trend summaries.

mod calculator;

pub use calculator::{average_true_range, Candle, PriceTrend};
