//! Market summary text handed to the advisory service.

use std::fmt::Write;

use rust_decimal::Decimal;

use crate::metrics::PriceTrend;
use crate::models::{Decision, Position};

/// Describe the market and open positions for one trading cycle.
///
/// `trend` is `None` when price history could not be fetched; the summary
/// then carries only the current price.
pub fn build_summary(
    pair: &str,
    current_price: Decimal,
    trend: Option<&PriceTrend>,
    window_days: u32,
    positions: &[Position],
) -> String {
    let options = Decision::ALL
        .iter()
        .map(|d| d.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let Some(trend) = trend else {
        return format!(
            "Current price of {} is ${:.2}. No historical data available.\n\
             {}\n\
             Your options are: {}.",
            pair,
            current_price,
            positions_summary(positions),
            options
        );
    };

    let window = if window_days == 1 {
        "24 hours".to_string()
    } else {
        format!("{} days", window_days)
    };

    let mut out = String::new();
    let _ = writeln!(out, "Here is the summary for {}:", pair);
    let _ = writeln!(out, "- The current price is ${:.2}.", current_price);
    let _ = writeln!(out, "- Over the last {}, the price trend has been {}.", window, trend.trend);
    let _ = writeln!(
        out,
        "- The price has changed by {:.2}% in the last {}, indicating {} volatility.",
        trend.change_pct, window, trend.volatility
    );
    let _ = writeln!(
        out,
        "- Standard deviation of step returns: {:.4}%.",
        trend.return_std_dev_pct
    );
    let _ = writeln!(out, "- {}", positions_summary(positions));
    let _ = write!(
        out,
        "\nBased on this data, what is your scalping decision? Your options are: {}.",
        options
    );
    out
}

/// One line per open position with live P&L.
fn positions_summary(positions: &[Position]) -> String {
    if positions.is_empty() {
        return "No ongoing trades.".to_string();
    }

    let mut out = String::from("Ongoing Trades:\n");
    for p in positions {
        let _ = writeln!(
            out,
            "  - Type: {}, Entry: ${:.2}, P&L: ${:.2} ({:.4}%)",
            p.side.as_str().to_lowercase(),
            p.entry_price,
            p.profit_loss,
            p.pnl_pct() * Decimal::ONE_HUNDRED
        );
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TradeSide;
    use rust_decimal_macros::dec;

    fn open_long() -> Position {
        let mut pos = Position::new(
            "BTC/USD".to_string(),
            TradeSide::Buy,
            dec!(100),
            dec!(1000),
            dec!(95),
            dec!(110),
        );
        pos.update_price(dec!(101));
        pos
    }

    #[test]
    fn test_summary_with_history() {
        let trend = PriceTrend::from_prices(&[dec!(100), dec!(98), dec!(97)], dec!(5)).unwrap();
        let text = build_summary("BTC/USD", dec!(97), Some(&trend), 1, &[open_long()]);

        assert!(text.contains("summary for BTC/USD"));
        assert!(text.contains("$97.00"));
        assert!(text.contains("trend has been downward"));
        assert!(text.contains("-3.00%"));
        assert!(text.contains("low volatility"));
        assert!(text.contains("Type: buy, Entry: $100.00, P&L: $10.00 (1.0000%)"));
        assert!(text.ends_with("BUY, SELL, SKIP, CLOSE_ALL."));
    }

    #[test]
    fn test_summary_without_history() {
        let text = build_summary("BTC/USD", dec!(64000.5), None, 1, &[]);

        assert!(text.starts_with("Current price of BTC/USD is $64000.50. No historical data available."));
        assert!(text.contains("No ongoing trades."));
    }
}
