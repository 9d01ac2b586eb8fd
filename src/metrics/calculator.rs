//! Calculators for volatility (ATR) and trend over a price series.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use statrs::statistics::Statistics;

/// One period of price data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candle {
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

impl Candle {
    /// Candle built from a single last-trade price (`high = low = close`).
    pub fn from_price(price: Decimal) -> Self {
        Self {
            high: price,
            low: price,
            close: price,
        }
    }
}

/// True range of `candle` given the previous period's close.
///
/// `max(high - low, |high - prev_close|, |low - prev_close|)`
pub fn true_range(candle: &Candle, prev_close: Decimal) -> Decimal {
    (candle.high - candle.low)
        .max((candle.high - prev_close).abs())
        .max((candle.low - prev_close).abs())
}

/// Mean true range over `candles`, oldest first.
///
/// Needs at least two candles; returns `None` otherwise so callers never
/// mistake "no estimate" for zero volatility.
pub fn average_true_range(candles: &[Candle]) -> Option<Decimal> {
    let ranges: Vec<Decimal> = candles
        .windows(2)
        .map(|w| true_range(&w[1], w[0].close))
        .collect();

    if ranges.is_empty() {
        return None;
    }

    Some(ranges.iter().copied().sum::<Decimal>() / Decimal::from(ranges.len()))
}

/// Direction of price over a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Upward,
    Downward,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trend::Upward => f.write_str("upward"),
            Trend::Downward => f.write_str("downward"),
        }
    }
}

/// Coarse volatility bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolatilityLevel {
    High,
    Low,
}

impl std::fmt::Display for VolatilityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VolatilityLevel::High => f.write_str("high"),
            VolatilityLevel::Low => f.write_str("low"),
        }
    }
}

/// Trend statistics over a trailing price window.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTrend {
    pub start_price: Decimal,
    pub end_price: Decimal,
    pub trend: Trend,
    /// Percentage change from first to last price (5 = 5%)
    pub change_pct: Decimal,
    pub volatility: VolatilityLevel,
    /// Standard deviation of step-to-step returns, in percent
    pub return_std_dev_pct: f64,
}

impl PriceTrend {
    /// Summarize `prices` (oldest first).
    ///
    /// Volatility is `High` when the absolute change exceeds
    /// `high_volatility_pct`. Returns `None` for an empty series or a zero
    /// starting price.
    pub fn from_prices(prices: &[Decimal], high_volatility_pct: Decimal) -> Option<Self> {
        let start_price = *prices.first()?;
        let end_price = *prices.last()?;
        if start_price.is_zero() {
            return None;
        }

        let trend = if end_price > start_price {
            Trend::Upward
        } else {
            Trend::Downward
        };

        let change_pct = (end_price - start_price) / start_price * Decimal::ONE_HUNDRED;
        let volatility = if change_pct.abs() > high_volatility_pct {
            VolatilityLevel::High
        } else {
            VolatilityLevel::Low
        };

        Some(Self {
            start_price,
            end_price,
            trend,
            change_pct,
            volatility,
            return_std_dev_pct: return_std_dev_pct(prices),
        })
    }
}

/// Sample standard deviation of step returns, 0 when undefined.
fn return_std_dev_pct(prices: &[Decimal]) -> f64 {
    let returns: Vec<f64> = prices
        .windows(2)
        .filter_map(|w| {
            let prev = w[0].to_f64()?;
            let curr = w[1].to_f64()?;
            if prev > 0.0 {
                Some((curr - prev) / prev * 100.0)
            } else {
                None
            }
        })
        .collect();

    if returns.len() < 2 {
        return 0.0;
    }

    let std_dev = returns.iter().std_dev();
    if std_dev.is_finite() {
        std_dev
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn candles(prices: &[Decimal]) -> Vec<Candle> {
        prices.iter().copied().map(Candle::from_price).collect()
    }

    #[test]
    fn test_true_range_full_candle() {
        let candle = Candle {
            high: dec!(112),
            low: dec!(102),
            close: dec!(105),
        };
        // Gap down from 90: |112 - 90| dominates
        assert_eq!(true_range(&candle, dec!(90)), dec!(22));
        // Inside bar: high - low dominates
        assert_eq!(true_range(&candle, dec!(105)), dec!(10));
    }

    #[test]
    fn test_atr_from_last_prices() {
        // Ranges collapse to |p_i - p_{i-1}|: 10, 5, 15
        let atr = average_true_range(&candles(&[dec!(100), dec!(110), dec!(105), dec!(120)]));
        assert_eq!(atr, Some(dec!(10)));
    }

    #[test]
    fn test_atr_needs_two_points() {
        assert_eq!(average_true_range(&[]), None);
        assert_eq!(average_true_range(&candles(&[dec!(100)])), None);
    }

    #[test]
    fn test_trend_summary() {
        let prices = [dec!(100), dec!(102), dec!(101), dec!(106)];
        let summary = PriceTrend::from_prices(&prices, dec!(5)).unwrap();

        assert_eq!(summary.trend, Trend::Upward);
        assert_eq!(summary.change_pct, dec!(6));
        assert_eq!(summary.volatility, VolatilityLevel::High);
        assert!(summary.return_std_dev_pct > 0.0);
    }

    #[test]
    fn test_flat_series_is_downward_and_calm() {
        let prices = [dec!(100), dec!(100)];
        let summary = PriceTrend::from_prices(&prices, dec!(5)).unwrap();

        assert_eq!(summary.trend, Trend::Downward);
        assert_eq!(summary.volatility, VolatilityLevel::Low);
        assert_eq!(summary.return_std_dev_pct, 0.0);
    }

    #[test]
    fn test_trend_rejects_bad_input() {
        assert!(PriceTrend::from_prices(&[], dec!(5)).is_none());
        assert!(PriceTrend::from_prices(&[Decimal::ZERO, dec!(1)], dec!(5)).is_none());
    }
}
