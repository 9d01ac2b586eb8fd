//! Trading configuration.

use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Configuration for sizing, risk limits and task schedules.
///
/// Read once at startup; never changed while the bot runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Instrument pair traded (e.g., "BTC/USD")
    pub pair: String,

    /// Market-data id for `pair`
    pub coin_id: String,

    /// Fraction of available balance committed per trade (0.0 to 1.0)
    pub risk_per_trade: Decimal,

    /// Stop-loss distance in ATRs
    pub atr_multiplier_sl: Decimal,

    /// Take-profit distance in ATRs
    pub atr_multiplier_tp: Decimal,

    /// Minimum trade size in quote currency
    pub min_trade_size: Decimal,

    /// Maximum number of open positions
    pub max_open_trades: usize,

    /// Minimum time after any close before a new cycle may act (seconds)
    pub trade_cooldown_secs: u64,

    /// History window for the ATR estimate (days)
    pub atr_window_days: u32,

    /// History window for the trend summary (days)
    pub trend_window_days: u32,

    /// Absolute % change above which volatility is reported as high
    pub high_volatility_pct: Decimal,

    /// Price/P&L refresh interval (seconds)
    pub monitor_interval_secs: u64,

    /// Stop-loss/take-profit check interval (seconds)
    pub execution_interval_secs: u64,

    /// Trading cycle interval (seconds)
    pub cycle_interval_secs: u64,

    /// Delay before the first trading cycle (seconds)
    pub warmup_secs: u64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            pair: "BTC/USD".to_string(),
            coin_id: "bitcoin".to_string(),
            risk_per_trade: dec!(0.02),      // 2% of available balance
            atr_multiplier_sl: dec!(1.5),
            atr_multiplier_tp: dec!(3.0),
            min_trade_size: dec!(1.0),       // Min $1
            max_open_trades: 3,
            trade_cooldown_secs: 300,        // 5 minutes
            atr_window_days: 14,
            trend_window_days: 1,
            high_volatility_pct: dec!(5),
            monitor_interval_secs: 30,
            execution_interval_secs: 1,
            cycle_interval_secs: 600,        // 10 minutes
            warmup_secs: 5,
        }
    }
}

impl TradingConfig {
    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.trade_cooldown_secs as i64)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs.max(1))
    }

    pub fn execution_interval(&self) -> Duration {
        Duration::from_secs(self.execution_interval_secs.max(1))
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs.max(1))
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_secs(self.warmup_secs)
    }

    /// Check the configuration for values that make trading impossible.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.risk_per_trade <= Decimal::ZERO || self.risk_per_trade > Decimal::ONE {
            anyhow::bail!("risk_per_trade must be in (0, 1], got {}", self.risk_per_trade);
        }
        if self.atr_multiplier_sl <= Decimal::ZERO || self.atr_multiplier_tp <= Decimal::ZERO {
            anyhow::bail!("ATR multipliers must be positive");
        }
        if self.max_open_trades == 0 {
            anyhow::bail!("max_open_trades must be at least 1");
        }
        if self.pair.is_empty() || self.coin_id.is_empty() {
            anyhow::bail!("pair and coin_id must be set");
        }
        if self.monitor_interval_secs == 0
            || self.execution_interval_secs == 0
            || self.cycle_interval_secs == 0
        {
            anyhow::bail!("task intervals must be at least one second");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = TradingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cooldown(), chrono::Duration::minutes(5));
        assert_eq!(config.cycle_interval(), Duration::from_secs(600));
    }

    #[test]
    fn test_rejects_bad_risk_fraction() {
        let config = TradingConfig {
            risk_per_trade: dec!(1.5),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = TradingConfig {
            max_open_trades: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = TradingConfig {
            execution_interval_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
