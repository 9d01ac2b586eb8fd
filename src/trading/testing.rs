//! Scripted oracles for exercising the trading tasks without a network.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::api::{DecisionOracle, PriceOracle, VolatilityOracle};
use crate::models::Decision;

/// Market with a fixed price, history and ATR.
pub struct MockMarket {
    price: Option<Decimal>,
    history: Option<Vec<Decimal>>,
    atr: Option<Decimal>,
    price_calls: AtomicUsize,
    history_calls: AtomicUsize,
    atr_calls: AtomicUsize,
}

impl MockMarket {
    pub fn new(price: Option<Decimal>, history: Option<Vec<Decimal>>, atr: Option<Decimal>) -> Self {
        Self {
            price,
            history,
            atr,
            price_calls: AtomicUsize::new(0),
            history_calls: AtomicUsize::new(0),
            atr_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_price(price: Decimal) -> Self {
        Self::new(Some(price), Some(vec![price]), None)
    }

    pub fn unavailable() -> Self {
        Self::new(None, None, None)
    }

    pub fn price_calls(&self) -> usize {
        self.price_calls.load(Ordering::SeqCst)
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    pub fn atr_calls(&self) -> usize {
        self.atr_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.price_calls() + self.history_calls() + self.atr_calls()
    }
}

#[async_trait]
impl PriceOracle for MockMarket {
    async fn current_price(&self, _pair: &str) -> Result<Decimal> {
        self.price_calls.fetch_add(1, Ordering::SeqCst);
        self.price.ok_or_else(|| anyhow::anyhow!("price feed down"))
    }

    async fn historical_prices(&self, _pair: &str, _days: u32) -> Result<Vec<Decimal>> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        self.history
            .clone()
            .ok_or_else(|| anyhow::anyhow!("history unavailable"))
    }
}

#[async_trait]
impl VolatilityOracle for MockMarket {
    async fn average_true_range(&self, _pair: &str, _days: u32) -> Option<Decimal> {
        self.atr_calls.fetch_add(1, Ordering::SeqCst);
        self.atr
    }
}

/// Advisor that always answers with the same decision.
pub struct MockAdvisor {
    decision: Decision,
    calls: AtomicUsize,
    last_summary: Mutex<Option<String>>,
}

impl MockAdvisor {
    pub fn new(decision: Decision) -> Self {
        Self {
            decision,
            calls: AtomicUsize::new(0),
            last_summary: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_summary(&self) -> Option<String> {
        self.last_summary.lock().unwrap().clone()
    }
}

#[async_trait]
impl DecisionOracle for MockAdvisor {
    async fn decide(&self, summary: &str) -> Decision {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_summary.lock().unwrap() = Some(summary.to_string());
        self.decision
    }
}
