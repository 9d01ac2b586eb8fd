//! Bot runner: schedules the periodic tasks over one shared state store.
//!
//! Handles:
//! - Price/P&L refresh (position monitor)
//! - Stop-loss/take-profit checks (execution simulator)
//! - Decision-driven trading cycles (cycle orchestrator)
//! - Coordinated shutdown on Ctrl+C

use std::any::Any;
use std::collections::BTreeMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use futures::FutureExt;
use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::api::{DecisionOracle, PriceOracle, VolatilityOracle};
use crate::models::TradeState;
use crate::store::StateStore;
use crate::trading::{
    CycleOrchestrator, ExecutionSimulator, PeriodicTask, PositionMonitor, TradingConfig,
};

/// Runs the monitor, simulator and trading cycle until shutdown.
pub struct Bot {
    config: TradingConfig,
    store: Arc<StateStore>,
    prices: Arc<dyn PriceOracle>,
    volatility: Arc<dyn VolatilityOracle>,
    advisor: Arc<dyn DecisionOracle>,
}

impl Bot {
    pub fn new(
        config: TradingConfig,
        store: Arc<StateStore>,
        prices: Arc<dyn PriceOracle>,
        volatility: Arc<dyn VolatilityOracle>,
        advisor: Arc<dyn DecisionOracle>,
    ) -> Self {
        Self {
            config,
            store,
            prices,
            volatility,
            advisor,
        }
    }

    /// Run until Ctrl+C.
    pub async fn run(&self) -> Result<()> {
        let (tx, rx) = watch::channel(false);

        tokio::spawn(async move {
            wait_for_interrupt(tokio::signal::ctrl_c()).await;
            info!("Shutdown signal received");
            tx.send(true).ok();
        });

        self.run_until(rx).await
    }

    /// Run until `shutdown` turns true or its sender is dropped.
    ///
    /// In-flight ticks finish before their task stops, so no mutation is
    /// ever cut short.
    pub async fn run_until(&self, shutdown: watch::Receiver<bool>) -> Result<()> {
        self.config.validate()?;

        info!(
            pair = %self.config.pair,
            monitor_secs = self.config.monitor_interval_secs,
            execution_secs = self.config.execution_interval_secs,
            cycle_secs = self.config.cycle_interval_secs,
            "Starting bot run loop"
        );

        let tasks: Vec<Arc<dyn PeriodicTask>> = vec![
            Arc::new(PositionMonitor::new(
                &self.config,
                self.store.clone(),
                self.prices.clone(),
            )),
            Arc::new(ExecutionSimulator::new(&self.config, self.store.clone())),
            Arc::new(CycleOrchestrator::new(
                self.config.clone(),
                self.store.clone(),
                self.prices.clone(),
                self.volatility.clone(),
                self.advisor.clone(),
            )),
        ];

        let handles: Vec<_> = tasks
            .into_iter()
            .map(|task| tokio::spawn(run_periodic(task, shutdown.clone())))
            .collect();

        for joined in join_all(handles).await {
            if let Err(e) = joined {
                error!(error = %e, "Task terminated abnormally");
            }
        }

        info!("Bot shutdown complete");
        Ok(())
    }

    /// Current stats from a state snapshot.
    pub async fn get_stats(&self) -> Result<BotStats> {
        Ok(BotStats::from_state(&self.store.snapshot().await?))
    }
}

/// Resolve when `signal` fires. If the handler cannot be installed, never
/// resolve, so the bot keeps running instead of stopping at once.
async fn wait_for_interrupt<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        error!(error = %e, "Failed to listen for Ctrl+C; stop the process externally");
        std::future::pending::<()>().await;
    }
}

/// Tick `task` on its schedule until shutdown.
///
/// Errors and panics from one tick are logged and the schedule continues.
pub async fn run_periodic(task: Arc<dyn PeriodicTask>, mut shutdown: watch::Receiver<bool>) {
    let name = task.name();
    let mut ticker = interval_at(Instant::now() + task.initial_delay(), task.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        task = name,
        interval_ms = task.interval().as_millis() as u64,
        initial_delay_ms = task.initial_delay().as_millis() as u64,
        "Task scheduled"
    );

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
        }

        match AssertUnwindSafe(task.tick()).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(task = name, error = %e, "Error in task tick"),
            Err(panic) => error!(task = name, panic = %panic_message(&*panic), "Task tick panicked"),
        }
    }

    debug!(task = name, "Task stopped");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Bot statistics.
#[derive(Debug, Clone)]
pub struct BotStats {
    pub opening_balance: Decimal,
    pub current_balance: Decimal,
    pub available_balance: Decimal,
    pub unrealized_pnl: Decimal,
    pub committed: Decimal,
    pub open_positions: usize,
    pub prices: BTreeMap<String, Decimal>,
    pub last_close_at: Option<DateTime<Utc>>,
}

impl BotStats {
    pub fn from_state(state: &TradeState) -> Self {
        Self {
            opening_balance: state.portfolio.opening_balance,
            current_balance: state.portfolio.current_balance,
            available_balance: state.portfolio.available_balance,
            unrealized_pnl: state.unrealized_pnl(),
            committed: state.committed(),
            open_positions: state.ongoing_trades.len(),
            prices: state
                .current_prices
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
            last_close_at: state.last_close_at,
        }
    }
}

impl std::fmt::Display for BotStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Bot Statistics ===")?;
        writeln!(f, "Opening Balance:   ${:.2}", self.opening_balance)?;
        writeln!(f, "Current Balance:   ${:.2}", self.current_balance)?;
        writeln!(f, "Available Balance: ${:.2}", self.available_balance)?;
        writeln!(f, "Committed:         ${:.2}", self.committed)?;
        writeln!(f, "Unrealized P&L:    ${:.2}", self.unrealized_pnl)?;
        writeln!(f, "Open Positions:    {}", self.open_positions)?;
        for (pair, price) in &self.prices {
            writeln!(f, "Price {:<12} ${:.2}", format!("{}:", pair), price)?;
        }
        match self.last_close_at {
            Some(at) => writeln!(f, "Last Close:        {}", at.format("%Y-%m-%d %H:%M:%S UTC"))?,
            None => writeln!(f, "Last Close:        Never")?,
        }
        Ok(())
    }
}
