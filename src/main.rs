//! Simulated scalping bot
//!
//! Trades one crypto pair against a paper account: prices and volatility
//! come from a market-data API, entry decisions from a generative-model
//! advisor, and exits from ATR-based stop-loss and take-profit levels.

mod api;
mod bot;
mod metrics;
mod models;
mod store;
mod trading;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::api::{AdvisorClient, MarketDataClient, RetryPolicy};
use crate::bot::{Bot, BotStats};
use crate::store::{state_file_exists, StateStore};
use crate::trading::TradingConfig;

/// Simulated single-pair trading bot CLI.
#[derive(Parser)]
#[command(name = "scalpsim")]
#[command(about = "Paper-trade one crypto pair with ATR exits and an AI advisor", long_about = None)]
struct Cli {
    /// Trading state file path
    #[arg(short, long, env = "SCALPSIM_STATE", default_value = "./database.json")]
    state: PathBuf,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot
    Run {
        /// Starting balance if the state file does not exist yet
        #[arg(short, long, default_value = "10000")]
        balance: f64,

        /// Market-data API key (demo tier)
        #[arg(long, env = "COINGECKO_API_KEY")]
        market_api_key: Option<String>,

        /// Advisor API key
        #[arg(long, env = "GEMINI_API_KEY")]
        advisor_api_key: String,

        /// Advisor model name
        #[arg(long, env = "GEMINI_MODEL")]
        model: Option<String>,

        /// Attempts per external call, including the first
        #[arg(long, default_value = "3")]
        max_attempts: u32,

        /// Seconds to wait between attempts
        #[arg(long, default_value = "5")]
        retry_delay: u64,
    },

    /// Show balances, prices and open positions
    Status,

    /// Replace the state file with a fresh account
    Reset {
        /// Starting balance
        #[arg(short, long)]
        balance: f64,
    },

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = TradingConfig::default();
    config.validate()?;

    match cli.command {
        Commands::Run {
            balance,
            market_api_key,
            advisor_api_key,
            model,
            max_attempts,
            retry_delay,
        } => {
            let balance = parse_balance(balance)?;
            let retry = RetryPolicy::new(max_attempts, Duration::from_secs(retry_delay));
            info!(
                state = %cli.state.display(),
                pair = %config.pair,
                "Starting simulated trading bot"
            );

            let store = Arc::new(StateStore::open(&cli.state, balance).await?);
            let market = Arc::new(
                MarketDataClient::new(market_api_key, retry)?
                    .with_pair(config.pair.clone(), config.coin_id.clone()),
            );
            let advisor = Arc::new(AdvisorClient::new(advisor_api_key, model, retry)?);

            let bot = Bot::new(
                config.clone(),
                store,
                market.clone(),
                market,
                advisor,
            );

            let stats = bot.get_stats().await?;
            println!("\n=== Simulated Trading Bot ===");
            println!("Pair:              {}", config.pair);
            println!("State file:        {}", cli.state.display());
            println!("Available balance: ${:.2}", stats.available_balance);
            println!("Open positions:    {}", stats.open_positions);
            println!("\nThis is SIMULATED trading - no real money involved.");
            println!("Press Ctrl+C to stop.\n");

            if let Err(e) = bot.run().await {
                tracing::error!(error = %e, "Bot error");
            }

            // Show final stats
            println!("\n{}", bot.get_stats().await?);
        }

        Commands::Status => {
            if !state_file_exists(&cli.state).await? {
                println!(
                    "No state file at {}. Run 'scalpsim run' to start the bot.",
                    cli.state.display()
                );
                return Ok(());
            }

            let state = StateStore::load(&cli.state).await?;
            println!("\n{}", BotStats::from_state(&state));

            if !state.ongoing_trades.is_empty() {
                println!("=== Open Positions ===");
                println!(
                    "{:<16} {:<8} {:<5} {:>12} {:>10} {:>12} {:>12} {:>10}",
                    "ID", "PAIR", "TYPE", "ENTRY", "AMOUNT", "SL", "TP", "P&L"
                );
                println!("{}", "-".repeat(92));

                for pos in &state.ongoing_trades {
                    let pnl_sign = if pos.profit_loss >= Decimal::ZERO { "+" } else { "" };
                    let pnl = format!("{}${:.2}", pnl_sign, pos.profit_loss);
                    println!(
                        "{:<16} {:<8} {:<5} {:>12.2} {:>10.2} {:>12.2} {:>12.2} {:>10} ({:.2}%)",
                        truncate(&pos.trade_id, 16),
                        pos.pair,
                        pos.side.as_str(),
                        pos.entry_price,
                        pos.amount,
                        pos.stop_loss,
                        pos.take_profit,
                        pnl,
                        pos.pnl_pct() * dec!(100)
                    );
                }
            }
        }

        Commands::Reset { balance } => {
            let balance = parse_balance(balance)?;
            StateStore::create(&cli.state, balance).await?;
            info!(state = %cli.state.display(), balance = %balance, "State reset");
            println!("Reset {} with balance ${:.2}", cli.state.display(), balance);
        }

        Commands::Config => {
            let retry = RetryPolicy::default();

            println!("\n=== Trading Configuration ===\n");
            println!("Instrument:");
            println!("  Pair:                 {}", config.pair);
            println!("  Coin Id:              {}", config.coin_id);

            println!("\nPosition Sizing:");
            println!("  Risk Per Trade:       {}%", config.risk_per_trade * dec!(100));
            println!("  Min Trade Size:       ${}", config.min_trade_size);
            println!("  Max Open Trades:      {}", config.max_open_trades);

            println!("\nExits:");
            println!("  Stop Loss:            {} x ATR", config.atr_multiplier_sl);
            println!("  Take Profit:          {} x ATR", config.atr_multiplier_tp);
            println!("  ATR Window:           {} days", config.atr_window_days);
            println!("  Trade Cooldown:       {}s", config.trade_cooldown_secs);

            println!("\nAdvisor Summary:");
            println!("  Trend Window:         {} days", config.trend_window_days);
            println!("  High Volatility:      >{}%", config.high_volatility_pct);

            println!("\nSchedules:");
            println!("  Price Refresh:        {}s", config.monitor_interval_secs);
            println!("  Exit Checks:          {}s", config.execution_interval_secs);
            println!("  Trading Cycle:        {}s", config.cycle_interval_secs);
            println!("  First Cycle After:    {}s", config.warmup_secs);

            println!("\nRetries (defaults, see `run --help`):");
            println!("  Max Attempts:         {}", retry.max_attempts);
            println!("  Delay:                {}s", retry.delay.as_secs());
        }
    }

    Ok(())
}

fn parse_balance(balance: f64) -> Result<Decimal> {
    let balance = Decimal::try_from(balance)?;
    if balance <= Decimal::ZERO {
        anyhow::bail!("balance must be positive, got {}", balance);
    }
    Ok(balance.round_dp(2))
}

/// Truncate a string with ellipsis if too long.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
