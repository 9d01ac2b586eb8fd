//! Shared trading-state store backed by a JSON document on disk.
//!
//! All background tasks read and write the account through this store:
//! - `snapshot()` returns a point-in-time copy
//! - `mutate()` runs a read-modify-write under one exclusive lock and
//!   persists the result before releasing it
//!
//! For a file-backed store the document on disk is authoritative: both
//! operations re-read it under the lock, so an external rewrite (such as
//! `scalpsim reset`) is picked up by the next call instead of being
//! overwritten.
//!
//! Compound updates (remove a position AND adjust balances) must happen
//! inside a single `mutate` call.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::models::TradeState;

/// Where the document lives.
enum Backing {
    File(PathBuf),
    #[cfg(test)]
    Memory(TradeState),
}

/// Single-lock owner of the trading-state document.
pub struct StateStore {
    backing: Mutex<Backing>,
}

impl StateStore {
    /// Open the state file, creating it with `initial_balance` if missing.
    pub async fn open(path: impl AsRef<Path>, initial_balance: Decimal) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if state_file_exists(&path).await? {
            let state = Self::load(&path).await?;
            info!(
                path = %path.display(),
                positions = state.ongoing_trades.len(),
                available = %state.portfolio.available_balance,
                "Loaded trading state"
            );
            Ok(Self {
                backing: Mutex::new(Backing::File(path)),
            })
        } else {
            info!(path = %path.display(), balance = %initial_balance, "Creating new trading state");
            Self::create(path, initial_balance).await
        }
    }

    /// Write a fresh state document, replacing any existing one.
    pub async fn create(path: impl AsRef<Path>, balance: Decimal) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        write_document(&path, &TradeState::new(balance)).await?;

        Ok(Self {
            backing: Mutex::new(Backing::File(path)),
        })
    }

    /// Store that never touches the filesystem.
    #[cfg(test)]
    pub fn in_memory(state: TradeState) -> Self {
        Self {
            backing: Mutex::new(Backing::Memory(state)),
        }
    }

    /// Read a state document from disk.
    pub async fn load(path: impl AsRef<Path>) -> Result<TradeState> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read state file {}", path.display()))?;

        serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse state file {}", path.display()))
    }

    /// Point-in-time copy of the whole document.
    pub async fn snapshot(&self) -> Result<TradeState> {
        let backing = self.backing.lock().await;
        match &*backing {
            Backing::File(path) => Self::load(path).await,
            #[cfg(test)]
            Backing::Memory(state) => Ok(state.clone()),
        }
    }

    /// Apply `f` to the latest document under the exclusive lock and persist it.
    ///
    /// `f` runs on a freshly loaded copy; nothing is kept if the write fails,
    /// so a failed mutation leaves no partial update behind.
    pub async fn mutate<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut TradeState) -> R,
    {
        let mut backing = self.backing.lock().await;
        match &mut *backing {
            Backing::File(path) => {
                let mut working = Self::load(&*path).await?;
                let out = f(&mut working);
                write_document(path, &working).await?;
                Ok(out)
            }
            #[cfg(test)]
            Backing::Memory(state) => Ok(f(state)),
        }
    }
}

/// Whether the state file exists. I/O errors are reported, never read as
/// "missing", so an unreadable file is not replaced by a fresh account.
pub async fn state_file_exists(path: &Path) -> Result<bool> {
    tokio::fs::try_exists(path)
        .await
        .with_context(|| format!("Failed to check state file {}", path.display()))
}

/// Serialize `state` and atomically replace the file at `path`.
async fn write_document(path: &Path, state: &TradeState) -> Result<()> {
    let json = serde_json::to_vec_pretty(state).context("Failed to serialize trading state")?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, &json)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to replace state file {}", path.display()))?;

    debug!(path = %path.display(), bytes = json.len(), "State persisted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::models::{Position, TradeSide};
    use rust_decimal_macros::dec;
    use tokio_test::assert_ok;

    fn position(amount: Decimal) -> Position {
        Position::new(
            "BTC/USD".to_string(),
            TradeSide::Buy,
            dec!(100),
            amount,
            dec!(90),
            dec!(120),
        )
    }

    #[tokio::test]
    async fn test_snapshot_is_idempotent() {
        let store = StateStore::in_memory(TradeState::new(dec!(1000)));
        assert_eq!(store.snapshot().await.unwrap(), store.snapshot().await.unwrap());
    }

    #[tokio::test]
    async fn test_mutate_sees_latest_state() {
        let store = StateStore::in_memory(TradeState::new(dec!(1000)));

        let stale = store.snapshot().await.unwrap();
        assert_ok!(store
            .mutate(|s| s.portfolio.available_balance -= dec!(100))
            .await);
        assert_ok!(store
            .mutate(|s| s.portfolio.available_balance -= dec!(100))
            .await);

        assert_eq!(stale.portfolio.available_balance, dec!(1000));
        assert_eq!(store.snapshot().await.unwrap().portfolio.available_balance, dec!(800));
    }

    #[tokio::test]
    async fn test_concurrent_mutations_are_not_lost() {
        let store = Arc::new(StateStore::in_memory(TradeState::new(dec!(1000))));

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .mutate(|s| s.open_position(position(dec!(10))))
                        .await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap().unwrap();
        }

        let state = store.snapshot().await.unwrap();
        assert_eq!(state.ongoing_trades.len(), 50);
        assert_eq!(state.portfolio.available_balance, dec!(500));
    }

    #[tokio::test]
    async fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.json");

        let store = StateStore::open(&path, dec!(2500)).await.unwrap();
        store
            .mutate(|s| {
                s.open_position(position(dec!(250))).unwrap();
                s.revalue("BTC/USD", dec!(110));
            })
            .await
            .unwrap();
        let expected = store.snapshot().await.unwrap();
        drop(store);

        let reopened = StateStore::open(&path, dec!(99999)).await.unwrap();
        let state = reopened.snapshot().await.unwrap();

        assert_eq!(state.portfolio, expected.portfolio);
        assert_eq!(state.ongoing_trades.len(), 1);
        assert_eq!(state.ongoing_trades[0].trade_id, expected.ongoing_trades[0].trade_id);
        assert_eq!(state.ongoing_trades[0].profit_loss, dec!(25));
        assert!(!dir.path().join("database.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_reload_preserves_balances_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.json");
        let store = StateStore::open(&path, dec!(10000)).await.unwrap();

        let expected = store
            .mutate(|s| {
                s.open_position(Position::new(
                    "BTC/USD".to_string(),
                    TradeSide::Buy,
                    dec!(64000.5),
                    dec!(200),
                    dec!(63000),
                    dec!(65000),
                ))
                .unwrap();
                s.open_position(Position::new(
                    "BTC/USD".to_string(),
                    TradeSide::Sell,
                    dec!(63999.99),
                    dec!(196),
                    dec!(65000),
                    dec!(63000),
                ))
                .unwrap();
                s.revalue("BTC/USD", dec!(64123.37));
                s.clone()
            })
            .await
            .unwrap();

        let reloaded = StateStore::load(&path).await.unwrap();

        assert_eq!(reloaded, expected);
        assert_eq!(
            reloaded.portfolio.current_balance,
            reloaded.portfolio.opening_balance + reloaded.unrealized_pnl()
        );
    }

    #[tokio::test]
    async fn test_create_resets_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = StateStore::open(&path, dec!(1000)).await.unwrap();
        store
            .mutate(|s| s.open_position(position(dec!(100))))
            .await
            .unwrap()
            .unwrap();

        StateStore::create(&path, dec!(5000)).await.unwrap();
        let state = StateStore::load(&path).await.unwrap();

        assert!(state.ongoing_trades.is_empty());
        assert_eq!(state.portfolio.available_balance, dec!(5000));
    }

    #[tokio::test]
    async fn test_external_reset_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.json");

        let running = StateStore::open(&path, dec!(1000)).await.unwrap();
        running
            .mutate(|s| s.open_position(position(dec!(100))))
            .await
            .unwrap()
            .unwrap();

        // Another process resets the account while the bot is running
        StateStore::create(&path, dec!(5000)).await.unwrap();

        let snapshot = running.snapshot().await.unwrap();
        assert!(snapshot.ongoing_trades.is_empty());
        assert_eq!(snapshot.portfolio.available_balance, dec!(5000));

        running
            .mutate(|s| s.revalue("BTC/USD", dec!(110)))
            .await
            .unwrap();

        let on_disk = StateStore::load(&path).await.unwrap();
        assert!(on_disk.ongoing_trades.is_empty());
        assert_eq!(on_disk.portfolio.available_balance, dec!(5000));
        assert_eq!(on_disk.portfolio.current_balance, dec!(5000));
        assert_eq!(on_disk.price("BTC/USD"), Some(dec!(110)));
    }

    #[tokio::test]
    async fn test_external_edit_between_mutations_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.json");
        let store = StateStore::open(&path, dec!(1000)).await.unwrap();

        let mut edited = StateStore::load(&path).await.unwrap();
        edited.portfolio.available_balance = dec!(700);
        std::fs::write(&path, serde_json::to_vec(&edited).unwrap()).unwrap();

        store
            .mutate(|s| s.portfolio.available_balance -= dec!(100))
            .await
            .unwrap();

        assert_eq!(
            StateStore::load(&path).await.unwrap().portfolio.available_balance,
            dec!(600)
        );
    }

    #[tokio::test]
    async fn test_existence_check_reports_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("plain-file");
        std::fs::write(&not_a_dir, b"keep me").unwrap();
        let path = not_a_dir.join("database.json");

        assert!(state_file_exists(&path).await.is_err());
        assert!(StateStore::open(&path, dec!(1000)).await.is_err());
        assert_eq!(std::fs::read(&not_a_dir).unwrap(), b"keep me");
    }

    #[tokio::test]
    async fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, b"{ not json").unwrap();

        assert!(StateStore::open(&path, dec!(1000)).await.is_err());
    }
}
