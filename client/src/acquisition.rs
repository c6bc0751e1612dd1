//! Restore-or-rebuild decision for the session wallet.
//!
//! ```text
//! NoCache ──────────────────────────────────────────────┐
//! CacheFound ─(bad snapshot / any error)──────────────── ├─> Rebuilding ─> Ready
//! CacheFound ─> Restoring ─(reset)─> ResetDetected ───── ┤
//!                         ─(sync failed)──────────────── ┘
//!                         ─(synced)─> RestoredOk ─────────────────────────> Ready
//! ```

use crate::config::Config;
use crate::error::{ClientError, Result};
use crate::persistence::{cache_file_name, detect_chain_reset, WalletSnapshot, WalletStore};
use crate::sync::SyncWaiter;
use crate::types::WalletSeed;
use crate::wallet::{Wallet, WalletBuilder};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    NoCache,
    CacheFound,
    Restoring,
    RestoredOk,
    ResetDetected,
    Rebuilding,
    Ready,
}

pub struct AcquiredWallet {
    pub wallet: Arc<dyn Wallet>,
    /// States visited, in order, ending with `Ready`
    pub trace: Vec<AcquisitionState>,
}

impl AcquiredWallet {
    #[must_use]
    pub fn restored(&self) -> bool {
        self.trace.contains(&AcquisitionState::RestoredOk)
    }
}

impl std::fmt::Debug for AcquiredWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquiredWallet")
            .field("trace", &self.trace)
            .finish_non_exhaustive()
    }
}

pub struct WalletAcquirer {
    builder: Arc<dyn WalletBuilder>,
    waiter: Arc<SyncWaiter>,
    cache_directory: Option<PathBuf>,
    restore_sync_timeout: Option<Duration>,
}

impl WalletAcquirer {
    pub fn new(
        builder: Arc<dyn WalletBuilder>,
        waiter: Arc<SyncWaiter>,
        cache_directory: Option<PathBuf>,
    ) -> Self {
        Self {
            builder,
            waiter,
            cache_directory,
            restore_sync_timeout: None,
        }
    }

    pub fn from_config(
        config: &Config,
        builder: Arc<dyn WalletBuilder>,
        waiter: Arc<SyncWaiter>,
    ) -> Self {
        Self::new(builder, waiter, config.cache.directory.clone())
            .with_restore_sync_timeout(config.restore_sync_timeout())
    }

    #[must_use]
    pub const fn with_restore_sync_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.restore_sync_timeout = timeout;
        self
    }

    /// Cache file for `seed`, if caching is enabled
    #[must_use]
    pub fn store_for(&self, seed: &WalletSeed) -> Option<WalletStore> {
        self.cache_directory
            .as_ref()
            .map(|directory| WalletStore::new(directory.clone(), cache_file_name(seed)))
    }

    /// Restore the wallet from its cache when that is safe, otherwise build
    /// it from the seed. Only a failing rebuild is an error.
    #[instrument(skip_all)]
    pub async fn acquire(&self, seed: &WalletSeed) -> Result<AcquiredWallet> {
        let mut trace = Vec::new();

        let restored = match self.store_for(seed) {
            Some(store) => self.try_restore(&store, seed, &mut trace).await,
            None => {
                info!("File path for save file not found, building wallet from scratch");
                trace.push(AcquisitionState::NoCache);
                None
            }
        };

        let wallet = match restored {
            Some(wallet) => wallet,
            None => {
                trace.push(AcquisitionState::Rebuilding);
                let wallet = self.builder.build_from_seed(seed).await?;
                wallet.start();
                wallet
            }
        };

        trace.push(AcquisitionState::Ready);
        Ok(AcquiredWallet { wallet, trace })
    }

    /// Acquire the wallet, then block until it holds funds.
    pub async fn build_wallet_and_wait_for_funds(&self, seed: &WalletSeed) -> Result<AcquiredWallet> {
        let acquired = self.acquire(seed).await?;

        let state = acquired.wallet.state().borrow().clone();
        info!("Your wallet address is: {}", state.address);

        let mut balance = state.native_balance();
        if balance == 0 {
            info!("Your wallet balance is: 0");
            info!("Waiting to receive tokens...");
            balance = self
                .waiter
                .wait_for_positive_balance(acquired.wallet.state())
                .await?;
        }
        info!("Your wallet balance is: {balance}");

        Ok(acquired)
    }

    async fn try_restore(
        &self,
        store: &WalletStore,
        seed: &WalletSeed,
        trace: &mut Vec<AcquisitionState>,
    ) -> Option<Arc<dyn Wallet>> {
        let snapshot = match store.load().await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                info!("Wallet save file not found, building wallet from scratch");
                trace.push(AcquisitionState::NoCache);
                return None;
            }
            Err(e) => {
                trace.push(AcquisitionState::CacheFound);
                warn!("Could not read {}: {e}", store.path().display());
                warn!("Wallet was not able to restore using the stored state, building wallet from scratch");
                return None;
            }
        };

        trace.push(AcquisitionState::CacheFound);
        info!("Attempting to restore state from {}", store.path().display());

        match self.restore_from(&snapshot, seed, trace).await {
            Ok(wallet) => wallet,
            Err(e) => {
                error!("{e}");
                warn!("Wallet was not able to restore using the stored state, building wallet from scratch");
                None
            }
        }
    }

    async fn restore_from(
        &self,
        snapshot: &WalletSnapshot,
        seed: &WalletSeed,
        trace: &mut Vec<AcquisitionState>,
    ) -> Result<Option<Arc<dyn Wallet>>> {
        let cached_offset = snapshot.offset()?;

        trace.push(AcquisitionState::Restoring);
        let wallet = self.builder.restore(seed, snapshot).await?;
        wallet.start();

        match self.verify_restored(wallet.as_ref(), cached_offset, trace).await {
            Ok(true) => Ok(Some(wallet)),
            Ok(false) => {
                close_discarded(wallet.as_ref()).await;
                Ok(None)
            }
            Err(e) => {
                close_discarded(wallet.as_ref()).await;
                Err(e)
            }
        }
    }

    async fn verify_restored(
        &self,
        wallet: &dyn Wallet,
        cached_offset: u64,
        trace: &mut Vec<AcquisitionState>,
    ) -> Result<bool> {
        if self.is_another_chain(wallet, cached_offset).await? {
            warn!("The chain was reset, building wallet from scratch");
            trace.push(AcquisitionState::ResetDetected);
            return Ok(false);
        }

        let sync = self.waiter.wait_for_full_sync(wallet.state());
        let outcome = match self.restore_sync_timeout {
            Some(limit) => match tokio::time::timeout(limit, sync).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ClientError::Timeout(format!(
                    "restored wallet did not sync within {}s",
                    limit.as_secs()
                ))),
            },
            None => sync.await,
        };

        match outcome {
            Ok(_) => {
                info!("Wallet was able to sync from restored state");
                trace.push(AcquisitionState::RestoredOk);
                Ok(true)
            }
            Err(e) => {
                let lag = wallet.state().borrow().lag();
                info!("Offset: {cached_offset}");
                info!("SyncProgress.lag.applyGap: {}", lag.apply_gap);
                info!("SyncProgress.lag.sourceGap: {}", lag.source_gap);
                warn!("Wallet was not able to sync from restored state, building wallet from scratch: {e}");
                Ok(false)
            }
        }
    }

    async fn is_another_chain(&self, wallet: &dyn Wallet, cached_offset: u64) -> Result<bool> {
        self.waiter.wait_for_any_sync_progress(wallet.state()).await?;

        let live_offset = WalletSnapshot::new(wallet.serialize_state().await?).offset()?;
        if detect_chain_reset(live_offset, cached_offset) {
            warn!(
                "Your offset {live_offset} is lower than the restored state offset {cached_offset}, are you sure you're on the right chain?"
            );
            return Ok(true);
        }

        Ok(false)
    }
}

async fn close_discarded(wallet: &dyn Wallet) {
    if let Err(e) = wallet.close().await {
        warn!("Could not close discarded wallet: {e}");
    }
}
