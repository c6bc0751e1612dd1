//! Waiting on the wallet state stream.
//!
//! Every wait samples the stream at most once per interval and keeps only the
//! latest state. Each sample logs the backend and wallet lag before its
//! predicate is checked.

use crate::config::SyncConfig;
use crate::error::{ClientError, Result};
use crate::types::WalletState;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::info;

pub const SYNC_SAMPLE_INTERVAL: Duration = Duration::from_secs(5);
pub const FUNDS_SAMPLE_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct SyncWaiter {
    sync_interval: Duration,
    funds_interval: Duration,
    samples: AtomicU64,
}

impl Default for SyncWaiter {
    fn default() -> Self {
        Self::with_intervals(SYNC_SAMPLE_INTERVAL, FUNDS_SAMPLE_INTERVAL)
    }
}

impl SyncWaiter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_intervals(sync_interval: Duration, funds_interval: Duration) -> Self {
        Self {
            sync_interval,
            funds_interval,
            samples: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub const fn from_config(config: &SyncConfig) -> Self {
        Self::with_intervals(
            Duration::from_secs(config.sync_interval_seconds),
            Duration::from_secs(config.funds_interval_seconds),
        )
    }

    /// Number of states sampled so far across all waits
    pub fn samples_taken(&self) -> u64 {
        self.samples.load(Ordering::Relaxed)
    }

    /// Resolve with the first sampled state that reports `synced`.
    pub async fn wait_for_full_sync(&self, rx: watch::Receiver<WalletState>) -> Result<WalletState> {
        self.sample_until(rx, self.sync_interval, "sync", |state| {
            state.is_synced().then(|| state.clone())
        })
        .await
    }

    /// Resolve with the first sampled state that carries any sync progress.
    pub async fn wait_for_any_sync_progress(
        &self,
        rx: watch::Receiver<WalletState>,
    ) -> Result<WalletState> {
        self.sample_until(rx, self.sync_interval, "sync progress", |state| {
            state.sync_progress.is_some().then(|| state.clone())
        })
        .await
    }

    /// Resolve with the native balance once the wallet is synced and holds a
    /// non-zero amount.
    pub async fn wait_for_positive_balance(&self, rx: watch::Receiver<WalletState>) -> Result<u128> {
        self.sample_until(rx, self.funds_interval, "funds", |state| {
            let balance = state.native_balance();
            (state.is_synced() && balance > 0).then_some(balance)
        })
        .await
    }

    async fn sample_until<T, F>(
        &self,
        mut rx: watch::Receiver<WalletState>,
        interval: Duration,
        awaiting: &str,
        mut select: F,
    ) -> Result<T>
    where
        F: FnMut(&WalletState) -> Option<T>,
    {
        loop {
            let state = rx.borrow_and_update().clone();
            self.samples.fetch_add(1, Ordering::Relaxed);

            let lag = state.lag();
            info!(
                "Waiting for {awaiting}. Backend lag: {}, wallet lag: {}, transactions={}",
                lag.source_gap,
                lag.apply_gap,
                state.transaction_history.len()
            );

            if let Some(found) = select(&state) {
                return Ok(found);
            }

            // Anything published during the pause is collapsed into the next sample.
            sleep(interval).await;
            rx.changed()
                .await
                .map_err(|_| ClientError::StateStreamClosed)?;
        }
    }
}
