//! Wallet client seam.
//!
//! The wallet SDK is reached only through [`Wallet`] and [`WalletBuilder`];
//! [`crate::devnet`] provides the in-process implementation.

use crate::error::Result;
use crate::persistence::WalletSnapshot;
use crate::types::{
    BalancedTransaction, CoinInfo, TransactionId, UnbalancedTransaction, WalletSeed, WalletState,
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, instrument};

#[async_trait]
pub trait Wallet: Send + Sync {
    /// Subscribe to the wallet's state. The receiver starts at the latest
    /// published state.
    fn state(&self) -> watch::Receiver<WalletState>;

    async fn balance_transaction(
        &self,
        tx: UnbalancedTransaction,
        new_coins: Vec<CoinInfo>,
    ) -> Result<BalancedTransaction>;

    async fn prove_transaction(&self, tx: BalancedTransaction) -> Result<BalancedTransaction>;

    async fn submit_transaction(&self, tx: BalancedTransaction) -> Result<TransactionId>;

    /// Opaque snapshot string, loadable by [`WalletBuilder::restore`]
    async fn serialize_state(&self) -> Result<String>;

    /// Begin syncing against the chain. Idempotent.
    fn start(&self);

    async fn close(&self) -> Result<()>;
}

#[async_trait]
pub trait WalletBuilder: Send + Sync {
    async fn build_from_seed(&self, seed: &WalletSeed) -> Result<Arc<dyn Wallet>>;

    async fn restore(&self, seed: &WalletSeed, snapshot: &WalletSnapshot)
        -> Result<Arc<dyn Wallet>>;
}

/// Wallet adapter handed to contract calls: balances, proves and submits
pub struct WalletAndMidnightProvider {
    wallet: Arc<dyn Wallet>,
    coin_public_key: String,
    encryption_public_key: String,
}

impl WalletAndMidnightProvider {
    #[must_use]
    pub fn new(wallet: Arc<dyn Wallet>) -> Self {
        let state = wallet.state().borrow().clone();
        Self {
            wallet,
            coin_public_key: state.coin_public_key,
            encryption_public_key: state.encryption_public_key,
        }
    }

    #[must_use]
    pub fn coin_public_key(&self) -> &str {
        &self.coin_public_key
    }

    #[must_use]
    pub fn encryption_public_key(&self) -> &str {
        &self.encryption_public_key
    }

    #[must_use]
    pub fn wallet(&self) -> &Arc<dyn Wallet> {
        &self.wallet
    }

    #[instrument(skip_all)]
    pub async fn balance_tx(
        &self,
        tx: UnbalancedTransaction,
        new_coins: Vec<CoinInfo>,
    ) -> Result<BalancedTransaction> {
        let balanced = self.wallet.balance_transaction(tx, new_coins).await?;
        debug!("Balanced transaction with fee {}", balanced.fee);
        self.wallet.prove_transaction(balanced).await
    }

    #[instrument(skip_all)]
    pub async fn submit_tx(&self, tx: BalancedTransaction) -> Result<TransactionId> {
        let tx_id = self.wallet.submit_transaction(tx).await?;
        debug!("Submitted transaction {tx_id}");
        Ok(tx_id)
    }
}

impl std::fmt::Debug for WalletAndMidnightProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletAndMidnightProvider")
            .field("coin_public_key", &self.coin_public_key)
            .field("encryption_public_key", &self.encryption_public_key)
            .finish_non_exhaustive()
    }
}
