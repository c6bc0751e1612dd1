use crate::error::{ClientError, Result};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Seed that mints the genesis funds on a local standalone network
pub const GENESIS_MINT_WALLET_SEED: &str =
    "0000000000000000000000000000000000000000000000000000000000000001";

/// Identifier of a token type, hex encoded
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(String);

impl TokenId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The network's native token (tDUST)
    #[must_use]
    pub fn native() -> Self {
        Self(format!("02{}", "0".repeat(64)))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub type Balances = BTreeMap<TokenId, u128>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncLag {
    pub apply_gap: u64,
    pub source_gap: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProgress {
    pub synced: bool,
    pub lag: SyncLag,
}

/// Snapshot of what the wallet client currently knows, as published on its
/// state channel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletState {
    pub address: String,
    pub coin_public_key: String,
    pub encryption_public_key: String,
    pub balances: Balances,
    pub sync_progress: Option<SyncProgress>,
    pub transaction_history: Vec<TransactionId>,
}

impl WalletState {
    #[must_use]
    pub fn native_balance(&self) -> u128 {
        self.balances.get(&TokenId::native()).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.sync_progress.is_some_and(|progress| progress.synced)
    }

    #[must_use]
    pub fn lag(&self) -> SyncLag {
        self.sync_progress.map(|progress| progress.lag).unwrap_or_default()
    }
}

/// 32-byte wallet seed, hex encoded. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct WalletSeed(String);

impl WalletSeed {
    #[must_use]
    pub fn genesis() -> Self {
        Self(GENESIS_MINT_WALLET_SEED.to_string())
    }

    #[must_use]
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// The hex seed itself. Only for showing to the wallet owner.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        hex::decode(&self.0).unwrap_or_default()
    }
}

impl FromStr for WalletSeed {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(digits)
            .map_err(|e| ClientError::Config(format!("Invalid wallet seed: {e}")))?;
        if bytes.len() != 32 {
            return Err(ClientError::Config(format!(
                "Invalid wallet seed: expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self(digits.to_ascii_lowercase()))
    }
}

impl fmt::Debug for WalletSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WalletSeed(..)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hex address of a deployed contract, stored lowercase without `0x`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContractAddress(String);

impl ContractAddress {
    pub(crate) fn from_digest(bytes: &[u8]) -> Self {
        Self(hex::encode(bytes))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ContractAddress {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        if digits.is_empty() {
            return Err(ClientError::InvalidAddress("address is empty".to_string()));
        }
        hex::decode(digits).map_err(|e| ClientError::InvalidAddress(format!("{trimmed}: {e}")))?;
        Ok(Self(digits.to_ascii_lowercase()))
    }
}

impl TryFrom<String> for ContractAddress {
    type Error = ClientError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ContractAddress> for String {
    fn from(address: ContractAddress) -> Self {
        address.0
    }
}

impl fmt::Display for ContractAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A coin created by a transaction that the wallet should start tracking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinInfo {
    pub token: TokenId,
    pub value: u128,
    pub nonce: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnbalancedTransaction {
    pub payload: Vec<u8>,
}

/// Transaction with fees attached; `proof` is filled in by proving
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancedTransaction {
    pub payload: Vec<u8>,
    pub payer: String,
    pub fee: u128,
    pub new_coins: Vec<CoinInfo>,
    pub proof: Option<Vec<u8>>,
}

impl BalancedTransaction {
    #[must_use]
    pub const fn is_proven(&self) -> bool {
        self.proof.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizedTxData {
    pub tx_id: TransactionId,
    pub tx_hash: String,
    pub block_height: u64,
}

/// Public state of a contract as seen by the indexer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractState {
    pub operations: BTreeSet<String>,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmerLedgerState {
    pub registered_farmers: u64,
    pub total_crops: u64,
}

impl FarmerLedgerState {
    #[must_use]
    pub fn from_contract_state(state: &ContractState) -> Self {
        let registered_farmers = state
            .data
            .get("farmers")
            .and_then(serde_json::Value::as_object)
            .map_or(0, |farmers| farmers.len() as u64);
        let total_crops = state
            .data
            .get("crops")
            .and_then(serde_json::Value::as_array)
            .map_or(0, |crops| crops.len() as u64);

        Self {
            registered_farmers,
            total_crops,
        }
    }
}
