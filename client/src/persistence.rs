use crate::config::Config;
use crate::error::{ClientError, Result};
use crate::types::WalletSeed;
use crate::wallet::Wallet;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

/// Serialized wallet state exactly as the wallet client produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletSnapshot {
    raw: String,
}

/// Fields this client reads out of an otherwise opaque snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub offset: u64,
    pub address: Option<String>,
}

impl WalletSnapshot {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn header(&self) -> Result<SnapshotHeader> {
        let value: Value = serde_json::from_str(&self.raw)
            .map_err(|e| ClientError::CorruptSnapshot(e.to_string()))?;

        let offset = match value.get("offset") {
            Some(Value::Number(number)) => number.as_u64(),
            Some(Value::String(text)) => text.trim().parse().ok(),
            _ => None,
        }
        .ok_or_else(|| ClientError::CorruptSnapshot("missing or invalid offset".to_string()))?;

        let address = value
            .get("address")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(SnapshotHeader { offset, address })
    }

    /// Chain position the wallet had applied when the snapshot was taken
    pub fn offset(&self) -> Result<u64> {
        self.header().map(|header| header.offset)
    }
}

/// True when the live chain is more than one block behind the cached offset,
/// meaning the cache was taken on a chain that no longer exists.
#[must_use]
pub const fn detect_chain_reset(live_offset: u64, cached_offset: u64) -> bool {
    live_offset.saturating_add(1) < cached_offset
}

/// `wallet-<first 16 hex of sha256(seed)>.state`
#[must_use]
pub fn cache_file_name(seed: &WalletSeed) -> String {
    let digest = Sha256::digest(seed.expose().as_bytes());
    let hex = hex::encode(digest);
    format!("wallet-{}.state", &hex[..16])
}

/// One wallet cache file inside the `SYNC_CACHE` directory
#[derive(Debug, Clone)]
pub struct WalletStore {
    directory: PathBuf,
    file_name: String,
}

impl WalletStore {
    pub fn new(directory: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            file_name: file_name.into(),
        }
    }

    /// Store for `seed`, or `None` when no cache directory is configured
    #[must_use]
    pub fn from_config(config: &Config, seed: &WalletSeed) -> Option<Self> {
        config
            .cache
            .directory
            .as_ref()
            .map(|directory| Self::new(directory.clone(), cache_file_name(seed)))
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }

    fn temp_path(&self) -> PathBuf {
        self.directory.join(format!(".{}.tmp", self.file_name))
    }

    #[instrument(skip(self), fields(path = %self.path().display()))]
    pub async fn load(&self) -> Result<Option<WalletSnapshot>> {
        match fs::read_to_string(self.path()).await {
            Ok(raw) => {
                debug!("Read {} bytes of wallet state", raw.len());
                Ok(Some(WalletSnapshot::new(raw)))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the snapshot so that readers only ever see a complete file.
    #[instrument(skip(self, snapshot), fields(path = %self.path().display()))]
    pub async fn save(&self, snapshot: &WalletSnapshot) -> Result<()> {
        fs::create_dir_all(&self.directory).await?;

        let temp = self.temp_path();
        fs::write(&temp, snapshot.as_str()).await?;
        if let Err(e) = fs::rename(&temp, self.path()).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }

        Ok(())
    }

    /// Serialize and save the wallet's state. Failures are logged, not returned.
    pub async fn save_wallet(&self, wallet: &dyn Wallet) {
        info!("Saving state in {}", self.path().display());

        let raw = match wallet.serialize_state().await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Could not serialize wallet state: {e}");
                return;
            }
        };

        if let Err(e) = self.save(&WalletSnapshot::new(raw)).await {
            warn!("Could not save wallet state to {}: {e}", self.path().display());
        }
    }
}
