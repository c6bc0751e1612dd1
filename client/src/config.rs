use crate::error::{ClientError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub network: NetworkConfig,
    pub cache: CacheConfig,
    pub sync: SyncConfig,
    pub devnet: DevnetConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkId {
    /// Local standalone network started from genesis
    Undeployed,
    TestNet,
}

impl FromStr for NetworkId {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "undeployed" | "standalone" | "local" => Ok(Self::Undeployed),
            "testnet" | "test-net" => Ok(Self::TestNet),
            other => Err(ClientError::Config(format!("Unknown network: {other}"))),
        }
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undeployed => f.write_str("undeployed"),
            Self::TestNet => f.write_str("testnet"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub id: NetworkId,
    pub indexer: Url,
    pub indexer_ws: Url,
    pub node: Url,
    pub proof_server: Url,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory for wallet cache files. Unset means no caching at all.
    pub directory: Option<PathBuf>,
    pub restore_sync_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub sync_interval_seconds: u64,
    pub funds_interval_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevnetConfig {
    /// Credit freshly built wallets that hold no funds
    pub faucet: bool,
    pub genesis_funds: u128,
    pub faucet_amount: u128,
    pub tx_fee: u128,
    /// Time the wallet sync task spends applying one block
    pub sync_step_millis: u64,
    pub genesis_height: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_interval_seconds: 5,
            funds_interval_seconds: 10,
        }
    }
}

impl Default for DevnetConfig {
    fn default() -> Self {
        Self {
            faucet: true,
            genesis_funds: 25_000_000_000,
            faucet_amount: 1_000_000_000,
            tx_fee: 1_000,
            sync_step_millis: 20,
            genesis_height: 0,
        }
    }
}

impl NetworkConfig {
    /// Endpoints a network is reachable on when nothing is overridden
    pub fn preset(id: NetworkId) -> Result<Self> {
        let (indexer, indexer_ws, node, proof_server) = match id {
            NetworkId::Undeployed => (
                "http://127.0.0.1:8088/api/v1/graphql",
                "ws://127.0.0.1:8088/api/v1/graphql/ws",
                "http://127.0.0.1:9944",
                "http://127.0.0.1:6300",
            ),
            NetworkId::TestNet => (
                "https://indexer.testnet-02.midnight.network/api/v1/graphql",
                "wss://indexer.testnet-02.midnight.network/api/v1/graphql/ws",
                "https://rpc.testnet-02.midnight.network",
                "http://127.0.0.1:6300",
            ),
        };

        Ok(Self {
            id,
            indexer: Url::parse(indexer)?,
            indexer_ws: Url::parse(indexer_ws)?,
            node: Url::parse(node)?,
            proof_server: Url::parse(proof_server)?,
        })
    }
}

impl Config {
    pub fn for_network(id: NetworkId) -> Result<Self> {
        Ok(Self {
            network: NetworkConfig::preset(id)?,
            cache: CacheConfig::default(),
            sync: SyncConfig::default(),
            devnet: DevnetConfig::default(),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_env_for_network(None)
    }

    /// Like `from_env`, but `network` (when given) replaces `FARMER_NETWORK`
    /// before the endpoint overrides are applied.
    pub fn from_env_for_network(network: Option<NetworkId>) -> Result<Self> {
        Self::from_lookup_for_network(|key| env::var(key).ok(), network)
    }

    /// Build a config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_lookup_for_network(lookup, None)
    }

    pub fn from_lookup_for_network<F>(lookup: F, network: Option<NetworkId>) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let id = match network {
            Some(id) => id,
            None => lookup("FARMER_NETWORK")
                .unwrap_or_else(|| "undeployed".to_string())
                .parse()?,
        };
        let preset = NetworkConfig::preset(id)?;

        let endpoint = |key: &str, default: Url| -> Result<Url> {
            match lookup(key) {
                Some(raw) => {
                    Url::parse(&raw).map_err(|e| ClientError::Config(format!("Invalid {key}: {e}")))
                }
                None => Ok(default),
            }
        };

        let network = NetworkConfig {
            id,
            indexer: endpoint("INDEXER_URL", preset.indexer)?,
            indexer_ws: endpoint("INDEXER_WS_URL", preset.indexer_ws)?,
            node: endpoint("NODE_URL", preset.node)?,
            proof_server: endpoint("PROOF_SERVER_URL", preset.proof_server)?,
        };

        let restore_sync_timeout_seconds = match lookup("RESTORE_SYNC_TIMEOUT_SECONDS") {
            Some(raw) => Some(raw.trim().parse().map_err(|e| {
                ClientError::Config(format!("Invalid RESTORE_SYNC_TIMEOUT_SECONDS: {e}"))
            })?),
            None => None,
        };

        let defaults = DevnetConfig::default();
        let config = Self {
            network,
            cache: CacheConfig {
                directory: lookup("SYNC_CACHE")
                    .filter(|dir| !dir.trim().is_empty())
                    .map(PathBuf::from),
                restore_sync_timeout_seconds,
            },
            sync: SyncConfig::default(),
            devnet: DevnetConfig {
                faucet: match lookup("DEVNET_FAUCET") {
                    Some(raw) => raw.trim().parse().map_err(|e| {
                        ClientError::Config(format!("Invalid DEVNET_FAUCET: {e}"))
                    })?,
                    None => defaults.faucet,
                },
                ..defaults
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, url) in [
            ("INDEXER_URL", &self.network.indexer),
            ("NODE_URL", &self.network.node),
            ("PROOF_SERVER_URL", &self.network.proof_server),
        ] {
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ClientError::Config(format!(
                    "{name} must use http or https, got {}",
                    url.scheme()
                )));
            }
        }

        if !matches!(self.network.indexer_ws.scheme(), "ws" | "wss") {
            return Err(ClientError::Config(format!(
                "INDEXER_WS_URL must use ws or wss, got {}",
                self.network.indexer_ws.scheme()
            )));
        }

        if self.cache.restore_sync_timeout_seconds == Some(0) {
            return Err(ClientError::Config(
                "RESTORE_SYNC_TIMEOUT_SECONDS must be greater than 0".to_string(),
            ));
        }

        if self.sync.sync_interval_seconds == 0 || self.sync.funds_interval_seconds == 0 {
            return Err(ClientError::Config(
                "Sync sampling intervals must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    #[must_use]
    pub fn restore_sync_timeout(&self) -> Option<Duration> {
        self.cache
            .restore_sync_timeout_seconds
            .map(Duration::from_secs)
    }

    #[must_use]
    pub const fn is_standalone(&self) -> bool {
        matches!(self.network.id, NetworkId::Undeployed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_to_undeployed_network() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.network.id, NetworkId::Undeployed);
        assert_eq!(
            config.network.indexer.as_str(),
            "http://127.0.0.1:8088/api/v1/graphql"
        );
        assert_eq!(
            config.network.indexer_ws.as_str(),
            "ws://127.0.0.1:8088/api/v1/graphql/ws"
        );
        assert_eq!(config.network.node.as_str(), "http://127.0.0.1:9944/");
        assert_eq!(config.network.proof_server.as_str(), "http://127.0.0.1:6300/");
        assert!(config.cache.directory.is_none());
        assert!(config.restore_sync_timeout().is_none());
        assert!(config.is_standalone());
        assert!(config.devnet.faucet);
    }

    #[test]
    fn test_overrides_from_lookup() {
        let config = Config::from_lookup(lookup_from(&[
            ("FARMER_NETWORK", "testnet"),
            ("SYNC_CACHE", "/tmp/farmer-cache"),
            ("NODE_URL", "http://10.0.0.5:9944"),
            ("RESTORE_SYNC_TIMEOUT_SECONDS", "30"),
            ("DEVNET_FAUCET", "false"),
        ]))
        .unwrap();

        assert_eq!(config.network.id, NetworkId::TestNet);
        assert_eq!(config.network.node.as_str(), "http://10.0.0.5:9944/");
        assert_eq!(
            config.cache.directory,
            Some(PathBuf::from("/tmp/farmer-cache"))
        );
        assert_eq!(config.restore_sync_timeout(), Some(Duration::from_secs(30)));
        assert!(!config.devnet.faucet);
        assert!(!config.is_standalone());
    }

    #[test]
    fn test_network_argument_keeps_endpoint_overrides() {
        let lookup = lookup_from(&[
            ("FARMER_NETWORK", "undeployed"),
            ("INDEXER_URL", "http://127.0.0.1:9/custom-indexer"),
        ]);

        let from_env = Config::from_lookup_for_network(&lookup, None).unwrap();
        assert_eq!(
            from_env.network.indexer.as_str(),
            "http://127.0.0.1:9/custom-indexer"
        );

        let same = Config::from_lookup_for_network(&lookup, Some(NetworkId::Undeployed)).unwrap();
        assert_eq!(same.network.indexer, from_env.network.indexer);

        let switched = Config::from_lookup_for_network(&lookup, Some(NetworkId::TestNet)).unwrap();
        assert_eq!(switched.network.id, NetworkId::TestNet);
        assert_eq!(
            switched.network.indexer.as_str(),
            "http://127.0.0.1:9/custom-indexer"
        );
        assert_eq!(
            switched.network.node,
            NetworkConfig::preset(NetworkId::TestNet).unwrap().node
        );
    }

    #[test]
    fn test_empty_sync_cache_means_no_cache() {
        let config = Config::from_lookup(lookup_from(&[("SYNC_CACHE", "  ")])).unwrap();
        assert!(config.cache.directory.is_none());
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Config::from_lookup(lookup_from(&[("FARMER_NETWORK", "mainnet")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("INDEXER_URL", "not a url")])).is_err());
        assert!(
            Config::from_lookup(lookup_from(&[("INDEXER_WS_URL", "http://127.0.0.1:8088")]))
                .is_err()
        );
        assert!(
            Config::from_lookup(lookup_from(&[("RESTORE_SYNC_TIMEOUT_SECONDS", "0")])).is_err()
        );
        assert!(
            Config::from_lookup(lookup_from(&[("RESTORE_SYNC_TIMEOUT_SECONDS", "soon")])).is_err()
        );
        for typo in ["no", "0", "off", ""] {
            let err = Config::from_lookup(lookup_from(&[("DEVNET_FAUCET", typo)])).unwrap_err();
            assert!(err.to_string().contains("DEVNET_FAUCET"));
        }
        let config = Config::from_lookup(lookup_from(&[("DEVNET_FAUCET", " true ")])).unwrap();
        assert!(config.devnet.faucet);
    }

    #[test]
    fn test_network_id_parsing() {
        assert_eq!("Undeployed".parse::<NetworkId>().unwrap(), NetworkId::Undeployed);
        assert_eq!("testnet".parse::<NetworkId>().unwrap(), NetworkId::TestNet);
        assert_eq!(NetworkId::TestNet.to_string(), "testnet");
    }
}
