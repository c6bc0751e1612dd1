#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

pub mod acquisition;
pub mod config;
pub mod contracts;
pub mod devnet;
pub mod error;
pub mod health;
pub mod persistence;
pub mod session;
pub mod sync;
pub mod types;
pub mod wallet;

pub use acquisition::{AcquiredWallet, AcquisitionState, WalletAcquirer};
pub use config::{CacheConfig, Config, DevnetConfig, NetworkConfig, NetworkId, SyncConfig};
pub use contracts::{
    configure_providers, Backend, CircuitCall, ContractRuntime, DeployTxData,
    DeployedFarmerContract, FarmerCircuit, FarmerProviders, PublicDataProvider,
};
pub use devnet::{Devnet, DevnetNode, DevnetRuntime, DevnetWallet, DevnetWalletBuilder};
pub use error::{ClientError, Result};
pub use health::{check_services, ServiceHealth};
pub use persistence::{cache_file_name, detect_chain_reset, WalletSnapshot, WalletStore};
pub use session::{ContractInfo, ContractSession, DeployOrJoin};
pub use sync::SyncWaiter;
pub use types::{
    ContractAddress, ContractState, FarmerLedgerState, FinalizedTxData, TransactionId,
    WalletSeed, WalletState,
};
pub use wallet::{Wallet, WalletAndMidnightProvider, WalletBuilder};
