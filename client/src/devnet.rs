//! In-process development network.
//!
//! [`DevnetNode`] is a single-node chain holding native balances and farmer
//! contract ledgers. [`DevnetWallet`] syncs against it one block per step,
//! and [`DevnetRuntime`] builds farmer contract transactions and answers
//! indexer queries. Together they implement every collaborator trait so the
//! CLI runs without external services.

use crate::config::DevnetConfig;
use crate::contracts::{
    Backend, CircuitCall, ContractRuntime, DeployTxData, FarmerCircuit, PublicDataProvider,
};
use crate::error::{ClientError, Result};
use crate::persistence::WalletSnapshot;
use crate::types::{
    Balances, BalancedTransaction, CoinInfo, ContractAddress, ContractState, FinalizedTxData,
    SyncLag, SyncProgress, TokenId, TransactionId, UnbalancedTransaction, WalletSeed, WalletState,
};
use crate::wallet::{Wallet, WalletAndMidnightProvider, WalletBuilder};
use async_trait::async_trait;
use farmer_lib::{FarmerHash, FarmerWitnesses, FieldValue, TestWitnesses};
use parking_lot::{Mutex, RwLock};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

fn sha256_hex(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hex::encode(hasher.finalize())
}

/// Address a deploy transaction with this payload creates
fn contract_address_for(payload: &[u8]) -> ContractAddress {
    ContractAddress::from_digest(&Sha256::digest([b"contract".as_slice(), payload].concat()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum DevnetTx {
    Deploy {
        operations: BTreeSet<String>,
        salt: String,
    },
    Invoke {
        address: ContractAddress,
        call: CircuitCall,
        witness: Option<SelfTestWitness>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SelfTestWitness {
    farmer_hash: FarmerHash,
    full_name: FieldValue,
    region: FieldValue,
    crop_name: FieldValue,
}

impl SelfTestWitness {
    fn from_witnesses(witnesses: &dyn FarmerWitnesses) -> Self {
        Self {
            farmer_hash: witnesses.create_test_farmer_hash(),
            full_name: witnesses.create_test_farmer_name(),
            region: witnesses.create_test_region(),
            crop_name: witnesses.create_test_crop_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct FarmerRecord {
    full_name: FieldValue,
    region: FieldValue,
    registration_date: FieldValue,
}

#[derive(Debug, Clone, Serialize)]
struct CropRecord {
    farmer_hash: String,
    crop_name: FieldValue,
    planting_date: FieldValue,
    expected_harvest_date: FieldValue,
    crop_type: FieldValue,
}

#[derive(Debug, Default, Serialize)]
struct FarmerLedger {
    farmers: BTreeMap<String, FarmerRecord>,
    crops: Vec<CropRecord>,
}

impl FarmerLedger {
    fn apply(&mut self, call: CircuitCall, witness: Option<SelfTestWitness>) -> Result<()> {
        match call {
            CircuitCall::SignUp(registration) => {
                let key = hex::encode(registration.farmer_hash);
                if self.farmers.contains_key(&key) {
                    return Err(ClientError::TransactionFailed(format!(
                        "farmer {key} is already registered"
                    )));
                }
                self.farmers.insert(
                    key,
                    FarmerRecord {
                        full_name: registration.full_name,
                        region: registration.region,
                        registration_date: registration.registration_date,
                    },
                );
            }
            CircuitCall::RegisterCrop(crop) => {
                let key = hex::encode(crop.farmer_hash);
                if !self.farmers.contains_key(&key) {
                    return Err(ClientError::TransactionFailed(format!(
                        "farmer {key} is not registered"
                    )));
                }
                self.crops.push(CropRecord {
                    farmer_hash: key,
                    crop_name: crop.crop_name,
                    planting_date: crop.planting_date,
                    expected_harvest_date: crop.expected_harvest_date,
                    crop_type: crop.crop_type,
                });
            }
            CircuitCall::TestFarmerRegistration => {
                let witness = witness.ok_or_else(|| {
                    ClientError::TransactionFailed("self-test witness is missing".to_string())
                })?;
                let key = hex::encode(witness.farmer_hash);
                self.farmers.entry(key.clone()).or_insert(FarmerRecord {
                    full_name: witness.full_name,
                    region: witness.region,
                    registration_date: FieldValue::ZERO,
                });
                self.crops.push(CropRecord {
                    farmer_hash: key,
                    crop_name: witness.crop_name,
                    planting_date: FieldValue::ZERO,
                    expected_harvest_date: FieldValue::ZERO,
                    crop_type: FieldValue::from_u64(1),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
struct DevnetContract {
    operations: BTreeSet<String>,
    ledger: FarmerLedger,
}

#[derive(Debug, Default)]
struct Chain {
    height: u64,
    balances: HashMap<String, u128>,
    contracts: HashMap<ContractAddress, DevnetContract>,
    finalized: HashMap<TransactionId, FinalizedTxData>,
}

impl Chain {
    fn apply(&mut self, tx: DevnetTx, payload: &[u8]) -> Result<()> {
        match tx {
            DevnetTx::Deploy { operations, .. } => {
                let address = contract_address_for(payload);
                if self.contracts.contains_key(&address) {
                    return Err(ClientError::TransactionFailed(format!(
                        "contract {address} already exists"
                    )));
                }
                self.contracts.insert(
                    address,
                    DevnetContract {
                        operations,
                        ledger: FarmerLedger::default(),
                    },
                );
            }
            DevnetTx::Invoke {
                address,
                call,
                witness,
            } => {
                let contract = self
                    .contracts
                    .get_mut(&address)
                    .ok_or_else(|| ClientError::ContractNotFound(address.to_string()))?;
                let circuit = call.circuit();
                if !contract.operations.contains(circuit.name()) {
                    return Err(ClientError::TransactionFailed(format!(
                        "contract {address} has no circuit {circuit}"
                    )));
                }
                contract.ledger.apply(call, witness)?;
            }
        }
        Ok(())
    }
}

/// Single-node chain. Every accepted transaction produces one block.
#[derive(Debug)]
pub struct DevnetNode {
    config: DevnetConfig,
    chain: RwLock<Chain>,
    height_tx: watch::Sender<u64>,
}

impl DevnetNode {
    #[must_use]
    pub fn new(config: DevnetConfig) -> Arc<Self> {
        let genesis = WalletKeys::derive(&WalletSeed::genesis());
        let mut chain = Chain {
            height: config.genesis_height,
            ..Chain::default()
        };
        chain.balances.insert(genesis.address, config.genesis_funds);

        let (height_tx, _) = watch::channel(config.genesis_height);
        Arc::new(Self {
            config,
            chain: RwLock::new(chain),
            height_tx,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &DevnetConfig {
        &self.config
    }

    pub fn height(&self) -> u64 {
        self.chain.read().height
    }

    pub fn subscribe_height(&self) -> watch::Receiver<u64> {
        self.height_tx.subscribe()
    }

    pub fn balance_of(&self, address: &str) -> u128 {
        self.chain.read().balances.get(address).copied().unwrap_or(0)
    }

    /// Mint `amount` to `address` in a new block.
    pub fn credit(&self, address: &str, amount: u128) {
        let height = {
            let mut chain = self.chain.write();
            let balance = chain.balances.entry(address.to_string()).or_insert(0);
            *balance = balance.saturating_add(amount);
            chain.height += 1;
            chain.height
        };
        self.height_tx.send_replace(height);
    }

    /// Produce `blocks` empty blocks.
    pub fn advance(&self, blocks: u64) {
        let height = {
            let mut chain = self.chain.write();
            chain.height += blocks;
            chain.height
        };
        self.height_tx.send_replace(height);
    }

    /// Place a contract exposing `operations` on chain, as if someone else
    /// had deployed it.
    pub fn install_contract<I, S>(&self, operations: I) -> ContractAddress
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        let address = ContractAddress::from_digest(&Sha256::digest(salt));

        self.chain.write().contracts.insert(
            address.clone(),
            DevnetContract {
                operations: operations.into_iter().map(Into::into).collect(),
                ledger: FarmerLedger::default(),
            },
        );
        address
    }

    pub fn contract_state(&self, address: &ContractAddress) -> Result<Option<ContractState>> {
        let chain = self.chain.read();
        let Some(contract) = chain.contracts.get(address) else {
            return Ok(None);
        };

        Ok(Some(ContractState {
            operations: contract.operations.clone(),
            data: serde_json::to_value(&contract.ledger)?,
        }))
    }

    pub fn finalized(&self, tx_id: &TransactionId) -> Option<FinalizedTxData> {
        self.chain.read().finalized.get(tx_id).cloned()
    }

    /// Validate, apply and include a transaction in a new block.
    pub fn submit(&self, tx: &BalancedTransaction) -> Result<FinalizedTxData> {
        if !tx.is_proven() {
            return Err(ClientError::TransactionFailed(
                "transaction is not proven".to_string(),
            ));
        }
        let decoded: DevnetTx = serde_json::from_slice(&tx.payload)
            .map_err(|e| ClientError::TransactionFailed(format!("malformed transaction: {e}")))?;

        let finalized = {
            let mut chain = self.chain.write();
            let available = chain.balances.get(&tx.payer).copied().unwrap_or(0);
            if available < tx.fee {
                return Err(ClientError::InsufficientFunds {
                    required: tx.fee,
                    available,
                });
            }

            chain.apply(decoded, &tx.payload)?;
            chain.balances.insert(tx.payer.clone(), available - tx.fee);
            chain.height += 1;

            let block_height = chain.height;
            let tx_hash = sha256_hex(&[&tx.payload, &block_height.to_be_bytes()]);
            let tx_id = TransactionId::new(sha256_hex(&[b"tx", tx_hash.as_bytes()]));
            let finalized = FinalizedTxData {
                tx_id: tx_id.clone(),
                tx_hash,
                block_height,
            };
            chain.finalized.insert(tx_id, finalized.clone());
            finalized
        };

        debug!(
            "Block {} includes transaction {}",
            finalized.block_height, finalized.tx_id
        );
        self.height_tx.send_replace(finalized.block_height);
        Ok(finalized)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct WalletKeys {
    address: String,
    coin_public_key: String,
    encryption_public_key: String,
}

impl WalletKeys {
    fn derive(seed: &WalletSeed) -> Self {
        let seed = seed.to_bytes();
        Self {
            address: sha256_hex(&[b"address", &seed]),
            coin_public_key: sha256_hex(&[b"coin", &seed]),
            encryption_public_key: sha256_hex(&[b"encryption", &seed]),
        }
    }
}

#[derive(Debug, Default)]
struct WalletLedger {
    balance: u128,
    history: Vec<TransactionId>,
}

/// On-disk form of a devnet wallet
#[derive(Debug, Serialize, Deserialize)]
struct SerializedWallet {
    offset: u64,
    address: String,
    balances: BTreeMap<TokenId, String>,
    #[serde(default)]
    tx_history: Vec<TransactionId>,
}

#[derive(Debug)]
struct WalletCore {
    node: Arc<DevnetNode>,
    keys: WalletKeys,
    offset: AtomicU64,
    ledger: Mutex<WalletLedger>,
    state_tx: watch::Sender<WalletState>,
    step: Duration,
}

impl WalletCore {
    /// Apply one block, or re-anchor to the tip when ahead of it. Returns
    /// whether the wallet is caught up.
    fn sync_step(&self) -> bool {
        let height = self.node.height();
        let offset = self.offset.load(Ordering::SeqCst);
        let next = match offset.cmp(&height) {
            CmpOrdering::Less => offset + 1,
            CmpOrdering::Equal | CmpOrdering::Greater => height,
        };
        self.offset.store(next, Ordering::SeqCst);
        self.publish(next, height);
        next == height
    }

    fn publish(&self, offset: u64, height: u64) {
        let synced = offset == height;
        let (balance, history) = {
            let mut ledger = self.ledger.lock();
            if synced {
                ledger.balance = self.node.balance_of(&self.keys.address);
            }
            (ledger.balance, ledger.history.clone())
        };

        let mut balances = Balances::new();
        balances.insert(TokenId::native(), balance);

        self.state_tx.send_replace(WalletState {
            address: self.keys.address.clone(),
            coin_public_key: self.keys.coin_public_key.clone(),
            encryption_public_key: self.keys.encryption_public_key.clone(),
            balances,
            sync_progress: Some(SyncProgress {
                synced,
                lag: SyncLag {
                    apply_gap: height.saturating_sub(offset),
                    source_gap: 0,
                },
            }),
            transaction_history: history,
        });
    }
}

async fn run_sync(core: Arc<WalletCore>) {
    let mut heights = core.node.subscribe_height();
    loop {
        heights.mark_unchanged();
        if core.sync_step() {
            if heights.changed().await.is_err() {
                break;
            }
        } else {
            tokio::time::sleep(core.step).await;
        }
    }
}

/// Wallet client against a [`DevnetNode`]
#[derive(Debug)]
pub struct DevnetWallet {
    core: Arc<WalletCore>,
    sync_task: Mutex<Option<JoinHandle<()>>>,
}

impl DevnetWallet {
    fn new(node: Arc<DevnetNode>, keys: WalletKeys, offset: u64, ledger: WalletLedger) -> Self {
        let mut balances = Balances::new();
        balances.insert(TokenId::native(), ledger.balance);
        let (state_tx, _) = watch::channel(WalletState {
            address: keys.address.clone(),
            coin_public_key: keys.coin_public_key.clone(),
            encryption_public_key: keys.encryption_public_key.clone(),
            balances,
            sync_progress: None,
            transaction_history: ledger.history.clone(),
        });
        let step = Duration::from_millis(node.config().sync_step_millis);

        Self {
            core: Arc::new(WalletCore {
                node,
                keys,
                offset: AtomicU64::new(offset),
                ledger: Mutex::new(ledger),
                state_tx,
                step,
            }),
            sync_task: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.core.keys.address
    }

    /// Last block this wallet has applied
    pub fn offset(&self) -> u64 {
        self.core.offset.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        if let Some(task) = self.sync_task.lock().take() {
            task.abort();
        }
    }
}

impl Drop for DevnetWallet {
    fn drop(&mut self) {
        self.stop();
    }
}

#[async_trait]
impl Wallet for DevnetWallet {
    fn state(&self) -> watch::Receiver<WalletState> {
        self.core.state_tx.subscribe()
    }

    async fn balance_transaction(
        &self,
        tx: UnbalancedTransaction,
        new_coins: Vec<CoinInfo>,
    ) -> Result<BalancedTransaction> {
        let fee = self.core.node.config().tx_fee;
        let available = self.core.node.balance_of(self.address());
        if available < fee {
            return Err(ClientError::InsufficientFunds {
                required: fee,
                available,
            });
        }

        Ok(BalancedTransaction {
            payload: tx.payload,
            payer: self.address().to_string(),
            fee,
            new_coins,
            proof: None,
        })
    }

    async fn prove_transaction(&self, mut tx: BalancedTransaction) -> Result<BalancedTransaction> {
        let mut hasher = Sha256::new();
        hasher.update(&tx.payload);
        hasher.update(tx.payer.as_bytes());
        tx.proof = Some(hasher.finalize().to_vec());
        Ok(tx)
    }

    async fn submit_transaction(&self, tx: BalancedTransaction) -> Result<TransactionId> {
        if tx.payer != self.address() {
            return Err(ClientError::Wallet(format!(
                "transaction is paid by {}, not this wallet",
                tx.payer
            )));
        }

        let finalized = self.core.node.submit(&tx)?;
        self.core.ledger.lock().history.push(finalized.tx_id.clone());
        Ok(finalized.tx_id)
    }

    async fn serialize_state(&self) -> Result<String> {
        let serialized = {
            let ledger = self.core.ledger.lock();
            let mut balances = BTreeMap::new();
            balances.insert(TokenId::native(), ledger.balance.to_string());
            SerializedWallet {
                offset: self.offset(),
                address: self.address().to_string(),
                balances,
                tx_history: ledger.history.clone(),
            }
        };
        Ok(serde_json::to_string(&serialized)?)
    }

    fn start(&self) {
        let mut task = self.sync_task.lock();
        if task.is_none() {
            *task = Some(tokio::spawn(run_sync(Arc::clone(&self.core))));
        }
    }

    async fn close(&self) -> Result<()> {
        self.stop();
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DevnetWalletBuilder {
    node: Arc<DevnetNode>,
}

impl DevnetWalletBuilder {
    #[must_use]
    pub const fn new(node: Arc<DevnetNode>) -> Self {
        Self { node }
    }
}

#[async_trait]
impl WalletBuilder for DevnetWalletBuilder {
    async fn build_from_seed(&self, seed: &WalletSeed) -> Result<Arc<dyn Wallet>> {
        let keys = WalletKeys::derive(seed);

        let config = self.node.config();
        if config.faucet && self.node.balance_of(&keys.address) == 0 {
            info!(
                "Devnet faucet sending {} to {}",
                config.faucet_amount, keys.address
            );
            self.node.credit(&keys.address, config.faucet_amount);
        }

        Ok(Arc::new(DevnetWallet::new(
            Arc::clone(&self.node),
            keys,
            0,
            WalletLedger::default(),
        )))
    }

    async fn restore(&self, seed: &WalletSeed, snapshot: &WalletSnapshot) -> Result<Arc<dyn Wallet>> {
        let keys = WalletKeys::derive(seed);
        let serialized: SerializedWallet = serde_json::from_str(snapshot.as_str())
            .map_err(|e| ClientError::CorruptSnapshot(e.to_string()))?;

        if serialized.address != keys.address {
            return Err(ClientError::Wallet(format!(
                "snapshot belongs to wallet {}",
                serialized.address
            )));
        }

        let balance = match serialized.balances.get(&TokenId::native()) {
            Some(amount) => amount
                .parse()
                .map_err(|e| ClientError::CorruptSnapshot(format!("balance {amount}: {e}")))?,
            None => 0,
        };

        Ok(Arc::new(DevnetWallet::new(
            Arc::clone(&self.node),
            keys,
            serialized.offset,
            WalletLedger {
                balance,
                history: serialized.tx_history,
            },
        )))
    }
}

/// Farmer contract runtime and indexer view backed by a [`DevnetNode`]
pub struct DevnetRuntime {
    node: Arc<DevnetNode>,
    witnesses: Arc<dyn FarmerWitnesses>,
}

impl DevnetRuntime {
    pub fn new(node: Arc<DevnetNode>, witnesses: Arc<dyn FarmerWitnesses>) -> Self {
        Self { node, witnesses }
    }

    async fn execute(
        &self,
        wallet: &WalletAndMidnightProvider,
        payload: Vec<u8>,
    ) -> Result<FinalizedTxData> {
        let proven = wallet
            .balance_tx(UnbalancedTransaction { payload }, Vec::new())
            .await?;
        let tx_id = wallet.submit_tx(proven).await?;
        self.watch_for_tx_data(&tx_id).await
    }
}

impl std::fmt::Debug for DevnetRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevnetRuntime")
            .field("node", &self.node)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ContractRuntime for DevnetRuntime {
    async fn deploy(&self, wallet: &WalletAndMidnightProvider) -> Result<DeployTxData> {
        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);

        let payload = serde_json::to_vec(&DevnetTx::Deploy {
            operations: FarmerCircuit::ALL
                .iter()
                .map(|circuit| circuit.name().to_string())
                .collect(),
            salt: hex::encode(salt),
        })?;
        let contract_address = contract_address_for(&payload);

        let tx = self.execute(wallet, payload).await?;
        Ok(DeployTxData {
            contract_address,
            tx,
        })
    }

    async fn call(
        &self,
        wallet: &WalletAndMidnightProvider,
        address: &ContractAddress,
        call: CircuitCall,
    ) -> Result<FinalizedTxData> {
        let witness = matches!(call, CircuitCall::TestFarmerRegistration)
            .then(|| SelfTestWitness::from_witnesses(self.witnesses.as_ref()));

        let payload = serde_json::to_vec(&DevnetTx::Invoke {
            address: address.clone(),
            call,
            witness,
        })?;
        self.execute(wallet, payload).await
    }
}

#[async_trait]
impl PublicDataProvider for DevnetRuntime {
    async fn query_contract_state(&self, address: &ContractAddress) -> Result<Option<ContractState>> {
        self.node.contract_state(address)
    }

    async fn watch_for_tx_data(&self, tx_id: &TransactionId) -> Result<FinalizedTxData> {
        let mut heights = self.node.subscribe_height();
        loop {
            if let Some(data) = self.node.finalized(tx_id) {
                return Ok(data);
            }
            heights
                .changed()
                .await
                .map_err(|_| ClientError::Contract("devnet node stopped".to_string()))?;
        }
    }
}

/// A node plus the collaborators built on it
#[derive(Debug, Clone)]
pub struct Devnet {
    node: Arc<DevnetNode>,
    runtime: Arc<DevnetRuntime>,
}

impl Devnet {
    #[must_use]
    pub fn new(config: DevnetConfig) -> Self {
        Self::with_witnesses(config, Arc::new(TestWitnesses))
    }

    #[must_use]
    pub fn with_witnesses(config: DevnetConfig, witnesses: Arc<dyn FarmerWitnesses>) -> Self {
        let node = DevnetNode::new(config);
        let runtime = Arc::new(DevnetRuntime::new(Arc::clone(&node), witnesses));
        Self { node, runtime }
    }

    #[must_use]
    pub const fn node(&self) -> &Arc<DevnetNode> {
        &self.node
    }

    #[must_use]
    pub fn backend(&self) -> Backend {
        Backend {
            wallet_builder: Arc::new(DevnetWalletBuilder::new(Arc::clone(&self.node))),
            runtime: self.runtime.clone(),
            public_data: self.runtime.clone(),
        }
    }
}
