use crate::error::{ClientError, Result};
use crate::types::{ContractAddress, ContractState, FinalizedTxData, TransactionId};
use crate::wallet::{Wallet, WalletAndMidnightProvider, WalletBuilder};
use async_trait::async_trait;
use farmer_lib::{CropRegistration, FarmerRegistration};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Circuits of the farmer contract this client calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FarmerCircuit {
    SignUp,
    RegisterCrop,
    TestFarmerRegistration,
}

impl FarmerCircuit {
    pub const ALL: [Self; 3] = [Self::SignUp, Self::RegisterCrop, Self::TestFarmerRegistration];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::SignUp => "sign_up",
            Self::RegisterCrop => "register_crop",
            Self::TestFarmerRegistration => "test_farmer_registration",
        }
    }
}

impl fmt::Display for FarmerCircuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A circuit invocation with its public arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "circuit", rename_all = "snake_case")]
pub enum CircuitCall {
    SignUp(FarmerRegistration),
    RegisterCrop(CropRegistration),
    TestFarmerRegistration,
}

impl CircuitCall {
    #[must_use]
    pub const fn circuit(&self) -> FarmerCircuit {
        match self {
            Self::SignUp(_) => FarmerCircuit::SignUp,
            Self::RegisterCrop(_) => FarmerCircuit::RegisterCrop,
            Self::TestFarmerRegistration => FarmerCircuit::TestFarmerRegistration,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployTxData {
    pub contract_address: ContractAddress,
    pub tx: FinalizedTxData,
}

/// Indexer-side view of the chain
#[async_trait]
pub trait PublicDataProvider: Send + Sync {
    async fn query_contract_state(&self, address: &ContractAddress) -> Result<Option<ContractState>>;

    /// Wait until `tx_id` is included in a block.
    async fn watch_for_tx_data(&self, tx_id: &TransactionId) -> Result<FinalizedTxData>;
}

/// Builds, proves and submits transactions for the farmer contract
#[async_trait]
pub trait ContractRuntime: Send + Sync {
    async fn deploy(&self, wallet: &WalletAndMidnightProvider) -> Result<DeployTxData>;

    async fn call(
        &self,
        wallet: &WalletAndMidnightProvider,
        address: &ContractAddress,
        call: CircuitCall,
    ) -> Result<FinalizedTxData>;
}

/// Collaborators a wallet-independent backend supplies
#[derive(Clone)]
pub struct Backend {
    pub wallet_builder: Arc<dyn WalletBuilder>,
    pub runtime: Arc<dyn ContractRuntime>,
    pub public_data: Arc<dyn PublicDataProvider>,
}

#[derive(Clone)]
pub struct FarmerProviders {
    pub public_data: Arc<dyn PublicDataProvider>,
    pub runtime: Arc<dyn ContractRuntime>,
    pub wallet: Arc<WalletAndMidnightProvider>,
}

impl fmt::Debug for FarmerProviders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FarmerProviders")
            .field("wallet", &self.wallet)
            .finish_non_exhaustive()
    }
}

/// Wire the session's wallet to the backend's contract collaborators.
pub fn configure_providers(wallet: Arc<dyn Wallet>, backend: &Backend) -> FarmerProviders {
    FarmerProviders {
        public_data: Arc::clone(&backend.public_data),
        runtime: Arc::clone(&backend.runtime),
        wallet: Arc::new(WalletAndMidnightProvider::new(wallet)),
    }
}

/// Handle to a farmer contract whose circuits have been checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedFarmerContract {
    address: ContractAddress,
    deploy_tx: Option<FinalizedTxData>,
    circuits: BTreeSet<FarmerCircuit>,
}

impl DeployedFarmerContract {
    /// Check that `state` exposes every circuit this client calls.
    pub fn bind(
        address: ContractAddress,
        state: &ContractState,
        deploy_tx: Option<FinalizedTxData>,
    ) -> Result<Self> {
        let mut circuits = BTreeSet::new();
        for circuit in FarmerCircuit::ALL {
            if !state.operations.contains(circuit.name()) {
                return Err(ClientError::ContractShape {
                    circuit: circuit.name(),
                });
            }
            circuits.insert(circuit);
        }

        Ok(Self {
            address,
            deploy_tx,
            circuits,
        })
    }

    #[must_use]
    pub const fn address(&self) -> &ContractAddress {
        &self.address
    }

    /// Deployment transaction, known only for contracts deployed in this session
    #[must_use]
    pub const fn deploy_tx(&self) -> Option<&FinalizedTxData> {
        self.deploy_tx.as_ref()
    }

    /// Re-check `circuit` against the set verified by `bind` before a call.
    /// A handle from `bind` always passes; the check guards handles built
    /// with a narrower set.
    pub fn require(&self, circuit: FarmerCircuit) -> Result<()> {
        if self.circuits.contains(&circuit) {
            Ok(())
        } else {
            Err(ClientError::ContractShape {
                circuit: circuit.name(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state_with(operations: &[&str]) -> ContractState {
        ContractState {
            operations: operations.iter().map(|op| (*op).to_string()).collect(),
            data: json!({}),
        }
    }

    #[test]
    fn test_bind_accepts_full_contract() {
        let address: ContractAddress = "aa01".parse().unwrap();
        let contract = DeployedFarmerContract::bind(
            address.clone(),
            &state_with(&["sign_up", "register_crop", "test_farmer_registration", "extra"]),
            None,
        )
        .unwrap();

        assert_eq!(contract.address(), &address);
        for circuit in FarmerCircuit::ALL {
            contract.require(circuit).unwrap();
        }
    }

    #[test]
    fn test_require_rejects_unverified_circuit() {
        let contract = DeployedFarmerContract {
            address: "aa01".parse().unwrap(),
            deploy_tx: None,
            circuits: BTreeSet::from([FarmerCircuit::SignUp]),
        };

        contract.require(FarmerCircuit::SignUp).unwrap();
        let err = contract.require(FarmerCircuit::RegisterCrop).unwrap_err();
        assert!(matches!(
            err,
            ClientError::ContractShape {
                circuit: "register_crop"
            }
        ));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_bind_names_missing_circuit() {
        let err = DeployedFarmerContract::bind(
            "aa01".parse().unwrap(),
            &state_with(&["sign_up", "test_farmer_registration"]),
            None,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            ClientError::ContractShape {
                circuit: "register_crop"
            }
        ));
    }

    #[test]
    fn test_circuit_call_wire_format() {
        let value = serde_json::to_value(CircuitCall::TestFarmerRegistration).unwrap();
        assert_eq!(value, json!({ "circuit": "test_farmer_registration" }));
        assert_eq!(
            CircuitCall::TestFarmerRegistration.circuit(),
            FarmerCircuit::TestFarmerRegistration
        );
    }
}
