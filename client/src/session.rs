use crate::contracts::{CircuitCall, DeployedFarmerContract, FarmerCircuit, FarmerProviders};
use crate::error::{ClientError, Result};
use crate::types::{ContractAddress, FarmerLedgerState, FinalizedTxData};
use farmer_lib::{CropRegistration, FarmerRegistration};
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOrJoin {
    Deploy,
    Join(ContractAddress),
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractInfo {
    pub address: ContractAddress,
    /// `None` when nothing is deployed at `address`
    pub state: Option<FarmerLedgerState>,
}

/// Farmer contract operations on behalf of one wallet
#[derive(Debug, Clone)]
pub struct ContractSession {
    providers: FarmerProviders,
}

impl ContractSession {
    #[must_use]
    pub const fn new(providers: FarmerProviders) -> Self {
        Self { providers }
    }

    #[must_use]
    pub const fn providers(&self) -> &FarmerProviders {
        &self.providers
    }

    pub async fn deploy_or_join(&self, choice: DeployOrJoin) -> Result<Option<DeployedFarmerContract>> {
        match choice {
            DeployOrJoin::Deploy => self.deploy().await.map(Some),
            DeployOrJoin::Join(address) => self.join(&address).await.map(Some),
            DeployOrJoin::Exit => Ok(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn deploy(&self) -> Result<DeployedFarmerContract> {
        info!("Deploying farmer contract...");
        let deployed = self.providers.runtime.deploy(&self.providers.wallet).await?;

        let state = self
            .providers
            .public_data
            .query_contract_state(&deployed.contract_address)
            .await?
            .ok_or_else(|| ClientError::ContractNotFound(deployed.contract_address.to_string()))?;

        let contract =
            DeployedFarmerContract::bind(deployed.contract_address, &state, Some(deployed.tx))?;
        info!("Deployed contract at address: {}", contract.address());
        Ok(contract)
    }

    #[instrument(skip(self))]
    pub async fn join(&self, address: &ContractAddress) -> Result<DeployedFarmerContract> {
        let state = self
            .providers
            .public_data
            .query_contract_state(address)
            .await?
            .ok_or_else(|| ClientError::ContractNotFound(address.to_string()))?;

        let contract = DeployedFarmerContract::bind(address.clone(), &state, None)?;
        info!("Joined contract at address: {}", contract.address());
        Ok(contract)
    }

    #[instrument(skip_all, fields(contract = %contract.address()))]
    pub async fn register_farmer(
        &self,
        contract: &DeployedFarmerContract,
        registration: FarmerRegistration,
    ) -> Result<FinalizedTxData> {
        info!("Registering farmer...");
        let tx = self.invoke(contract, CircuitCall::SignUp(registration)).await?;
        info!(
            "Farmer registration completed! Transaction {} added in block {}",
            tx.tx_id, tx.block_height
        );
        Ok(tx)
    }

    #[instrument(skip_all, fields(contract = %contract.address()))]
    pub async fn register_crop(
        &self,
        contract: &DeployedFarmerContract,
        crop: CropRegistration,
    ) -> Result<FinalizedTxData> {
        info!("Registering crop...");
        let tx = self.invoke(contract, CircuitCall::RegisterCrop(crop)).await?;
        info!(
            "Crop registration completed! Transaction {} added in block {}",
            tx.tx_id, tx.block_height
        );
        Ok(tx)
    }

    #[instrument(skip_all, fields(contract = %contract.address()))]
    pub async fn run_self_test(&self, contract: &DeployedFarmerContract) -> Result<FinalizedTxData> {
        info!("Running test farmer registration...");
        let tx = self
            .invoke(contract, CircuitCall::TestFarmerRegistration)
            .await?;
        info!(
            "Test transaction {} added in block {}",
            tx.tx_id, tx.block_height
        );
        Ok(tx)
    }

    pub async fn display_info(&self, contract: &DeployedFarmerContract) -> Result<ContractInfo> {
        let address = contract.address().clone();
        let state = self
            .providers
            .public_data
            .query_contract_state(&address)
            .await?
            .map(|state| FarmerLedgerState::from_contract_state(&state));

        match &state {
            Some(ledger) => info!(
                "Farmer contract at {address}: registered farmers: {}, total crops: {}",
                ledger.registered_farmers, ledger.total_crops
            ),
            None => info!("There is no farmer contract deployed at {address}."),
        }

        Ok(ContractInfo { address, state })
    }

    async fn invoke(
        &self,
        contract: &DeployedFarmerContract,
        call: CircuitCall,
    ) -> Result<FinalizedTxData> {
        let circuit: FarmerCircuit = call.circuit();
        contract.require(circuit)?;
        self.providers
            .runtime
            .call(&self.providers.wallet, contract.address(), call)
            .await
    }
}
