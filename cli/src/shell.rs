//! Interactive farmer shell.
//!
//! Builds the session wallet, deploys or joins a farmer contract and then
//! loops over the main menu until the user exits or input ends. On the way
//! out the wallet state is saved (when caching) and the wallet is closed.

use farmer_client::{
    configure_providers, AcquiredWallet, Backend, ClientError, Config, ContractSession,
    DeployOrJoin, DeployedFarmerContract, SyncWaiter, WalletAcquirer, WalletSeed,
};
use farmer_lib::{CropRegistration, FarmerRegistration};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info};

pub const DEPLOY_OR_JOIN_QUESTION: &str = "
You can do one of the following:
  1. Deploy a new farmer verification contract
  2. Join an existing farmer verification contract
  3. Exit
Which would you like to do? ";

pub const MAIN_LOOP_QUESTION: &str = "
You can do one of the following:
  1. Register a new farmer
  2. Register a crop for a farmer
  3. Run test farmer registration
  4. Display farmer contract information
  5. Exit
Which would you like to do? ";

pub const WALLET_LOOP_QUESTION: &str = "
You can do one of the following:
  1. Build a fresh wallet
  2. Build wallet from a seed
  3. Exit
Which would you like to do? ";

#[derive(Error, Debug)]
pub enum ShellError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Input error: {0}")]
    Io(#[from] std::io::Error),

    /// End of input, treated as a request to exit
    #[error("Input closed")]
    InputClosed,
}

type ShellResult<T> = Result<T, ShellError>;

/// Line-oriented question/answer over any async reader and writer
pub struct Prompter<R, W> {
    reader: R,
    writer: W,
    closed: bool,
}

impl<R, W> Prompter<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub const fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            closed: false,
        }
    }

    /// Write `prompt` and read one trimmed answer line.
    pub async fn question(&mut self, prompt: &str) -> ShellResult<String> {
        if self.closed {
            return Err(ShellError::InputClosed);
        }

        self.writer.write_all(prompt.as_bytes()).await?;
        self.writer.flush().await?;

        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            self.closed = true;
            return Err(ShellError::InputClosed);
        }
        Ok(line.trim().to_string())
    }

    /// Stop reading input. Later questions fail with `InputClosed`.
    pub async fn close(&mut self) {
        self.closed = true;
        if let Err(e) = self.writer.flush().await {
            error!("Error closing input: {e}");
        }
    }

    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

/// Treat recoverable client errors as a failed menu action rather than the
/// end of the session.
fn recover(action: &str, result: ShellResult<()>) -> ShellResult<()> {
    match result {
        Err(ShellError::Client(e)) if e.is_recoverable() => {
            error!("Failed to {action}: {e}");
            Ok(())
        }
        other => other,
    }
}

pub struct Shell<R, W> {
    prompter: Prompter<R, W>,
    config: Config,
    backend: Backend,
    waiter: Arc<SyncWaiter>,
}

impl<R, W> Shell<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(config: Config, backend: Backend, reader: R, writer: W) -> Self {
        let waiter = Arc::new(SyncWaiter::from_config(&config.sync));
        Self {
            prompter: Prompter::new(reader, writer),
            config,
            backend,
            waiter,
        }
    }

    #[must_use]
    pub fn with_waiter(mut self, waiter: Arc<SyncWaiter>) -> Self {
        self.waiter = waiter;
        self
    }

    pub fn into_output(self) -> W {
        self.prompter.into_parts().1
    }

    /// Run one interactive session. Errors after the wallet is built are
    /// logged and end the session gracefully; only a failure to build the
    /// wallet is returned.
    pub async fn run(&mut self) -> ShellResult<()> {
        let acquirer = WalletAcquirer::from_config(
            &self.config,
            Arc::clone(&self.backend.wallet_builder),
            Arc::clone(&self.waiter),
        );

        let (seed, acquired) = match self.build_wallet(&acquirer).await {
            Ok(Some(built)) => built,
            Ok(None) => return Ok(()),
            Err(ShellError::InputClosed) => {
                info!("Input closed, exiting...");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let session = ContractSession::new(configure_providers(
            Arc::clone(&acquired.wallet),
            &self.backend,
        ));

        match self.main_loop(&session).await {
            Ok(()) => {}
            Err(ShellError::InputClosed) => info!("Input closed, exiting..."),
            Err(e) => {
                error!("Found error '{e}'");
                info!("Exiting...");
                debug!("{e:?}");
            }
        }

        self.shutdown(&acquirer, &seed, &acquired).await;
        Ok(())
    }

    async fn shutdown(&mut self, acquirer: &WalletAcquirer, seed: &WalletSeed, acquired: &AcquiredWallet) {
        self.prompter.close().await;

        match acquirer.store_for(seed) {
            Some(store) => store.save_wallet(acquired.wallet.as_ref()).await,
            None => info!("Not saving cache as sync cache was not defined"),
        }

        if let Err(e) = acquired.wallet.close().await {
            error!("Error closing wallet: {e}");
        }
        info!("Goodbye");
    }

    async fn build_wallet(
        &mut self,
        acquirer: &WalletAcquirer,
    ) -> ShellResult<Option<(WalletSeed, AcquiredWallet)>> {
        if self.config.is_standalone() {
            let seed = WalletSeed::genesis();
            let acquired = acquirer.build_wallet_and_wait_for_funds(&seed).await?;
            return Ok(Some((seed, acquired)));
        }

        loop {
            let choice = self.prompter.question(WALLET_LOOP_QUESTION).await?;
            let seed = match choice.as_str() {
                "1" => {
                    let seed = WalletSeed::random();
                    info!("Your wallet seed is: {}", seed.expose());
                    seed
                }
                "2" => {
                    let raw = self.prompter.question("Enter your wallet seed: ").await?;
                    match raw.parse::<WalletSeed>() {
                        Ok(seed) => seed,
                        Err(e) => {
                            error!("{e}");
                            continue;
                        }
                    }
                }
                "3" => {
                    info!("Exiting...");
                    return Ok(None);
                }
                other => {
                    error!("Invalid choice: {other}");
                    continue;
                }
            };

            let acquired = acquirer.build_wallet_and_wait_for_funds(&seed).await?;
            return Ok(Some((seed, acquired)));
        }
    }

    async fn deploy_or_join(
        &mut self,
        session: &ContractSession,
    ) -> ShellResult<Option<DeployedFarmerContract>> {
        loop {
            let choice = self.prompter.question(DEPLOY_OR_JOIN_QUESTION).await?;
            let request = match choice.as_str() {
                "1" => DeployOrJoin::Deploy,
                "2" => {
                    let raw = self
                        .prompter
                        .question("What is the contract address (in hex)? ")
                        .await?;
                    match raw.parse() {
                        Ok(address) => DeployOrJoin::Join(address),
                        Err(e) => {
                            error!("{e}");
                            continue;
                        }
                    }
                }
                "3" => {
                    info!("Exiting...");
                    DeployOrJoin::Exit
                }
                other => {
                    error!("Invalid choice: {other}");
                    continue;
                }
            };

            return Ok(session.deploy_or_join(request).await?);
        }
    }

    async fn main_loop(&mut self, session: &ContractSession) -> ShellResult<()> {
        let Some(contract) = self.deploy_or_join(session).await? else {
            return Ok(());
        };

        loop {
            let choice = self.prompter.question(MAIN_LOOP_QUESTION).await?;
            match choice.as_str() {
                "1" => {
                    let result = self.register_farmer(session, &contract).await;
                    recover("register farmer", result)?;
                }
                "2" => {
                    let result = self.register_crop(session, &contract).await;
                    recover("register crop", result)?;
                }
                "3" => {
                    let result = session
                        .run_self_test(&contract)
                        .await
                        .map(|_| info!("Test farmer registration completed successfully!"))
                        .map_err(ShellError::from);
                    recover("run test farmer registration", result)?;
                }
                "4" => {
                    session.display_info(&contract).await?;
                }
                "5" => {
                    info!("Exiting...");
                    return Ok(());
                }
                other => error!("Invalid choice: {other}"),
            }
        }
    }

    async fn register_farmer(
        &mut self,
        session: &ContractSession,
        contract: &DeployedFarmerContract,
    ) -> ShellResult<()> {
        info!("Registering a new farmer...");
        let full_name = self.prompter.question("Enter farmer full name: ").await?;
        let region = self.prompter.question("Enter farmer region: ").await?;
        let registration_date = self
            .prompter
            .question("Enter registration date (YYYY-MM-DD): ")
            .await?;

        let registration = FarmerRegistration::from_input(&full_name, &region, &registration_date)
            .map_err(ClientError::from)?;
        let farmer_hash = hex::encode(registration.farmer_hash);
        info!(
            "Calling sign_up with: hash=0x{farmer_hash}, name={}, region={}, date={}",
            registration.full_name, registration.region, registration.registration_date
        );

        session.register_farmer(contract, registration).await?;
        info!("Farmer registration completed successfully! Farmer hash: 0x{farmer_hash}");
        Ok(())
    }

    async fn register_crop(
        &mut self,
        session: &ContractSession,
        contract: &DeployedFarmerContract,
    ) -> ShellResult<()> {
        info!("Registering a crop for a farmer...");
        let farmer_hash = self
            .prompter
            .question("Enter farmer hash (32 bytes hex): ")
            .await?;
        let crop_name = self.prompter.question("Enter crop name: ").await?;
        let planting_date = self
            .prompter
            .question("Enter planting date (YYYY-MM-DD): ")
            .await?;
        let harvest_date = self
            .prompter
            .question("Enter expected harvest date (YYYY-MM-DD): ")
            .await?;
        let crop_type = self
            .prompter
            .question("Enter crop type (1=Grains, 2=Vegetables, 3=Fruits, 4=Legumes): ")
            .await?;

        let crop = CropRegistration::from_input(
            &farmer_hash,
            &crop_name,
            &planting_date,
            &harvest_date,
            &crop_type,
        )
        .map_err(ClientError::from)?;
        let kind = crop
            .crop_kind()
            .map_or_else(|| "unlisted".to_string(), |kind| kind.to_string());
        info!(
            "Calling register_crop with: hash=0x{}, crop={}, planting={}, harvest={}, type={} ({kind})",
            hex::encode(crop.farmer_hash),
            crop.crop_name,
            crop.planting_date,
            crop.expected_harvest_date,
            crop.crop_type
        );

        session.register_crop(contract, crop).await?;
        info!("Crop registration completed successfully!");
        Ok(())
    }
}
