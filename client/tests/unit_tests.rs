#[cfg(test)]
mod tests {
    use farmer_client::{
        configure_providers, AcquisitionState, ClientError, ContractSession, DeployOrJoin, Devnet,
        DevnetConfig, SyncWaiter, Wallet, WalletAcquirer, WalletSeed, WalletSnapshot, WalletStore,
    };
    use farmer_lib::{CropRegistration, FarmerRegistration};
    use serde_json::json;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    use AcquisitionState::{CacheFound, NoCache, Ready, Rebuilding, ResetDetected, RestoredOk, Restoring};

    fn devnet_at(height: u64) -> Devnet {
        Devnet::new(DevnetConfig {
            faucet: false,
            genesis_height: height,
            ..DevnetConfig::default()
        })
    }

    fn acquirer(devnet: &Devnet, cache: Option<&Path>) -> WalletAcquirer {
        WalletAcquirer::new(
            devnet.backend().wallet_builder,
            Arc::new(SyncWaiter::new()),
            cache.map(Path::to_path_buf),
        )
    }

    /// Write a cache file for `seed` claiming the wallet had applied `offset`.
    async fn write_cache(devnet: &Devnet, acquirer: &WalletAcquirer, seed: &WalletSeed, offset: u64) {
        let wallet = devnet
            .backend()
            .wallet_builder
            .build_from_seed(seed)
            .await
            .unwrap();
        let mut raw: serde_json::Value =
            serde_json::from_str(&wallet.serialize_state().await.unwrap()).unwrap();
        raw["offset"] = json!(offset);
        wallet.close().await.unwrap();

        let store = acquirer.store_for(seed).unwrap();
        store.save(&WalletSnapshot::new(raw.to_string())).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_cache_configured_builds_fresh_wallet() {
        let devnet = devnet_at(0);
        let acquired = acquirer(&devnet, None)
            .acquire(&WalletSeed::genesis())
            .await
            .unwrap();

        assert_eq!(acquired.trace, vec![NoCache, Rebuilding, Ready]);
        assert!(!acquired.restored());
        acquired.wallet.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_cache_file_builds_fresh_wallet() {
        let dir = TempDir::new().unwrap();
        let devnet = devnet_at(0);
        let acquired = acquirer(&devnet, Some(dir.path()))
            .acquire(&WalletSeed::genesis())
            .await
            .unwrap();

        assert_eq!(acquired.trace, vec![NoCache, Rebuilding, Ready]);
        acquired.wallet.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_corrupt_cache_falls_back_to_rebuild() {
        let dir = TempDir::new().unwrap();
        let devnet = devnet_at(0);
        let acquirer = acquirer(&devnet, Some(dir.path()));
        let seed = WalletSeed::genesis();
        acquirer
            .store_for(&seed)
            .unwrap()
            .save(&WalletSnapshot::new("definitely not json"))
            .await
            .unwrap();

        let acquired = acquirer.acquire(&seed).await.unwrap();
        assert_eq!(acquired.trace, vec![CacheFound, Rebuilding, Ready]);
        acquired.wallet.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_chain_reset_is_detected() {
        let dir = TempDir::new().unwrap();
        let devnet = devnet_at(98);
        let acquirer = acquirer(&devnet, Some(dir.path()));
        let seed = WalletSeed::genesis();
        write_cache(&devnet, &acquirer, &seed, 100).await;

        let acquired = acquirer.acquire(&seed).await.unwrap();
        assert_eq!(
            acquired.trace,
            vec![CacheFound, Restoring, ResetDetected, Rebuilding, Ready]
        );
        acquired.wallet.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_block_behind_is_not_a_reset() {
        let dir = TempDir::new().unwrap();
        let devnet = devnet_at(99);
        let acquirer = acquirer(&devnet, Some(dir.path()));
        let seed = WalletSeed::genesis();
        write_cache(&devnet, &acquirer, &seed, 100).await;

        let acquired = acquirer.acquire(&seed).await.unwrap();
        assert_eq!(acquired.trace, vec![CacheFound, Restoring, RestoredOk, Ready]);
        assert!(acquired.restored());
        acquired.wallet.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_sync_timeout_falls_back_to_rebuild() {
        let dir = TempDir::new().unwrap();
        let devnet = devnet_at(1_000);
        let acquirer = acquirer(&devnet, Some(dir.path()))
            .with_restore_sync_timeout(Some(Duration::from_secs(1)));
        let seed = WalletSeed::genesis();
        write_cache(&devnet, &acquirer, &seed, 10).await;

        let acquired = acquirer.acquire(&seed).await.unwrap();
        assert_eq!(acquired.trace, vec![CacheFound, Restoring, Rebuilding, Ready]);
        acquired.wallet.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_saved_state_restores_on_next_start() {
        let dir = TempDir::new().unwrap();
        let devnet = devnet_at(5);
        let acquirer = acquirer(&devnet, Some(dir.path()));
        let seed = WalletSeed::genesis();

        let first = acquirer.acquire(&seed).await.unwrap();
        SyncWaiter::new()
            .wait_for_full_sync(first.wallet.state())
            .await
            .unwrap();
        let store: WalletStore = acquirer.store_for(&seed).unwrap();
        store.save_wallet(first.wallet.as_ref()).await;
        first.wallet.close().await.unwrap();

        let snapshot = store.load().await.unwrap().unwrap();
        let header = snapshot.header().unwrap();
        assert_eq!(header.offset, 5);
        assert!(header.address.is_some());

        let second = acquirer.acquire(&seed).await.unwrap();
        assert_eq!(second.trace, vec![CacheFound, Restoring, RestoredOk, Ready]);
        second.wallet.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_wallet_waits_for_faucet_funds() {
        let devnet = Devnet::new(DevnetConfig {
            faucet: true,
            faucet_amount: 750,
            ..DevnetConfig::default()
        });
        let acquirer = WalletAcquirer::new(
            devnet.backend().wallet_builder,
            Arc::new(SyncWaiter::new()),
            None,
        );

        let acquired = acquirer
            .build_wallet_and_wait_for_funds(&WalletSeed::random())
            .await
            .unwrap();
        assert_eq!(acquired.wallet.state().borrow().native_balance(), 750);
        acquired.wallet.close().await.unwrap();
    }

    async fn genesis_session(devnet: &Devnet) -> (ContractSession, Arc<dyn Wallet>) {
        let acquired = acquirer(devnet, None)
            .acquire(&WalletSeed::genesis())
            .await
            .unwrap();
        let providers = configure_providers(Arc::clone(&acquired.wallet), &devnet.backend());
        (ContractSession::new(providers), acquired.wallet)
    }

    #[tokio::test(start_paused = true)]
    async fn test_farmer_contract_lifecycle() {
        let devnet = devnet_at(0);
        let (session, wallet) = genesis_session(&devnet).await;

        let contract = session
            .deploy_or_join(DeployOrJoin::Deploy)
            .await
            .unwrap()
            .unwrap();
        assert!(contract.deploy_tx().is_some());

        let farmer = FarmerRegistration::from_input("Amina Okafor", "Kano", "2024-03-15").unwrap();
        let farmer_hex = hex::encode(farmer.farmer_hash);
        let signed_up = session.register_farmer(&contract, farmer.clone()).await.unwrap();
        assert_eq!(signed_up.tx_hash.len(), 64);

        let crop =
            CropRegistration::from_input(&farmer_hex, "Sorghum", "2024-04-01", "2024-08-15", "3")
                .unwrap();
        let planted = session.register_crop(&contract, crop).await.unwrap();
        assert!(planted.block_height > signed_up.block_height);

        session.run_self_test(&contract).await.unwrap();

        let info = session.display_info(&contract).await.unwrap();
        assert_eq!(&info.address, contract.address());
        let ledger = info.state.unwrap();
        assert_eq!(ledger.registered_farmers, 2);
        assert_eq!(ledger.total_crops, 2);

        let duplicate = session.register_farmer(&contract, farmer).await.unwrap_err();
        assert!(matches!(duplicate, ClientError::TransactionFailed(_)));
        assert!(duplicate.is_recoverable());

        wallet.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_crop_for_unknown_farmer_is_rejected() {
        let devnet = devnet_at(0);
        let (session, wallet) = genesis_session(&devnet).await;
        let contract = session
            .deploy_or_join(DeployOrJoin::Deploy)
            .await
            .unwrap()
            .unwrap();

        let crop = CropRegistration::from_input(
            &format!("0x{}", "7".repeat(64)),
            "Cassava",
            "2024-04-01",
            "2024-12-01",
            "2",
        )
        .unwrap();
        let err = session.register_crop(&contract, crop).await.unwrap_err();
        assert!(matches!(err, ClientError::TransactionFailed(_)));

        wallet.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_checks_contract_shape() {
        let devnet = devnet_at(0);
        let (session, wallet) = genesis_session(&devnet).await;

        let unknown = "ab".repeat(32).parse().unwrap();
        let err = session
            .deploy_or_join(DeployOrJoin::Join(unknown))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::ContractNotFound(_)));

        let partial = devnet
            .node()
            .install_contract(["sign_up", "test_farmer_registration"]);
        let err = session
            .deploy_or_join(DeployOrJoin::Join(partial))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::ContractShape {
                circuit: "register_crop"
            }
        ));

        let complete = devnet.node().install_contract([
            "sign_up",
            "register_crop",
            "test_farmer_registration",
        ]);
        let joined = session
            .deploy_or_join(DeployOrJoin::Join(complete.clone()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(joined.address(), &complete);
        assert!(joined.deploy_tx().is_none());

        assert!(session
            .deploy_or_join(DeployOrJoin::Exit)
            .await
            .unwrap()
            .is_none());

        wallet.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_unfunded_wallet_cannot_deploy() {
        let devnet = devnet_at(0);
        let acquired = acquirer(&devnet, None)
            .acquire(&WalletSeed::random())
            .await
            .unwrap();
        let session =
            ContractSession::new(configure_providers(Arc::clone(&acquired.wallet), &devnet.backend()));

        let err = session.deploy().await.unwrap_err();
        assert!(matches!(err, ClientError::InsufficientFunds { available: 0, .. }));

        acquired.wallet.close().await.unwrap();
    }
}
