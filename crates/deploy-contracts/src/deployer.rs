use {
    crate::{
        artifacts::ArtifactStore,
        error::Error,
        network::Registry,
        record::DeploymentRecord,
        traits::ChainConnector,
    },
    dashmap::DashSet,
    std::{sync::Arc, time::Duration},
    tracing::instrument,
};

type DeploymentKey = (String, String);

/// Deploys compiled contracts to configured networks. Cheap to clone; clones
/// share the set of deployments in flight.
#[derive(Clone)]
pub struct Deployer {
    pub(crate) registry: Arc<Registry>,
    pub(crate) store: Arc<ArtifactStore>,
    pub(crate) connector: Arc<dyn ChainConnector>,
    in_flight: Arc<DashSet<DeploymentKey>>,
}

impl Deployer {
    pub fn new(
        registry: Registry,
        store: ArtifactStore,
        connector: Arc<dyn ChainConnector>,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            store: Arc::new(store),
            connector,
            in_flight: Default::default(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Deploys `contract` to `network` and publishes the record.
    ///
    /// Waits for the transaction to be mined without any time limit; see
    /// [`Deployer::deploy_with_timeout`]. Dropping the future stops waiting
    /// but cannot recall a transaction that was already broadcast.
    #[instrument(skip(self))]
    pub async fn deploy(&self, contract: &str, network: &str) -> Result<DeploymentRecord, Error> {
        let _guard = self.start(contract, network)?;

        let profile = self.registry.resolve_profile(network)?;
        let signer = profile.signer()?;
        let artifact = self.store.load(contract)?;

        let chain = self.connector.connect(profile, signer).await?;
        let chain_id = chain.chain_id().await?;
        profile.verify_chain_id(chain_id)?;

        let deployer = chain.deployer();
        tracing::info!(
            %deployer,
            endpoint = %profile.endpoint(),
            chain_id,
            "deploying contract"
        );
        let tx_hash = chain.submit_deployment(artifact.bytecode.clone()).await?;
        tracing::info!(?tx_hash, "deployment transaction broadcast");

        let confirmation = chain.await_confirmation(tx_hash).await?;
        if !confirmation.success {
            return Err(Error::TransactionReverted {
                tx_hash,
                block_number: confirmation.block_number,
            });
        }
        let address = confirmation.contract_address.ok_or_else(|| {
            Error::NetworkFailure(format!("receipt of {tx_hash} has no contract address"))
        })?;

        let record = DeploymentRecord {
            contract_name: contract.to_string(),
            network: network.to_string(),
            chain_id,
            address,
            transaction_hash: tx_hash,
            block_number: confirmation.block_number,
            deployer,
            timestamp: chrono::Utc::now(),
        };
        self.store.publish(&record, &artifact.abi)?;
        tracing::info!(%address, block = ?record.block_number, "contract deployed");
        Ok(record)
    }

    /// Like [`Deployer::deploy`] but gives up after `timeout`.
    pub async fn deploy_with_timeout(
        &self,
        contract: &str,
        network: &str,
        timeout: Duration,
    ) -> Result<DeploymentRecord, Error> {
        match tokio::time::timeout(timeout, self.deploy(contract, network)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    contract,
                    network,
                    "gave up waiting; a broadcast transaction may still be mined"
                );
                Err(Error::DeploymentTimedOut { timeout })
            }
        }
    }

    fn start(&self, contract: &str, network: &str) -> Result<InFlight<'_>, Error> {
        let key = (contract.to_string(), network.to_string());
        if !self.in_flight.insert(key.clone()) {
            return Err(Error::DeploymentInProgress {
                contract: key.0,
                network: key.1,
            });
        }
        Ok(InFlight {
            set: &self.in_flight,
            key,
        })
    }
}

/// Marks a deployment as running until dropped.
struct InFlight<'a> {
    set: &'a DashSet<DeploymentKey>,
    key: DeploymentKey,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.key);
    }
}
