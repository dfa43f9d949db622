//! Connectivity and funding check for a network, run before deploying.

use {
    crate::{deployer::Deployer, error::Error},
    alloy::primitives::{Address, U256, utils::format_ether},
    std::fmt::{self, Display, Formatter},
};

/// Below 0.01 of the native token a deployment will likely run out of gas.
pub const LOW_BALANCE_WEI: u64 = 10_000_000_000_000_000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkReport {
    pub network: String,
    pub endpoint: String,
    pub chain_id: u64,
    pub block_number: u64,
    pub deployer: Address,
    pub balance: U256,
}

impl NetworkReport {
    pub fn low_balance(&self) -> bool {
        self.balance < U256::from(LOW_BALANCE_WEI)
    }
}

impl Display for NetworkReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "network: {}", self.network)?;
        writeln!(f, "endpoint: {}", self.endpoint)?;
        writeln!(f, "chain_id: {}", self.chain_id)?;
        writeln!(f, "block_number: {}", self.block_number)?;
        writeln!(f, "deployer: {}", self.deployer)?;
        write!(f, "balance: {}", format_ether(self.balance))?;
        if self.low_balance() {
            write!(f, " (low, deployment may fail)")?;
        }
        Ok(())
    }
}

impl Deployer {
    /// Verifies that `network` is usable for deployments without sending
    /// any transaction.
    #[tracing::instrument(skip(self))]
    pub async fn check(&self, network: &str) -> Result<NetworkReport, Error> {
        let profile = self.registry.resolve_profile(network)?;
        let signer = profile.signer()?;
        let chain = self.connector.connect(profile, signer).await?;

        let chain_id = chain.chain_id().await?;
        profile.verify_chain_id(chain_id)?;
        let block_number = chain.block_number().await?;
        let deployer = chain.deployer();
        let balance = chain.balance(deployer).await?;

        let report = NetworkReport {
            network: network.to_string(),
            endpoint: profile.endpoint(),
            chain_id,
            block_number,
            deployer,
            balance,
        };
        if report.low_balance() {
            tracing::warn!(
                %deployer,
                balance = %format_ether(balance),
                "deployer balance is low"
            );
        }
        Ok(report)
    }
}
