use {
    alloy::primitives::{Address, B256},
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

/// Proof of one successful deployment, as read by the mobile client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub contract_name: String,
    pub network: String,
    pub chain_id: u64,
    pub address: Address,
    pub transaction_hash: B256,
    pub block_number: Option<u64>,
    pub deployer: Address,
    pub timestamp: DateTime<Utc>,
}
