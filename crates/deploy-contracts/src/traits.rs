//! Trait definitions for the blockchain boundary.
//!
//! The deployment flow only talks to a chain through these traits so it can
//! be exercised against mocks and the in-memory chain.

use {
    crate::network::NetworkProfile,
    alloy::{
        primitives::{Address, B256, Bytes, U256},
        signers::local::PrivateKeySigner,
    },
    std::sync::Arc,
};

/// Failure reported by a [`ChainClient`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// The node could not be reached or answered with something unusable.
    #[error("{0}")]
    Transport(String),
    /// The node understood the request and refused it.
    #[error("{0}")]
    Rejected(String),
}

/// Outcome of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
    /// Address of the created contract, present for successful contract
    /// creation transactions.
    pub contract_address: Option<Address>,
    pub success: bool,
}

/// On-chain status of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Succeeded,
    Reverted,
}

/// A connection to one chain with one signing account.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ChainClient: Send + Sync {
    /// Address of the account signing deployments.
    fn deployer(&self) -> Address;

    async fn chain_id(&self) -> Result<u64, ChainError>;

    async fn block_number(&self) -> Result<u64, ChainError>;

    async fn balance(&self, address: Address) -> Result<U256, ChainError>;

    /// Signs and broadcasts a contract creation transaction carrying
    /// `bytecode`. Returns as soon as the node accepted it.
    async fn submit_deployment(&self, bytecode: Bytes) -> Result<B256, ChainError>;

    /// Waits until the transaction is included in a block. Does not time out
    /// on its own.
    async fn await_confirmation(&self, tx_hash: B256) -> Result<Confirmation, ChainError>;

    /// Returns `None` while the transaction has no receipt (pending or
    /// unknown to the node).
    async fn transaction_status(&self, tx_hash: B256) -> Result<Option<TxStatus>, ChainError>;
}

/// Creates [`ChainClient`]s for network profiles.
#[async_trait::async_trait]
pub trait ChainConnector: Send + Sync {
    async fn connect(
        &self,
        profile: &NetworkProfile,
        signer: PrivateKeySigner,
    ) -> Result<Arc<dyn ChainClient>, ChainError>;
}
