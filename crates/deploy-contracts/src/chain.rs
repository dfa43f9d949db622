//! [`ChainClient`] backed by a JSON-RPC node.

use {
    crate::{
        network::NetworkProfile,
        traits::{ChainClient, ChainConnector, ChainError, Confirmation, TxStatus},
    },
    alloy::{
        network::TransactionBuilder,
        primitives::{Address, B256, Bytes, U256},
        providers::{PendingTransactionBuilder, PendingTransactionError, Provider},
        rpc::types::{TransactionReceipt, TransactionRequest},
        signers::local::PrivateKeySigner,
        transports::TransportError,
    },
    ethrpc::{AlloyProvider, alloy::errors::TransportErrorExt},
    std::sync::Arc,
};

pub struct RpcChainClient {
    provider: AlloyProvider,
    deployer: Address,
}

impl RpcChainClient {
    /// `provider` must sign transactions sent from `deployer`.
    pub fn new(provider: AlloyProvider, deployer: Address) -> Self {
        Self { provider, deployer }
    }
}

#[async_trait::async_trait]
impl ChainClient for RpcChainClient {
    fn deployer(&self) -> Address {
        self.deployer
    }

    async fn chain_id(&self) -> Result<u64, ChainError> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn balance(&self, address: Address) -> Result<U256, ChainError> {
        Ok(self.provider.get_balance(address).await?)
    }

    async fn submit_deployment(&self, bytecode: Bytes) -> Result<B256, ChainError> {
        let tx = TransactionRequest::default()
            .with_from(self.deployer)
            .with_deploy_code(bytecode);
        let pending = self.provider.send_transaction(tx).await?;
        Ok(*pending.tx_hash())
    }

    async fn await_confirmation(&self, tx_hash: B256) -> Result<Confirmation, ChainError> {
        let receipt = PendingTransactionBuilder::new(self.provider.root().clone(), tx_hash)
            .get_receipt()
            .await?;
        Ok(confirmation(&receipt))
    }

    async fn transaction_status(&self, tx_hash: B256) -> Result<Option<TxStatus>, ChainError> {
        let receipt = self.provider.get_transaction_receipt(tx_hash).await?;
        Ok(receipt.map(|receipt| match receipt.status() {
            true => TxStatus::Succeeded,
            false => TxStatus::Reverted,
        }))
    }
}

fn confirmation(receipt: &TransactionReceipt) -> Confirmation {
    Confirmation {
        tx_hash: receipt.transaction_hash,
        block_number: receipt.block_number,
        contract_address: receipt.contract_address,
        success: receipt.status(),
    }
}

impl From<TransportError> for ChainError {
    fn from(err: TransportError) -> Self {
        if err.is_rejection() {
            Self::Rejected(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<PendingTransactionError> for ChainError {
    fn from(err: PendingTransactionError) -> Self {
        match err {
            PendingTransactionError::TransportError(err) => err.into(),
            other => Self::Transport(other.to_string()),
        }
    }
}

/// Connects to the profile's RPC endpoint. Connecting is lazy, the first
/// request is the first contact with the node.
pub struct RpcConnector;

#[async_trait::async_trait]
impl ChainConnector for RpcConnector {
    async fn connect(
        &self,
        profile: &NetworkProfile,
        signer: PrivateKeySigner,
    ) -> Result<Arc<dyn ChainClient>, ChainError> {
        let deployer = signer.address();
        let provider = ethrpc::alloy::provider_with_signer(profile.rpc_url(), Box::new(signer));
        tracing::debug!(network = profile.name(), endpoint = %profile.endpoint(), "connected");
        Ok(Arc::new(RpcChainClient::new(provider, deployer)))
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        alloy::providers::mock::Asserter,
        ethrpc::alloy::{
            errors::{testing_rejection_error, testing_transport_error},
            mocked_provider,
        },
    };

    fn client() -> (RpcChainClient, Asserter) {
        let asserter = Asserter::new();
        let client = RpcChainClient::new(mocked_provider(asserter.clone()), Address::repeat_byte(1));
        (client, asserter)
    }

    #[tokio::test]
    async fn reads_chain_state() {
        let (client, asserter) = client();
        asserter.push_success(&"0x13881");
        asserter.push_success(&"0x2a");
        asserter.push_success(&"0xde0b6b3a7640000");

        assert_eq!(client.chain_id().await.unwrap(), 80001);
        assert_eq!(client.block_number().await.unwrap(), 42);
        assert_eq!(
            client.balance(Address::repeat_byte(1)).await.unwrap(),
            U256::from(10).pow(U256::from(18))
        );
    }

    #[tokio::test]
    async fn unknown_transaction_has_no_status() {
        let (client, asserter) = client();
        asserter.push_success(&serde_json::Value::Null);
        assert_eq!(client.transaction_status(B256::ZERO).await.unwrap(), None);
    }

    #[tokio::test]
    async fn node_errors_are_reported() {
        let (client, asserter) = client();
        asserter.push_failure_msg("header not found");
        assert!(client.block_number().await.is_err());
    }

    #[test]
    fn transport_errors_are_classified() {
        assert!(matches!(
            ChainError::from(testing_transport_error()),
            ChainError::Transport(_)
        ));
        assert!(matches!(
            ChainError::from(testing_rejection_error()),
            ChainError::Rejected(msg) if msg.contains("insufficient funds")
        ));
        assert!(matches!(
            ChainError::from(PendingTransactionError::TransportError(testing_rejection_error())),
            ChainError::Rejected(_)
        ));
    }
}
