pub mod errors;

#[cfg(any(test, feature = "test-util"))]
use alloy::providers::mock;
use {
    crate::AlloyProvider,
    alloy::{
        network::{EthereumWallet, TxSigner},
        primitives::Signature,
        providers::{Provider, ProviderBuilder},
        rpc::client::ClientBuilder,
    },
    url::Url,
};

/// Provider for the node at `url` that fills nonce, gas and chain ID and signs
/// every outgoing transaction with `signer`.
pub fn provider_with_signer(
    url: &Url,
    signer: Box<dyn TxSigner<Signature> + Send + Sync + 'static>,
) -> AlloyProvider {
    let rpc = ClientBuilder::default().http(url.clone());
    let wallet = EthereumWallet::new(signer);

    ProviderBuilder::new()
        .wallet(wallet)
        .connect_client(rpc)
        .erased()
}

/// Provider answering every request with the responses queued on
/// `asserter`. Useful for testing.
#[cfg(any(test, feature = "test-util"))]
pub fn mocked_provider(asserter: mock::Asserter) -> AlloyProvider {
    ProviderBuilder::new()
        .connect_mocked_client(asserter)
        .erased()
}
