//! An in-memory chain for exercising deployments without a node.

use {
    crate::{
        network::NetworkProfile,
        traits::{ChainClient, ChainConnector, ChainError, Confirmation, TxStatus},
    },
    alloy::{
        primitives::{Address, B256, Bytes, U256, keccak256},
        signers::local::PrivateKeySigner,
    },
    std::{
        collections::{HashMap, VecDeque},
        sync::{
            Arc,
            Mutex,
            atomic::{AtomicU64, AtomicUsize, Ordering},
        },
        time::Duration,
    },
};

/// Misbehaviour to inject into the next deployment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    /// The node is unreachable when the transaction is sent.
    TransportOnSubmit,
    /// The node refuses the transaction.
    RejectOnSubmit,
    /// The connection drops while waiting for the receipt.
    TransportOnConfirm,
    /// The transaction is mined but reverts.
    Revert,
    /// The receipt has no contract address.
    MissingContractAddress,
    /// The transaction is never mined.
    Stall,
}

struct Mined {
    confirmation: Confirmation,
    stall: bool,
}

#[derive(Default)]
struct State {
    nonces: HashMap<Address, u64>,
    transactions: HashMap<B256, Mined>,
    faults: VecDeque<Fault>,
}

/// Mines every accepted transaction in its own block. Clones share state.
#[derive(Clone)]
pub struct InMemoryChain {
    chain_id: u64,
    balance: U256,
    confirmation_delay: Option<Duration>,
    state: Arc<Mutex<State>>,
    block: Arc<AtomicU64>,
    connections: Arc<AtomicUsize>,
    submissions: Arc<AtomicUsize>,
}

impl InMemoryChain {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            balance: U256::from(10).pow(U256::from(18)),
            confirmation_delay: None,
            state: Default::default(),
            block: Arc::new(AtomicU64::new(1)),
            connections: Default::default(),
            submissions: Default::default(),
        }
    }

    /// Balance reported for every account.
    pub fn with_balance(mut self, balance: U256) -> Self {
        self.balance = balance;
        self
    }

    /// Makes every confirmation take `delay`.
    pub fn with_confirmation_delay(mut self, delay: Duration) -> Self {
        self.confirmation_delay = Some(delay);
        self
    }

    /// Queues a fault. Faults apply to deployments in order, one each.
    pub fn inject(&self, fault: Fault) {
        self.lock().faults.push_back(fault);
    }

    /// Number of clients handed out so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Number of deployment transactions the chain accepted or refused.
    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn submit(&self, deployer: Address, bytecode: &Bytes) -> Result<B256, ChainError> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        let fault = state.faults.pop_front();
        match fault {
            Some(Fault::TransportOnSubmit) => {
                return Err(ChainError::Transport("connection refused".into()));
            }
            Some(Fault::RejectOnSubmit) => {
                return Err(ChainError::Rejected(
                    "insufficient funds for gas * price + value".into(),
                ));
            }
            _ => (),
        }

        let nonce = state.nonces.entry(deployer).or_default();
        let contract = deployer.create(*nonce);
        let tx_hash = keccak256(
            [deployer.as_slice(), &nonce.to_be_bytes()[..], &bytecode[..]].concat(),
        );
        *nonce += 1;

        let success = fault != Some(Fault::Revert);
        let confirmation = Confirmation {
            tx_hash,
            block_number: Some(self.block.fetch_add(1, Ordering::SeqCst)),
            contract_address: (success && fault != Some(Fault::MissingContractAddress))
                .then_some(contract),
            success,
        };
        state.transactions.insert(
            tx_hash,
            Mined {
                confirmation,
                stall: fault == Some(Fault::Stall),
            },
        );
        if fault == Some(Fault::TransportOnConfirm) {
            // Re-queued so that the wait for this transaction fails.
            state.faults.push_front(Fault::TransportOnConfirm);
        }
        Ok(tx_hash)
    }

    async fn confirm(&self, tx_hash: B256) -> Result<Confirmation, ChainError> {
        let (confirmation, stall) = {
            let mut state = self.lock();
            if state.faults.front() == Some(&Fault::TransportOnConfirm) {
                state.faults.pop_front();
                return Err(ChainError::Transport("connection reset by peer".into()));
            }
            let mined = state
                .transactions
                .get(&tx_hash)
                .ok_or_else(|| ChainError::Transport(format!("unknown transaction {tx_hash}")))?;
            (mined.confirmation, mined.stall)
        };
        if stall {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.confirmation_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(confirmation)
    }
}

#[async_trait::async_trait]
impl ChainConnector for InMemoryChain {
    async fn connect(
        &self,
        _: &NetworkProfile,
        signer: PrivateKeySigner,
    ) -> Result<Arc<dyn ChainClient>, ChainError> {
        self.connections.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(Client {
            chain: self.clone(),
            deployer: signer.address(),
        }))
    }
}

struct Client {
    chain: InMemoryChain,
    deployer: Address,
}

#[async_trait::async_trait]
impl ChainClient for Client {
    fn deployer(&self) -> Address {
        self.deployer
    }

    async fn chain_id(&self) -> Result<u64, ChainError> {
        Ok(self.chain.chain_id)
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        Ok(self.chain.block.load(Ordering::SeqCst) - 1)
    }

    async fn balance(&self, _: Address) -> Result<U256, ChainError> {
        Ok(self.chain.balance)
    }

    async fn submit_deployment(&self, bytecode: Bytes) -> Result<B256, ChainError> {
        self.chain.submit(self.deployer, &bytecode)
    }

    async fn await_confirmation(&self, tx_hash: B256) -> Result<Confirmation, ChainError> {
        self.chain.confirm(tx_hash).await
    }

    async fn transaction_status(&self, tx_hash: B256) -> Result<Option<TxStatus>, ChainError> {
        Ok(self.chain.lock().transactions.get(&tx_hash).and_then(|mined| {
            (!mined.stall).then_some(match mined.confirmation.success {
                true => TxStatus::Succeeded,
                false => TxStatus::Reverted,
            })
        }))
    }
}
