use {
    crate::traits::ChainError,
    alloy::primitives::{Address, B256},
    std::{path::PathBuf, time::Duration},
    thiserror::Error,
};

/// Exit code for failures that may succeed when retried later.
pub const EXIT_RETRYABLE: u8 = 75;
/// Exit code for every terminal failure.
pub const EXIT_FAILURE: u8 = 1;

/// Everything that can go wrong while deploying a contract or checking a
/// network. The variant name is the error kind reported to operators.
#[derive(Debug, Error, strum::IntoStaticStr)]
pub enum Error {
    #[error("no network profile named {network:?} (known networks: {known})")]
    ProfileNotFound { network: String, known: String },

    #[error("deployment to {network:?} is disabled: {env_var} is unset or empty")]
    SigningKeyMissing { network: String, env_var: String },

    // Never include the key or the parser message, both may echo the secret.
    #[error("the signing key configured for {network:?} is not a valid secp256k1 private key")]
    InvalidSigningKey { network: String },

    #[error(
        "no compiled artifact for {contract:?} under {}; run the contract compiler first",
        dir.display()
    )]
    ArtifactMissing { contract: String, dir: PathBuf },

    #[error("artifact {} for {contract:?} is unusable: {reason}", path.display())]
    ArtifactInvalid {
        contract: String,
        path: PathBuf,
        reason: String,
    },

    #[error("node for {network:?} reports chain ID {actual} but {expected} is configured")]
    ChainIdMismatch {
        network: String,
        expected: u64,
        actual: u64,
    },

    #[error("{0}")]
    NetworkFailure(String),

    #[error("node refused the transaction: {0}")]
    SubmissionRejected(String),

    #[error("deployment transaction {tx_hash} reverted in block {}", block_number.map_or("<unknown>".to_string(), |b| b.to_string()))]
    TransactionReverted {
        tx_hash: B256,
        block_number: Option<u64>,
    },

    #[error("no confirmation within {}", humantime::format_duration(*timeout))]
    DeploymentTimedOut { timeout: Duration },

    #[error(
        "contract deployed at {address} by transaction {tx_hash} but writing {} failed: {source}",
        path.display()
    )]
    RecordWriteFailure {
        address: Address,
        tx_hash: B256,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("a deployment of {contract:?} to {network:?} is already in progress")]
    DeploymentInProgress { contract: String, network: String },

    #[error("invalid configuration: {0:#}")]
    InvalidConfiguration(anyhow::Error),
}

impl Error {
    /// The error kind, e.g. `ArtifactMissing`.
    pub fn kind(&self) -> &'static str {
        self.into()
    }

    /// Only transport level failures are worth retrying. Everything else
    /// either already happened on-chain or will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkFailure(_))
    }

    pub fn exit_code(&self) -> u8 {
        if self.is_retryable() {
            EXIT_RETRYABLE
        } else {
            EXIT_FAILURE
        }
    }
}

impl From<ChainError> for Error {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::Transport(message) => Self::NetworkFailure(message),
            ChainError::Rejected(message) => Self::SubmissionRejected(message),
        }
    }
}
