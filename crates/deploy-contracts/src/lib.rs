pub mod arguments;
pub mod artifacts;
pub mod chain;
pub mod cli;
pub mod deployer;
pub mod error;
pub mod network;
pub mod preflight;
pub mod record;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod traits;

pub use {
    deployer::Deployer,
    error::Error,
    record::DeploymentRecord,
};
