//! Command execution and mapping of outcomes to output and exit codes.

use {
    crate::{
        arguments::{Arguments, Command},
        artifacts::ArtifactStore,
        chain::RpcConnector,
        deployer::Deployer,
        error::{EXIT_FAILURE, Error},
        network::{NetworksFile, Registry},
    },
    anyhow::Context,
    std::{io::Write, sync::Arc},
};

/// Exit code after the operator interrupted the process.
pub const EXIT_INTERRUPTED: u8 = 130;

/// Builds the deployer from the command line and runs the command until it
/// finishes or the process receives Ctrl-C.
pub async fn run(args: Arguments) -> u8 {
    let deployer = match deployer(&args).await {
        Ok(deployer) => deployer,
        Err(err) => return report(Error::InvalidConfiguration(err), &mut std::io::stderr()),
    };

    let (mut stdout, mut stderr) = (std::io::stdout(), std::io::stderr());
    tokio::select! {
        code = execute(&deployer, &args.command, &mut stdout, &mut stderr) => code,
        _ = tokio::signal::ctrl_c() => {
            let _ = writeln!(
                std::io::stderr(),
                "interrupted; a deployment transaction that was already broadcast may still be \
                 mined, check the deployer account before retrying"
            );
            EXIT_INTERRUPTED
        }
    }
}

async fn deployer(args: &Arguments) -> anyhow::Result<Deployer> {
    let file = match &args.networks_config {
        Some(path) => Some(NetworksFile::from_path(path).await?),
        None => None,
    };
    let registry = Registry::new(&args.network_settings(), file, |name| {
        std::env::var(name).ok()
    });
    tracing::debug!(networks = ?registry.names().collect::<Vec<_>>(), "loaded network profiles");

    let mut store = ArtifactStore::new(&args.artifacts_dir, &args.output_dir);
    if let Some(root) = &args.contracts_root {
        anyhow::ensure!(
            root.is_dir(),
            "contracts root {} is not a directory",
            root.display()
        );
        store = store.with_contracts_root(root);
    }
    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("cannot create {}", args.output_dir.display()))?;

    Ok(Deployer::new(registry, store, Arc::new(RpcConnector)))
}

/// Runs `command`. The deployed address or the network report goes to
/// `stdout`; failures are written to `stderr` as `<kind>: <message>`.
pub async fn execute(
    deployer: &Deployer,
    command: &Command,
    stdout: &mut impl Write,
    stderr: &mut impl Write,
) -> u8 {
    // The second value is what the operator must not lose if stdout fails.
    let result = match command {
        Command::Deploy {
            contract,
            network,
            timeout,
        } => deployer
            .deploy_with_timeout(contract, network, *timeout)
            .await
            .map(|record| {
                let deployed = format!(
                    "{contract} deployed to {network} at {} by transaction {}",
                    record.address, record.transaction_hash
                );
                (record.address.to_string(), Some(deployed))
            }),
        Command::Check { network } => deployer
            .check(network)
            .await
            .map(|report| (report.to_string(), None)),
    };
    match result {
        Ok((output, deployed)) => match writeln!(stdout, "{output}") {
            Ok(()) => 0,
            Err(err) => {
                tracing::error!(?err, %output, "cannot write to stdout");
                let _ = writeln!(stderr, "cannot write to stdout: {err}");
                if let Some(deployed) = deployed {
                    let _ = writeln!(stderr, "{deployed}; do not deploy it again");
                }
                EXIT_FAILURE
            }
        },
        Err(err) => report(err, stderr),
    }
}

fn report(err: Error, stderr: &mut impl Write) -> u8 {
    tracing::debug!(kind = err.kind(), ?err, "command failed");
    let _ = writeln!(stderr, "{}: {err}", err.kind());
    err.exit_code()
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            error::EXIT_RETRYABLE,
            network::NetworkSettings,
            testing::{Fault, InMemoryChain},
        },
        serde_json::json,
        std::time::Duration,
    };

    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn deployer(dir: &tempfile::TempDir, chain: &InMemoryChain) -> Deployer {
        let artifacts = dir.path().join("artifacts");
        std::fs::create_dir_all(&artifacts).unwrap();
        std::fs::write(
            artifacts.join("AgriSmartTraceability.json"),
            json!({"contractName": "AgriSmartTraceability", "abi": [], "bytecode": "0x6080"})
                .to_string(),
        )
        .unwrap();
        let settings = NetworkSettings {
            polygon_rpc_url: None,
            private_key: Some(KEY.into()),
        };
        Deployer::new(
            Registry::new(&settings, None, |_| None),
            ArtifactStore::new(artifacts, dir.path().join("deployments")),
            Arc::new(chain.clone()),
        )
    }

    fn deploy(network: &str) -> Command {
        Command::Deploy {
            contract: "AgriSmartTraceability".into(),
            network: network.into(),
            timeout: Duration::from_secs(60),
        }
    }

    async fn run(deployer: &Deployer, command: &Command) -> (u8, String, String) {
        let (mut stdout, mut stderr) = (Vec::new(), Vec::new());
        let code = execute(deployer, command, &mut stdout, &mut stderr).await;
        (
            code,
            String::from_utf8(stdout).unwrap(),
            String::from_utf8(stderr).unwrap(),
        )
    }

    #[tokio::test]
    async fn prints_address_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let chain = InMemoryChain::new(80001);
        let (code, stdout, stderr) = run(&deployer(&dir, &chain), &deploy("mumbai")).await;
        assert_eq!(code, 0);
        assert!(stdout.trim().starts_with("0x"));
        assert!(stderr.is_empty());
    }

    #[tokio::test]
    async fn prints_kind_and_message_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let chain = InMemoryChain::new(80001);
        let (code, stdout, stderr) = run(&deployer(&dir, &chain), &deploy("goerli")).await;
        assert_eq!(code, EXIT_FAILURE);
        assert!(stdout.is_empty());
        assert!(stderr.starts_with("ProfileNotFound: "));
    }

    #[tokio::test]
    async fn exit_code_tells_whether_to_retry() {
        let dir = tempfile::tempdir().unwrap();
        let chain = InMemoryChain::new(80001);
        let deployer = deployer(&dir, &chain);

        chain.inject(Fault::TransportOnSubmit);
        let (code, _, stderr) = run(&deployer, &deploy("mumbai")).await;
        assert_eq!(code, EXIT_RETRYABLE);
        assert!(stderr.starts_with("NetworkFailure: "));

        chain.inject(Fault::RejectOnSubmit);
        let (code, _, stderr) = run(&deployer, &deploy("mumbai")).await;
        assert_eq!(code, EXIT_FAILURE);
        assert!(stderr.starts_with("SubmissionRejected: "));
    }

    /// A closed pipe.
    struct Closed;

    impl Write for Closed {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn deployed_address_survives_closed_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let chain = InMemoryChain::new(80001);
        let deployer = deployer(&dir, &chain);
        let mut stderr = Vec::new();

        let code = execute(&deployer, &deploy("mumbai"), &mut Closed, &mut stderr).await;

        assert_eq!(code, EXIT_FAILURE);
        let record = deployer
            .store()
            .latest_record("mumbai", "AgriSmartTraceability")
            .unwrap()
            .unwrap();
        let stderr = String::from_utf8(stderr).unwrap();
        assert!(stderr.contains(&record.address.to_string()));
        assert!(stderr.contains(&record.transaction_hash.to_string()));
    }

    #[tokio::test]
    async fn check_prints_report() {
        let dir = tempfile::tempdir().unwrap();
        let chain = InMemoryChain::new(80001);
        let command = Command::Check {
            network: "mumbai".into(),
        };
        let (code, stdout, _) = run(&deployer(&dir, &chain), &command).await;
        assert_eq!(code, 0);
        assert!(stdout.contains("chain_id: 80001"));
        assert_eq!(chain.submissions(), 0);
    }
}
