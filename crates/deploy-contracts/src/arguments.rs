use {
    crate::network::{NetworkSettings, redacted},
    std::{
        fmt::{self, Display, Formatter},
        path::PathBuf,
        time::Duration,
    },
    tracing::Level,
    url::Url,
};

#[derive(clap::Parser)]
#[clap(version, about = "Deploys compiled contracts and publishes their addresses")]
pub struct Arguments {
    #[clap(flatten)]
    pub logging: LoggingArguments,

    /// RPC endpoint of the Polygon Mumbai network. Defaults to a public demo
    /// endpoint.
    #[clap(long, env)]
    pub polygon_rpc_url: Option<Url>,

    /// Private key deployments are signed with. Deployment is disabled while
    /// it is unset.
    #[clap(long, env, hide_env_values = true)]
    pub private_key: Option<String>,

    /// TOML file with additional network profiles.
    #[clap(long, env)]
    pub networks_config: Option<PathBuf>,

    /// Directory the contract compiler writes its artifacts to.
    #[clap(long, env, default_value = "app/services/contract_artifacts")]
    pub artifacts_dir: PathBuf,

    /// Directory deployment records and ABIs are published to.
    #[clap(long, env, default_value = "deployments")]
    pub output_dir: PathBuf,

    /// Root of the contract sources. When set, artifacts older than their
    /// source are refused.
    #[clap(long, env)]
    pub contracts_root: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(clap::Parser)]
pub struct LoggingArguments {
    #[clap(long, env, default_value = "warn,deploy_contracts=debug,ethrpc=debug")]
    pub log_filter: String,

    /// Events at or below this level go to stderr, the rest to stdout. By
    /// default everything goes to stderr.
    #[clap(long, env)]
    pub log_stderr_threshold: Option<Level>,

    #[clap(long, env)]
    pub use_json_logs: bool,
}

#[derive(clap::Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Deploys a contract and prints its address.
    Deploy {
        /// Name of the compiled contract, e.g. `AgriSmartTraceability`.
        contract: String,

        /// Network profile to deploy to.
        network: String,

        /// Give up waiting for the confirmation after this long.
        #[clap(
            long,
            env = "DEPLOYMENT_TIMEOUT",
            default_value = "5m",
            value_parser = humantime::parse_duration,
        )]
        timeout: Duration,
    },
    /// Checks connectivity, chain ID and deployer balance of a network.
    Check {
        network: String,
    },
}

impl Arguments {
    pub fn network_settings(&self) -> NetworkSettings {
        NetworkSettings {
            polygon_rpc_url: self.polygon_rpc_url.clone(),
            private_key: self.private_key.clone(),
        }
    }
}

impl Display for LoggingArguments {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let Self {
            log_filter,
            log_stderr_threshold,
            use_json_logs,
        } = self;

        writeln!(f, "log_filter: {log_filter}")?;
        display_option(f, "log_stderr_threshold", log_stderr_threshold)?;
        writeln!(f, "use_json_logs: {use_json_logs}")?;
        Ok(())
    }
}

impl Display for Arguments {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let Self {
            logging,
            polygon_rpc_url,
            private_key,
            networks_config,
            artifacts_dir,
            output_dir,
            contracts_root,
            command,
        } = self;

        write!(f, "{logging}")?;
        display_option(f, "polygon_rpc_url", &polygon_rpc_url.as_ref().map(redacted))?;
        display_secret_option(f, "private_key", private_key)?;
        display_option(
            f,
            "networks_config",
            &networks_config.as_ref().map(|path| path.display()),
        )?;
        writeln!(f, "artifacts_dir: {}", artifacts_dir.display())?;
        writeln!(f, "output_dir: {}", output_dir.display())?;
        display_option(
            f,
            "contracts_root",
            &contracts_root.as_ref().map(|path| path.display()),
        )?;
        writeln!(f, "command: {command:?}")?;
        Ok(())
    }
}

fn display_secret_option<T>(f: &mut Formatter<'_>, name: &str, option: &Option<T>) -> fmt::Result {
    display_option(f, name, &option.as_ref().map(|_| "SECRET"))
}

fn display_option(f: &mut Formatter<'_>, name: &str, option: &Option<impl Display>) -> fmt::Result {
    write!(f, "{name}: ")?;
    match option {
        Some(display) => writeln!(f, "{display}"),
        None => writeln!(f, "None"),
    }
}

#[cfg(test)]
mod tests {
    use {super::*, clap::Parser};

    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn parses_deploy_command() {
        let args = Arguments::try_parse_from([
            "deploy-contracts",
            "--private-key",
            KEY,
            "deploy",
            "AgriSmartTraceability",
            "mumbai",
            "--timeout",
            "90s",
        ])
        .unwrap();
        assert_eq!(
            args.command,
            Command::Deploy {
                contract: "AgriSmartTraceability".into(),
                network: "mumbai".into(),
                timeout: Duration::from_secs(90),
            }
        );
        assert_eq!(
            args.artifacts_dir,
            PathBuf::from("app/services/contract_artifacts")
        );
        assert_eq!(args.output_dir, PathBuf::from("deployments"));
    }

    #[test]
    fn display_hides_secrets() {
        let args = Arguments::try_parse_from([
            "deploy-contracts",
            "--private-key",
            KEY,
            "--polygon-rpc-url",
            "https://polygon-mumbai.g.alchemy.com/v2/my-api-key",
            "check",
            "mumbai",
        ])
        .unwrap();
        let printed = args.to_string();
        assert!(printed.contains("private_key: SECRET"));
        assert!(printed.contains("polygon_rpc_url: https://polygon-mumbai.g.alchemy.com\n"));
        assert!(!printed.contains(&KEY[2..]));
        assert!(!printed.contains("my-api-key"));
    }
}
