use {clap::Parser, std::process::ExitCode};

#[tokio::main]
async fn main() -> ExitCode {
    let args = deploy_contracts::arguments::Arguments::parse();
    let obs_config = observe::Config::new(
        &args.logging.log_filter,
        args.logging.log_stderr_threshold,
        args.logging.use_json_logs,
    );
    observe::tracing::initialize(&obs_config);
    tracing::info!("running deploy-contracts with validated arguments:\n{}", args);
    ExitCode::from(deploy_contracts::cli::run(args).await)
}
