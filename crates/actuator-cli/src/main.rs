//! Actuator CLI main entry point

use actuator_cli::{
    cli::{Cli, Commands, CredentialCommand},
    commands::{CredentialsCommand, ExecuteCommand, ListCommand, TriggerCommand},
    env::EnvResolver,
    error::CliResult,
    utils::{init_tracing, ColoredOutput},
    workspace::Workspace,
};
use actuator_runtime::RuntimeConfig;
use clap::Parser;
use tracing::{debug, info};

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{} {}", ColoredOutput::error("Error:"), e);
            1
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose)?;

    if cli.no_color {
        colored::control::set_override(false);
    }

    info!("Actuator CLI v{}", env!("CARGO_PKG_VERSION"));

    // Secret validation works without a catalog
    if let Commands::Credentials { command: CredentialCommand::Validate { credential_type, secrets } } = &cli.command {
        return CredentialsCommand::validate(credential_type, secrets);
    }

    let config = RuntimeConfig::from_env()?;
    debug!(config = ?config, "Loaded runtime configuration");

    let resolver = if cli.unrestricted_env { EnvResolver::unrestricted() } else { EnvResolver::default() };
    let workspace = Workspace::open(&cli.catalog, &cli.environment, &resolver, config).await?;

    match cli.command {
        Commands::List { resource } => ListCommand::run(&workspace, resource).await,

        Commands::Execute { action_id, client_id, version_id, format } => {
            ExecuteCommand::run(&workspace, &action_id, &client_id, version_id, format).await
        }

        Commands::Trigger { client_id, dry_run, format } => {
            TriggerCommand::run(&workspace, &client_id, dry_run, format).await
        }

        Commands::Credentials { command } => CredentialsCommand::run(&workspace, command).await,
    }
}
