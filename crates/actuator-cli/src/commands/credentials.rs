//! Credential inspection commands

use crate::{
    cli::{CredentialCommand, OutputFormat},
    error::CliResult,
    utils::{parse_secret_pairs, print_json, ColoredOutput},
    workspace::Workspace,
};
use actuator_core::CredentialType;
use actuator_runtime::{CredentialManager, CredentialSummary};
use chrono::{DateTime, Utc};

pub struct CredentialsCommand;

impl CredentialsCommand {
    pub async fn run(workspace: &Workspace, command: CredentialCommand) -> CliResult<()> {
        match command {
            CredentialCommand::List { format } => {
                let summaries = workspace.credential_manager()?.list_credentials(None).await?;
                match format {
                    OutputFormat::Text => Self::display_summaries(&summaries),
                    OutputFormat::Json => print_json(&summaries)?,
                }
                Ok(())
            }
            CredentialCommand::Validate { credential_type, secrets } => Self::validate(&credential_type, &secrets),
            CredentialCommand::Test { name } => {
                let summary = workspace.credential_manager()?.test_credentials(&name).await?;
                println!(
                    "{} credential '{}' ({}) decrypts and validates",
                    ColoredOutput::success("ok"),
                    summary.name,
                    summary.credential_type
                );
                Ok(())
            }
        }
    }

    /// Needs no catalog or passphrase.
    pub fn validate(credential_type: &str, secrets: &[String]) -> CliResult<()> {
        let credential_type: CredentialType = credential_type.parse()?;
        let secrets = parse_secret_pairs(secrets)?;
        CredentialManager::validate_credentials(credential_type, &secrets)?;
        println!("{} {} credentials are complete", ColoredOutput::success("ok"), credential_type);
        Ok(())
    }

    fn display_summaries(summaries: &[CredentialSummary]) {
        if summaries.is_empty() {
            println!("{}", ColoredOutput::info("No credentials found"));
            return;
        }
        println!(
            "{:<24} {:<10} {:<14} {:<10} {:<20} {}",
            ColoredOutput::highlight("Name"),
            ColoredOutput::highlight("Type"),
            ColoredOutput::highlight("Environment"),
            ColoredOutput::highlight("State"),
            ColoredOutput::highlight("Expires"),
            ColoredOutput::highlight("Last used")
        );
        println!("{}", "-".repeat(100));
        for summary in summaries {
            let state = match (summary.active, summary.expired) {
                (false, _) => ColoredOutput::dim("inactive"),
                (true, true) => ColoredOutput::warning("expired"),
                (true, false) => ColoredOutput::success("active"),
            };
            let expires = format_timestamp(summary.expires_at);
            let last_used = format_timestamp(summary.last_used_at);
            println!(
                "{:<24} {:<10} {:<14} {:<10} {:<20} {}",
                summary.name, summary.credential_type, summary.environment, state, expires, last_used
            );
        }
    }
}

fn format_timestamp(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.format("%Y-%m-%d %H:%M").to_string()).unwrap_or_else(|| "-".into())
}
