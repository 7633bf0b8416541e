//! CLI argument definitions using clap

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "actuator", about = "Actuator - workflow-driven action execution", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Catalog file (YAML or JSON)
    #[arg(long, env = "ACTUATOR_CATALOG", default_value = "./actuator.yaml")]
    pub catalog: String,

    /// Deployment environment actions are matched against
    #[arg(long, env = "ACTUATOR_ENVIRONMENT", default_value = "development")]
    pub environment: String,

    /// Allow any environment variable in catalog `${VAR}` references
    #[arg(long)]
    pub unrestricted_env: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List catalog entries
    List {
        #[command(subcommand)]
        resource: ListResource,
    },

    /// Execute one action for a client
    Execute {
        /// Action id from the catalog
        action_id: String,

        #[arg(long)]
        client_id: String,

        /// Workflow version; defaults to the client's latest workflow document
        #[arg(long)]
        version_id: Option<String>,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Fire actions for the verbs in a client's latest workflow document
    Trigger {
        #[arg(long)]
        client_id: String,

        /// Evaluate trigger conditions without executing
        #[arg(long)]
        dry_run: bool,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Inspect and check credentials
    Credentials {
        #[command(subcommand)]
        command: CredentialCommand,
    },
}

#[derive(Subcommand)]
pub enum ListResource {
    /// List resource types
    ResourceTypes {
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// List actions for the current environment
    Actions {
        /// Only actions bound to this verb
        #[arg(long)]
        verb: Option<String>,

        /// Only actions of this resource type, by name
        #[arg(long)]
        resource_type: Option<String>,

        /// Include inactive actions and other environments
        #[arg(long)]
        all: bool,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Subcommand)]
pub enum CredentialCommand {
    /// List credential summaries (never secrets)
    List {
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Check secret fields for a credential type without storing them
    Validate {
        /// api_key, bearer, basic, oauth2 or custom
        #[arg(long = "type")]
        credential_type: String,

        /// Secret field as key=value; repeatable
        #[arg(long = "secret", value_name = "KEY=VALUE")]
        secrets: Vec<String>,
    },

    /// Decrypt a stored credential and re-validate it
    Test {
        name: String,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum OutputFormat {
    /// Human-readable output
    Text,
    /// Pretty-printed JSON
    Json,
}
