pub mod catalog;
pub mod cli;
pub mod commands;
pub mod env;
pub mod error;
pub mod utils;
pub mod workspace;

// Re-export commonly used types
pub use catalog::{CatalogFile, FileFormat};
pub use cli::{Cli, Commands};
pub use env::EnvResolver;
pub use error::{CliError, CliResult};
pub use utils::{init_tracing, ColoredOutput};
pub use workspace::Workspace;
