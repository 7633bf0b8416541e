pub mod credentials;
pub mod execute;
pub mod list;
pub mod trigger;

// Re-export command handlers
pub use credentials::CredentialsCommand;
pub use execute::ExecuteCommand;
pub use list::{ActionFilter, ListCommand};
pub use trigger::TriggerCommand;
