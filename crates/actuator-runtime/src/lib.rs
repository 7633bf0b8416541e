//! Action execution runtime: attribute resolution, credential vault,
//! the execution engine and workflow-change triggers.

pub mod config;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod resolver;
pub mod transform;
pub mod trigger;

// Re-export commonly used types
pub use config::RuntimeConfig;
pub use credentials::{CredentialManager, CredentialSummary};
pub use engine::{ExecutionEngine, ExecutionRequest, ExecutionResult, API_RESPONSE_SOURCE};
pub use error::{RuntimeError, RuntimeResult};
pub use resolver::{build_api_request_payload, AttributeResolver, ResolutionContext, ResolvedInputs};
pub use transform::transform;
pub use trigger::{extract_verbs, PlannedAction, SkippedAction, TriggerFailure, TriggerPlan, TriggerReport};
