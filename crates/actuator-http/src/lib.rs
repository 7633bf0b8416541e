pub mod auth;
pub mod client;
pub mod error;
pub mod retry;
pub mod validator;

// Re-export commonly used types
pub use client::{HttpClient, HttpRequest, HttpResponse, TransportError, USER_AGENT};
pub use error::{HttpError, HttpResult};
pub use retry::{calculate_backoff_delay, is_retryable, should_retry, RetryManager};
pub use validator::{validate_response, ValidationFailure};
