//! Retry decisions and backoff delays for action calls

use actuator_core::{BackoffStrategy, FailureHandling, RetryConfig};
use std::time::Duration;

use crate::client::HttpResponse;

/// Exponent cap for the exponential strategy
const MAX_EXPONENT: u32 = 10;

/// Decide whether another attempt should follow `attempt` (0-based).
pub fn should_retry(response: &HttpResponse, failure: &FailureHandling, attempt: u32, max_retries: u32) -> bool {
    attempt < max_retries && is_retryable(response, failure)
}

/// Whether the outcome is worth another attempt, ignoring the attempt budget.
pub fn is_retryable(response: &HttpResponse, failure: &FailureHandling) -> bool {
    if response.is_success() {
        return false;
    }
    if response.error.is_none() && failure.retry_on_codes.contains(&response.status) {
        return true;
    }
    response.error.is_some() || response.status >= 500
}

/// Delay to wait after a failed `attempt` (0-based) before the next one.
pub fn calculate_backoff_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let base = config.base_delay_ms;
    let millis = match config.backoff_strategy {
        BackoffStrategy::Fixed => base,
        BackoffStrategy::Linear => {
            let multiplier = config.multiplier.unwrap_or(1.0).max(0.0);
            // f64 -> u64 casts saturate
            (base as f64 * (attempt as f64 + 1.0) * multiplier) as u64
        }
        BackoffStrategy::Exponential | BackoffStrategy::Unrecognized => {
            let factor = 1u64 << attempt.min(MAX_EXPONENT);
            let delay = base.saturating_mul(factor);
            match config.max_delay_ms {
                Some(cap) => delay.min(cap),
                None => delay,
            }
        }
    };
    Duration::from_millis(millis)
}

/// Retry policy bound to one action's configuration
#[derive(Debug, Clone)]
pub struct RetryManager {
    config: RetryConfig,
    failure: FailureHandling,
}

impl RetryManager {
    pub fn new(config: RetryConfig, failure: FailureHandling) -> Self {
        Self { config, failure }
    }

    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    pub fn should_retry(&self, response: &HttpResponse, attempt: u32) -> bool {
        should_retry(response, &self.failure, attempt, self.config.max_retries)
    }

    pub fn is_retryable(&self, response: &HttpResponse) -> bool {
        is_retryable(response, &self.failure)
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        calculate_backoff_delay(attempt, &self.config)
    }
}
