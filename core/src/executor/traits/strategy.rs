use std::time::Duration;

use crate::error::AgentError;

/// Retry policy for node-local failures.
pub trait RetryStrategyPlugin: Send + Sync {
    fn name(&self) -> &str;

    /// Delay before retry number `attempt` (1-based), or `None` to give up.
    fn next_delay(&self, attempt: u32, error: &AgentError) -> Option<Duration>;

    /// Total attempts allowed, counting the first one.
    fn max_attempts(&self) -> u32;

    fn should_retry(&self, attempt: u32, error: &AgentError) -> bool {
        attempt < self.max_attempts() && !self.is_fatal_error(error)
    }

    fn is_fatal_error(&self, error: &AgentError) -> bool {
        !error.is_retryable()
    }
}
