use std::time::Duration;

use quill_core::config::RetryConfig;
use quill_core::error::AgentError;
use quill_core::executor::traits::RetryStrategyPlugin;

pub struct ExponentialBackoffPlugin {
    config: RetryConfig,
    max_attempts: u32,
}

pub struct LinearRetryPlugin {
    config: RetryConfig,
    max_attempts: u32,
}

impl ExponentialBackoffPlugin {
    /// `max_attempts` counts the first attempt.
    pub fn new(config: RetryConfig, max_attempts: u32) -> Self {
        Self {
            config,
            max_attempts: max_attempts.max(1),
        }
    }
}

impl LinearRetryPlugin {
    pub fn new(config: RetryConfig, max_attempts: u32) -> Self {
        Self {
            config,
            max_attempts: max_attempts.max(1),
        }
    }
}

impl RetryStrategyPlugin for ExponentialBackoffPlugin {
    fn name(&self) -> &str {
        "exponential-backoff"
    }

    fn next_delay(&self, attempt: u32, _error: &AgentError) -> Option<Duration> {
        if attempt == 0 || attempt >= self.max_attempts {
            return None;
        }
        let exp = 1u64 << (attempt - 1).min(30);
        let delay = self.config.base_delay_ms.saturating_mul(exp);
        let delay = delay.min(self.config.max_delay_ms);
        Some(Duration::from_millis(delay))
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl RetryStrategyPlugin for LinearRetryPlugin {
    fn name(&self) -> &str {
        "linear"
    }

    fn next_delay(&self, attempt: u32, _error: &AgentError) -> Option<Duration> {
        if attempt == 0 || attempt >= self.max_attempts {
            return None;
        }
        let delay = self.config.base_delay_ms.saturating_mul(attempt as u64);
        let delay = delay.min(self.config.max_delay_ms);
        Some(Duration::from_millis(delay))
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::error::GenerationError;

    fn cfg(strategy: &str, base: u64, max: u64) -> RetryConfig {
        RetryConfig {
            strategy: strategy.to_string(),
            base_delay_ms: base,
            max_delay_ms: max,
        }
    }

    fn transient() -> AgentError {
        GenerationError::rate_limited("429").into()
    }

    #[test]
    fn test_exponential_backoff() {
        let plugin = ExponentialBackoffPlugin::new(cfg("exponential-backoff", 100, 1000), 4);
        let err = transient();
        assert_eq!(plugin.next_delay(1, &err).unwrap().as_millis(), 100);
        assert_eq!(plugin.next_delay(2, &err).unwrap().as_millis(), 200);
        assert_eq!(plugin.next_delay(3, &err).unwrap().as_millis(), 400);
        assert_eq!(plugin.next_delay(4, &err), None);
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let plugin = ExponentialBackoffPlugin::new(cfg("exponential-backoff", 400, 1000), 10);
        assert_eq!(plugin.next_delay(5, &transient()).unwrap().as_millis(), 1000);
    }

    #[test]
    fn test_linear_backoff() {
        let plugin = LinearRetryPlugin::new(cfg("linear", 50, 200), 5);
        let err = transient();
        assert_eq!(plugin.next_delay(1, &err).unwrap().as_millis(), 50);
        assert_eq!(plugin.next_delay(3, &err).unwrap().as_millis(), 150);
        assert_eq!(plugin.next_delay(4, &err).unwrap().as_millis(), 200);
    }

    #[test]
    fn fatal_errors_are_not_retried() {
        let plugin = LinearRetryPlugin::new(cfg("linear", 50, 200), 5);
        let quota: AgentError = GenerationError::quota_exceeded("no credits").into();
        assert!(!plugin.should_retry(1, &quota));
        assert!(plugin.should_retry(1, &transient()));
        assert!(!plugin.should_retry(5, &transient()));
    }
}
