use std::time::Duration;

use crate::config::ExecutorConfig;

/// Knobs for one executor instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOpts {
    pub max_concurrency: usize,
    pub node_timeout: Duration,
    pub max_retries: u32,
    pub cancel_grace: Duration,
}

impl ExecutionOpts {
    pub fn from_config(cfg: &ExecutorConfig) -> Self {
        Self {
            max_concurrency: cfg.max_concurrency.max(1),
            node_timeout: Duration::from_millis(cfg.node_timeout_ms.max(1)),
            max_retries: cfg.max_retries,
            cancel_grace: Duration::from_millis(cfg.cancel_grace_ms),
        }
    }

    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }
}

impl Default for ExecutionOpts {
    fn default() -> Self {
        Self::from_config(&ExecutorConfig::default())
    }
}
