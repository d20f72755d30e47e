use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuillConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub tracer: TracerConfig,

    #[serde(default)]
    pub cluster: ClusterDefaults,
}

impl QuillConfig {
    /// Clamp values that would make the engine stall or panic.
    pub fn normalized(mut self) -> Self {
        self.executor.max_concurrency = self.executor.max_concurrency.max(1);
        self.tracer.max_traces = self.tracer.max_traces.max(1);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default = "default_logging_file")]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "quill_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Optional directory for log files. If empty or unset, uses OS temp dir.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_file() -> bool {
    false
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: default_logging_file(),
            level: default_logging_level(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Upper bound on nodes executing at the same time.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Timeout applied to each single-agent invocation.
    #[serde(default = "default_node_timeout_ms")]
    pub node_timeout_ms: u64,

    /// Extra attempts granted to retryable failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// How long in-flight nodes may keep running after a cancel request.
    #[serde(default = "default_cancel_grace_ms")]
    pub cancel_grace_ms: u64,

    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_max_concurrency() -> usize {
    3
}

fn default_node_timeout_ms() -> u64 {
    120_000
}

fn default_max_retries() -> u32 {
    2
}

fn default_cancel_grace_ms() -> u64 {
    5_000
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            node_timeout_ms: default_node_timeout_ms(),
            max_retries: default_max_retries(),
            cancel_grace_ms: default_cancel_grace_ms(),
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_retry_strategy")]
    pub strategy: String,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_retry_strategy() -> String {
    "exponential-backoff".to_string()
}

fn default_base_delay_ms() -> u64 {
    200
}

fn default_max_delay_ms() -> u64 {
    5_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            strategy: default_retry_strategy(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracerConfig {
    /// Finished traces kept in memory before the oldest are evicted.
    #[serde(default = "default_max_traces")]
    pub max_traces: usize,
}

fn default_max_traces() -> usize {
    1_000
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            max_traces: default_max_traces(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterDefaults {
    #[serde(default = "default_max_revisions")]
    pub max_revisions: u32,

    /// Critique score (1-10) at or above which a draft is approved.
    #[serde(default = "default_approval_threshold")]
    pub approval_threshold: u8,

    /// Timeout applied to each writer or critic call inside a revision round.
    #[serde(default = "default_round_timeout_ms")]
    pub round_timeout_ms: u64,
}

fn default_max_revisions() -> u32 {
    3
}

fn default_approval_threshold() -> u8 {
    7
}

fn default_round_timeout_ms() -> u64 {
    120_000
}

impl Default for ClusterDefaults {
    fn default() -> Self {
        Self {
            max_revisions: default_max_revisions(),
            approval_threshold: default_approval_threshold(),
            round_timeout_ms: default_round_timeout_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg: QuillConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, QuillConfig::default());
        assert_eq!(cfg.executor.max_concurrency, 3);
        assert_eq!(cfg.cluster.max_revisions, 3);
        assert_eq!(cfg.tracer.max_traces, 1_000);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg: QuillConfig = toml::from_str(
            r#"
            [executor]
            max_concurrency = 8

            [executor.retry]
            strategy = "linear"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.executor.max_concurrency, 8);
        assert_eq!(cfg.executor.max_retries, 2);
        assert_eq!(cfg.executor.retry.strategy, "linear");
        assert_eq!(cfg.executor.retry.base_delay_ms, 200);
    }

    #[test]
    fn normalized_clamps_zero_values() {
        let mut cfg = QuillConfig::default();
        cfg.executor.max_concurrency = 0;
        cfg.tracer.max_traces = 0;
        let cfg = cfg.normalized();
        assert_eq!(cfg.executor.max_concurrency, 1);
        assert_eq!(cfg.tracer.max_traces, 1);
    }
}
