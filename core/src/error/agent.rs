use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a generation call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationFailure {
    RateLimited,
    QuotaExceeded,
    InvalidModel,
    Network,
    Timeout,
    Other,
}

impl GenerationFailure {
    /// Whether a failure of this kind is worth retrying by default.
    pub fn default_retryable(self) -> bool {
        matches!(self, Self::RateLimited | Self::Network | Self::Timeout)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::QuotaExceeded => "quota_exceeded",
            Self::InvalidModel => "invalid_model",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for GenerationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed failure surfaced by a generation backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("generation failed ({reason}): {message}")]
pub struct GenerationError {
    pub reason: GenerationFailure,
    pub message: String,
    pub retryable: bool,
}

impl GenerationError {
    pub fn new(reason: GenerationFailure, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
            retryable: reason.default_retryable(),
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(GenerationFailure::RateLimited, message)
    }

    pub fn quota_exceeded(message: impl Into<String>) -> Self {
        Self::new(GenerationFailure::QuotaExceeded, message)
    }

    pub fn invalid_model(message: impl Into<String>) -> Self {
        Self::new(GenerationFailure::InvalidModel, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(GenerationFailure::Network, message)
    }

    /// Overrides the default retry classification.
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }
}

/// Node-local failures raised by agents, the registry and the cluster protocol.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    #[error("agent not found: {0}")]
    NotFound(String),

    #[error("agent unavailable: {0}")]
    Unavailable(String),

    #[error("agent '{agent_id}' cannot run this node: {reason}")]
    Incompatible { agent_id: String, reason: String },

    #[error("invalid agent registration: {0}")]
    InvalidRegistration(String),

    #[error("unknown task type: {0}")]
    UnknownTaskType(String),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("agent '{agent_id}' timed out after {after_ms}ms")]
    Timeout { agent_id: String, after_ms: u64 },

    #[error("cancelled")]
    Cancelled,

    #[error("unparsable critique: {0}")]
    CritiqueParse(String),

    #[error("agent '{agent_id}' cannot handle a '{kind}' message")]
    UnsupportedMessage { agent_id: String, kind: &'static str },
}

impl AgentError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Generation(e) => e.retryable,
            Self::Timeout { .. } => true,
            _ => false,
        }
    }
}
