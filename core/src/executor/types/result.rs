use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::agent::AgentResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Success,
    Failed,
    Skipped,
    Cancelled,
}

impl NodeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    Failed { error: String, retryable: bool },
    AgentNotFound { agent_id: String },
    /// Never ran because `blocked_by` (a direct or transitive dependency) failed.
    Skipped { blocked_by: String },
    Cancelled,
}

impl FailureReason {
    pub fn status(&self) -> NodeStatus {
        match self {
            Self::Failed { .. } | Self::AgentNotFound { .. } => NodeStatus::Failed,
            Self::Skipped { .. } => NodeStatus::Skipped,
            Self::Cancelled => NodeStatus::Cancelled,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Failed { error, .. } => error.clone(),
            Self::AgentNotFound { agent_id } => format!("agent not found: {agent_id}"),
            Self::Skipped { blocked_by } => format!("skipped: dependency '{blocked_by}' failed"),
            Self::Cancelled => "cancelled".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedNode {
    pub node_id: String,
    pub reason: FailureReason,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: usize,
    pub quality_warnings: usize,
    pub total_tokens: u64,
    pub total_cost: f64,
}

/// Outcome of one graph run. Every node has an entry in `results` and
/// `statuses`, whatever happened to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DagExecutionResult {
    pub run_id: String,
    pub results: HashMap<String, AgentResult>,
    pub statuses: HashMap<String, NodeStatus>,
    /// Failed, skipped and cancelled nodes in graph order.
    pub failed_nodes: Vec<FailedNode>,
    /// Planned dependency stages, for diagnostics.
    pub stages: Vec<Vec<String>>,
    pub summary: TraceSummary,
    pub duration_ms: u64,
}

impl DagExecutionResult {
    pub fn status(&self, node_id: &str) -> Option<NodeStatus> {
        self.statuses.get(node_id).copied()
    }

    pub fn failure(&self, node_id: &str) -> Option<&FailureReason> {
        self.failed_nodes
            .iter()
            .find(|f| f.node_id == node_id)
            .map(|f| &f.reason)
    }

    /// True when every node succeeded. Quality warnings do not count against it.
    pub fn is_success(&self) -> bool {
        self.failed_nodes.is_empty()
    }
}
