use serde::{Deserialize, Serialize};

use super::critique::CritiquePayload;
use super::types::{AgentResult, AgentTask};

/// Messages exchanged between agents inside a cluster.
///
/// Serialized as `{ "type": "...", "payload": { ... } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum A2AMessage {
    /// Work for the receiving agent.
    Task(AgentTask),
    /// A finished draft, addressed to a reviewer.
    Result { task: AgentTask, result: AgentResult },
    /// A reviewer's answer to a `Result`.
    Critique {
        task_id: String,
        critique: CritiquePayload,
        tokens_used: u64,
        cost: f64,
    },
}

impl A2AMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Task(_) => "task",
            Self::Result { .. } => "result",
            Self::Critique { .. } => "critique",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::TaskType;

    #[test]
    fn wire_shape_is_adjacently_tagged() {
        let msg = A2AMessage::Task(AgentTask::new("t", TaskType::Summarize, "s", "sum up"));
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["type"], "task");
        assert_eq!(v["payload"]["id"], "t");

        let critique = A2AMessage::Critique {
            task_id: "t".into(),
            critique: CritiquePayload::approve("fine"),
            tokens_used: 12,
            cost: 0.5,
        };
        let v = serde_json::to_value(&critique).unwrap();
        assert_eq!(v["type"], "critique");
        assert_eq!(v["payload"]["critique"]["verdict"], "approve");
        assert_eq!(critique.kind(), "critique");
    }
}
