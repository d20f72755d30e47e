use serde::{Deserialize, Serialize};

use crate::agent::{AgentRole, AgentTask};
use crate::error::AgentError;

/// Common interface the graph needs from a vertex.
pub trait TaskLike: Clone + Send + Sync {
    fn id(&self) -> &str;
    fn dependencies(&self) -> &[String];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStrategy {
    #[default]
    Single,
    Cluster,
}

/// One vertex of a task graph. Edges are implicit in `depends_on`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DagNode {
    pub id: String,
    pub task: AgentTask,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub execution_strategy: ExecutionStrategy,
}

impl DagNode {
    /// A node whose id is the task id.
    pub fn single(task: AgentTask) -> Self {
        Self {
            id: task.id.clone(),
            task,
            depends_on: Vec::new(),
            execution_strategy: ExecutionStrategy::Single,
        }
    }

    pub fn cluster(task: AgentTask) -> Self {
        Self {
            execution_strategy: ExecutionStrategy::Cluster,
            ..Self::single(task)
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }
}

impl TaskLike for DagNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn dependencies(&self) -> &[String] {
        &self.depends_on
    }
}

/// Who fills one agent position in a node's plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentSlot {
    /// A specific agent, checked for role and capability when planning.
    Pinned(String),
    /// Least-loaded available agent of this role, chosen when the node
    /// is dispatched.
    Select(AgentRole),
}

/// How a node will be executed. Decided before the run starts; agents
/// behind [`AgentSlot::Select`] are picked only when the node is ready.
#[derive(Debug, Clone, PartialEq)]
pub enum NodePlan {
    /// A `Select` slot falls back to any role when none of the preferred
    /// role is free.
    Single {
        agent: AgentSlot,
    },
    Cluster {
        writer: AgentSlot,
        critic: AgentSlot,
        max_revisions: u32,
    },
    /// No agent could be resolved; the node fails when it is reached.
    Unresolved {
        error: AgentError,
    },
}
