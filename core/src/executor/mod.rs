//! DAG execution for task graphs
//!
//! # Architecture
//!
//! ```text
//! Vec<DagNode> + plans
//!   ↓
//! TaskGraph::from_tasks() → validate() → detect_cycle(), missing dependencies
//!   ↓
//! TaskGraph::topological_stages() → planned stages (diagnostics only)
//!   ↓
//! DagExecutor::execute() → ready queue + dependency countdown → DagExecutionResult
//! ```

mod engine;
mod graph;
pub mod traits;
pub mod types;

pub use engine::{DagExecutor, DagExecutorBuilder};
pub use graph::TaskGraph;
pub use traits::RetryStrategyPlugin;
pub use types::{
    AgentSlot, DagExecutionResult, DagNode, ExecutionOpts, ExecutionStrategy, FailedNode,
    FailureReason, NodePlan, NodeStatus, TaskLike, TraceSummary,
};
