//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `quill_core::api` instead of reaching into internal modules.

pub use crate::agent::{
    A2AMessage, Agent, AgentCapabilities, AgentContext, AgentRegistry, AgentResult, AgentRole,
    AgentStatus, AgentTask, CriticAgent, CritiquePayload, Generation, GenerationOptions,
    Generator, ModelMode, ModelPreferences, Prompt, RunMetadata, Severity, TaskType, Verdict,
    WriterAgent,
};
pub use crate::cluster::{
    ClusterConfig, ClusterFailure, ClusterOutcome, CritiqueRound, TaskPolicy, WriterCriticCluster,
};
pub use crate::config::{
    load_default, load_from_path, ClusterDefaults, ExecutorConfig, LoggingConfig, QuillConfig,
    RetryConfig, TracerConfig,
};
pub use crate::error::{AgentError, ExecutorError, GenerationError, GenerationFailure};
pub use crate::executor::{
    AgentSlot, DagExecutionResult, DagExecutor, DagNode, ExecutionOpts, ExecutionStrategy, FailedNode,
    FailureReason, NodePlan, NodeStatus, RetryStrategyPlugin, TaskGraph, TraceSummary,
};
pub use crate::orchestrator::MultiAgentOrchestrator;
pub use crate::persist::{SaveOutcome, SectionStore};
pub use crate::trace::{
    AgentStats, EventType, ExecutionEvent, ExecutionTrace, ExecutionTracer, TraceExport,
    TraceStats, TraceStatus,
};
pub use crate::util::word_count;
