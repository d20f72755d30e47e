use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::agent::{Agent, AgentRegistry, AgentRole, RunMetadata, TaskType};
use crate::cluster::{ClusterConfig, WriterCriticCluster};
use crate::config::QuillConfig;
use crate::error::{AgentError, ExecutorError};
use crate::executor::{
    AgentSlot, DagExecutionResult, DagExecutor, DagNode, ExecutionOpts, ExecutionStrategy,
    NodePlan, RetryStrategyPlugin,
};
use crate::trace::{ExecutionTracer, TraceExport};

/// Entry point for running task graphs.
///
/// Owns the registry and tracer for its lifetime; every run builds its own
/// executor state. Resolves which agents handle each node, then hands the
/// graph to [`DagExecutor`].
pub struct MultiAgentOrchestrator {
    registry: Arc<AgentRegistry>,
    tracer: Arc<ExecutionTracer>,
    config: QuillConfig,
    retry_strategy: Option<Arc<dyn RetryStrategyPlugin>>,
}

impl MultiAgentOrchestrator {
    pub fn new(config: QuillConfig) -> Self {
        let tracer = Arc::new(ExecutionTracer::from_config(&config.tracer));
        Self::with_parts(Arc::new(AgentRegistry::new()), tracer, config)
    }

    pub fn with_parts(
        registry: Arc<AgentRegistry>,
        tracer: Arc<ExecutionTracer>,
        config: QuillConfig,
    ) -> Self {
        Self {
            registry,
            tracer,
            config: config.normalized(),
            retry_strategy: None,
        }
    }

    pub fn with_retry_strategy(mut self, strategy: Arc<dyn RetryStrategyPlugin>) -> Self {
        self.retry_strategy = Some(strategy);
        self
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn tracer(&self) -> &Arc<ExecutionTracer> {
        &self.tracer
    }

    pub fn config(&self) -> &QuillConfig {
        &self.config
    }

    pub fn register(&self, agent: Arc<dyn Agent>) -> Result<(), AgentError> {
        self.registry.register(agent)
    }

    pub async fn run_graph(
        &self,
        nodes: &[DagNode],
        cluster: &ClusterConfig,
    ) -> Result<DagExecutionResult, ExecutorError> {
        self.run_graph_with(nodes, cluster, RunMetadata::new(), CancellationToken::new())
            .await
    }

    /// Start a run and return the token that cancels it.
    pub fn run_graph_with_cancel<'a>(
        &'a self,
        nodes: &'a [DagNode],
        cluster: &'a ClusterConfig,
        run: RunMetadata,
    ) -> (
        CancellationToken,
        impl Future<Output = Result<DagExecutionResult, ExecutorError>> + Send + 'a,
    ) {
        let cancel = CancellationToken::new();
        let fut = self.run_graph_with(nodes, cluster, run, cancel.clone());
        (cancel, fut)
    }

    pub async fn run_graph_with(
        &self,
        nodes: &[DagNode],
        cluster: &ClusterConfig,
        run: RunMetadata,
        cancel: CancellationToken,
    ) -> Result<DagExecutionResult, ExecutorError> {
        let plans = self.resolve_plans(nodes, cluster);
        self.executor()
            .execute(nodes, &plans, Arc::new(run), cancel)
            .await
    }

    /// Decide, per node, which agent (or writer/critic pair) runs it.
    ///
    /// Pinned ids from the cluster config are checked now: the agent must
    /// exist, support the node's task type and, inside a cluster, have the
    /// role of its seat. Unpinned seats are filled from the registry when
    /// the node is dispatched. Nodes that cannot be staffed get an
    /// `Unresolved` plan and fail individually when reached.
    pub fn resolve_plans(
        &self,
        nodes: &[DagNode],
        cluster: &ClusterConfig,
    ) -> HashMap<String, NodePlan> {
        nodes
            .iter()
            .map(|node| (node.id.clone(), self.resolve_plan(node, cluster)))
            .collect()
    }

    fn resolve_plan(&self, node: &DagNode, cluster: &ClusterConfig) -> NodePlan {
        let task_type = node.task.task_type;
        let policy = cluster.policy(task_type);

        let plan = match node.execution_strategy {
            // Critics accept every task type for review; keep them off
            // drafting work unless nothing else can take it.
            ExecutionStrategy::Single => self
                .slot(
                    policy.and_then(|p| p.agent.as_deref()),
                    task_type,
                    single_role(task_type),
                    false,
                )
                .map(|agent| NodePlan::Single { agent }),
            ExecutionStrategy::Cluster => self
                .slot(
                    policy.and_then(|p| p.writer.as_deref()),
                    task_type,
                    AgentRole::Writer,
                    true,
                )
                .and_then(|writer| {
                    self.slot(
                        policy.and_then(|p| p.critic.as_deref()),
                        task_type,
                        AgentRole::Critic,
                        true,
                    )
                    .map(|critic| NodePlan::Cluster {
                        writer,
                        critic,
                        max_revisions: cluster.max_revisions_for(task_type),
                    })
                }),
        };

        plan.unwrap_or_else(|error| {
            tracing::warn!(node_id = %node.id, %task_type, %error, "no agent for node");
            NodePlan::Unresolved { error }
        })
    }

    fn slot(
        &self,
        pinned: Option<&str>,
        task_type: TaskType,
        role: AgentRole,
        strict_role: bool,
    ) -> Result<AgentSlot, AgentError> {
        let Some(id) = pinned else {
            return Ok(AgentSlot::Select(role));
        };
        let agent = self.registry.get_agent(id)?;
        let incompatible = |reason: String| AgentError::Incompatible {
            agent_id: id.to_string(),
            reason,
        };
        if !agent.capabilities().supports(task_type) {
            return Err(incompatible(format!("does not support {task_type}")));
        }
        if strict_role && agent.role() != role {
            return Err(incompatible(format!(
                "is a {} but the seat needs a {role}",
                agent.role()
            )));
        }
        Ok(AgentSlot::Pinned(id.to_string()))
    }

    fn executor(&self) -> DagExecutor {
        let cluster = Arc::new(WriterCriticCluster::with_defaults(
            self.tracer.clone(),
            &self.config.cluster,
        ));
        let mut builder = DagExecutor::builder(self.registry.clone(), self.tracer.clone())
            .opts(ExecutionOpts::from_config(&self.config.executor))
            .cluster(cluster);
        if let Some(strategy) = &self.retry_strategy {
            builder = builder.retry_strategy(strategy.clone());
        }
        builder.build()
    }

    pub fn export_traces(&self) -> TraceExport {
        self.tracer.export_traces()
    }

    pub fn export_traces_json(&self) -> serde_json::Result<String> {
        self.tracer.export_json()
    }
}

fn single_role(task_type: TaskType) -> AgentRole {
    match task_type {
        TaskType::ReviewSection => AgentRole::Critic,
        _ => AgentRole::Writer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentCapabilities, AgentContext, AgentResult, AgentTask};
    use crate::cluster::TaskPolicy;
    use async_trait::async_trait;

    struct Stub {
        id: String,
        caps: AgentCapabilities,
    }

    #[async_trait]
    impl Agent for Stub {
        fn id(&self) -> &str {
            &self.id
        }

        fn capabilities(&self) -> &AgentCapabilities {
            &self.caps
        }

        async fn execute(
            &self,
            task: &AgentTask,
            _ctx: &AgentContext,
        ) -> Result<AgentResult, AgentError> {
            Ok(AgentResult::completed(&task.id, &self.id, "", 0, 0.0))
        }
    }

    fn stub(id: &str, role: AgentRole, types: &[TaskType]) -> Arc<dyn Agent> {
        Arc::new(Stub {
            id: id.to_string(),
            caps: AgentCapabilities::new(role, types.iter().copied()),
        })
    }

    fn orchestrator() -> MultiAgentOrchestrator {
        let orch = MultiAgentOrchestrator::new(QuillConfig::default());
        orch.register(stub("critic", AgentRole::Critic, &TaskType::ALL)).unwrap();
        orch.register(stub("writer", AgentRole::Writer, &TaskType::ALL)).unwrap();
        orch
    }

    fn node(id: &str, task_type: TaskType) -> DagNode {
        DagNode::single(AgentTask::new(id, task_type, "s", "d"))
    }

    fn pinned_cluster(writer: &str, critic: &str) -> ClusterConfig {
        ClusterConfig::default().with_policy(
            TaskType::WriteSection,
            TaskPolicy {
                writer: Some(writer.into()),
                critic: Some(critic.into()),
                ..TaskPolicy::default()
            },
        )
    }

    #[test]
    fn single_nodes_prefer_the_natural_role() {
        let orch = orchestrator();
        let plans = orch.resolve_plans(
            &[node("w", TaskType::WriteSection), node("r", TaskType::ReviewSection)],
            &ClusterConfig::default(),
        );
        assert_eq!(
            plans["w"],
            NodePlan::Single {
                agent: AgentSlot::Select(AgentRole::Writer)
            }
        );
        assert_eq!(
            plans["r"],
            NodePlan::Single {
                agent: AgentSlot::Select(AgentRole::Critic)
            }
        );
    }

    #[test]
    fn cluster_nodes_pair_writer_and_critic() {
        let orch = orchestrator();
        let cluster = ClusterConfig::default().with_policy(
            TaskType::WriteSection,
            TaskPolicy {
                max_revisions: Some(5),
                ..TaskPolicy::default()
            },
        );
        let plans = orch.resolve_plans(
            &[DagNode::cluster(AgentTask::new("c", TaskType::WriteSection, "s", "d"))],
            &cluster,
        );
        assert_eq!(
            plans["c"],
            NodePlan::Cluster {
                writer: AgentSlot::Select(AgentRole::Writer),
                critic: AgentSlot::Select(AgentRole::Critic),
                max_revisions: 5,
            }
        );
    }

    #[test]
    fn pinned_pair_is_kept() {
        let orch = orchestrator();
        let plans = orch.resolve_plans(
            &[DagNode::cluster(AgentTask::new("c", TaskType::WriteSection, "s", "d"))],
            &pinned_cluster("writer", "critic"),
        );
        assert!(matches!(
            &plans["c"],
            NodePlan::Cluster {
                writer: AgentSlot::Pinned(w),
                critic: AgentSlot::Pinned(c),
                ..
            } if w == "writer" && c == "critic"
        ));
    }

    #[test]
    fn unknown_pinned_agent_is_unresolved() {
        let orch = orchestrator();
        let cluster = ClusterConfig::default().with_policy(
            TaskType::Summarize,
            TaskPolicy {
                agent: Some("ghost".into()),
                ..TaskPolicy::default()
            },
        );
        let plans = orch.resolve_plans(&[node("s", TaskType::Summarize)], &cluster);
        assert!(matches!(
            &plans["s"],
            NodePlan::Unresolved { error: AgentError::NotFound(id) } if id == "ghost"
        ));
    }

    #[test]
    fn critic_pinned_into_writer_seat_is_unresolved() {
        let orch = orchestrator();
        let plans = orch.resolve_plans(
            &[DagNode::cluster(AgentTask::new("c", TaskType::WriteSection, "s", "d"))],
            &pinned_cluster("critic", "critic"),
        );
        assert!(matches!(
            &plans["c"],
            NodePlan::Unresolved {
                error: AgentError::Incompatible { agent_id, .. }
            } if agent_id == "critic"
        ));
    }

    #[test]
    fn pinned_agent_must_support_the_task_type() {
        let orch = orchestrator();
        orch.register(stub("summarizer", AgentRole::Writer, &[TaskType::Summarize])).unwrap();
        let cluster = ClusterConfig::default().with_policy(
            TaskType::WriteSection,
            TaskPolicy {
                agent: Some("summarizer".into()),
                ..TaskPolicy::default()
            },
        );
        let plans = orch.resolve_plans(&[node("w", TaskType::WriteSection)], &cluster);
        match &plans["w"] {
            NodePlan::Unresolved {
                error: AgentError::Incompatible { agent_id, reason },
            } => {
                assert_eq!(agent_id, "summarizer");
                assert!(reason.contains("does not support"));
            }
            other => panic!("unexpected plan {other:?}"),
        }
    }
}
