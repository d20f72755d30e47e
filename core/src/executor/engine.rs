use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::agent::{
    Agent, AgentContext, AgentRegistry, AgentResult, LoadGuard, RunMetadata, TaskType,
};
use crate::cluster::WriterCriticCluster;
use crate::error::{AgentError, ExecutorError};
use crate::trace::{EventType, ExecutionTracer, TraceStatus};

use super::graph::TaskGraph;
use super::traits::RetryStrategyPlugin;
use super::types::{
    AgentSlot, DagExecutionResult, DagNode, ExecutionOpts, FailedNode, FailureReason, NodePlan,
    NodeStatus, TraceSummary,
};

/// Tokens and cost spent by a node, whether or not it succeeded.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Usage {
    tokens: u64,
    cost: f64,
}

impl Usage {
    fn add(&mut self, tokens: u64, cost: f64) {
        self.tokens += tokens;
        self.cost += cost;
    }
}

/// Terminal state of one node as seen by the scheduler.
enum NodeOutcome {
    Succeeded(AgentResult),
    Failed(FailureReason, Usage),
}

/// Agents holding a node for the whole of its run, retries included.
/// Dropping the staff releases their load.
enum Staff {
    Single {
        agent: Arc<dyn Agent>,
        _load: LoadGuard,
    },
    Cluster {
        writer: Arc<dyn Agent>,
        critic: Arc<dyn Agent>,
        max_revisions: u32,
        _loads: (LoadGuard, LoadGuard),
    },
}

impl Staff {
    fn trace_agent(&self) -> &str {
        match self {
            Self::Single { agent, .. } => agent.id(),
            Self::Cluster { writer, .. } => writer.id(),
        }
    }
}

/// Execution engine for task dependency graphs
///
/// Readiness is a per-node countdown of unfinished dependencies: a node
/// enters the ready queue when its last dependency succeeds, and at most
/// `max_concurrency` nodes run at once.
pub struct DagExecutor {
    registry: Arc<AgentRegistry>,
    tracer: Arc<ExecutionTracer>,
    cluster: Arc<WriterCriticCluster>,
    opts: ExecutionOpts,
    retry_strategy: Option<Arc<dyn RetryStrategyPlugin>>,
}

pub struct DagExecutorBuilder {
    registry: Arc<AgentRegistry>,
    tracer: Arc<ExecutionTracer>,
    cluster: Option<Arc<WriterCriticCluster>>,
    opts: ExecutionOpts,
    retry_strategy: Option<Arc<dyn RetryStrategyPlugin>>,
}

impl DagExecutor {
    pub fn new(registry: Arc<AgentRegistry>, tracer: Arc<ExecutionTracer>) -> Self {
        Self::builder(registry, tracer).build()
    }

    pub fn builder(registry: Arc<AgentRegistry>, tracer: Arc<ExecutionTracer>) -> DagExecutorBuilder {
        DagExecutorBuilder::new(registry, tracer)
    }

    pub fn opts(&self) -> &ExecutionOpts {
        &self.opts
    }

    /// Validate the graph and run it to completion.
    ///
    /// Structural problems (duplicate ids, missing dependencies, cycles) are
    /// returned before any agent runs. Anything that goes wrong inside a node
    /// is reported in the result instead.
    pub async fn execute(
        &self,
        nodes: &[DagNode],
        plans: &HashMap<String, NodePlan>,
        run: Arc<RunMetadata>,
        cancel: CancellationToken,
    ) -> Result<DagExecutionResult, ExecutorError> {
        let graph = TaskGraph::from_tasks(nodes)?;
        graph.validate()?;
        let stages = graph.topological_stages()?;

        let started = Instant::now();
        tracing::info!(
            run_id = %run.run_id,
            nodes = graph.len(),
            stages = stages.len(),
            max_concurrency = self.opts.max_concurrency,
            "graph run started"
        );

        let ids = graph.node_ids();
        let index: HashMap<&str, usize> =
            ids.iter().enumerate().map(|(i, id)| (id.as_str(), i)).collect();
        let mut remaining: Vec<usize> = ids
            .iter()
            .map(|id| graph.dependencies_of(id).len())
            .collect();
        let mut outcomes: Vec<Option<NodeOutcome>> = ids.iter().map(|_| None).collect();
        let mut ready: VecDeque<usize> = (0..ids.len()).filter(|&i| remaining[i] == 0).collect();
        let mut running: Vec<usize> = Vec::new();
        let mut in_flight: FuturesUnordered<BoxFuture<'_, (usize, NodeOutcome)>> =
            FuturesUnordered::new();
        let mut abandon_at: Option<tokio::time::Instant> = None;

        loop {
            while abandon_at.is_none()
                && !cancel.is_cancelled()
                && in_flight.len() < self.opts.max_concurrency
            {
                let Some(i) = ready.pop_front() else {
                    break;
                };
                if outcomes[i].is_some() {
                    continue;
                }
                let Some(node) = graph.nodes.get(&ids[i]) else {
                    continue;
                };
                let ctx = self.build_context(&graph, node, &outcomes, &index, &run, &cancel);
                let plan = plans.get(&node.id);
                running.push(i);
                in_flight.push(
                    async move { (i, self.run_node(node, plan, ctx).await) }.boxed(),
                );
            }

            if in_flight.is_empty() {
                break;
            }

            tokio::select! {
                biased;
                Some((i, outcome)) = in_flight.next() => {
                    running.retain(|&r| r != i);
                    let succeeded = matches!(outcome, NodeOutcome::Succeeded(_));
                    // Dependents of a node lost to cancellation stay unresolved
                    // and are reported as cancelled, not skipped.
                    let cancelled = cancel.is_cancelled()
                        || matches!(outcome, NodeOutcome::Failed(FailureReason::Cancelled, _));
                    outcomes[i] = Some(outcome);
                    if succeeded {
                        for dependent in graph.dependents_of(&ids[i]) {
                            let Some(&d) = index.get(dependent.as_str()) else {
                                continue;
                            };
                            remaining[d] = remaining[d].saturating_sub(1);
                            if remaining[d] == 0 && outcomes[d].is_none() {
                                ready.push_back(d);
                            }
                        }
                    } else if !cancelled {
                        skip_dependents(&graph, &index, &ids[i], &mut outcomes);
                    }
                }
                _ = cancel.cancelled(), if abandon_at.is_none() => {
                    tracing::warn!(
                        run_id = %run.run_id,
                        in_flight = in_flight.len(),
                        grace_ms = self.opts.cancel_grace.as_millis() as u64,
                        "run cancelled; waiting for in-flight nodes"
                    );
                    abandon_at = Some(tokio::time::Instant::now() + self.opts.cancel_grace);
                }
                _ = sleep_until(abandon_at) => {
                    break;
                }
            }
        }

        // Whatever is still in flight is abandoned with its future.
        drop(in_flight);
        for i in running {
            tracing::warn!(node_id = %ids[i], "abandoning in-flight node");
            self.tracer.add_event(
                &ids[i],
                EventType::Error,
                "abandoned after cancellation grace period",
                None,
            );
            self.tracer
                .end_trace(&ids[i], TraceStatus::Cancelled, 0, 0.0);
            outcomes[i] = Some(NodeOutcome::Failed(FailureReason::Cancelled, Usage::default()));
        }

        let result = self.collect(&graph, stages, outcomes, &run, started);
        tracing::info!(
            run_id = %result.run_id,
            succeeded = result.summary.succeeded,
            failed = result.summary.failed,
            skipped = result.summary.skipped,
            cancelled = result.summary.cancelled,
            duration_ms = result.duration_ms,
            "graph run finished"
        );
        Ok(result)
    }

    fn build_context(
        &self,
        graph: &TaskGraph<DagNode>,
        node: &DagNode,
        outcomes: &[Option<NodeOutcome>],
        index: &HashMap<&str, usize>,
        run: &Arc<RunMetadata>,
        cancel: &CancellationToken,
    ) -> AgentContext {
        let succeeded = |id: &str| -> Option<AgentResult> {
            match index.get(id).and_then(|&i| outcomes[i].as_ref()) {
                Some(NodeOutcome::Succeeded(result)) => Some(result.clone()),
                _ => None,
            }
        };

        let mut dependency_results = BTreeMap::new();
        let mut sibling_results = BTreeMap::new();
        for dep in graph.dependencies_of(&node.id) {
            if let Some(result) = succeeded(dep) {
                dependency_results.insert(dep.clone(), result);
            }
            for sibling in graph.dependents_of(dep) {
                if sibling == &node.id || sibling_results.contains_key(sibling) {
                    continue;
                }
                if let Some(result) = succeeded(sibling) {
                    sibling_results.insert(sibling.clone(), result);
                }
            }
        }

        AgentContext::new(run.clone(), cancel.child_token())
            .with_dependency_results(dependency_results)
            .with_sibling_results(sibling_results)
    }

    /// Run one node with tracing, timeout and retries.
    async fn run_node(
        &self,
        node: &DagNode,
        plan: Option<&NodePlan>,
        ctx: AgentContext,
    ) -> NodeOutcome {
        let staffed = match plan {
            Some(plan) => self.staff(node.task.task_type, plan),
            None => Err(AgentError::NotFound(format!("no plan for node '{}'", node.id))),
        };
        let agent_id = staffed.as_ref().map_or("unresolved", Staff::trace_agent);

        self.tracer.start_trace(&node.id, agent_id);
        tracing::debug!(node_id = %node.id, agent_id, "node started");

        let outcome = match &staffed {
            Ok(staff) => self.attempt_with_retries(node, staff, &ctx).await,
            Err(e) => Err((failure_reason(e.clone()), Usage::default())),
        };

        match outcome {
            Ok(result) => {
                let message = if result.quality_warning {
                    "completed with quality warning"
                } else {
                    "completed"
                };
                self.tracer.add_event(
                    &node.id,
                    EventType::Complete,
                    message,
                    Some(json!({
                        "tokensUsed": result.tokens_used,
                        "revisions": result.revisions,
                    })),
                );
                self.tracer.end_trace(
                    &node.id,
                    TraceStatus::Success,
                    result.tokens_used,
                    result.cost,
                );
                NodeOutcome::Succeeded(result)
            }
            Err((reason, spent)) => {
                self.tracer
                    .add_event(&node.id, EventType::Error, reason.describe(), None);
                let status = if matches!(reason, FailureReason::Cancelled) {
                    TraceStatus::Cancelled
                } else {
                    TraceStatus::Failed
                };
                self.tracer.end_trace(&node.id, status, spent.tokens, spent.cost);
                tracing::warn!(
                    node_id = %node.id,
                    reason = %reason.describe(),
                    tokens_used = spent.tokens,
                    "node failed"
                );
                NodeOutcome::Failed(reason, spent)
            }
        }
    }

    /// Fill the plan's slots from the registry, counting the chosen agents
    /// as busy until the returned staff is dropped.
    fn staff(&self, task_type: TaskType, plan: &NodePlan) -> Result<Staff, AgentError> {
        match plan {
            NodePlan::Unresolved { error } => Err(error.clone()),
            NodePlan::Single { agent } => {
                let (agent, load) = match agent {
                    AgentSlot::Pinned(id) => self.registry.acquire(id)?,
                    AgentSlot::Select(role) => self
                        .registry
                        .acquire_for(task_type, Some(*role))
                        .or_else(|_| self.registry.acquire_for(task_type, None))?,
                };
                Ok(Staff::Single { agent, _load: load })
            }
            NodePlan::Cluster {
                writer,
                critic,
                max_revisions,
            } => {
                let (writer, writer_load) = self.fill(task_type, writer)?;
                let (critic, critic_load) = self.fill(task_type, critic)?;
                Ok(Staff::Cluster {
                    writer,
                    critic,
                    max_revisions: *max_revisions,
                    _loads: (writer_load, critic_load),
                })
            }
        }
    }

    fn fill(
        &self,
        task_type: TaskType,
        slot: &AgentSlot,
    ) -> Result<(Arc<dyn Agent>, LoadGuard), AgentError> {
        match slot {
            AgentSlot::Pinned(id) => self.registry.acquire(id),
            AgentSlot::Select(role) => self.registry.acquire_for(task_type, Some(*role)),
        }
    }

    /// Retry `invoke` per the strategy. Usage from failed attempts is kept:
    /// it is added to the final result, or returned with the failure.
    async fn attempt_with_retries(
        &self,
        node: &DagNode,
        staff: &Staff,
        ctx: &AgentContext,
    ) -> Result<AgentResult, (FailureReason, Usage)> {
        let max_attempts = self.opts.max_retries.saturating_add(1);
        let mut attempt: u32 = 0;
        let mut spent = Usage::default();

        loop {
            attempt += 1;
            let err = match self.invoke(node, staff, ctx).await {
                Ok(mut result) if result.success => {
                    result.tokens_used += spent.tokens;
                    result.cost += spent.cost;
                    return Ok(result);
                }
                Ok(result) => {
                    spent.add(result.tokens_used, result.cost);
                    let error = result
                        .error
                        .unwrap_or_else(|| "agent reported failure".to_string());
                    return Err((
                        FailureReason::Failed {
                            error,
                            retryable: false,
                        },
                        spent,
                    ));
                }
                Err((err, usage)) => {
                    spent.add(usage.tokens, usage.cost);
                    err
                }
            };

            let delay = if attempt < max_attempts && err.is_retryable() {
                match &self.retry_strategy {
                    Some(strategy) if strategy.should_retry(attempt, &err) => {
                        strategy.next_delay(attempt, &err)
                    }
                    Some(_) => None,
                    None => Some(Duration::ZERO),
                }
            } else {
                None
            };

            let Some(delay) = delay else {
                return Err((failure_reason(err), spent));
            };

            tracing::info!(
                node_id = %node.id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retrying node"
            );
            self.tracer.add_event(
                &node.id,
                EventType::Progress,
                format!("retry {attempt}/{} after error: {err}", max_attempts - 1),
                Some(json!({ "attempt": attempt, "delayMs": delay.as_millis() as u64 })),
            );

            tokio::select! {
                _ = ctx.cancellation().cancelled() => return Err((FailureReason::Cancelled, spent)),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn invoke(
        &self,
        node: &DagNode,
        staff: &Staff,
        ctx: &AgentContext,
    ) -> Result<AgentResult, (AgentError, Usage)> {
        if ctx.is_cancelled() {
            return Err((AgentError::Cancelled, Usage::default()));
        }
        match staff {
            Staff::Single { agent, .. } => {
                let timeout = self.opts.node_timeout;
                match tokio::time::timeout(timeout, agent.execute(&node.task, ctx)).await {
                    Ok(res) => res.map_err(|e| (e, Usage::default())),
                    Err(_) => Err((
                        AgentError::Timeout {
                            agent_id: agent.id().to_string(),
                            after_ms: timeout.as_millis() as u64,
                        },
                        Usage::default(),
                    )),
                }
            }
            Staff::Cluster {
                writer,
                critic,
                max_revisions,
                ..
            } => self
                .cluster
                .run(
                    &node.id,
                    &node.task,
                    writer.as_ref(),
                    critic.as_ref(),
                    *max_revisions,
                    ctx,
                )
                .await
                .map(|outcome| outcome.result)
                .map_err(|failure| {
                    (
                        failure.error,
                        Usage {
                            tokens: failure.tokens_used,
                            cost: failure.cost,
                        },
                    )
                }),
        }
    }

    fn collect(
        &self,
        graph: &TaskGraph<DagNode>,
        stages: Vec<Vec<String>>,
        outcomes: Vec<Option<NodeOutcome>>,
        run: &RunMetadata,
        started: Instant,
    ) -> DagExecutionResult {
        let mut results = HashMap::new();
        let mut statuses = HashMap::new();
        let mut failed_nodes = Vec::new();
        let mut summary = TraceSummary::default();

        for (id, outcome) in graph.node_ids().iter().zip(outcomes) {
            let task_id = graph
                .nodes
                .get(id)
                .map(|n| n.task.id.clone())
                .unwrap_or_default();
            // Nodes never reached before cancellation.
            let outcome = outcome
                .unwrap_or(NodeOutcome::Failed(FailureReason::Cancelled, Usage::default()));
            match outcome {
                NodeOutcome::Succeeded(result) => {
                    summary.succeeded += 1;
                    if result.quality_warning {
                        summary.quality_warnings += 1;
                    }
                    summary.total_tokens += result.tokens_used;
                    summary.total_cost += result.cost;
                    statuses.insert(id.clone(), NodeStatus::Success);
                    results.insert(id.clone(), result);
                }
                NodeOutcome::Failed(reason, spent) => {
                    summary.total_tokens += spent.tokens;
                    summary.total_cost += spent.cost;
                    let status = reason.status();
                    match status {
                        NodeStatus::Failed => summary.failed += 1,
                        NodeStatus::Skipped => summary.skipped += 1,
                        NodeStatus::Cancelled => summary.cancelled += 1,
                        NodeStatus::Success => {}
                    }
                    statuses.insert(id.clone(), status);
                    let mut failed = AgentResult::failed(task_id, "", reason.describe());
                    failed.tokens_used = spent.tokens;
                    failed.cost = spent.cost;
                    results.insert(id.clone(), failed);
                    failed_nodes.push(FailedNode {
                        node_id: id.clone(),
                        reason,
                    });
                }
            }
        }

        DagExecutionResult {
            run_id: run.run_id.clone(),
            results,
            statuses,
            failed_nodes,
            stages,
            summary,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }
}

impl DagExecutorBuilder {
    pub fn new(registry: Arc<AgentRegistry>, tracer: Arc<ExecutionTracer>) -> Self {
        Self {
            registry,
            tracer,
            cluster: None,
            opts: ExecutionOpts::default(),
            retry_strategy: None,
        }
    }

    pub fn opts(mut self, opts: ExecutionOpts) -> Self {
        self.opts = opts;
        self
    }

    pub fn cluster(mut self, cluster: Arc<WriterCriticCluster>) -> Self {
        self.cluster = Some(cluster);
        self
    }

    pub fn retry_strategy(mut self, strategy: Arc<dyn RetryStrategyPlugin>) -> Self {
        self.retry_strategy = Some(strategy);
        self
    }

    pub fn build(self) -> DagExecutor {
        let cluster = self.cluster.unwrap_or_else(|| {
            Arc::new(WriterCriticCluster::new(self.tracer.clone()))
        });
        DagExecutor {
            registry: self.registry,
            tracer: self.tracer,
            cluster,
            opts: self.opts,
            retry_strategy: self.retry_strategy,
        }
    }
}

/// Mark every not-yet-finished node downstream of `failed_id` as skipped.
fn skip_dependents(
    graph: &TaskGraph<DagNode>,
    index: &HashMap<&str, usize>,
    failed_id: &str,
    outcomes: &mut [Option<NodeOutcome>],
) {
    let mut queue: VecDeque<&str> = graph
        .dependents_of(failed_id)
        .iter()
        .map(String::as_str)
        .collect();
    while let Some(id) = queue.pop_front() {
        let Some(&i) = index.get(id) else {
            continue;
        };
        if outcomes[i].is_some() {
            continue;
        }
        tracing::info!(node_id = id, blocked_by = failed_id, "skipping node");
        outcomes[i] = Some(NodeOutcome::Failed(
            FailureReason::Skipped {
                blocked_by: failed_id.to_string(),
            },
            Usage::default(),
        ));
        queue.extend(graph.dependents_of(id).iter().map(String::as_str));
    }
}

fn failure_reason(err: AgentError) -> FailureReason {
    match err {
        AgentError::NotFound(agent_id) => FailureReason::AgentNotFound { agent_id },
        AgentError::Cancelled => FailureReason::Cancelled,
        other => FailureReason::Failed {
            retryable: other.is_retryable(),
            error: other.to_string(),
        },
    }
}

async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
