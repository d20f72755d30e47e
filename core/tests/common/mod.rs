#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use quill_core::api::{
    Agent, AgentCapabilities, AgentContext, AgentError, AgentResult, AgentRole, AgentTask,
    DagNode, Generation, GenerationError, GenerationOptions, Generator, MultiAgentOrchestrator,
    Prompt, QuillConfig, TaskType,
};
use tokio::sync::Barrier;

/// Generator that replays queued responses, then repeats a fallback.
pub struct CountingGenerator {
    responses: Mutex<VecDeque<String>>,
    fallback: String,
    calls: AtomicUsize,
    prompts: Mutex<Vec<Prompt>>,
}

impl CountingGenerator {
    pub fn new(fallback: &str) -> Arc<Self> {
        Self::scripted(&[], fallback)
    }

    pub fn scripted(responses: &[&str], fallback: &str) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
            fallback: fallback.to_string(),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for CountingGenerator {
    async fn generate(
        &self,
        prompt: &Prompt,
        _options: &GenerationOptions,
    ) -> Result<Generation, GenerationError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.prompts.lock().unwrap().push(prompt.clone());
        let content = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        Ok(Generation {
            content,
            tokens_used: 10,
            cost: 0.01 * n as f64,
        })
    }
}

/// Generator that plays back a fixed script of replies and failures,
/// each with its own usage. Runs out into a network error.
pub struct MeteredGenerator {
    steps: Mutex<VecDeque<Result<Generation, GenerationError>>>,
    calls: AtomicUsize,
}

impl MeteredGenerator {
    pub fn new(steps: Vec<Result<Generation, GenerationError>>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn reply(content: &str, tokens_used: u64, cost: f64) -> Result<Generation, GenerationError> {
    Ok(Generation {
        content: content.to_string(),
        tokens_used,
        cost,
    })
}

#[async_trait]
impl Generator for MeteredGenerator {
    async fn generate(
        &self,
        _prompt: &Prompt,
        _options: &GenerationOptions,
    ) -> Result<Generation, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GenerationError::network("script exhausted")))
    }
}

/// What a [`StubAgent`] does for a given task id.
#[derive(Clone)]
pub enum Behavior {
    Succeed,
    Fail(AgentError),
    /// Fail the first `n` calls, then succeed.
    FailFirst(usize, AgentError),
    /// Wait on the barrier (bounded) before succeeding.
    Rendezvous(Arc<Barrier>),
    Sleep(Duration),
    /// Block until the run is cancelled, then report cancellation.
    AwaitCancel,
}

/// Agent driven by per-task behaviors that records every invocation.
pub struct StubAgent {
    id: String,
    caps: AgentCapabilities,
    behaviors: HashMap<String, Behavior>,
    calls: Mutex<HashMap<String, usize>>,
    seen_dependencies: Mutex<HashMap<String, Vec<String>>>,
    seen_siblings: Mutex<HashMap<String, Vec<String>>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl StubAgent {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            caps: AgentCapabilities::new(AgentRole::Writer, TaskType::ALL),
            behaviors: HashMap::new(),
            calls: Mutex::new(HashMap::new()),
            seen_dependencies: Mutex::new(HashMap::new()),
            seen_siblings: Mutex::new(HashMap::new()),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
        }
    }

    pub fn on(mut self, task_id: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(task_id.to_string(), behavior);
        self
    }

    pub fn calls_for(&self, task_id: &str) -> usize {
        self.calls.lock().unwrap().get(task_id).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn dependencies_seen_by(&self, task_id: &str) -> Vec<String> {
        self.seen_dependencies
            .lock()
            .unwrap()
            .get(task_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn siblings_seen_by(&self, task_id: &str) -> Vec<String> {
        self.seen_siblings
            .lock()
            .unwrap()
            .get(task_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Agent for StubAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> &AgentCapabilities {
        &self.caps
    }

    async fn execute(
        &self,
        task: &AgentTask,
        ctx: &AgentContext,
    ) -> Result<AgentResult, AgentError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let n = calls.entry(task.id.clone()).or_insert(0);
            *n += 1;
            *n
        };
        self.seen_dependencies.lock().unwrap().insert(
            task.id.clone(),
            ctx.dependency_results().keys().cloned().collect(),
        );
        self.seen_siblings.lock().unwrap().insert(
            task.id.clone(),
            ctx.sibling_results().keys().cloned().collect(),
        );

        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);

        let outcome = match self.behaviors.get(&task.id).cloned().unwrap_or(Behavior::Succeed) {
            Behavior::Succeed => Ok(()),
            Behavior::Fail(e) => Err(e),
            Behavior::FailFirst(n, e) => {
                if call <= n {
                    Err(e)
                } else {
                    Ok(())
                }
            }
            Behavior::Rendezvous(barrier) => {
                match tokio::time::timeout(Duration::from_secs(5), barrier.wait()).await {
                    Ok(_) => Ok(()),
                    Err(_) => Err(AgentError::Timeout {
                        agent_id: self.id.clone(),
                        after_ms: 5_000,
                    }),
                }
            }
            Behavior::Sleep(d) => {
                tokio::time::sleep(d).await;
                Ok(())
            }
            Behavior::AwaitCancel => {
                ctx.cancellation().cancelled().await;
                Err(AgentError::Cancelled)
            }
        };

        self.running.fetch_sub(1, Ordering::SeqCst);
        outcome.map(|_| {
            AgentResult::completed(&task.id, &self.id, format!("content of {}", task.id), 5, 0.5)
        })
    }
}

pub fn task(id: &str) -> AgentTask {
    AgentTask::new(id, TaskType::WriteSection, id, format!("write {id}"))
}

pub fn node(id: &str, deps: &[&str]) -> DagNode {
    DagNode::single(task(id)).with_dependencies(deps.iter().copied())
}

pub fn cluster_node(id: &str) -> DagNode {
    DagNode::cluster(task(id))
}

pub fn config(max_concurrency: usize) -> QuillConfig {
    let mut cfg = QuillConfig::default();
    cfg.executor.max_concurrency = max_concurrency;
    cfg
}

pub fn orchestrator_with(cfg: QuillConfig, agents: Vec<Arc<dyn Agent>>) -> MultiAgentOrchestrator {
    let orchestrator = MultiAgentOrchestrator::new(cfg);
    for agent in agents {
        orchestrator.register(agent).unwrap();
    }
    orchestrator
}

pub fn transient() -> AgentError {
    GenerationError::network("connection reset").into()
}

pub fn fatal() -> AgentError {
    GenerationError::quota_exceeded("no credits left").into()
}
