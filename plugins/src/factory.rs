use std::sync::Arc;

use anyhow::Result;

use quill_core::agent::{CriticAgent, Generator, WriterAgent};
use quill_core::config::{ExecutorConfig, QuillConfig};
use quill_core::executor::RetryStrategyPlugin;
use quill_core::orchestrator::MultiAgentOrchestrator;

use crate::executor::{ExponentialBackoffPlugin, LinearRetryPlugin};
use crate::generation::{EchoGeneration, ScriptedGeneration};

pub const DEFAULT_WRITER_ID: &str = "writer";
pub const DEFAULT_CRITIC_ID: &str = "critic";

pub fn build_retry_strategy(cfg: &ExecutorConfig) -> Result<Option<Arc<dyn RetryStrategyPlugin>>> {
    let max_attempts = cfg.max_retries.saturating_add(1);
    match cfg.retry.strategy.as_str() {
        "exponential-backoff" => Ok(Some(Arc::new(ExponentialBackoffPlugin::new(
            cfg.retry.clone(),
            max_attempts,
        )))),
        "linear" => Ok(Some(Arc::new(LinearRetryPlugin::new(
            cfg.retry.clone(),
            max_attempts,
        )))),
        // Retries still happen, back to back.
        "none" | "immediate" => Ok(None),
        other => anyhow::bail!("unknown retry strategy '{other}'"),
    }
}

/// Offline generation backends. Vendor adapters are wired by the embedding application.
pub fn build_generator(kind: &str) -> Result<Arc<dyn Generator>> {
    match kind {
        "echo" => Ok(Arc::new(EchoGeneration::new())),
        other => anyhow::bail!("unknown generation backend '{other}'"),
    }
}

/// Orchestrator with one writer and one critic registered under the default ids.
///
/// The critic backend always approves, so cluster nodes finish after one pass.
pub fn build_orchestrator(cfg: QuillConfig, generator: Arc<dyn Generator>) -> Result<MultiAgentOrchestrator> {
    let mut orchestrator = MultiAgentOrchestrator::new(cfg);
    if let Some(strategy) = build_retry_strategy(&orchestrator.config().executor)? {
        orchestrator = orchestrator.with_retry_strategy(strategy);
    }

    let threshold = orchestrator.config().cluster.approval_threshold;
    orchestrator.register(Arc::new(WriterAgent::new(DEFAULT_WRITER_ID, generator)))?;
    orchestrator.register(Arc::new(
        CriticAgent::new(
            DEFAULT_CRITIC_ID,
            Arc::new(ScriptedGeneration::approving(threshold.max(1))),
        )
        .with_approval_threshold(threshold),
    ))?;
    Ok(orchestrator)
}
