//! Writer/critic revision loop for a single task.

mod config;

pub use config::{ClusterConfig, TaskPolicy};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::agent::{A2AMessage, Agent, AgentContext, AgentResult, AgentTask, CritiquePayload};
use crate::config::ClusterDefaults;
use crate::error::AgentError;
use crate::trace::{EventType, ExecutionTracer};

/// One critique in the loop's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CritiqueRound {
    pub round: u32,
    pub critique: CritiquePayload,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterOutcome {
    /// Last draft, with usage summed over every writer and critic call.
    pub result: AgentResult,
    pub history: Vec<CritiqueRound>,
}

/// A loop that ended in an error, with the usage spent before it did.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{error}")]
pub struct ClusterFailure {
    pub error: AgentError,
    pub tokens_used: u64,
    pub cost: f64,
}

/// Drives draft -> critique -> decide until approval or the revision limit.
pub struct WriterCriticCluster {
    tracer: Arc<ExecutionTracer>,
    round_timeout: Duration,
}

impl WriterCriticCluster {
    pub fn new(tracer: Arc<ExecutionTracer>) -> Self {
        Self::with_defaults(tracer, &ClusterDefaults::default())
    }

    pub fn with_defaults(tracer: Arc<ExecutionTracer>, defaults: &ClusterDefaults) -> Self {
        Self {
            tracer,
            round_timeout: Duration::from_millis(defaults.round_timeout_ms.max(1)),
        }
    }

    /// Run the loop for `task`, logging every step under `trace_id`.
    ///
    /// The writer runs at most `max_revisions + 1` times. Running out of
    /// revisions is not a failure: the last draft comes back with
    /// `quality_warning` set. Unparsable critiques count as `revise`.
    /// The caller owns the agents' load accounting.
    pub async fn run(
        &self,
        trace_id: &str,
        task: &AgentTask,
        writer: &dyn Agent,
        critic: &dyn Agent,
        max_revisions: u32,
        ctx: &AgentContext,
    ) -> Result<ClusterOutcome, ClusterFailure> {
        let writer_id = writer.id();
        let critic_id = critic.id();
        let mut history: Vec<CritiqueRound> = Vec::new();
        let mut tokens_used = 0u64;
        let mut cost = 0.0f64;
        let mut round_ctx = ctx.clone();
        let mut round = 0u32;

        let (mut draft, quality_warning) = loop {
            round += 1;

            self.tracer.add_event(
                trace_id,
                EventType::Progress,
                format!("draft round {round}"),
                Some(json!({ "round": round, "writer": writer_id })),
            );
            let reply = self
                .guarded(
                    writer_id,
                    ctx,
                    writer.receive(A2AMessage::Task(task.clone()), &round_ctx),
                )
                .await;
            let draft = match reply {
                Ok(A2AMessage::Result { result, .. }) => result,
                Ok(other) => {
                    return Err(ClusterFailure {
                        error: AgentError::UnsupportedMessage {
                            agent_id: writer_id.to_string(),
                            kind: other.kind(),
                        },
                        tokens_used,
                        cost,
                    })
                }
                Err(error) => {
                    return Err(ClusterFailure {
                        error,
                        tokens_used,
                        cost,
                    })
                }
            };
            tokens_used += draft.tokens_used;
            cost += draft.cost;

            if !draft.success {
                tracing::warn!(
                    task_id = %task.id,
                    agent_id = writer_id,
                    round,
                    "writer reported failure; ending revision loop"
                );
                break (draft, false);
            }

            let reviewed = self
                .guarded(
                    critic_id,
                    ctx,
                    critic.receive(
                        A2AMessage::Result {
                            task: task.clone(),
                            result: draft.clone(),
                        },
                        &round_ctx,
                    ),
                )
                .await;
            let critique = match reviewed {
                Ok(A2AMessage::Critique {
                    critique,
                    tokens_used: t,
                    cost: c,
                    ..
                }) => {
                    tokens_used += t;
                    cost += c;
                    critique
                }
                Ok(other) => CritiquePayload::fail_safe(&format!(
                    "critic answered with a '{}' message",
                    other.kind()
                )),
                Err(AgentError::CritiqueParse(reason)) => CritiquePayload::fail_safe(&reason),
                Err(error) => {
                    return Err(ClusterFailure {
                        error,
                        tokens_used,
                        cost,
                    })
                }
            };

            self.tracer.add_event(
                trace_id,
                EventType::Critique,
                format!("{:?} ({:?})", critique.verdict, critique.severity).to_lowercase(),
                Some(json!({
                    "round": round,
                    "critic": critic_id,
                    "score": critique.score,
                    "feedback": critique.feedback,
                    "suggestions": critique.suggestions,
                })),
            );
            let approved = critique.is_approved();
            history.push(CritiqueRound { round, critique });

            let revisions_done = round - 1;
            if approved {
                self.tracer.add_event(
                    trace_id,
                    EventType::Revision,
                    format!("approved after {revisions_done} revision(s)"),
                    Some(json!({ "round": round, "decision": "approve" })),
                );
                break (draft, false);
            }
            if revisions_done >= max_revisions {
                self.tracer.add_event(
                    trace_id,
                    EventType::Revision,
                    format!("max revisions ({max_revisions}) reached without approval"),
                    Some(json!({ "round": round, "decision": "exhausted" })),
                );
                tracing::info!(
                    task_id = %task.id,
                    max_revisions,
                    "revision limit reached; keeping last draft"
                );
                break (draft, true);
            }

            self.tracer.add_event(
                trace_id,
                EventType::Revision,
                format!("revision {} of {max_revisions} requested", revisions_done + 1),
                Some(json!({ "round": round, "decision": "revise" })),
            );
            let feedback = history.iter().map(|r| r.critique.clone()).collect();
            round_ctx = ctx.for_revision(&draft.content, feedback);
        };

        draft.tokens_used = tokens_used;
        draft.cost = cost;
        draft.quality_warning = quality_warning;
        draft.revisions = round - 1;

        Ok(ClusterOutcome {
            result: draft,
            history,
        })
    }

    /// Bound one agent call by the round timeout. Cancellation is checked
    /// before the call; a call already in progress is left to finish.
    async fn guarded<F>(
        &self,
        agent_id: &str,
        ctx: &AgentContext,
        call: F,
    ) -> Result<A2AMessage, AgentError>
    where
        F: Future<Output = Result<A2AMessage, AgentError>>,
    {
        if ctx.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        match tokio::time::timeout(self.round_timeout, call).await {
            Ok(reply) => reply,
            Err(_) => Err(AgentError::Timeout {
                agent_id: agent_id.to_string(),
                after_ms: self.round_timeout.as_millis() as u64,
            }),
        }
    }
}
