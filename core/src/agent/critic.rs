use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AgentError;
use crate::util::truncate_chars;

use super::context::AgentContext;
use super::critique::{parse_critique, CritiquePayload};
use super::generation::{GenerationOptions, Generator, Prompt};
use super::message::A2AMessage;
use super::traits::Agent;
use super::types::{AgentCapabilities, AgentResult, AgentRole, AgentTask, TaskType};

const REVIEW_CONTENT_LIMIT: usize = 3000;

/// Reviews drafts and answers with a [`CritiquePayload`].
pub struct CriticAgent {
    id: String,
    capabilities: AgentCapabilities,
    generator: Arc<dyn Generator>,
    options: GenerationOptions,
    approval_threshold: u8,
}

/// A critique plus what it cost to produce.
#[derive(Debug, Clone, PartialEq)]
pub struct Review {
    pub critique: CritiquePayload,
    pub tokens_used: u64,
    pub cost: f64,
}

impl CriticAgent {
    pub fn new(id: impl Into<String>, generator: Arc<dyn Generator>) -> Self {
        Self {
            id: id.into(),
            capabilities: AgentCapabilities::new(AgentRole::Critic, TaskType::ALL),
            generator,
            options: GenerationOptions::critic_defaults(),
            approval_threshold: 7,
        }
    }

    pub fn with_task_types(mut self, task_types: impl IntoIterator<Item = TaskType>) -> Self {
        self.capabilities = AgentCapabilities::new(AgentRole::Critic, task_types);
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_approval_threshold(mut self, threshold: u8) -> Self {
        self.approval_threshold = threshold.clamp(1, 10);
        self
    }

    pub fn build_prompt(&self, task: &AgentTask, content: &str) -> Prompt {
        let system = format!(
            "You are an expert editor and writing critic.
Your job is to evaluate content quality and provide constructive feedback.

Evaluate based on:
1. Clarity and readability
2. Engagement and flow
3. Grammar and style
4. Consistency with context
5. Creativity and originality

Respond with ONLY valid JSON (no markdown, no extra text):
Example: {{\"score\": 8, \"feedback\": \"Good writing with strong imagery\", \"suggestions\": [\"Add more dialogue\"]}}

Score 1-10 where {} or higher means approved quality.",
            self.approval_threshold
        );

        let (content, _) = truncate_chars(content, REVIEW_CONTENT_LIMIT);
        let user = format!(
            "Section: {}\nRequest: {}\n\nEvaluate this content:\n\n{}",
            task.section_id, task.description, content
        );

        Prompt { system, user }
    }

    /// Review `content` written for `task`.
    ///
    /// Always yields a verdict when the backend answers: unparsable output
    /// becomes a high-severity `revise`. Backend failures are returned as-is.
    pub async fn review(
        &self,
        task: &AgentTask,
        content: &str,
        ctx: &AgentContext,
    ) -> Result<Review, AgentError> {
        if ctx.is_cancelled() {
            return Err(AgentError::Cancelled);
        }

        let prompt = self.build_prompt(task, content);
        let options = self
            .options
            .clone()
            .with_model(ctx.run().model_preferences.fixed_model());
        let generated = self.generator.generate(&prompt, &options).await?;

        let critique = match parse_critique(&generated.content, self.approval_threshold) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(
                    agent_id = %self.id,
                    task_id = %task.id,
                    error = %e,
                    "critique unparsable; defaulting to revise"
                );
                CritiquePayload::fail_safe(&e.to_string())
            }
        };

        tracing::debug!(
            agent_id = %self.id,
            task_id = %task.id,
            verdict = ?critique.verdict,
            score = ?critique.score,
            "critic reviewed draft"
        );

        Ok(Review {
            critique,
            tokens_used: generated.tokens_used,
            cost: generated.cost,
        })
    }
}

#[async_trait]
impl Agent for CriticAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> &AgentCapabilities {
        &self.capabilities
    }

    /// Standalone review: the task's input context is the text under review
    /// and the serialized critique becomes the result content.
    async fn execute(
        &self,
        task: &AgentTask,
        ctx: &AgentContext,
    ) -> Result<AgentResult, AgentError> {
        let review = self.review(task, &task.input_context, ctx).await?;
        let content = serde_json::to_string(&review.critique)
            .map_err(|e| AgentError::CritiqueParse(e.to_string()))?;
        Ok(AgentResult::completed(
            &task.id,
            &self.id,
            content,
            review.tokens_used,
            review.cost,
        ))
    }

    async fn receive(
        &self,
        message: A2AMessage,
        ctx: &AgentContext,
    ) -> Result<A2AMessage, AgentError> {
        match message {
            A2AMessage::Result { task, result } => {
                let review = self.review(&task, &result.content, ctx).await?;
                Ok(A2AMessage::Critique {
                    task_id: task.id,
                    critique: review.critique,
                    tokens_used: review.tokens_used,
                    cost: review.cost,
                })
            }
            A2AMessage::Task(task) => {
                let result = self.execute(&task, ctx).await?;
                Ok(A2AMessage::Result { task, result })
            }
            other @ A2AMessage::Critique { .. } => Err(AgentError::UnsupportedMessage {
                agent_id: self.id.clone(),
                kind: other.kind(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Generation, RunMetadata, Severity, Verdict};
    use crate::error::GenerationError;
    use tokio_util::sync::CancellationToken;

    struct Canned(&'static str);

    #[async_trait]
    impl Generator for Canned {
        async fn generate(
            &self,
            _prompt: &Prompt,
            _options: &GenerationOptions,
        ) -> Result<Generation, GenerationError> {
            Ok(Generation {
                content: self.0.to_string(),
                tokens_used: 7,
                cost: 0.002,
            })
        }
    }

    fn ctx() -> AgentContext {
        AgentContext::new(Arc::new(RunMetadata::new()), CancellationToken::new())
    }

    fn draft_message() -> A2AMessage {
        let task = AgentTask::new("t1", TaskType::WriteSection, "intro", "Open with a storm");
        let result = AgentResult::completed("t1", "writer", "Rain fell.", 10, 0.01);
        A2AMessage::Result { task, result }
    }

    #[tokio::test]
    async fn answers_results_with_critiques() {
        let critic = CriticAgent::new("critic", Arc::new(Canned(r#"{"score": 9, "feedback": "vivid"}"#)));
        let reply = critic.receive(draft_message(), &ctx()).await.unwrap();
        match reply {
            A2AMessage::Critique {
                task_id,
                critique,
                tokens_used,
                ..
            } => {
                assert_eq!(task_id, "t1");
                assert_eq!(critique.verdict, Verdict::Approve);
                assert_eq!(tokens_used, 7);
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unparsable_response_defaults_to_revise() {
        let critic = CriticAgent::new("critic", Arc::new(Canned("I liked it a lot!")));
        let reply = critic.receive(draft_message(), &ctx()).await.unwrap();
        let A2AMessage::Critique { critique, .. } = reply else {
            panic!("expected critique");
        };
        assert_eq!(critique.verdict, Verdict::Revise);
        assert_eq!(critique.severity, Severity::High);
    }

    #[tokio::test]
    async fn threshold_is_configurable() {
        let critic = CriticAgent::new("critic", Arc::new(Canned(r#"{"score": 8}"#)))
            .with_approval_threshold(9);
        let reply = critic.receive(draft_message(), &ctx()).await.unwrap();
        let A2AMessage::Critique { critique, .. } = reply else {
            panic!("expected critique");
        };
        assert_eq!(critique.verdict, Verdict::Revise);
    }

    #[test]
    fn prompt_truncates_long_content() {
        let critic = CriticAgent::new("critic", Arc::new(Canned("{}")));
        let task = AgentTask::new("t1", TaskType::WriteSection, "intro", "x");
        let prompt = critic.build_prompt(&task, &"y".repeat(5000));
        assert!(prompt.user.contains(&"y".repeat(3000)));
        assert!(!prompt.user.contains(&"y".repeat(3001)));
        assert!(prompt.system.contains("7 or higher"));
    }
}
