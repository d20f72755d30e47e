use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AgentError;
use crate::util::truncate_chars;

use super::context::AgentContext;
use super::generation::{GenerationOptions, Generator, Prompt};
use super::traits::Agent;
use super::types::{AgentCapabilities, AgentResult, AgentRole, AgentTask, TaskType};

const EXISTING_CONTENT_LIMIT: usize = 2000;
const SIBLING_EXCERPT_LIMIT: usize = 500;

const WRITER_SYSTEM_PROMPT: &str = "You are an expert creative writer. Your task is to generate \
high-quality content for the given section.

Guidelines:
- Write in a clear, engaging style
- Match the tone and voice of any existing content
- Be creative while staying true to the context
- Use vivid descriptions and strong narrative flow
";

/// Produces section content through the injected generation capability.
pub struct WriterAgent {
    id: String,
    capabilities: AgentCapabilities,
    generator: Arc<dyn Generator>,
    options: GenerationOptions,
}

impl WriterAgent {
    pub fn new(id: impl Into<String>, generator: Arc<dyn Generator>) -> Self {
        Self {
            id: id.into(),
            capabilities: AgentCapabilities::new(
                AgentRole::Writer,
                [
                    TaskType::WriteSection,
                    TaskType::ImproveSection,
                    TaskType::GenerateStructure,
                    TaskType::AnswerQuestion,
                    TaskType::Summarize,
                ],
            ),
            generator,
            options: GenerationOptions::writer_defaults(),
        }
    }

    pub fn with_task_types(mut self, task_types: impl IntoIterator<Item = TaskType>) -> Self {
        self.capabilities = AgentCapabilities::new(AgentRole::Writer, task_types);
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build_prompt(task: &AgentTask, ctx: &AgentContext) -> Prompt {
        let mut system = String::from(WRITER_SYSTEM_PROMPT);

        let dependency_context =
            build_results_context("Dependency Outputs", ctx.dependency_results(), None);
        if !dependency_context.is_empty() {
            system.push('\n');
            system.push_str(&dependency_context);
        }

        // Parallel sections only need enough to avoid repeating them.
        let sibling_context = build_results_context(
            "Sibling Sections",
            ctx.sibling_results(),
            Some(SIBLING_EXCERPT_LIMIT),
        );
        if !sibling_context.is_empty() {
            system.push('\n');
            system.push_str(&sibling_context);
        }

        if !task.input_context.trim().is_empty() {
            let (existing, cut) = truncate_chars(&task.input_context, EXISTING_CONTENT_LIMIT);
            system.push_str("\nDocument Context:\n");
            system.push_str(existing);
            if cut {
                system.push_str("...");
            }
            system.push('\n');
        }

        let mut user = String::with_capacity(task.description.len() + 128);
        let _ = write!(
            user,
            "Section: {}\n\nUser request: {}\n\n",
            task.section_id, task.description
        );

        match ctx.previous_draft() {
            Some(draft) => {
                user.push_str("Previous draft:\n");
                user.push_str(draft);
                user.push_str("\n\nEditor feedback:\n");
                for (round, critique) in ctx.revision_feedback().iter().enumerate() {
                    let _ = writeln!(
                        user,
                        "- round {} ({:?}): {}",
                        round + 1,
                        critique.severity,
                        critique.feedback
                    );
                    for suggestion in &critique.suggestions {
                        let _ = writeln!(user, "  * {suggestion}");
                    }
                }
                user.push_str("\nRevise the draft to address the feedback:");
            }
            None => user.push_str("Write the content for this section:"),
        }

        Prompt { system, user }
    }
}

#[async_trait]
impl Agent for WriterAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> &AgentCapabilities {
        &self.capabilities
    }

    async fn execute(
        &self,
        task: &AgentTask,
        ctx: &AgentContext,
    ) -> Result<AgentResult, AgentError> {
        if ctx.is_cancelled() {
            return Err(AgentError::Cancelled);
        }

        let prompt = Self::build_prompt(task, ctx);
        let options = self
            .options
            .clone()
            .with_model(ctx.run().model_preferences.fixed_model());

        let generated = self
            .generator
            .generate(&prompt, &options)
            .await
            .map_err(|e| {
                tracing::warn!(
                    agent_id = %self.id,
                    task_id = %task.id,
                    reason = %e.reason,
                    retryable = e.retryable,
                    "writer generation failed"
                );
                AgentError::Generation(e)
            })?;

        tracing::debug!(
            agent_id = %self.id,
            task_id = %task.id,
            chars = generated.content.len(),
            tokens = generated.tokens_used,
            "writer produced draft"
        );

        Ok(AgentResult::completed(
            &task.id,
            &self.id,
            generated.content,
            generated.tokens_used,
            generated.cost,
        ))
    }
}

/// Render completed results as a titled prompt section, each body
/// optionally cut to `limit` characters.
fn build_results_context(
    title: &str,
    results: &BTreeMap<String, AgentResult>,
    limit: Option<usize>,
) -> String {
    if results.values().all(|r| r.content.is_empty()) {
        return String::new();
    }

    let estimated_size = results.len() * 200 + 50;
    let mut context = String::with_capacity(estimated_size);
    let _ = write!(context, "=== {title} ===\n\n");

    for (id, result) in results {
        if result.content.is_empty() {
            continue;
        }
        context.push_str("# Section: ");
        context.push_str(id);
        context.push('\n');
        match limit {
            Some(limit) => {
                let (excerpt, cut) = truncate_chars(&result.content, limit);
                context.push_str(excerpt);
                if cut {
                    context.push_str("...");
                }
            }
            None => context.push_str(&result.content),
        }
        context.push_str("\n\n");
    }

    let _ = writeln!(context, "=== End {title} ===");
    context
}
