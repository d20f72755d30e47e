use async_trait::async_trait;
use quill_core::agent::{Generation, GenerationOptions, Generator, Prompt};
use quill_core::error::GenerationError;
use quill_core::util::word_count;

/// Offline backend that restates the user prompt.
///
/// Used for dry runs: it exercises scheduling, tracing and persistence
/// without a network call. Tokens are approximated by word counts.
pub struct EchoGeneration {
    cost_per_1k_tokens: f64,
}

impl EchoGeneration {
    pub fn new() -> Self {
        Self {
            cost_per_1k_tokens: 0.0,
        }
    }

    pub fn with_cost_per_1k_tokens(mut self, cost: f64) -> Self {
        self.cost_per_1k_tokens = cost.max(0.0);
        self
    }
}

impl Default for EchoGeneration {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Generator for EchoGeneration {
    async fn generate(
        &self,
        prompt: &Prompt,
        options: &GenerationOptions,
    ) -> Result<Generation, GenerationError> {
        let model = options.model.as_deref().unwrap_or("echo");
        let content = format!("[{model}] {}", prompt.user.trim());
        let tokens_used = (word_count(&prompt.system) + word_count(&prompt.user) + word_count(&content))
            .min(options.max_tokens as usize * 4) as u64;
        Ok(Generation {
            content,
            tokens_used,
            cost: tokens_used as f64 / 1000.0 * self.cost_per_1k_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_user_prompt_with_model_tag() {
        let gen = EchoGeneration::new().with_cost_per_1k_tokens(2.0);
        let prompt = Prompt {
            system: "be brief".into(),
            user: "Write the opening".into(),
        };
        let out = gen
            .generate(&prompt, &GenerationOptions::writer_defaults())
            .await
            .unwrap();
        assert_eq!(out.content, "[echo] Write the opening");
        assert_eq!(out.tokens_used, 2 + 3 + 4);
        assert!((out.cost - 0.018).abs() < 1e-9);
    }

    #[tokio::test]
    async fn uses_requested_model_name() {
        let gen = EchoGeneration::default();
        let prompt = Prompt {
            system: String::new(),
            user: "hi".into(),
        };
        let opts = GenerationOptions::critic_defaults().with_model(Some("tiny"));
        let out = gen.generate(&prompt, &opts).await.unwrap();
        assert_eq!(out.content, "[tiny] hi");
        assert_eq!(out.cost, 0.0);
    }
}
