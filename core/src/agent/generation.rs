use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

/// A system/user prompt pair handed to a generation backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    #[serde(default)]
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl GenerationOptions {
    pub fn writer_defaults() -> Self {
        Self {
            model: None,
            temperature: 0.7,
            max_tokens: 4000,
        }
    }

    pub fn critic_defaults() -> Self {
        Self {
            model: None,
            temperature: 0.3,
            max_tokens: 1000,
        }
    }

    pub fn with_model(mut self, model: Option<&str>) -> Self {
        if let Some(m) = model {
            self.model = Some(m.to_string());
        }
        self
    }
}

/// Text produced by a backend plus its accounting.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub content: String,
    pub tokens_used: u64,
    pub cost: f64,
}

/// The injected LLM capability. Vendor adapters live outside this crate.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        prompt: &Prompt,
        options: &GenerationOptions,
    ) -> Result<Generation, GenerationError>;
}
