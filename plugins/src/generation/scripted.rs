use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use quill_core::agent::{Generation, GenerationOptions, Generator, Prompt};
use quill_core::error::GenerationError;
use quill_core::util::word_count;

#[derive(Debug, Clone)]
pub enum ScriptedStep {
    Reply(String),
    Fail(GenerationError),
}

/// Backend that replays a fixed list of replies in order.
///
/// Once the script runs out the last step repeats. An empty script fails
/// every call.
pub struct ScriptedGeneration {
    steps: Mutex<VecDeque<ScriptedStep>>,
    last: Mutex<Option<ScriptedStep>>,
    calls: Mutex<Vec<Prompt>>,
}

impl ScriptedGeneration {
    pub fn new(steps: impl IntoIterator<Item = ScriptedStep>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            last: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn replies<S: Into<String>>(replies: impl IntoIterator<Item = S>) -> Self {
        Self::new(replies.into_iter().map(|r| ScriptedStep::Reply(r.into())))
    }

    /// A critic backend that approves every draft with the given score.
    pub fn approving(score: u8) -> Self {
        Self::replies([format!(
            r#"{{"score": {}, "verdict": "approve", "feedback": "Looks good."}}"#,
            score.clamp(1, 10)
        )])
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn next_step(&self) -> Option<ScriptedStep> {
        let mut steps = self.steps.lock().unwrap_or_else(|e| e.into_inner());
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(step) = steps.pop_front() {
            *last = Some(step.clone());
            return Some(step);
        }
        last.clone()
    }
}

#[async_trait]
impl Generator for ScriptedGeneration {
    async fn generate(
        &self,
        prompt: &Prompt,
        _options: &GenerationOptions,
    ) -> Result<Generation, GenerationError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(prompt.clone());
        }
        match self.next_step() {
            Some(ScriptedStep::Reply(content)) => Ok(Generation {
                tokens_used: word_count(&content) as u64,
                content,
                cost: 0.0,
            }),
            Some(ScriptedStep::Fail(err)) => Err(err),
            None => Err(GenerationError::invalid_model("script is empty")),
        }
    }
}
