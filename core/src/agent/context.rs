use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::critique::CritiquePayload;
use super::types::AgentResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelMode {
    #[default]
    Automatic,
    Fixed,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelPreferences {
    #[serde(default)]
    pub mode: ModelMode,
    #[serde(default)]
    pub model: Option<String>,
}

impl ModelPreferences {
    pub fn fixed(model: impl Into<String>) -> Self {
        Self {
            mode: ModelMode::Fixed,
            model: Some(model.into()),
        }
    }

    /// The model to pin generation calls to, if the caller asked for one.
    pub fn fixed_model(&self) -> Option<&str> {
        match self.mode {
            ModelMode::Fixed => self.model.as_deref(),
            ModelMode::Automatic => None,
        }
    }
}

/// Run-wide metadata shared by every node of one graph run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    pub run_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub model_preferences: ModelPreferences,
}

impl RunMetadata {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            user_id: None,
            model_preferences: ModelPreferences::default(),
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_model_preferences(mut self, prefs: ModelPreferences) -> Self {
        self.model_preferences = prefs;
        self
    }
}

impl Default for RunMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only inputs handed to an agent for one invocation.
///
/// Built fresh per node by the executor. Agents only ever see `&AgentContext`;
/// the cluster derives a new context per revision round instead of mutating.
#[derive(Debug, Clone)]
pub struct AgentContext {
    run: Arc<RunMetadata>,
    dependency_results: BTreeMap<String, AgentResult>,
    sibling_results: BTreeMap<String, AgentResult>,
    previous_draft: Option<String>,
    revision_feedback: Vec<CritiquePayload>,
    cancel: CancellationToken,
}

impl AgentContext {
    pub fn new(run: Arc<RunMetadata>, cancel: CancellationToken) -> Self {
        Self {
            run,
            dependency_results: BTreeMap::new(),
            sibling_results: BTreeMap::new(),
            previous_draft: None,
            revision_feedback: Vec::new(),
            cancel,
        }
    }

    pub fn with_dependency_results(mut self, results: BTreeMap<String, AgentResult>) -> Self {
        self.dependency_results = results;
        self
    }

    pub fn with_sibling_results(mut self, results: BTreeMap<String, AgentResult>) -> Self {
        self.sibling_results = results;
        self
    }

    /// Derive the context for the next revision round.
    pub fn for_revision(&self, draft: &str, feedback: Vec<CritiquePayload>) -> Self {
        let mut next = self.clone();
        next.previous_draft = Some(draft.to_string());
        next.revision_feedback = feedback;
        next
    }

    pub fn run(&self) -> &RunMetadata {
        &self.run
    }

    /// Results of this node's direct dependencies, keyed by node id.
    pub fn dependency_results(&self) -> &BTreeMap<String, AgentResult> {
        &self.dependency_results
    }

    /// Completed results of nodes that share a dependency with this one.
    pub fn sibling_results(&self) -> &BTreeMap<String, AgentResult> {
        &self.sibling_results
    }

    pub fn previous_draft(&self) -> Option<&str> {
        self.previous_draft.as_deref()
    }

    pub fn revision_feedback(&self) -> &[CritiquePayload] {
        &self.revision_feedback
    }

    pub fn is_revision(&self) -> bool {
        self.previous_draft.is_some()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
