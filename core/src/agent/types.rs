use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AgentError;

/// Kinds of work an agent can declare support for.
///
/// Closed on purpose: capability declarations and cluster policies are parsed
/// against this list, so a misspelled task type fails at registration or
/// config load instead of surfacing as a missing agent mid-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    WriteSection,
    ImproveSection,
    GenerateStructure,
    ReviewSection,
    AnswerQuestion,
    Summarize,
}

impl TaskType {
    pub const ALL: [TaskType; 6] = [
        TaskType::WriteSection,
        TaskType::ImproveSection,
        TaskType::GenerateStructure,
        TaskType::ReviewSection,
        TaskType::AnswerQuestion,
        TaskType::Summarize,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::WriteSection => "write_section",
            Self::ImproveSection => "improve_section",
            Self::GenerateStructure => "generate_structure",
            Self::ReviewSection => "review_section",
            Self::AnswerQuestion => "answer_question",
            Self::Summarize => "summarize",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == needle)
            .ok_or_else(|| AgentError::UnknownTaskType(needle.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Writer,
    Critic,
}

impl AgentRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Writer => "writer",
            Self::Critic => "critic",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an agent is and which task types it accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCapabilities {
    pub role: AgentRole,
    pub task_types: Vec<TaskType>,
}

impl AgentCapabilities {
    pub fn new(role: AgentRole, task_types: impl IntoIterator<Item = TaskType>) -> Self {
        let mut types: Vec<TaskType> = Vec::new();
        for t in task_types {
            if !types.contains(&t) {
                types.push(t);
            }
        }
        Self {
            role,
            task_types: types,
        }
    }

    /// Build capabilities from loosely typed names (e.g. from a manifest).
    pub fn parse(role: AgentRole, names: &[&str]) -> Result<Self, AgentError> {
        let types = names
            .iter()
            .map(|n| n.parse::<TaskType>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(role, types))
    }

    pub fn supports(&self, task_type: TaskType) -> bool {
        self.task_types.contains(&task_type)
    }
}

/// One unit of work. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentTask {
    pub id: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub section_id: String,
    pub description: String,
    #[serde(default)]
    pub input_context: String,
}

impl AgentTask {
    pub fn new(
        id: impl Into<String>,
        task_type: TaskType,
        section_id: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            task_type,
            section_id: section_id.into(),
            description: description.into(),
            input_context: String::new(),
        }
    }

    pub fn with_input_context(mut self, input_context: impl Into<String>) -> Self {
        self.input_context = input_context.into();
        self
    }
}

/// Outcome of one task, produced once per node after any revision rounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResult {
    pub task_id: String,
    pub agent_id: String,
    pub content: String,
    pub tokens_used: u64,
    pub cost: f64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when a critique loop ran out of revisions without approval.
    #[serde(default)]
    pub quality_warning: bool,
    #[serde(default)]
    pub revisions: u32,
}

impl AgentResult {
    pub fn completed(
        task_id: impl Into<String>,
        agent_id: impl Into<String>,
        content: impl Into<String>,
        tokens_used: u64,
        cost: f64,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            agent_id: agent_id.into(),
            content: content.into(),
            tokens_used,
            cost,
            success: true,
            error: None,
            quality_warning: false,
            revisions: 0,
        }
    }

    pub fn failed(
        task_id: impl Into<String>,
        agent_id: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            agent_id: agent_id.into(),
            content: String::new(),
            tokens_used: 0,
            cost: 0.0,
            success: false,
            error: Some(error.into()),
            quality_warning: false,
            revisions: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_type_parses_known_names_only() {
        assert_eq!(
            "write_section".parse::<TaskType>().unwrap(),
            TaskType::WriteSection
        );
        assert_eq!(
            " summarize ".parse::<TaskType>().unwrap(),
            TaskType::Summarize
        );
        assert_eq!(
            "write_sectoin".parse::<TaskType>(),
            Err(AgentError::UnknownTaskType("write_sectoin".into()))
        );
    }

    #[test]
    fn capabilities_dedupe_and_parse() {
        let caps = AgentCapabilities::new(
            AgentRole::Writer,
            [TaskType::WriteSection, TaskType::WriteSection, TaskType::Summarize],
        );
        assert_eq!(caps.task_types.len(), 2);
        assert!(caps.supports(TaskType::Summarize));
        assert!(!caps.supports(TaskType::ReviewSection));

        assert!(AgentCapabilities::parse(AgentRole::Critic, &["review_section"]).is_ok());
        assert!(AgentCapabilities::parse(AgentRole::Critic, &["reveiw"]).is_err());
    }

    #[test]
    fn task_serializes_with_wire_names() {
        let task = AgentTask::new("t1", TaskType::WriteSection, "ch-1", "Open the story");
        let v = serde_json::to_value(&task).unwrap();
        assert_eq!(v["type"], "write_section");
        assert_eq!(v["sectionId"], "ch-1");
        assert_eq!(v["inputContext"], "");
    }
}
