use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::agent::TaskType;
use crate::config::ClusterDefaults;

/// How nodes of one task type are staffed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPolicy {
    /// Agent for `single` nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub writer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_revisions: Option<u32>,
}

/// Per-run mapping from task type to agents and revision limits.
///
/// Keys deserialize through [`TaskType`], so an unknown task type is a parse
/// error rather than a node that silently finds no agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    #[serde(default = "default_max_revisions")]
    pub default_max_revisions: u32,
    #[serde(default)]
    pub policies: BTreeMap<TaskType, TaskPolicy>,
}

fn default_max_revisions() -> u32 {
    ClusterDefaults::default().max_revisions
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            default_max_revisions: default_max_revisions(),
            policies: BTreeMap::new(),
        }
    }
}

impl ClusterConfig {
    pub fn from_defaults(defaults: &ClusterDefaults) -> Self {
        Self {
            default_max_revisions: defaults.max_revisions,
            policies: BTreeMap::new(),
        }
    }

    pub fn with_policy(mut self, task_type: TaskType, policy: TaskPolicy) -> Self {
        self.policies.insert(task_type, policy);
        self
    }

    pub fn policy(&self, task_type: TaskType) -> Option<&TaskPolicy> {
        self.policies.get(&task_type)
    }

    pub fn max_revisions_for(&self, task_type: TaskType) -> u32 {
        self.policy(task_type)
            .and_then(|p| p.max_revisions)
            .unwrap_or(self.default_max_revisions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_policies_keyed_by_task_type() {
        let cfg: ClusterConfig = serde_json::from_str(
            r#"{
                "defaultMaxRevisions": 2,
                "policies": {
                    "write_section": { "writer": "w1", "critic": "c1", "maxRevisions": 4 },
                    "summarize": { "agent": "w2" }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(cfg.max_revisions_for(TaskType::WriteSection), 4);
        assert_eq!(cfg.max_revisions_for(TaskType::Summarize), 2);
        assert_eq!(cfg.max_revisions_for(TaskType::AnswerQuestion), 2);
        assert_eq!(
            cfg.policy(TaskType::Summarize).and_then(|p| p.agent.as_deref()),
            Some("w2")
        );
    }

    #[test]
    fn unknown_task_type_is_rejected() {
        let err = serde_json::from_str::<ClusterConfig>(
            r#"{ "policies": { "write_sectoin": { "writer": "w1" } } }"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn defaults_to_three_revisions() {
        assert_eq!(ClusterConfig::default().default_max_revisions, 3);
    }
}
