use std::path::Path;

use quill_core::cluster::ClusterConfig;
use quill_core::executor::DagNode;
use serde::{Deserialize, Serialize};

use crate::error::CliError;

/// On-disk task graph: the nodes plus an optional per-run cluster mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphFile {
    pub nodes: Vec<DagNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ClusterConfig>,
}

impl GraphFile {
    pub fn parse(s: &str) -> Result<Self, CliError> {
        serde_json::from_str(s).map_err(|e| CliError::GraphFile(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, CliError> {
        let s = std::fs::read_to_string(path)?;
        Self::parse(&s)
    }
}
