use thiserror::Error;

/// Structural errors raised while building or validating a task graph.
///
/// These abort a run before any agent is invoked.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("Duplicate node ID: {0}")]
    DuplicateNode(String),

    #[error("Missing dependency: node '{node_id}' depends on '{missing_dep}'")]
    MissingDependency {
        node_id: String,
        missing_dep: String,
    },

    #[error("Cyclic dependency detected: {0}")]
    CyclicDependency(String),
}

impl ExecutorError {
    /// Short machine-readable code, used by the CLI and in logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateNode(_) => "duplicate_node",
            Self::MissingDependency { .. } => "missing_dependency",
            Self::CyclicDependency(_) => "cyclic_dependency",
        }
    }
}
