use quill_core::error::ExecutorError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(String),
    #[error("invalid graph file: {0}")]
    GraphFile(String),
    #[error(transparent)]
    Graph(#[from] ExecutorError),
    #[error("command error: {0}")]
    Command(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl CliError {
    // 0: success
    // 1: run finished with failed or skipped nodes (returned as a normal exit code)
    // 11: config error
    // 12: graph file or graph validation error
    // 20: IO / command error
    // 50: internal/uncategorized
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 11,
            Self::GraphFile(_) | Self::Graph(_) => 12,
            Self::Command(_) | Self::Io(_) => 20,
            Self::Anyhow(_) => 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_errors_map_to_validation_code() {
        let err: CliError = ExecutorError::CyclicDependency("a -> b -> a".into()).into();
        assert_eq!(err.exit_code(), 12);
        assert_eq!(CliError::Config("bad".into()).exit_code(), 11);
        assert_eq!(CliError::Anyhow(anyhow::anyhow!("boom")).exit_code(), 50);
    }
}
