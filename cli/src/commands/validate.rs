use quill_core::executor::TaskGraph;

use crate::commands::cli::ValidateArgs;
use crate::error::CliError;
use crate::graph_file::GraphFile;

pub fn handle_validate(args: &ValidateArgs) -> Result<i32, CliError> {
    let file = GraphFile::load(&args.graph)?;
    for line in render_plan(&file)? {
        println!("{line}");
    }
    Ok(0)
}

/// Validate the graph and describe its planned stages.
pub fn render_plan(file: &GraphFile) -> Result<Vec<String>, CliError> {
    let graph = TaskGraph::from_tasks(&file.nodes)?;
    graph.validate()?;
    let stages = graph.topological_stages()?;

    let mut out = vec![format!(
        "graph ok: {} node(s) in {} stage(s)",
        graph.len(),
        stages.len()
    )];
    for (i, stage) in stages.iter().enumerate() {
        out.push(format!("  stage {}: {}", i + 1, stage.join(", ")));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quill_core::agent::{AgentTask, TaskType};
    use quill_core::error::ExecutorError;
    use quill_core::executor::DagNode;

    fn node(id: &str, deps: &[&str]) -> DagNode {
        DagNode::single(AgentTask::new(id, TaskType::WriteSection, "s", "d"))
            .with_dependencies(deps.iter().copied())
    }

    #[test]
    fn renders_stages() {
        let file = GraphFile {
            nodes: vec![node("a", &[]), node("b", &[]), node("c", &["a", "b"])],
            cluster: None,
        };
        assert_eq!(
            render_plan(&file).unwrap(),
            vec![
                "graph ok: 3 node(s) in 2 stage(s)".to_string(),
                "  stage 1: a, b".to_string(),
                "  stage 2: c".to_string(),
            ]
        );
    }

    #[test]
    fn reports_cycles() {
        let file = GraphFile {
            nodes: vec![node("a", &["b"]), node("b", &["a"])],
            cluster: None,
        };
        let err = render_plan(&file).unwrap_err();
        assert!(matches!(err, CliError::Graph(ExecutorError::CyclicDependency(_))));
        assert_eq!(err.exit_code(), 12);
    }
}
