use std::sync::Arc;

use quill_core::agent::{ModelPreferences, RunMetadata};
use quill_core::cluster::ClusterConfig;
use quill_core::config::QuillConfig;
use quill_core::executor::{DagExecutionResult, NodeStatus};
use quill_core::orchestrator::MultiAgentOrchestrator;
use quill_core::persist::SectionStore;
use quill_core::trace::TraceStats;
use quill_plugins::factory;
use quill_plugins::store::InMemorySectionStore;
use quill_plugins::trace_out::write_traces_jsonl;

use crate::commands::cli::RunArgs;
use crate::error::CliError;
use crate::graph_file::GraphFile;

pub async fn handle_run(args: RunArgs, mut cfg: QuillConfig) -> Result<i32, CliError> {
    let file = GraphFile::load(&args.graph)?;
    if let Some(n) = args.max_concurrency {
        cfg.executor.max_concurrency = n;
    }
    let cluster = file
        .cluster
        .clone()
        .unwrap_or_else(|| ClusterConfig::from_defaults(&cfg.cluster));

    let orchestrator = factory::build_orchestrator(cfg, factory::build_generator("echo")?)?;

    let mut run = RunMetadata::new();
    if let Some(user) = args.user.as_deref() {
        run = run.with_user(user);
    }
    if let Some(model) = args.model.as_deref() {
        run = run.with_model_preferences(ModelPreferences::fixed(model));
    }
    tracing::info!(run_id = %run.run_id, nodes = file.nodes.len(), "starting dry run");

    let (cancel, fut) = orchestrator.run_graph_with_cancel(&file.nodes, &cluster, run);
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling run");
                cancel.cancel();
            }
        })
    };
    let outcome = fut.await;
    watcher.abort();
    let result = outcome?;

    let store = InMemorySectionStore::new();
    let saved = save_successful(&store, &file, &result).await?;

    if let Some(path) = args.traces_out.as_deref() {
        write_traces_jsonl(path, &orchestrator.tracer().get_all_traces(None)).await?;
    }
    if let Some(path) = args.export.as_deref() {
        let json = orchestrator
            .export_traces_json()
            .map_err(|e| CliError::Command(e.to_string()))?;
        std::fs::write(path, json)?;
    }

    if args.json {
        let body = serde_json::to_string_pretty(&result)
            .map_err(|e| CliError::Command(e.to_string()))?;
        println!("{body}");
    } else {
        for line in render_report(&file, &result, &orchestrator_stats(&orchestrator), saved) {
            println!("{line}");
        }
    }

    Ok(if result.is_success() { 0 } else { 1 })
}

fn orchestrator_stats(orchestrator: &MultiAgentOrchestrator) -> TraceStats {
    orchestrator.tracer().get_stats()
}

/// Hand every successful node's content to the store. Returns the number saved.
pub async fn save_successful(
    store: &dyn SectionStore,
    file: &GraphFile,
    result: &DagExecutionResult,
) -> Result<usize, CliError> {
    let mut saved = 0;
    for node in &file.nodes {
        let Some(res) = result.results.get(&node.id).filter(|r| r.success) else {
            continue;
        };
        let outcome = store
            .save_section_content(&result.run_id, &node.task.section_id, &res.content)
            .await?;
        tracing::debug!(
            node_id = %node.id,
            store = store.name(),
            words = outcome.word_count,
            "section saved"
        );
        if outcome.success {
            saved += 1;
        }
    }
    Ok(saved)
}

pub fn render_report(
    file: &GraphFile,
    result: &DagExecutionResult,
    stats: &TraceStats,
    saved: usize,
) -> Vec<String> {
    let mut out = Vec::with_capacity(file.nodes.len() + 4);
    out.push(format!("run {} ({}ms)", result.run_id, result.duration_ms));
    for node in &file.nodes {
        let status = result.status(&node.id).unwrap_or(NodeStatus::Failed);
        let mut line = format!("  {:<24} {}", node.id, status);
        if let Some(res) = result.results.get(&node.id) {
            if res.quality_warning {
                line.push_str(" (quality warning)");
            } else if res.revisions > 0 {
                line.push_str(&format!(" ({} revision(s))", res.revisions));
            }
        }
        if let Some(reason) = result.failure(&node.id) {
            line.push_str(&format!(": {}", reason.describe()));
        }
        out.push(line);
    }
    let s = &result.summary;
    out.push(format!(
        "summary: {} succeeded, {} failed, {} skipped, {} cancelled, {} saved",
        s.succeeded, s.failed, s.skipped, s.cancelled, saved
    ));
    out.push(format!(
        "traces: {} completed, success rate {:.0}%, {} tokens, cost {:.4}",
        stats.completed,
        stats.success_rate * 100.0,
        stats.total_tokens,
        stats.total_cost
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quill_core::agent::{AgentTask, TaskType};
    use quill_core::executor::DagNode;
    use quill_core::trace::{ExecutionTrace, TraceExport, TraceStatus};

    fn graph() -> GraphFile {
        GraphFile {
            nodes: vec![
                DagNode::cluster(AgentTask::new("intro", TaskType::WriteSection, "s1", "Open")),
                DagNode::single(AgentTask::new("sum", TaskType::Summarize, "s2", "Sum up"))
                    .with_dependencies(["intro"]),
            ],
            cluster: None,
        }
    }

    #[tokio::test]
    async fn dry_run_saves_every_section() {
        let cfg = QuillConfig::default();
        let orchestrator =
            factory::build_orchestrator(cfg, factory::build_generator("echo").unwrap()).unwrap();
        let file = graph();
        let result = orchestrator
            .run_graph(&file.nodes, &ClusterConfig::default())
            .await
            .unwrap();
        assert!(result.is_success());

        let store = InMemorySectionStore::new();
        let saved = save_successful(&store, &file, &result).await.unwrap();
        assert_eq!(saved, 2);
        assert!(store.get(&result.run_id, "s2").await.is_some());

        let stats = orchestrator.tracer().get_stats();
        let report = render_report(&file, &result, &stats, saved);
        assert!(report[1].contains("intro"));
        assert!(report[1].ends_with("success"));
        assert!(report[3].starts_with("summary: 2 succeeded, 0 failed"));
    }

    #[tokio::test]
    async fn run_writes_trace_lines_and_export() {
        let dir = tempfile::tempdir().unwrap();
        let graph_path = dir.path().join("graph.json");
        std::fs::write(&graph_path, serde_json::to_string(&graph()).unwrap()).unwrap();
        let traces_path = dir.path().join("traces.jsonl");
        let export_path = dir.path().join("export.json");

        let args = RunArgs {
            graph: graph_path,
            max_concurrency: Some(1),
            model: None,
            user: Some("tester".into()),
            traces_out: Some(traces_path.to_string_lossy().into_owned()),
            export: Some(export_path.clone()),
            json: false,
        };
        let code = handle_run(args, QuillConfig::default()).await.unwrap();
        assert_eq!(code, 0);

        let lines: Vec<ExecutionTrace> = std::fs::read_to_string(&traces_path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|t| t.status == TraceStatus::Success));

        let export: TraceExport =
            serde_json::from_str(&std::fs::read_to_string(&export_path).unwrap()).unwrap();
        assert_eq!(export.traces.len(), 2);
        assert_eq!(export.stats.succeeded, 2);
        assert_eq!(export.stats, TraceStats::from_traces(&export.traces));
    }
}
