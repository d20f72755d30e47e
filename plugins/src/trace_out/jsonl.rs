use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Context;
use quill_core::trace::ExecutionTrace;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Path that routes trace lines to stdout instead of a file.
pub const STDOUT_TARGET: &str = "stdout:";

const CHANNEL_CAPACITY: usize = 256;

/// Sending half of a JSONL trace writer. One finished trace per line.
pub struct TraceSinkTx {
    tx: mpsc::Sender<String>,
    written: Arc<AtomicU64>,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl TraceSinkTx {
    pub async fn send(&self, trace: &ExecutionTrace) -> anyhow::Result<()> {
        let line = serde_json::to_string(trace)?;
        self.tx
            .send(line)
            .await
            .map_err(|_| anyhow::anyhow!("trace sink writer closed"))
    }

    /// Close the channel and wait for every queued line to be flushed.
    pub async fn finish(self) -> anyhow::Result<u64> {
        drop(self.tx);
        self.handle.await.context("trace sink writer panicked")??;
        Ok(self.written.load(Ordering::Relaxed))
    }
}

/// Spawn a writer appending trace lines to `path` (or stdout for `stdout:`).
pub async fn start_trace_sink(path: &str) -> anyhow::Result<TraceSinkTx> {
    let mut writer: Box<dyn tokio::io::AsyncWrite + Unpin + Send> = if path == STDOUT_TARGET {
        Box::new(tokio::io::stdout())
    } else {
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("open trace output {path}"))?;
        Box::new(file)
    };

    let (tx, mut rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
    let written = Arc::new(AtomicU64::new(0));
    let written_clone = written.clone();

    let handle = tokio::spawn(async move {
        while let Some(mut line) = rx.recv().await {
            line.push('\n');
            writer.write_all(line.as_bytes()).await?;
            written_clone.fetch_add(1, Ordering::Relaxed);
        }
        writer.flush().await?;
        Ok::<(), anyhow::Error>(())
    });

    Ok(TraceSinkTx {
        tx,
        written,
        handle,
    })
}

/// Write `traces` as JSONL to `path` and return how many lines were written.
pub async fn write_traces_jsonl(path: &str, traces: &[ExecutionTrace]) -> anyhow::Result<u64> {
    let sink = start_trace_sink(path).await?;
    for trace in traces {
        sink.send(trace).await?;
    }
    let written = sink.finish().await?;
    tracing::info!(path, written, "traces exported");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::trace::{EventType, ExecutionTracer, TraceStatus};

    fn finished_traces() -> Vec<ExecutionTrace> {
        let tracer = ExecutionTracer::new(10);
        tracer.start_trace("a", "writer-1");
        tracer.add_event("a", EventType::Progress, "drafting", None);
        tracer.end_trace("a", TraceStatus::Success, 12, 0.25);
        tracer.start_trace("b", "writer-1");
        tracer.end_trace("b", TraceStatus::Failed, 0, 0.0);
        tracer.get_all_traces(None)
    }

    #[tokio::test]
    async fn writes_one_line_per_trace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traces.jsonl");
        let path = path.to_str().unwrap();
        let traces = finished_traces();

        let written = write_traces_jsonl(path, &traces).await.unwrap();
        assert_eq!(written, 2);

        let body = tokio::fs::read_to_string(path).await.unwrap();
        let parsed: Vec<ExecutionTrace> = body
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(parsed, traces);
    }

    #[tokio::test]
    async fn appends_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traces.jsonl");
        let path = path.to_str().unwrap();
        let traces = finished_traces();

        write_traces_jsonl(path, &traces[..1]).await.unwrap();
        write_traces_jsonl(path, &traces[1..]).await.unwrap();

        let body = tokio::fs::read_to_string(path).await.unwrap();
        assert_eq!(body.lines().count(), 2);
    }

    #[tokio::test]
    async fn unwritable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("traces.jsonl");
        assert!(start_trace_sink(path.to_str().unwrap()).await.is_err());
    }
}
