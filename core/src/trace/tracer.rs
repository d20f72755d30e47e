use std::collections::HashMap;
use std::fmt::Write;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Instant;

use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::TracerConfig;

use super::model::{EventType, ExecutionEvent, ExecutionTrace, TraceStatus};
use super::stats::TraceStats;

struct ActiveTrace {
    trace: ExecutionTrace,
    started: Instant,
}

/// Full JSON snapshot handed to external dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceExport {
    pub exported_at: DateTime<Utc>,
    pub traces: Vec<ExecutionTrace>,
    pub stats: TraceStats,
}

/// Observability sink for task executions.
///
/// Open traces live in a map of per-trace mutexes so concurrent nodes only
/// serialize on their own trace. Finalized traces move into a bounded LRU;
/// past `max_traces` the oldest finalized trace is evicted.
pub struct ExecutionTracer {
    active: RwLock<HashMap<String, Arc<Mutex<ActiveTrace>>>>,
    completed: Mutex<LruCache<String, ExecutionTrace>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl ExecutionTracer {
    pub fn new(max_traces: usize) -> Self {
        let cap = NonZeroUsize::new(max_traces).unwrap_or(NonZeroUsize::MIN);
        Self {
            active: RwLock::new(HashMap::new()),
            completed: Mutex::new(LruCache::new(cap)),
        }
    }

    pub fn from_config(cfg: &TracerConfig) -> Self {
        Self::new(cfg.max_traces)
    }

    fn active_entry(&self, task_id: &str) -> Option<Arc<Mutex<ActiveTrace>>> {
        let map = match self.active.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.get(task_id).cloned()
    }

    fn active_map(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<Mutex<ActiveTrace>>>> {
        match self.active.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Open a trace. A second call for a still-open id is ignored with a
    /// warning. Starting an id that already finished replaces the old record.
    pub fn start_trace(&self, task_id: &str, agent_id: &str) {
        let mut active = self.active_map();
        if active.contains_key(task_id) {
            tracing::warn!(task_id, agent_id, "trace already open; ignoring start");
            return;
        }
        if lock(&self.completed).pop(task_id).is_some() {
            tracing::debug!(task_id, "replacing finished trace");
        }

        let mut trace = ExecutionTrace::open(task_id, agent_id);
        trace.events.push(ExecutionEvent {
            timestamp: trace.start_time,
            event_type: EventType::Start,
            message: format!("started by {agent_id}"),
            metadata: None,
        });
        active.insert(
            task_id.to_string(),
            Arc::new(Mutex::new(ActiveTrace {
                trace,
                started: Instant::now(),
            })),
        );
    }

    /// Append an event to an open trace. Unknown or finished ids are ignored
    /// with a warning.
    pub fn add_event(
        &self,
        task_id: &str,
        event_type: EventType,
        message: impl Into<String>,
        metadata: Option<Value>,
    ) {
        let Some(entry) = self.active_entry(task_id) else {
            tracing::warn!(task_id, event = %event_type, "event for unknown trace dropped");
            return;
        };
        lock(&entry).trace.events.push(ExecutionEvent {
            timestamp: Utc::now(),
            event_type,
            message: message.into(),
            metadata,
        });
    }

    /// Finalize a trace and move it into the bounded store.
    pub fn end_trace(&self, task_id: &str, status: TraceStatus, tokens_used: u64, cost: f64) {
        let Some(entry) = self.active_map().remove(task_id) else {
            tracing::warn!(task_id, %status, "end for unknown trace ignored");
            return;
        };

        let status = if status == TraceStatus::Running {
            tracing::warn!(task_id, "trace ended with running status; recording as failed");
            TraceStatus::Failed
        } else {
            status
        };

        let (mut trace, started) = {
            let active = lock(&entry);
            (active.trace.clone(), active.started)
        };
        let now = Utc::now();
        trace.end_time = Some(now);
        trace.duration = Some(started.elapsed().as_millis() as u64);
        trace.status = status;
        trace.tokens_used = tokens_used;
        trace.cost = cost;

        if let Some((evicted, _)) = lock(&self.completed).push(task_id.to_string(), trace) {
            if evicted != task_id {
                tracing::debug!(evicted = %evicted, "trace store full; evicted oldest trace");
            }
        }
    }

    pub fn get_trace(&self, task_id: &str) -> Option<ExecutionTrace> {
        if let Some(entry) = self.active_entry(task_id) {
            return Some(lock(&entry).trace.clone());
        }
        lock(&self.completed).peek(task_id).cloned()
    }

    /// Every known trace, optionally filtered by status, ordered by start time.
    pub fn get_all_traces(&self, status: Option<TraceStatus>) -> Vec<ExecutionTrace> {
        let mut traces = self.snapshot();
        if let Some(status) = status {
            traces.retain(|t| t.status == status);
        }
        traces
    }

    pub fn get_traces_by_agent(&self, agent_id: &str) -> Vec<ExecutionTrace> {
        let mut traces = self.snapshot();
        traces.retain(|t| t.agent_id == agent_id);
        traces
    }

    pub fn get_active_traces(&self) -> Vec<ExecutionTrace> {
        self.get_all_traces(Some(TraceStatus::Running))
    }

    pub fn get_stats(&self) -> TraceStats {
        TraceStats::from_traces(&self.snapshot())
    }

    /// Human-readable event dump for one trace.
    pub fn get_timeline(&self, task_id: &str) -> Option<String> {
        let trace = self.get_trace(task_id)?;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Trace {} (agent {}, status {})",
            trace.task_id, trace.agent_id, trace.status
        );
        for event in &trace.events {
            let offset = (event.timestamp - trace.start_time).num_milliseconds();
            let _ = write!(
                out,
                "  +{offset}ms [{}] {}",
                event.event_type, event.message
            );
            if let Some(meta) = &event.metadata {
                let _ = write!(out, " {meta}");
            }
            out.push('\n');
        }
        if let Some(duration) = trace.duration {
            let _ = writeln!(
                out,
                "  total {duration}ms, {} tokens, cost {:.4}",
                trace.tokens_used, trace.cost
            );
        }
        Some(out)
    }

    pub fn export_traces(&self) -> TraceExport {
        let traces = self.snapshot();
        let stats = TraceStats::from_traces(&traces);
        TraceExport {
            exported_at: Utc::now(),
            traces,
            stats,
        }
    }

    pub fn export_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.export_traces())
    }

    /// Drop every trace, open or finished.
    pub fn clear(&self) {
        self.active_map().clear();
        lock(&self.completed).clear();
    }

    pub fn len(&self) -> usize {
        let active = match self.active.read() {
            Ok(g) => g.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        };
        active + lock(&self.completed).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<ExecutionTrace> {
        let open: Vec<Arc<Mutex<ActiveTrace>>> = match self.active.read() {
            Ok(g) => g.values().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().values().cloned().collect(),
        };
        let mut traces: Vec<ExecutionTrace> =
            open.iter().map(|e| lock(e).trace.clone()).collect();
        traces.extend(lock(&self.completed).iter().map(|(_, t)| t.clone()));
        traces.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.task_id.cmp(&b.task_id))
        });
        traces
    }
}

impl Default for ExecutionTracer {
    fn default() -> Self {
        Self::from_config(&TracerConfig::default())
    }
}
