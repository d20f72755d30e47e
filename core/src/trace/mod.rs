//! Execution tracing: per-task event records, aggregate stats and JSON export.

mod model;
mod stats;
mod tracer;

pub use model::{EventType, ExecutionEvent, ExecutionTrace, TraceStatus};
pub use stats::{AgentStats, TraceStats};
pub use tracer::{ExecutionTracer, TraceExport};
