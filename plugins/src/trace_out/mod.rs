pub mod jsonl;

pub use jsonl::{start_trace_sink, write_traces_jsonl, TraceSinkTx};
