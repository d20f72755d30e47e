use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::model::{ExecutionTrace, TraceStatus};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStats {
    pub traces: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub average_duration_ms: f64,
}

/// Aggregate view over a set of traces.
///
/// Rates, totals and averages only consider finalized traces; `active`
/// counts the ones still running.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceStats {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub success_rate: f64,
    pub average_duration_ms: f64,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub by_agent: BTreeMap<String, AgentStats>,
}

#[derive(Default)]
struct Acc {
    traces: usize,
    finished: usize,
    succeeded: usize,
    failed: usize,
    cancelled: usize,
    tokens: u64,
    cost: f64,
    duration_ms: u64,
}

impl Acc {
    fn add(&mut self, trace: &ExecutionTrace) {
        self.traces += 1;
        if !trace.is_finished() {
            return;
        }
        self.finished += 1;
        match trace.status {
            TraceStatus::Success => self.succeeded += 1,
            TraceStatus::Failed => self.failed += 1,
            TraceStatus::Cancelled => self.cancelled += 1,
            TraceStatus::Running => {}
        }
        self.tokens += trace.tokens_used;
        self.cost += trace.cost;
        self.duration_ms += trace.duration.unwrap_or(0);
    }

    fn average_duration(&self) -> f64 {
        if self.finished == 0 {
            0.0
        } else {
            self.duration_ms as f64 / self.finished as f64
        }
    }
}

impl TraceStats {
    /// Compute stats from any collection of traces, e.g. a parsed export.
    ///
    /// Input order does not matter: traces are folded in `(start_time,
    /// task_id)` order so float totals come out identical for the same set.
    pub fn from_traces<'a, I>(traces: I) -> Self
    where
        I: IntoIterator<Item = &'a ExecutionTrace>,
    {
        let mut sorted: Vec<&ExecutionTrace> = traces.into_iter().collect();
        sorted.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.task_id.cmp(&b.task_id))
        });

        let mut all = Acc::default();
        let mut per_agent: BTreeMap<String, Acc> = BTreeMap::new();
        for trace in sorted {
            all.add(trace);
            per_agent.entry(trace.agent_id.clone()).or_default().add(trace);
        }

        let by_agent = per_agent
            .into_iter()
            .map(|(agent_id, acc)| {
                let stats = AgentStats {
                    traces: acc.traces,
                    succeeded: acc.succeeded,
                    failed: acc.failed,
                    total_tokens: acc.tokens,
                    total_cost: acc.cost,
                    average_duration_ms: acc.average_duration(),
                };
                (agent_id, stats)
            })
            .collect();

        let success_rate = if all.finished == 0 {
            0.0
        } else {
            all.succeeded as f64 / all.finished as f64
        };

        Self {
            total: all.traces,
            active: all.traces - all.finished,
            completed: all.finished,
            succeeded: all.succeeded,
            failed: all.failed,
            cancelled: all.cancelled,
            success_rate,
            average_duration_ms: all.average_duration(),
            total_tokens: all.tokens,
            total_cost: all.cost,
            by_agent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn trace(id: &str, agent: &str, status: TraceStatus, tokens: u64, cost: f64) -> ExecutionTrace {
        let mut t = ExecutionTrace::open(id, agent);
        t.status = status;
        if status.is_final() {
            t.tokens_used = tokens;
            t.cost = cost;
            t.duration = Some(100);
            t.end_time = Some(t.start_time + Duration::milliseconds(100));
        }
        t
    }

    #[test]
    fn running_traces_are_excluded_from_rates() {
        let traces = vec![
            trace("a", "w", TraceStatus::Success, 10, 0.1),
            trace("b", "w", TraceStatus::Failed, 5, 0.05),
            trace("c", "c", TraceStatus::Running, 0, 0.0),
        ];
        let stats = TraceStats::from_traces(&traces);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.success_rate, 0.5);
        assert_eq!(stats.total_tokens, 15);
        assert_eq!(stats.average_duration_ms, 100.0);
        assert_eq!(stats.by_agent["w"].traces, 2);
        assert_eq!(stats.by_agent["c"].succeeded, 0);
    }

    #[test]
    fn order_of_input_does_not_change_totals() {
        let base = Utc::now();
        let mut traces: Vec<ExecutionTrace> = (0..20)
            .map(|i| {
                let mut t = trace(&format!("t{i}"), "w", TraceStatus::Success, 1, 0.1 * i as f64);
                t.start_time = base + Duration::milliseconds(i);
                t
            })
            .collect();
        let forward = TraceStats::from_traces(&traces);
        traces.reverse();
        let backward = TraceStats::from_traces(&traces);
        assert_eq!(forward, backward);
    }

    #[test]
    fn empty_set_yields_zeroes() {
        let stats = TraceStats::from_traces(std::iter::empty());
        assert_eq!(stats, TraceStats::default());
    }
}
