//! Multi-agent orchestration for hierarchical writing tasks.
//!
//! A task graph of [`executor::DagNode`]s is staffed from an
//! [`agent::AgentRegistry`], run by the [`executor::DagExecutor`] (single
//! agents or [`cluster::WriterCriticCluster`] revision loops) and recorded by
//! the [`trace::ExecutionTracer`]. [`orchestrator::MultiAgentOrchestrator`]
//! wires these together.

pub mod agent;
pub mod api;
pub mod cluster;
pub mod config;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod persist;
pub mod trace;
pub mod util;
