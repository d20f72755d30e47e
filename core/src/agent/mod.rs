//! Agent abstraction: task/result types, the A2A message enum, the writer and
//! critic implementations and the registry that hands them out.

pub mod context;
pub mod critic;
pub mod critique;
pub mod generation;
pub mod message;
pub mod registry;
pub mod traits;
pub mod types;
pub mod writer;

pub use context::{AgentContext, ModelMode, ModelPreferences, RunMetadata};
pub use critic::{CriticAgent, Review};
pub use critique::{parse_critique, CritiquePayload, Severity, Verdict};
pub use generation::{Generation, GenerationOptions, Generator, Prompt};
pub use message::A2AMessage;
pub use registry::{AgentRegistry, AgentStatus, LoadGuard};
pub use traits::Agent;
pub use types::{AgentCapabilities, AgentResult, AgentRole, AgentTask, TaskType};
pub use writer::WriterAgent;
