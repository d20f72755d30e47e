pub mod agent;
pub mod executor;

pub use agent::{AgentError, GenerationError, GenerationFailure};
pub use executor::ExecutorError;
