pub mod echo;
pub mod scripted;

pub use echo::EchoGeneration;
pub use scripted::{ScriptedGeneration, ScriptedStep};
