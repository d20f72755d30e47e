use async_trait::async_trait;

use crate::error::AgentError;

use super::context::AgentContext;
use super::message::A2AMessage;
use super::types::{AgentCapabilities, AgentResult, AgentRole, AgentTask};

/// A unit that turns an [`AgentTask`] into an [`AgentResult`].
///
/// Implementations must not touch the graph; persistence of generated content
/// is the caller's business.
#[async_trait]
pub trait Agent: Send + Sync {
    fn id(&self) -> &str;

    fn capabilities(&self) -> &AgentCapabilities;

    fn role(&self) -> AgentRole {
        self.capabilities().role
    }

    async fn execute(
        &self,
        task: &AgentTask,
        ctx: &AgentContext,
    ) -> Result<AgentResult, AgentError>;

    /// Handle an A2A message. The default only understands `Task`.
    async fn receive(
        &self,
        message: A2AMessage,
        ctx: &AgentContext,
    ) -> Result<A2AMessage, AgentError> {
        match message {
            A2AMessage::Task(task) => {
                let result = self.execute(&task, ctx).await?;
                Ok(A2AMessage::Result { task, result })
            }
            other => Err(AgentError::UnsupportedMessage {
                agent_id: self.id().to_string(),
                kind: other.kind(),
            }),
        }
    }
}
