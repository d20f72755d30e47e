//! Persistence capability consumed by callers after a run.
//!
//! The engine never saves content itself; callers hand each successful
//! [`AgentResult`](crate::agent::AgentResult) to a store.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOutcome {
    pub success: bool,
    pub word_count: usize,
}

#[async_trait]
pub trait SectionStore: Send + Sync {
    fn name(&self) -> &str;

    async fn save_section_content(
        &self,
        node_ref: &str,
        section_id: &str,
        content: &str,
    ) -> anyhow::Result<SaveOutcome>;
}
