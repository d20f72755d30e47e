use std::collections::HashMap;

use async_trait::async_trait;
use quill_core::persist::{SaveOutcome, SectionStore};
use quill_core::util::word_count;
use tokio::sync::RwLock;

/// Section store that keeps content in process memory.
///
/// Saving the same (node, section) pair again overwrites the previous content.
#[derive(Default)]
pub struct InMemorySectionStore {
    sections: RwLock<HashMap<(String, String), String>>,
}

impl InMemorySectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, node_ref: &str, section_id: &str) -> Option<String> {
        self.sections
            .read()
            .await
            .get(&(node_ref.to_string(), section_id.to_string()))
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.sections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sections.read().await.is_empty()
    }
}

#[async_trait]
impl SectionStore for InMemorySectionStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn save_section_content(
        &self,
        node_ref: &str,
        section_id: &str,
        content: &str,
    ) -> anyhow::Result<SaveOutcome> {
        if section_id.trim().is_empty() {
            anyhow::bail!("section id must not be empty");
        }
        self.sections.write().await.insert(
            (node_ref.to_string(), section_id.to_string()),
            content.to_string(),
        );
        tracing::debug!(node_ref, section_id, "section saved");
        Ok(SaveOutcome {
            success: true,
            word_count: word_count(content),
        })
    }
}
