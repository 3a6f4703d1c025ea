//! Document retriever over the medical reference index.

use super::Tool;
use crate::embedding::Embedder;
use crate::error::{DoctorBotError, Result};
use crate::vector_store::VectorStore;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

pub const RETRIEVER_TOOL_NAME: &str = "retriever_tool";

const DESCRIPTION: &str = "Information related to medical conditions, symptoms, treatments, \
medications, and health advice. Use this tool to answer specific questions about illnesses, \
drugs, and general health topics.";

/// Embeds the query and returns the closest reference chunks.
pub struct RetrieverTool {
    vector_store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    k: usize,
    min_score: f32,
}

impl RetrieverTool {
    pub fn new(vector_store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            vector_store,
            embedder,
            k: 3,
            min_score: 0.0,
        }
    }

    /// Set how many chunks are returned.
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k.max(1);
        self
    }

    /// Set the minimum similarity score threshold.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }
}

#[async_trait]
impl Tool for RetrieverTool {
    fn name(&self) -> &str {
        RETRIEVER_TOOL_NAME
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    #[instrument(skip(self), fields(k = self.k))]
    async fn invoke(&self, input: &str) -> Result<String> {
        let embedding = self
            .embedder
            .embed(input)
            .await
            .map_err(|e| DoctorBotError::tool(RETRIEVER_TOOL_NAME, e))?;

        let results = self
            .vector_store
            .search_with_threshold(&embedding, self.k, self.min_score)
            .await
            .map_err(|e| DoctorBotError::tool(RETRIEVER_TOOL_NAME, e))?;

        debug!("Retrieved {} documents", results.len());

        if results.is_empty() {
            return Ok("No relevant documents found.".to_string());
        }

        Ok(results
            .into_iter()
            .map(|r| r.document.content)
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}
