//! Tools the agent can call, and the registry that names them.
//!
//! Every tool takes one free-form text input and returns text. The registry
//! is built once at startup and never changes afterwards.

mod retriever;
mod web_search;

pub use retriever::RetrieverTool;
pub use web_search::WebSearchTool;

use crate::config::Settings;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::vector_store::VectorStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// A capability the agent can invoke by name.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses after `Action:`.
    fn name(&self) -> &str;

    /// One-line description shown in the agent prompt.
    fn description(&self) -> &str;

    /// Run the tool. Failures are reported as [`crate::DoctorBotError::ToolExecution`].
    async fn invoke(&self, input: &str) -> Result<String>;
}

/// Fixed table of tools, looked up by exact name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Build a registry. Later tools with a duplicate name are ignored.
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        let mut by_name = HashMap::new();
        let mut kept: Vec<Arc<dyn Tool>> = Vec::with_capacity(tools.len());

        for tool in tools {
            if by_name.contains_key(tool.name()) {
                warn!("Ignoring duplicate tool registration: {}", tool.name());
                continue;
            }
            by_name.insert(tool.name().to_string(), kept.len());
            kept.push(tool);
        }

        Self {
            tools: kept,
            by_name,
        }
    }

    /// Build the standard registry: web search when it is enabled and its
    /// API key is available, then the document retriever.
    pub fn from_settings(
        settings: &Settings,
        vector_store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let mut tools: Vec<Arc<dyn Tool>> = Vec::with_capacity(2);

        if settings.web_search.enabled {
            match std::env::var(&settings.web_search.api_key_env) {
                Ok(key) if !key.is_empty() => {
                    tools.push(Arc::new(WebSearchTool::new(
                        &settings.web_search.endpoint,
                        key,
                        settings.web_search.max_results,
                    )?));
                }
                _ => warn!(
                    "{} not set; web search tool disabled",
                    settings.web_search.api_key_env
                ),
            }
        }

        tools.push(Arc::new(
            RetrieverTool::new(vector_store, embedder)
                .with_k(settings.retriever.k)
                .with_min_score(settings.retriever.min_score),
        ));

        let registry = Self::new(tools);
        info!("Registered tools: {}", registry.names());
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.by_name.get(name).map(|&i| self.tools[i].clone())
    }

    /// Comma-separated tool names, in registration order.
    pub fn names(&self) -> String {
        self.tools
            .iter()
            .map(|t| t.name())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `name: description` lines for the prompt.
    pub fn describe(&self) -> String {
        self.tools
            .iter()
            .map(|t| format!("{}: {}", t.name(), t.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::error::DoctorBotError;
    use std::sync::Mutex;

    /// Tool that returns a canned reply and records its inputs.
    pub struct StubTool {
        name: String,
        reply: std::result::Result<String, String>,
        pub calls: Mutex<Vec<String>>,
    }

    impl StubTool {
        pub fn ok(name: &str, reply: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                reply: Ok(reply.to_string()),
                calls: Mutex::new(Vec::new()),
            })
        }

        pub fn failing(name: &str, error: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                reply: Err(error.to_string()),
                calls: Mutex::new(Vec::new()),
            })
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Tool for StubTool {
        fn name(&self) -> &str {
            &self.name
        }

        fn description(&self) -> &str {
            "stub tool"
        }

        async fn invoke(&self, input: &str) -> Result<String> {
            self.calls.lock().unwrap().push(input.to_string());
            self.reply
                .clone()
                .map_err(|e| DoctorBotError::tool(&self.name, e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::StubTool;
    use super::*;
    use crate::vector_store::MemoryVectorStore;

    #[test]
    fn test_lookup_is_exact() {
        let registry = ToolRegistry::new(vec![
            StubTool::ok("retriever_tool", "a"),
            StubTool::ok("tavily_search", "b"),
        ]);

        assert!(registry.get("retriever_tool").is_some());
        assert!(registry.get("Retriever_Tool").is_none());
        assert!(registry.get("retriever").is_none());
        assert_eq!(registry.names(), "retriever_tool, tavily_search");
        assert_eq!(
            registry.describe(),
            "retriever_tool: stub tool\ntavily_search: stub tool"
        );
    }

    #[test]
    fn test_duplicate_names_keep_first() {
        let registry = ToolRegistry::new(vec![
            StubTool::ok("search", "first"),
            StubTool::ok("search", "second"),
        ]);
        assert_eq!(registry.len(), 1);
    }

    struct NoopEmbedder;

    #[async_trait]
    impl Embedder for NoopEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0])
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0]).collect())
        }
    }

    fn registry_for(settings: &Settings) -> ToolRegistry {
        ToolRegistry::from_settings(
            settings,
            Arc::new(MemoryVectorStore::new()),
            Arc::new(NoopEmbedder),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_from_settings_without_search_key() {
        let mut settings = Settings::default();
        settings.web_search.api_key_env = "DOCTORBOT_TEST_UNSET_SEARCH_KEY".to_string();

        assert_eq!(registry_for(&settings).names(), "retriever_tool");
    }

    #[tokio::test]
    async fn test_from_settings_lists_search_first() {
        let mut settings = Settings::default();
        settings.web_search.api_key_env = "DOCTORBOT_TEST_ORDER_SEARCH_KEY".to_string();
        std::env::set_var("DOCTORBOT_TEST_ORDER_SEARCH_KEY", "tvly-test");

        let registry = registry_for(&settings);

        assert_eq!(registry.names(), "tavily_search, retriever_tool");
        assert!(registry.describe().starts_with("tavily_search: "));
    }
}
