//! Wires DoctorBot's components together from settings.
//!
//! Every front end (chat, ask, serve) goes through the orchestrator so they
//! share one registry, one thread store and one graph runner.

use crate::agent::{AgentStep, GraphRunner, ToolExecutor};
use crate::config::{Prompts, Settings};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::Result;
use crate::llm::{Generator, OpenAIGenerator};
use crate::threads::{SqliteThreadStore, ThreadStore};
use crate::tools::ToolRegistry;
use crate::vector_store::{SqliteVectorStore, VectorStore};
use std::sync::Arc;
use tracing::info;

/// Owns the assembled assistant.
pub struct Orchestrator {
    settings: Settings,
    registry: Arc<ToolRegistry>,
    threads: Arc<dyn ThreadStore>,
    runner: Arc<GraphRunner>,
}

impl Orchestrator {
    /// Build everything from settings, optionally overriding the model.
    pub fn new(settings: Settings, model: Option<&str>) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let mut generator = OpenAIGenerator::from_settings(&settings.llm)?;
        if let Some(model) = model {
            generator = generator.with_model(model);
        }
        info!("Using model {}", generator.model());

        let embedder = Arc::new(OpenAIEmbedder::from_settings(&settings.embedding)?);
        let vector_store = Arc::new(SqliteVectorStore::new(&settings.index_path())?);
        let threads = Arc::new(SqliteThreadStore::new(&settings.threads_path())?);

        Self::with_components(
            settings,
            prompts,
            Arc::new(generator),
            embedder,
            vector_store,
            threads,
        )
    }

    /// Build from explicit components.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        generator: Arc<dyn Generator>,
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
        threads: Arc<dyn ThreadStore>,
    ) -> Result<Self> {
        let registry = Arc::new(ToolRegistry::from_settings(
            &settings,
            vector_store,
            embedder,
        )?);

        let runner = GraphRunner::new(
            AgentStep::new(generator, registry.clone(), prompts),
            ToolExecutor::new(registry.clone()),
            threads.clone(),
        )
        .with_max_iterations(settings.agent.max_iterations);

        Ok(Self {
            settings,
            registry,
            threads,
            runner: Arc::new(runner),
        })
    }

    pub fn runner(&self) -> Arc<GraphRunner> {
        self.runner.clone()
    }

    pub fn thread_store(&self) -> Arc<dyn ThreadStore> {
        self.threads.clone()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::threads::MemoryThreadStore;
    use crate::vector_store::MemoryVectorStore;
    use async_trait::async_trait;

    struct EchoGenerator;

    #[async_trait]
    impl Generator for EchoGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok("Final Answer: Please rest and stay hydrated.".to_string())
        }
    }

    struct ZeroEmbedder;

    #[async_trait]
    impl Embedder for ZeroEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.0; 3])
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.0; 3]).collect())
        }
    }

    #[tokio::test]
    async fn test_with_components_runs_a_turn() {
        let mut settings = Settings::default();
        settings.web_search.enabled = false;
        settings.agent.max_iterations = 3;

        let orchestrator = Orchestrator::with_components(
            settings,
            Prompts::default(),
            Arc::new(EchoGenerator),
            Arc::new(ZeroEmbedder),
            Arc::new(MemoryVectorStore::new()),
            Arc::new(MemoryThreadStore::new()),
        )
        .unwrap();

        assert_eq!(orchestrator.registry().names(), "retriever_tool");
        assert_eq!(orchestrator.runner().max_iterations(), 3);

        let result = orchestrator.runner().run_turn("t", "I feel tired").await.unwrap();
        assert_eq!(result.answer, "Please rest and stay hydrated.");

        let stored = orchestrator.thread_store().get("t").await.unwrap();
        assert_eq!(stored.map(|s| s.len()), Some(2));
    }
}
