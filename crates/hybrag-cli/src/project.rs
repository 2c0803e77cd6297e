//! Opening an initialized project: config, store, embedder, retriever.

use anyhow::{Context, Result};
use hybrag_core::config::{HYBRAG_DIR, ProjectConfig, load_effective_config};
use hybrag_core::retriever::Retriever;
use hybrag_core::strategy::Strategy;
use hybrag_search::embed::{Embedder, embedder_from_config};
use hybrag_search::pipeline::{Pipeline, generator_from_config};
use hybrag_search::sources::build_retriever;
use hybrag_search::store::DocumentStore;
use std::path::Path;
use std::sync::Arc;

use crate::output::CliError;

pub struct Project {
    pub config: ProjectConfig,
    pub store: DocumentStore,
}

impl Project {
    /// Open the project at `root`.
    ///
    /// # Errors
    ///
    /// Fails if `.hybrag/` is missing, the config is invalid, or the store
    /// cannot be opened.
    pub fn open(root: &Path) -> Result<Self> {
        if !root.join(HYBRAG_DIR).is_dir() {
            return Err(CliError::with_details(
                format!("no {HYBRAG_DIR}/ directory in {}", root.display()),
                "run `hybrag init` first",
                "not_initialized",
            )
            .into());
        }

        let config = load_effective_config(root)?;
        let db_path = config.store.resolve(root);
        let store = DocumentStore::open(&db_path)
            .with_context(|| format!("open store {}", db_path.display()))?;

        Ok(Self { config, store })
    }

    pub fn embedder(&self) -> Arc<dyn Embedder> {
        Arc::from(embedder_from_config(&self.config.embeddings))
    }

    /// # Errors
    ///
    /// Fails if the retriever cannot be assembled.
    pub fn retriever(&self) -> Result<Retriever> {
        build_retriever(&self.store, self.embedder(), &self.config.retrieval)
    }

    /// # Errors
    ///
    /// Fails if the retriever cannot be assembled.
    pub fn pipeline(&self) -> Result<Pipeline> {
        let generator =
            generator_from_config(&self.config.llm, self.config.embeddings.api_key());
        Ok(Pipeline::new(
            self.retriever()?,
            self.store.clone(),
            generator,
            self.config.llm.clone(),
        ))
    }

    /// `-n` when given, else the configured default.
    pub fn top_k(&self, flag: Option<usize>) -> usize {
        flag.unwrap_or(self.config.retrieval.default_top_k)
    }

    /// `--strategy` when given, else the configured default.
    pub fn strategy(&self, flag: Option<Strategy>) -> Strategy {
        flag.unwrap_or(self.config.retrieval.strategy)
    }
}
