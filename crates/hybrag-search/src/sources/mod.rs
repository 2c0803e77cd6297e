//! SQLite-backed candidate sources and the retriever that fuses them.

pub mod fulltext;
pub mod semantic;
pub mod vector;

pub use fulltext::FulltextSource;
pub use semantic::SemanticSource;
pub use vector::VectorSource;

use anyhow::{Context, Result};
use hybrag_core::config::RetrievalConfig;
use hybrag_core::engine::FusionEngine;
use hybrag_core::retriever::Retriever;
use hybrag_core::source::CandidateSource;
use std::sync::Arc;

use crate::embed::Embedder;
use crate::store::DocumentStore;

/// One source of each kind over `store`.
#[must_use]
pub fn store_sources(store: &DocumentStore, embedder: Arc<dyn Embedder>) -> Vec<Box<dyn CandidateSource>> {
    vec![
        Box::new(VectorSource::new(store.clone(), embedder)),
        Box::new(FulltextSource::new(store.clone())),
        Box::new(SemanticSource::new(store.clone())),
    ]
}

/// Retriever over all three store sources, configured from `[retrieval]`.
///
/// # Errors
///
/// Returns an error if the retriever cannot be assembled.
pub fn build_retriever(
    store: &DocumentStore,
    embedder: Arc<dyn Embedder>,
    config: &RetrievalConfig,
) -> Result<Retriever> {
    let engine = FusionEngine::new(config.weights);
    let retriever = Retriever::new(engine, store_sources(store, embedder))
        .context("assemble retriever")?
        .with_policy(config.degrade)
        .with_pool_multiplier(config.pool_multiplier);
    Ok(retriever)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashEmbedder;
    use hybrag_core::retriever::DegradePolicy;
    use hybrag_core::strategy::Strategy;

    #[test]
    fn retriever_follows_retrieval_config() {
        let store = DocumentStore::open_in_memory().unwrap();
        let config = RetrievalConfig {
            pool_multiplier: 3,
            degrade: DegradePolicy::Strict,
            ..RetrievalConfig::default()
        };
        let retriever = build_retriever(&store, Arc::new(HashEmbedder::new(8)), &config).unwrap();
        assert_eq!(retriever.policy(), DegradePolicy::Strict);
        assert_eq!(retriever.pool_size(Strategy::Hybrid, 4), 12);
        assert_eq!(retriever.pool_size(Strategy::Fulltext, 4), 4);
        assert_eq!(retriever.engine().weights(), config.weights);
    }
}
