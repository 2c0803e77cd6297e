//! Retrieve, assemble context, generate.
//!
//! A generation failure never fails the answer: the response falls back to
//! the retrieved context with the error noted. Retrieval errors (bad `top_k`,
//! a strict-policy source outage) do propagate.

pub mod context;
pub mod generate;

pub use context::{ContextBuilder, PromptBuilder};
pub use generate::{FallbackGenerator, GenerationRequest, Generator, generator_from_config};

use anyhow::{Context, Result};
use hybrag_core::config::LlmConfig;
use hybrag_core::fusion::{Breakdown, Explanation};
use hybrag_core::retriever::{DegradePolicy, Retriever};
use hybrag_core::strategy::Strategy;
use hybrag_core::weights::WeightConfig;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

use crate::store::{Document, DocumentStore};

/// One retrieved document as reported in an [`Answer`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedDocument {
    pub rank: usize,
    pub doc_id: String,
    pub title: Option<String>,
    pub score: f64,
    pub breakdown: Breakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub query: String,
    pub strategy: Strategy,
    pub retrieved: Vec<RetrievedDocument>,
    /// Characters in the assembled context.
    pub context_length: usize,
    pub response: String,
    /// Whether `response` came from a language model.
    pub generated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<Explanation>,
}

/// Effective pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineStats {
    pub max_context_length: usize,
    pub temperature: f64,
    pub max_tokens: u32,
    pub weights: WeightConfig,
    pub degrade: DegradePolicy,
    pub generator: String,
    pub generator_configured: bool,
    pub documents: usize,
    pub embeddings: usize,
}

pub struct Pipeline {
    retriever: Retriever,
    store: DocumentStore,
    generator: Box<dyn Generator>,
    llm: LlmConfig,
    prompts: PromptBuilder,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("retriever", &self.retriever)
            .field("generator", &self.generator.name())
            .field("llm", &self.llm)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    #[must_use]
    pub fn new(
        retriever: Retriever,
        store: DocumentStore,
        generator: Box<dyn Generator>,
        llm: LlmConfig,
    ) -> Self {
        Self {
            retriever,
            store,
            generator,
            llm,
            prompts: PromptBuilder,
        }
    }

    #[must_use]
    pub const fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Override generation settings for subsequent answers; `None` keeps the
    /// current value.
    pub fn configure(
        &mut self,
        max_context_length: Option<usize>,
        temperature: Option<f64>,
        max_tokens: Option<u32>,
    ) {
        if let Some(value) = max_context_length {
            self.llm.max_context_length = value;
        }
        if let Some(value) = temperature {
            self.llm.temperature = value;
        }
        if let Some(value) = max_tokens {
            self.llm.max_tokens = value;
        }
    }

    /// Answer `query` from the top `top_k` documents under `strategy`.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval or document lookup fails. Generation
    /// failures are folded into the response text instead.
    #[instrument(skip(self))]
    pub fn answer(
        &self,
        query: &str,
        strategy: Strategy,
        top_k: usize,
        include_explanation: bool,
    ) -> Result<Answer> {
        let ranked = self
            .retriever
            .retrieve(query, top_k, strategy)
            .context("retrieve documents")?;

        let ids: Vec<&str> = ranked.iter().map(|hit| hit.doc_id.as_str()).collect();
        let mut docs: HashMap<String, Document> = self
            .store
            .get_many(&ids)?
            .into_iter()
            .map(|doc| (doc.doc_id.clone(), doc))
            .collect();

        let mut retrieved = Vec::with_capacity(ranked.len());
        let mut context_docs = Vec::with_capacity(ranked.len());
        for hit in ranked {
            let Some(doc) = docs.remove(&hit.doc_id) else {
                debug!(doc_id = %hit.doc_id, "ranked document no longer in store, skipping");
                continue;
            };
            retrieved.push(RetrievedDocument {
                rank: retrieved.len() + 1,
                doc_id: hit.doc_id,
                title: doc.title.clone(),
                score: hit.fused_score,
                breakdown: hit.breakdown,
            });
            context_docs.push((doc, hit.fused_score));
        }

        let context = ContextBuilder::new(self.llm.max_context_length).build(&context_docs);
        let user_prompt = self.prompts.user_prompt(query, &context);
        let request = GenerationRequest {
            query,
            context: &context,
            system_prompt: self.prompts.system_prompt(),
            user_prompt: &user_prompt,
            temperature: self.llm.temperature,
            max_tokens: self.llm.max_tokens,
        };

        let (response, generated) = match self.generator.generate(&request) {
            Ok(response) => (response, self.generator.is_llm()),
            Err(err) => {
                warn!(generator = self.generator.name(), "generation failed: {err:#}");
                (generate::error_answer(query, &context, &err), false)
            }
        };

        let explanation = if include_explanation {
            Some(self.retriever.explain(query, top_k).context("explain retrieval")?)
        } else {
            None
        };

        Ok(Answer {
            query: query.to_string(),
            strategy,
            retrieved,
            context_length: context.chars().count(),
            response,
            generated,
            explanation,
        })
    }

    /// [`Pipeline::answer`] for each query; one failure does not stop the rest.
    pub fn answer_batch(&self, queries: &[&str], strategy: Strategy, top_k: usize) -> Vec<Result<Answer>> {
        queries
            .iter()
            .map(|query| self.answer(query, strategy, top_k, false))
            .collect()
    }

    /// # Errors
    ///
    /// Returns an error if the store counts cannot be read.
    pub fn stats(&self) -> Result<PipelineStats> {
        Ok(PipelineStats {
            max_context_length: self.llm.max_context_length,
            temperature: self.llm.temperature,
            max_tokens: self.llm.max_tokens,
            weights: self.retriever.engine().weights(),
            degrade: self.retriever.policy(),
            generator: self.generator.name().to_string(),
            generator_configured: self.generator.is_llm(),
            documents: self.store.count()?,
            embeddings: self.store.embedding_count()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashEmbedder;
    use crate::ingest::{embed_pending, ingest_documents};
    use crate::sources::build_retriever;
    use crate::store::NewDocument;
    use anyhow::bail;
    use hybrag_core::config::RetrievalConfig;
    use std::sync::Arc;

    struct Failing;

    impl Generator for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn generate(&self, _request: &GenerationRequest<'_>) -> Result<String> {
            bail!("upstream 503")
        }
    }

    struct Echo;

    impl Generator for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn generate(&self, request: &GenerationRequest<'_>) -> Result<String> {
            Ok(format!("{}|{}", request.max_tokens, request.user_prompt.len()))
        }
    }

    fn pipeline(generator: Box<dyn Generator>) -> Pipeline {
        let store = DocumentStore::open_in_memory().unwrap();
        ingest_documents(
            &store,
            &[
                NewDocument::new("d1", "migraine triptans relief").with_title("Migraine"),
                NewDocument::new("d2", "insulin glucose regulation").with_title("Diabetes"),
                NewDocument::new("d3", "tension headache and migraine"),
            ],
        )
        .unwrap();
        let embedder = Arc::new(HashEmbedder::new(16));
        embed_pending(&store, embedder.as_ref(), 10).unwrap();
        let retriever = build_retriever(&store, embedder, &RetrievalConfig::default()).unwrap();
        Pipeline::new(retriever, store, generator, LlmConfig::default())
    }

    #[test]
    fn fallback_answer_lists_retrieved_context() {
        let pipeline = pipeline(Box::new(FallbackGenerator));
        let answer = pipeline.answer("migraine", Strategy::Fulltext, 2, false).unwrap();

        assert_eq!(answer.retrieved.len(), 2);
        assert_eq!(answer.retrieved[0].rank, 1);
        assert!(!answer.generated);
        assert!(answer.response.contains("Document 1 (Score: "));
        assert!(answer.response.contains("fallback response"));
        assert!(answer.context_length > 0);
        assert!(answer.explanation.is_none());
    }

    #[test]
    fn generation_failure_falls_back_with_error_note() {
        let pipeline = pipeline(Box::new(Failing));
        let answer = pipeline.answer("insulin", Strategy::Hybrid, 2, true).unwrap();
        assert!(answer.response.ends_with("[Error generating LLM response: upstream 503]"));
        assert!(!answer.generated);
        let explanation = answer.explanation.expect("explanation requested");
        assert_eq!(explanation.query, "insulin");
    }

    #[test]
    fn configure_reaches_the_generator() {
        let mut pipeline = pipeline(Box::new(Echo));
        pipeline.configure(Some(20), None, Some(42));
        let answer = pipeline.answer("migraine", Strategy::Semantic, 3, false).unwrap();
        assert!(answer.generated);
        assert!(answer.response.starts_with("42|"));
        assert!(answer.context_length <= 23);
    }

    #[test]
    fn invalid_top_k_is_an_error() {
        let pipeline = pipeline(Box::new(FallbackGenerator));
        assert!(pipeline.answer("migraine", Strategy::Hybrid, 0, false).is_err());
        let batch = pipeline.answer_batch(&["migraine", "insulin"], Strategy::Hybrid, 0);
        assert_eq!(batch.len(), 2);
        assert!(batch.iter().all(Result::is_err));
    }

    #[test]
    fn stats_report_configuration() {
        let stats = pipeline(Box::new(FallbackGenerator)).stats().unwrap();
        assert_eq!(stats.max_context_length, 4000);
        assert_eq!(stats.max_tokens, 500);
        assert_eq!(stats.weights, WeightConfig::default());
        assert!(!stats.generator_configured);
        assert_eq!((stats.documents, stats.embeddings), (3, 3));
    }
}
