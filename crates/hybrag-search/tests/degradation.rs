//! Degradation integration tests for store-backed retrieval.
//!
//! A broken collaborator must never panic the retriever. Under the graceful
//! policy the remaining sources still rank; under the strict policy the
//! outage surfaces as `SourceUnavailable` naming the failed source.
//!
//! # Scenarios covered
//!
//! 1. **Missing FTS table**: hybrid ranking continues on vector and semantic
//!    signals; fulltext-only strategy reports the outage.
//! 2. **Missing embeddings table**: vector signal drops out, the rest rank.
//! 3. **Stale embedding dimension**: treated as an unavailable vector source.
//! 4. **Strict policy**: the same outages become errors.
//! 5. **Failing embedder**: query embedding failure degrades, never panics.

use anyhow::bail;
use hybrag_core::candidate::SourceKind;
use hybrag_core::config::RetrievalConfig;
use hybrag_core::retriever::{DegradePolicy, Retriever};
use hybrag_core::strategy::Strategy;
use hybrag_search::embed::{Embedder, HashEmbedder};
use hybrag_search::ingest::{embed_pending, ingest_documents};
use hybrag_search::sources::build_retriever;
use hybrag_search::store::{DocumentStore, NewDocument};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

const DIM: usize = 16;

/// In-memory store with three documents on different topics, fully embedded.
fn build_store() -> DocumentStore {
    let store = DocumentStore::open_in_memory().expect("open store");
    ingest_documents(
        &store,
        &[
            NewDocument::new("doc-1", "oauth service fails after 30 seconds under load")
                .with_title("Authentication timeout"),
            NewDocument::new("doc-2", "pool exhausts under sustained write load")
                .with_title("Connection pool exhaustion"),
            NewDocument::new("doc-3", "documentation improvements and spelling corrections")
                .with_title("README cleanup"),
        ],
    )
    .expect("ingest");
    embed_pending(&store, &HashEmbedder::new(DIM), 8).expect("embed");
    store
}

fn retriever(store: &DocumentStore, degrade: DegradePolicy) -> Retriever {
    retriever_with(store, Arc::new(HashEmbedder::new(DIM)), degrade)
}

fn retriever_with(store: &DocumentStore, embedder: Arc<dyn Embedder>, degrade: DegradePolicy) -> Retriever {
    let config = RetrievalConfig {
        degrade,
        ..RetrievalConfig::default()
    };
    build_retriever(store, embedder, &config).expect("build retriever")
}

fn drop_table(store: &DocumentStore, table: &str) {
    store
        .with_conn(|conn| {
            conn.execute_batch(&format!("DROP TABLE {table}"))?;
            Ok(())
        })
        .expect("drop table");
}

struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn model(&self) -> &str {
        "failing"
    }

    fn dimension(&self) -> usize {
        DIM
    }

    fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        bail!("model not loaded")
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn healthy_store_ranks_with_all_three_signals() {
    let store = build_store();
    let results = retriever(&store, DegradePolicy::Strict)
        .retrieve("load", 3, Strategy::Hybrid)
        .expect("hybrid retrieval");

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.breakdown.vector.raw.is_some()));
}

#[test]
fn missing_fts_table_degrades_hybrid() {
    let store = build_store();
    drop_table(&store, "documents_fts");
    let retriever = retriever(&store, DegradePolicy::Graceful);

    let results = retriever
        .retrieve("pool load", 2, Strategy::Hybrid)
        .expect("graceful hybrid retrieval");
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.breakdown.fulltext.raw.is_none()));

    let fulltext_only = retriever.retrieve("pool load", 2, Strategy::Fulltext).unwrap();
    assert!(fulltext_only.is_empty());
}

#[test]
fn missing_embeddings_table_drops_vector_signal() {
    let store = build_store();
    drop_table(&store, "document_embeddings");

    let results = retriever(&store, DegradePolicy::Graceful)
        .retrieve("oauth load", 3, Strategy::Hybrid)
        .expect("graceful hybrid retrieval");
    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.breakdown.vector.raw.is_none()));
    assert_eq!(results[0].doc_id, "doc-1");
}

#[test]
fn stale_embedding_dimension_is_reported_under_strict() {
    let store = build_store();
    let err = retriever_with(&store, Arc::new(HashEmbedder::new(DIM * 2)), DegradePolicy::Strict)
        .retrieve("load", 3, Strategy::Vector)
        .unwrap_err();

    assert!(err.is_source_unavailable());
    assert!(err.to_string().starts_with("vector source unavailable"));
    assert!(err.to_string().contains("dimension"));
}

#[test]
fn strict_policy_surfaces_missing_fts_table() {
    let store = build_store();
    drop_table(&store, "documents_fts");

    let err = retriever(&store, DegradePolicy::Strict)
        .retrieve("pool", 2, Strategy::Hybrid)
        .unwrap_err();
    assert!(err.is_source_unavailable());
    assert!(err.to_string().contains(SourceKind::Fulltext.as_str()));
}

#[test]
fn failing_embedder_never_panics() {
    let store = build_store();
    let retriever = retriever_with(&store, Arc::new(FailingEmbedder), DegradePolicy::Graceful);

    for query in ["load", "", "   ", "\"unbalanced", "a OR b NOT c", "こんにちは", "*"] {
        let results = retriever.retrieve(query, 3, Strategy::Hybrid);
        assert!(results.is_ok(), "query {query:?} failed: {results:?}");
    }

    let explanation = retriever.explain("pool load", 3).expect("graceful explain");
    assert_eq!(explanation.source(SourceKind::Vector).map(|s| s.count), Some(0));
}
