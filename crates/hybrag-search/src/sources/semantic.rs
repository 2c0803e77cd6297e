//! Lexical-overlap candidate source.
//!
//! A document's score is the share of its words that also occur in the
//! query: `common / total`, where `common` counts document words with
//! multiplicity. Words are lowercased and split on whitespace; no stemming or
//! punctuation stripping, so `"migraine?"` and `"migraine"` are different
//! words.

use anyhow::Result;
use hybrag_core::candidate::{Candidate, CandidateList, SourceKind};
use hybrag_core::error::{FusionError, Result as FusionResult};
use hybrag_core::source::CandidateSource;
use std::collections::HashSet;
use tracing::debug;

use crate::store::DocumentStore;

#[derive(Debug, Clone)]
pub struct SemanticSource {
    store: DocumentStore,
}

impl SemanticSource {
    #[must_use]
    pub const fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    /// Overlap-scored documents, best first, at most `limit`.
    ///
    /// # Errors
    ///
    /// Fails if the document table cannot be read.
    pub fn search_overlap(&self, query: &str, limit: usize) -> Result<Vec<Candidate>> {
        let query_lower = query.to_lowercase();
        let query_words: HashSet<&str> = query_lower.split_whitespace().collect();
        if query_words.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<Candidate> = self
            .store
            .all_texts()?
            .into_iter()
            .filter_map(|(doc_id, body)| {
                overlap_score(&query_words, &body).map(|score| Candidate::new(doc_id, score))
            })
            .collect();

        scored.sort_by(|a, b| {
            b.raw_score
                .total_cmp(&a.raw_score)
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });
        scored.truncate(limit);
        Ok(scored)
    }
}

impl CandidateSource for SemanticSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Semantic
    }

    fn search(&self, query: &str, pool_size: usize) -> FusionResult<CandidateList> {
        let hits = self
            .search_overlap(query, pool_size)
            .map_err(|err| FusionError::source_unavailable(SourceKind::Semantic, format!("{err:#}")))?;
        debug!(hits = hits.len(), "semantic search");
        CandidateList::new(SourceKind::Semantic, hits)
    }
}

/// `Some(common / total)` when at least one word overlaps.
#[must_use]
pub fn overlap_score(query_words: &HashSet<&str>, text: &str) -> Option<f64> {
    let text = text.to_lowercase();
    let mut total = 0_u32;
    let mut common = 0_u32;
    for word in text.split_whitespace() {
        total += 1;
        if query_words.contains(word) {
            common += 1;
        }
    }

    (common > 0).then(|| f64::from(common) / f64::from(total))
}
