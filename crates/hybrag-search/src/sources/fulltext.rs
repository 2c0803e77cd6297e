//! FTS5 BM25 candidate source.
//!
//! Free text is turned into an FTS5 query by splitting on anything that is
//! not alphanumeric and OR-ing the quoted terms, so user punctuation never
//! produces an FTS5 syntax error and any matching term is enough to qualify
//! a document.
//!
//! # Column Weights (BM25)
//!
//! | Column | Weight |
//! |--------|--------|
//! | title  | 2.0    |
//! | body   | 1.0    |
//!
//! FTS5's `bm25()` is "lower is better" and never positive, so the raw score
//! reported to fusion is `-bm25`: positive, unbounded, higher is better.

use anyhow::{Context, Result};
use hybrag_core::candidate::{Candidate, CandidateList, SourceKind};
use hybrag_core::error::{FusionError, Result as FusionResult};
use hybrag_core::source::CandidateSource;
use rusqlite::params;
use tracing::debug;

use crate::store::DocumentStore;

pub const BM25_WEIGHT_TITLE: f64 = 2.0;
pub const BM25_WEIGHT_BODY: f64 = 1.0;

/// BM25 search over `documents_fts`.
#[derive(Debug, Clone)]
pub struct FulltextSource {
    store: DocumentStore,
}

impl FulltextSource {
    #[must_use]
    pub const fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    /// Raw `(doc_id, -bm25)` hits, best first.
    ///
    /// # Errors
    ///
    /// Fails if the FTS table is missing or the query cannot run.
    pub fn search_bm25(&self, query: &str, limit: usize) -> Result<Vec<Candidate>> {
        let Some(fts_query) = to_fts_query(query) else {
            return Ok(Vec::new());
        };
        if limit == 0 {
            return Ok(Vec::new());
        }

        self.store.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT doc_id, bm25(documents_fts, ?1, ?2) AS score
                     FROM documents_fts
                     WHERE documents_fts MATCH ?3
                     ORDER BY score, doc_id
                     LIMIT ?4",
                )
                .context("prepare FTS5 BM25 search (documents_fts missing?)")?;

            let rows = stmt
                .query_map(
                    params![
                        BM25_WEIGHT_TITLE,
                        BM25_WEIGHT_BODY,
                        fts_query,
                        i64::try_from(limit).unwrap_or(i64::MAX),
                    ],
                    |row| {
                        let bm25: f64 = row.get(1)?;
                        Ok(Candidate::new(row.get::<_, String>(0)?, -bm25))
                    },
                )
                .with_context(|| format!("execute FTS5 search for '{fts_query}'"))?;

            rows.map(|row| row.context("read FTS5 search hit"))
                .collect()
        })
    }
}

impl CandidateSource for FulltextSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Fulltext
    }

    fn search(&self, query: &str, pool_size: usize) -> FusionResult<CandidateList> {
        let hits = self
            .search_bm25(query, pool_size)
            .map_err(|err| FusionError::source_unavailable(SourceKind::Fulltext, format!("{err:#}")))?;
        debug!(hits = hits.len(), "fulltext search");
        CandidateList::new(SourceKind::Fulltext, hits)
    }
}

/// `"term1" OR "term2" ...`, or `None` when the query has no usable terms.
#[must_use]
pub fn to_fts_query(query: &str) -> Option<String> {
    let mut terms: Vec<String> = Vec::new();
    for term in query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|term| !term.is_empty())
        .map(str::to_lowercase)
    {
        if !terms.contains(&term) {
            terms.push(term);
        }
    }

    if terms.is_empty() {
        return None;
    }

    Some(
        terms
            .iter()
            .map(|term| format!("\"{term}\""))
            .collect::<Vec<_>>()
            .join(" OR "),
    )
}
