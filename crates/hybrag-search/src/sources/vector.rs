//! Vector candidate source: embed the query, KNN over stored embeddings.
//!
//! When `sqlite-vec` is registered the ranking runs in SQL with
//! `vec_distance_cosine`; otherwise (or if that query fails) every stored
//! vector is scored in Rust. Either way the raw score is cosine similarity in
//! `[-1, 1]`.

use anyhow::{Context, Result, bail};
use hybrag_core::candidate::{Candidate, CandidateList, SourceKind};
use hybrag_core::error::{FusionError, Result as FusionResult};
use hybrag_core::source::CandidateSource;
use rusqlite::{Connection, params};
use std::sync::Arc;
use tracing::debug;

use crate::embed::{Embedder, cosine_similarity};
use crate::store::DocumentStore;
use crate::vec_ext;

pub struct VectorSource {
    store: DocumentStore,
    embedder: Arc<dyn Embedder>,
}

impl std::fmt::Debug for VectorSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorSource")
            .field("store", &self.store)
            .field("model", &self.embedder.model())
            .field("dimension", &self.embedder.dimension())
            .finish()
    }
}

impl VectorSource {
    #[must_use]
    pub fn new(store: DocumentStore, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    /// Top `limit` documents by cosine similarity to `query_embedding`.
    ///
    /// # Errors
    ///
    /// Fails if the embedding table is missing, or if stored vectors exist
    /// but none has the query's dimension.
    pub fn knn_search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<Candidate>> {
        if query_embedding.is_empty() {
            bail!("query embedding is empty");
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        self.store.with_conn(|conn| {
            if vec_ext::is_available(conn) {
                match knn_search_sqlite_vec(conn, query_embedding, limit) {
                    Ok(hits) if !hits.is_empty() => return Ok(hits),
                    Ok(_) => debug!("sqlite-vec returned no rows, checking with Rust KNN"),
                    Err(err) => debug!("sqlite-vec KNN failed, falling back to Rust KNN: {err:#}"),
                }
            }
            knn_search_scan(conn, query_embedding, limit)
        })
    }
}

impl CandidateSource for VectorSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Vector
    }

    fn search(&self, query: &str, pool_size: usize) -> FusionResult<CandidateList> {
        let unavailable =
            |err: anyhow::Error| FusionError::source_unavailable(SourceKind::Vector, format!("{err:#}"));

        let embedding = self
            .embedder
            .embed(query)
            .context("embed query")
            .map_err(unavailable)?;
        if embedding.len() != self.embedder.dimension() {
            return Err(FusionError::source_unavailable(
                SourceKind::Vector,
                format!(
                    "query embedding dimension mismatch: expected {}, got {}",
                    self.embedder.dimension(),
                    embedding.len()
                ),
            ));
        }

        let hits = self.knn_search(&embedding, pool_size).map_err(unavailable)?;
        debug!(hits = hits.len(), "vector search");
        CandidateList::new(SourceKind::Vector, hits)
    }
}

fn knn_search_sqlite_vec(conn: &Connection, query: &[f32], limit: usize) -> Result<Vec<Candidate>> {
    let query_json = serde_json::to_string(query).context("encode query embedding")?;
    let mut stmt = conn
        .prepare(
            "SELECT doc_id,
                    vec_distance_cosine(vec_f32(embedding_json), vec_f32(?1)) AS distance
             FROM document_embeddings
             WHERE json_array_length(embedding_json) = ?2
             ORDER BY distance ASC, doc_id ASC
             LIMIT ?3",
        )
        .context("prepare sqlite-vec KNN query")?;

    let rows = stmt
        .query_map(
            params![
                query_json,
                i64::try_from(query.len()).unwrap_or(i64::MAX),
                i64::try_from(limit).unwrap_or(i64::MAX),
            ],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)),
        )
        .context("execute sqlite-vec KNN query")?;

    let mut out = Vec::new();
    for row in rows {
        let (doc_id, distance) = row.context("read sqlite-vec KNN row")?;
        out.push(Candidate::new(doc_id, (1.0 - distance).clamp(-1.0, 1.0)));
    }
    Ok(out)
}

fn knn_search_scan(conn: &Connection, query: &[f32], limit: usize) -> Result<Vec<Candidate>> {
    let mut stmt = conn
        .prepare("SELECT doc_id, embedding_json FROM document_embeddings")
        .context("prepare vector KNN scan (document_embeddings missing?)")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
        .context("execute vector KNN scan")?;

    let mut stored = 0usize;
    let mut mismatched: Option<usize> = None;
    let mut scored = Vec::new();
    for row in rows {
        let (doc_id, embedding_json) = row.context("read vector KNN row")?;
        stored += 1;

        let embedding: Vec<f32> = match serde_json::from_str(&embedding_json) {
            Ok(value) => value,
            Err(err) => {
                debug!("skipping malformed embedding row for {doc_id}: {err}");
                continue;
            }
        };
        if embedding.len() != query.len() {
            debug!(
                "skipping embedding row for {doc_id} due to dimension {}",
                embedding.len()
            );
            mismatched.get_or_insert(embedding.len());
            continue;
        }

        let Some(cosine) = cosine_similarity(query, &embedding) else {
            continue;
        };
        scored.push(Candidate::new(doc_id, cosine));
    }

    if let (true, Some(dimension)) = (scored.is_empty(), mismatched) {
        bail!(
            "stored embeddings have dimension {dimension}, query has {} ({stored} rows); re-run ingest",
            query.len()
        );
    }

    scored.sort_by(|a, b| {
        b.raw_score
            .total_cmp(&a.raw_score)
            .then_with(|| a.doc_id.cmp(&b.doc_id))
    });
    scored.truncate(limit);
    Ok(scored)
}
