//! JSONL ingestion and embedding refresh.
//!
//! Each non-blank line is one `{doc_id, title?, text, source?, metadata?}`
//! object. Ingestion is idempotent: unchanged documents are skipped by
//! content hash, and only documents whose embedding is missing or stale are
//! re-embedded.

use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::io::BufRead;
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::embed::Embedder;
use crate::store::{DocumentStore, NewDocument, UpsertOutcome};

/// Counts from one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub embedded: usize,
}

impl IngestReport {
    #[must_use]
    pub const fn documents(&self) -> usize {
        self.inserted + self.updated + self.unchanged
    }
}

/// Parse JSONL documents from `reader`.
///
/// # Errors
///
/// Returns an error naming the 1-based line number of the first line that
/// fails to read or decode, or that has an empty `doc_id`.
pub fn parse_jsonl<R: BufRead>(reader: R) -> Result<Vec<NewDocument>> {
    let mut docs = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.with_context(|| format!("read line {line_no}"))?;
        if line.trim().is_empty() {
            continue;
        }

        let doc: NewDocument = serde_json::from_str(&line)
            .with_context(|| format!("line {line_no}: invalid document JSON"))?;
        if doc.doc_id.trim().is_empty() {
            bail!("line {line_no}: doc_id must not be empty");
        }
        docs.push(doc);
    }
    Ok(docs)
}

/// Upsert every document in `docs`.
///
/// # Errors
///
/// Stops at the first store failure.
pub fn ingest_documents(store: &DocumentStore, docs: &[NewDocument]) -> Result<IngestReport> {
    let mut report = IngestReport::default();
    for doc in docs {
        match store.upsert_document(doc)? {
            UpsertOutcome::Inserted => report.inserted += 1,
            UpsertOutcome::Updated => report.updated += 1,
            UpsertOutcome::Unchanged => report.unchanged += 1,
        }
    }
    Ok(report)
}

/// Load a JSONL file into `store`.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or parsed, or a write fails.
#[instrument(skip(store, path), fields(path = %path.display()))]
pub fn load_jsonl(store: &DocumentStore, path: &Path) -> Result<IngestReport> {
    let file = std::fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let docs = parse_jsonl(std::io::BufReader::new(file))
        .with_context(|| format!("parse {}", path.display()))?;

    let report = ingest_documents(store, &docs)?;
    info!(
        inserted = report.inserted,
        updated = report.updated,
        unchanged = report.unchanged,
        "ingested documents"
    );
    Ok(report)
}

/// Embed every document whose embedding is missing or stale, `batch_size`
/// texts per embedder call. An embedding is stale when the text changed or
/// when it came from another model or dimension. Returns the number of
/// embeddings written.
///
/// # Errors
///
/// Returns an error if the embedder fails, returns the wrong number or size
/// of vectors, or a write fails.
#[instrument(skip(store, embedder), fields(model = embedder.model()))]
pub fn embed_pending(store: &DocumentStore, embedder: &dyn Embedder, batch_size: usize) -> Result<usize> {
    let model = embedder.model();
    let dimension = embedder.dimension();
    let pending = store.pending_embeddings(model, dimension)?;
    if pending.is_empty() {
        debug!("all embeddings up to date");
        return Ok(0);
    }

    let mut written = 0;
    for batch in pending.chunks(batch_size.max(1)) {
        let texts: Vec<&str> = batch.iter().map(|doc| doc.text.as_str()).collect();
        let embeddings = embedder
            .embed_batch(&texts)
            .with_context(|| format!("embed batch of {} documents", texts.len()))?;
        if embeddings.len() != batch.len() {
            bail!(
                "embedder returned {} vectors for {} documents",
                embeddings.len(),
                batch.len()
            );
        }

        for (doc, embedding) in batch.iter().zip(&embeddings) {
            if embedding.len() != dimension {
                bail!(
                    "embedder {model} returned dimension {} for {}, expected {dimension}",
                    embedding.len(),
                    doc.doc_id
                );
            }
            store.upsert_embedding(&doc.doc_id, &doc.content_hash, model, embedding)?;
            written += 1;
        }
        debug!(written, total = pending.len(), "embedded batch");
    }

    info!(embedded = written, "refreshed embeddings");
    Ok(written)
}

/// `load_jsonl` followed by `embed_pending`.
///
/// # Errors
///
/// Propagates failures from either step.
pub fn ingest_file(
    store: &DocumentStore,
    embedder: &dyn Embedder,
    path: &Path,
    batch_size: usize,
) -> Result<IngestReport> {
    let mut report = load_jsonl(store, path)?;
    report.embedded = embed_pending(store, embedder, batch_size)?;
    Ok(report)
}
