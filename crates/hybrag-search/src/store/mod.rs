//! SQLite document store.
//!
//! Runtime defaults follow the usual single-writer layout:
//! - `journal_mode = WAL` so readers never block the ingester
//! - `busy_timeout = 5s` to ride out transient lock contention
//! - `foreign_keys = ON` so removing a document drops its embedding
//!
//! The store is a cheap cloneable handle over one connection. Candidate
//! sources each hold a clone and take the connection lock per query.

pub mod migrations;
pub mod schema;

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Busy timeout used for store connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A document as handed to the store (one JSONL line).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocument {
    pub doc_id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub text: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl NewDocument {
    pub fn new(doc_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            title: None,
            text: text.into(),
            source: None,
            metadata: None,
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Hash over everything that affects retrieval (title and text).
    #[must_use]
    pub fn content_hash(&self) -> String {
        content_hash_hex(self.title.as_deref(), &self.text)
    }
}

/// A stored document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub doc_id: String,
    pub title: Option<String>,
    pub body: String,
    pub source: Option<String>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub content_hash: String,
    pub ingested_at_us: i64,
}

impl Document {
    /// Text used for embeddings: title and body on separate lines.
    #[must_use]
    pub fn embedding_text(&self) -> String {
        embedding_text(self.title.as_deref(), &self.body)
    }
}

/// What `upsert_document` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// Same content hash as the stored copy; nothing written.
    Unchanged,
}

/// A document whose embedding is missing or stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEmbedding {
    pub doc_id: String,
    pub content_hash: String,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct DocumentStore {
    conn: Arc<Mutex<Connection>>,
}

impl DocumentStore {
    /// Open (or create) the store at `path`, apply pragmas, and migrate.
    ///
    /// # Errors
    ///
    /// Returns an error if opening, configuring, or migrating fails.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create store directory {}", parent.display()))?;
        }

        register_vec_extension();
        let conn = Connection::open(path)
            .with_context(|| format!("open document store {}", path.display()))?;
        Self::from_connection(conn, true)
    }

    /// A private in-memory store, mostly for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if migrating fails.
    pub fn open_in_memory() -> Result<Self> {
        register_vec_extension();
        let conn = Connection::open_in_memory().context("open in-memory document store")?;
        Self::from_connection(conn, false)
    }

    fn from_connection(mut conn: Connection, wal: bool) -> Result<Self> {
        configure_connection(&conn, wal).context("configure sqlite pragmas")?;
        migrations::migrate(&mut conn).context("apply document store migrations")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` with exclusive access to the connection.
    ///
    /// # Errors
    ///
    /// Propagates whatever `f` returns.
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        f(&conn)
    }

    fn with_conn_mut<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut conn)
    }

    /// Insert or update a document, skipping the write when content is
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Fails on an empty `doc_id` or a database error.
    pub fn upsert_document(&self, doc: &NewDocument) -> Result<UpsertOutcome> {
        if doc.doc_id.trim().is_empty() {
            bail!("document id must not be empty");
        }

        let hash = doc.content_hash();
        let metadata_json = serde_json::to_string(&doc.metadata.clone().unwrap_or_default())
            .context("serialize document metadata")?;

        self.with_conn(|conn| {
            let existing = conn
                .query_row(
                    "SELECT content_hash, source, metadata_json FROM documents WHERE doc_id = ?1",
                    params![doc.doc_id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, Option<String>>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    },
                )
                .optional()
                .with_context(|| format!("look up document {}", doc.doc_id))?;

            let outcome = match existing {
                Some((stored_hash, stored_source, stored_meta))
                    if stored_hash == hash
                        && stored_source == doc.source
                        && stored_meta == metadata_json =>
                {
                    return Ok(UpsertOutcome::Unchanged);
                }
                Some(_) => UpsertOutcome::Updated,
                None => UpsertOutcome::Inserted,
            };

            conn.execute(
                "INSERT INTO documents
                     (doc_id, title, body, source, metadata_json, content_hash, ingested_at_us)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(doc_id) DO UPDATE SET
                     title = excluded.title,
                     body = excluded.body,
                     source = excluded.source,
                     metadata_json = excluded.metadata_json,
                     content_hash = excluded.content_hash,
                     ingested_at_us = excluded.ingested_at_us",
                params![
                    doc.doc_id,
                    doc.title,
                    doc.text,
                    doc.source,
                    metadata_json,
                    hash,
                    chrono::Utc::now().timestamp_micros(),
                ],
            )
            .with_context(|| format!("upsert document {}", doc.doc_id))?;

            Ok(outcome)
        })
    }

    /// # Errors
    ///
    /// Returns an error on database failure or corrupt metadata.
    pub fn get(&self, doc_id: &str) -> Result<Option<Document>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("{DOCUMENT_COLUMNS} WHERE doc_id = ?1"),
                params![doc_id],
                read_document_row,
            )
            .optional()
            .with_context(|| format!("read document {doc_id}"))?
            .map(finish_document)
            .transpose()
        })
    }

    /// Fetch several documents, in the order of `doc_ids`. Unknown ids are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn get_many(&self, doc_ids: &[&str]) -> Result<Vec<Document>> {
        let mut out = Vec::with_capacity(doc_ids.len());
        for doc_id in doc_ids {
            if let Some(doc) = self.get(doc_id)? {
                out.push(doc);
            }
        }
        Ok(out)
    }

    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn count(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
                .context("count documents")?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
    }

    /// `(doc_id, body)` for every document, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure (including a missing table).
    pub fn all_texts(&self) -> Result<Vec<(String, String)>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT doc_id, body FROM documents ORDER BY doc_id")
                .context("prepare document text scan (documents table missing?)")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
                .context("scan document texts")?;
            rows.map(|row| row.context("read document text row"))
                .collect()
        })
    }

    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn remove(&self, doc_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn
                .execute("DELETE FROM documents WHERE doc_id = ?1", params![doc_id])
                .with_context(|| format!("remove document {doc_id}"))?;
            Ok(removed > 0)
        })
    }

    /// Delete every document and embedding. Returns the number of documents
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn clear(&self) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction().context("begin clear")?;
            tx.execute("DELETE FROM document_embeddings", [])
                .context("clear embeddings")?;
            let removed = tx
                .execute("DELETE FROM documents", [])
                .context("clear documents")?;
            tx.commit().context("commit clear")?;
            Ok(removed)
        })
    }

    /// Rebuild the FTS mirror from `documents`.
    ///
    /// # Errors
    ///
    /// Returns an error if the rebuild SQL fails.
    pub fn rebuild_fts(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute_batch(schema::REBUILD_FTS_SQL)
                .context("rebuild FTS5 index from documents table")
        })
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn fts_row_count(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM documents_fts", [], |row| row.get(0))
                .context("count FTS5 rows")?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
    }

    /// Documents whose embedding is missing, was computed from older
    /// content, or came from a different embedder (`model`/`dimension`),
    /// ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn pending_embeddings(&self, model: &str, dimension: usize) -> Result<Vec<PendingEmbedding>> {
        let dimension = i64::try_from(dimension).context("embedding dimension out of range")?;
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT d.doc_id, d.content_hash, d.title, d.body
                     FROM documents d
                     LEFT JOIN document_embeddings e ON e.doc_id = d.doc_id
                     WHERE e.content_hash IS NULL
                        OR e.content_hash != d.content_hash
                        OR e.model != ?1
                        OR e.dimension != ?2
                     ORDER BY d.doc_id",
                )
                .context("prepare pending embedding scan")?;
            let rows = stmt
                .query_map(params![model, dimension], |row| {
                    let title: Option<String> = row.get(2)?;
                    let body: String = row.get(3)?;
                    Ok(PendingEmbedding {
                        doc_id: row.get(0)?,
                        content_hash: row.get(1)?,
                        text: embedding_text(title.as_deref(), &body),
                    })
                })
                .context("scan pending embeddings")?;
            rows.map(|row| row.context("read pending embedding row"))
                .collect()
        })
    }

    /// Store `embedding` for `doc_id`, tagged with the content hash and the
    /// model that produced it. The dimension is the vector's length.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn upsert_embedding(
        &self,
        doc_id: &str,
        content_hash: &str,
        model: &str,
        embedding: &[f32],
    ) -> Result<()> {
        let embedding_json = serde_json::to_string(embedding).context("encode embedding")?;
        let dimension = i64::try_from(embedding.len()).context("embedding dimension out of range")?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO document_embeddings (doc_id, content_hash, embedding_json, model, dimension)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(doc_id) DO UPDATE SET
                     content_hash = excluded.content_hash,
                     embedding_json = excluded.embedding_json,
                     model = excluded.model,
                     dimension = excluded.dimension",
                params![doc_id, content_hash, embedding_json, model, dimension],
            )
            .with_context(|| format!("upsert embedding for {doc_id}"))?;
            Ok(())
        })
    }

    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn embedding_count(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM document_embeddings", [], |row| row.get(0))
                .context("count embeddings")?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
    }
}

fn register_vec_extension() {
    if let Err(err) = crate::vec_ext::register_sqlite_vec() {
        debug!("sqlite-vec not registered, vector search uses the Rust scan: {err}");
    }
}

const DOCUMENT_COLUMNS: &str = "SELECT doc_id, title, body, source, metadata_json, content_hash, \
                                ingested_at_us FROM documents";

type RawDocument = (Document, String);

fn read_document_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawDocument> {
    Ok((
        Document {
            doc_id: row.get(0)?,
            title: row.get(1)?,
            body: row.get(2)?,
            source: row.get(3)?,
            metadata: serde_json::Map::new(),
            content_hash: row.get(5)?,
            ingested_at_us: row.get(6)?,
        },
        row.get(4)?,
    ))
}

fn finish_document((mut doc, metadata_json): RawDocument) -> Result<Document> {
    doc.metadata = serde_json::from_str(&metadata_json)
        .with_context(|| format!("decode metadata for document {}", doc.doc_id))?;
    Ok(doc)
}

fn configure_connection(conn: &Connection, wal: bool) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    if wal {
        let _journal_mode: String =
            conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    }
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}

fn embedding_text(title: Option<&str>, body: &str) -> String {
    match title {
        Some(title) if !title.trim().is_empty() => format!("{title}\n{body}"),
        _ => body.to_string(),
    }
}

/// SHA-256 of title and text, hex encoded.
#[must_use]
pub fn content_hash_hex(title: Option<&str>, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.unwrap_or_default().as_bytes());
    hasher.update([0u8]);
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(docs: &[(&str, &str)]) -> DocumentStore {
        let store = DocumentStore::open_in_memory().expect("open store");
        for (id, text) in docs {
            store.upsert_document(&NewDocument::new(*id, *text)).expect("upsert");
        }
        store
    }

    #[test]
    fn open_on_disk_sets_wal_and_migrates() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested/hybrag.db");
        let store = DocumentStore::open(&path).expect("open");

        store
            .with_conn(|conn| {
                let mode: String = conn.pragma_query_value(None, "journal_mode", |row| row.get(0))?;
                assert_eq!(mode.to_ascii_lowercase(), "wal");
                assert_eq!(
                    migrations::current_schema_version(conn)?,
                    migrations::LATEST_SCHEMA_VERSION
                );
                Ok(())
            })
            .expect("inspect connection");
        assert!(path.exists());
    }

    #[test]
    fn upsert_reports_insert_update_unchanged() {
        let store = DocumentStore::open_in_memory().unwrap();
        let doc = NewDocument::new("d1", "aspirin relieves pain").with_title("Aspirin");

        assert_eq!(store.upsert_document(&doc).unwrap(), UpsertOutcome::Inserted);
        assert_eq!(store.upsert_document(&doc).unwrap(), UpsertOutcome::Unchanged);

        let changed = NewDocument {
            text: "aspirin reduces fever".into(),
            ..doc
        };
        assert_eq!(store.upsert_document(&changed).unwrap(), UpsertOutcome::Updated);
        assert_eq!(store.get("d1").unwrap().unwrap().body, "aspirin reduces fever");
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn upsert_rejects_empty_id() {
        let store = DocumentStore::open_in_memory().unwrap();
        assert!(store.upsert_document(&NewDocument::new("  ", "x")).is_err());
    }

    #[test]
    fn get_round_trips_metadata() {
        let store = DocumentStore::open_in_memory().unwrap();
        let mut doc = NewDocument::new("d1", "body").with_source("pubmed");
        let mut meta = serde_json::Map::new();
        meta.insert("year".into(), serde_json::json!(2021));
        doc.metadata = Some(meta.clone());
        store.upsert_document(&doc).unwrap();

        let stored = store.get("d1").unwrap().unwrap();
        assert_eq!(stored.metadata, meta);
        assert_eq!(stored.source.as_deref(), Some("pubmed"));
        assert_eq!(stored.content_hash, doc.content_hash());
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn get_many_keeps_request_order() {
        let store = store_with(&[("a", "one"), ("b", "two"), ("c", "three")]);
        let docs = store.get_many(&["c", "missing", "a"]).unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.doc_id.as_str()).collect();
        assert_eq!(ids, ["c", "a"]);
    }

    #[test]
    fn remove_and_clear() {
        let store = store_with(&[("a", "one"), ("b", "two")]);
        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
        assert_eq!(store.fts_row_count().unwrap(), 1);
        assert_eq!(store.clear().unwrap(), 1);
        assert_eq!(store.count().unwrap(), 0);
        assert_eq!(store.fts_row_count().unwrap(), 0);
    }

    #[test]
    fn rebuild_fts_restores_index() {
        let store = store_with(&[("a", "migraine"), ("b", "insulin")]);
        store
            .with_conn(|conn| {
                conn.execute("DELETE FROM documents_fts", [])?;
                Ok(())
            })
            .unwrap();
        assert_eq!(store.fts_row_count().unwrap(), 0);

        store.rebuild_fts().unwrap();
        assert_eq!(store.fts_row_count().unwrap(), 2);
    }

    #[test]
    fn pending_embeddings_track_content_changes() {
        let store = store_with(&[("a", "one"), ("b", "two")]);
        let pending = store.pending_embeddings("m", 2).unwrap();
        assert_eq!(pending.len(), 2);

        store
            .upsert_embedding("a", &pending[0].content_hash, "m", &[0.1, 0.2])
            .unwrap();
        assert_eq!(store.pending_embeddings("m", 2).unwrap().len(), 1);
        assert_eq!(store.embedding_count().unwrap(), 1);

        store.upsert_document(&NewDocument::new("a", "changed")).unwrap();
        assert_eq!(store.pending_embeddings("m", 2).unwrap().len(), 2);
    }

    #[test]
    fn pending_embeddings_track_embedder_changes() {
        let store = store_with(&[("a", "one")]);
        let hash = store.get("a").unwrap().unwrap().content_hash;
        store.upsert_embedding("a", &hash, "m", &[0.1, 0.2]).unwrap();
        assert!(store.pending_embeddings("m", 2).unwrap().is_empty());

        assert_eq!(store.pending_embeddings("m", 4).unwrap().len(), 1);
        assert_eq!(store.pending_embeddings("other", 2).unwrap().len(), 1);
    }

    #[test]
    fn removing_document_drops_embedding() {
        let store = store_with(&[("a", "one")]);
        let hash = store.get("a").unwrap().unwrap().content_hash;
        store.upsert_embedding("a", &hash, "m", &[1.0]).unwrap();
        store.remove("a").unwrap();
        assert_eq!(store.embedding_count().unwrap(), 0);
    }

    #[test]
    fn all_texts_sorted_by_id() {
        let store = store_with(&[("b", "two"), ("a", "one")]);
        assert_eq!(
            store.all_texts().unwrap(),
            vec![("a".to_string(), "one".to_string()), ("b".to_string(), "two".to_string())]
        );
    }

    #[test]
    fn content_hash_depends_on_title() {
        assert_ne!(content_hash_hex(Some("a"), "x"), content_hash_hex(None, "x"));
        assert_eq!(content_hash_hex(None, "x").len(), 64);
    }
}
