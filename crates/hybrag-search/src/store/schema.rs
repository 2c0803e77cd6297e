//! SQL for the document store.
//!
//! `documents` holds the canonical passages. `documents_fts` is a regular
//! FTS5 table mirroring `title`/`body`, kept in sync by triggers keyed on the
//! documents rowid. `document_embeddings` stores one JSON-encoded vector per
//! document with the content hash, model, and dimension it was computed with.

pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS documents (
    doc_id TEXT PRIMARY KEY,
    title TEXT,
    body TEXT NOT NULL,
    source TEXT,
    metadata_json TEXT NOT NULL DEFAULT '{}',
    content_hash TEXT NOT NULL,
    ingested_at_us INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_source ON documents(source);

CREATE VIRTUAL TABLE IF NOT EXISTS documents_fts USING fts5(
    title,
    body,
    doc_id UNINDEXED,
    tokenize='porter unicode61'
);

CREATE TRIGGER IF NOT EXISTS documents_ai
AFTER INSERT ON documents
BEGIN
    INSERT INTO documents_fts(rowid, title, body, doc_id)
    VALUES (new.rowid, COALESCE(new.title, ''), new.body, new.doc_id);
END;

CREATE TRIGGER IF NOT EXISTS documents_au
AFTER UPDATE ON documents
BEGIN
    DELETE FROM documents_fts WHERE rowid = old.rowid;
    INSERT INTO documents_fts(rowid, title, body, doc_id)
    VALUES (new.rowid, COALESCE(new.title, ''), new.body, new.doc_id);
END;

CREATE TRIGGER IF NOT EXISTS documents_ad
AFTER DELETE ON documents
BEGIN
    DELETE FROM documents_fts WHERE rowid = old.rowid;
END;
";

pub const MIGRATION_V2_SQL: &str = r"
CREATE TABLE IF NOT EXISTS document_embeddings (
    doc_id TEXT PRIMARY KEY REFERENCES documents(doc_id) ON DELETE CASCADE,
    content_hash TEXT NOT NULL,
    embedding_json TEXT NOT NULL
);
";

/// Rows written before v3 get an empty model and dimension 0, so they read as
/// stale for every embedder.
pub const MIGRATION_V3_SQL: &str = r"
ALTER TABLE document_embeddings ADD COLUMN model TEXT NOT NULL DEFAULT '';
ALTER TABLE document_embeddings ADD COLUMN dimension INTEGER NOT NULL DEFAULT 0;
";

/// Rebuild the FTS mirror from `documents`.
pub const REBUILD_FTS_SQL: &str = r"
DELETE FROM documents_fts;
INSERT INTO documents_fts(rowid, title, body, doc_id)
SELECT rowid, COALESCE(title, ''), body, doc_id FROM documents;
";

pub const REQUIRED_TABLES: &[&str] = &["documents", "documents_fts", "document_embeddings"];
