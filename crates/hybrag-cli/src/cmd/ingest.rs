use anyhow::Result;
use clap::Args;
use hybrag_search::ingest::{IngestReport, embed_pending, load_jsonl};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use crate::project::Project;

#[derive(Args, Debug)]
#[command(
    about = "Load documents from a JSONL file",
    long_about = "Load documents from a JSONL file (one {doc_id, title?, text, source?, metadata?} \
                  object per line) and refresh their embeddings.\n\n\
                  Re-ingesting is idempotent: unchanged documents are skipped by content hash.",
    after_help = "EXAMPLES:\n    # Load a corpus\n    hybrag ingest corpus.jsonl\n\n\
                  # Load without computing embeddings\n    hybrag ingest corpus.jsonl --skip-embeddings"
)]
pub struct IngestArgs {
    /// JSONL file to load.
    pub file: PathBuf,

    /// Only store documents; leave embeddings for a later run.
    #[arg(long)]
    pub skip_embeddings: bool,

    /// Rebuild the fulltext index after loading.
    #[arg(long)]
    pub rebuild_fts: bool,
}

#[derive(Debug, Serialize)]
struct IngestOutput {
    file: String,
    #[serde(flatten)]
    report: IngestReport,
    total_documents: usize,
    total_embeddings: usize,
    embedding_model: String,
}

/// Execute `hybrag ingest <file>`.
///
/// # Errors
///
/// Returns an error if the file cannot be parsed, or a store or embedder
/// operation fails.
pub fn run_ingest(args: &IngestArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let project = Project::open(project_root)?;
    let embedder = project.embedder();

    let mut report = load_jsonl(&project.store, &args.file)?;
    if args.rebuild_fts {
        project.store.rebuild_fts()?;
    }
    if !args.skip_embeddings {
        report.embedded = embed_pending(
            &project.store,
            embedder.as_ref(),
            project.config.embeddings.batch_size,
        )?;
    }

    let result = IngestOutput {
        file: args.file.display().to_string(),
        report,
        total_documents: project.store.count()?,
        total_embeddings: project.store.embedding_count()?,
        embedding_model: embedder.model().to_string(),
    };

    render_mode(
        output,
        &result,
        |r, w| {
            writeln!(
                w,
                "inserted={}\tupdated={}\tunchanged={}\tembedded={}\ttotal={}",
                r.report.inserted,
                r.report.updated,
                r.report.unchanged,
                r.report.embedded,
                r.total_documents
            )
        },
        |r, w| {
            pretty_section(w, &format!("Ingested {}", r.file))?;
            pretty_kv(w, "Inserted", r.report.inserted.to_string())?;
            pretty_kv(w, "Updated", r.report.updated.to_string())?;
            pretty_kv(w, "Unchanged", r.report.unchanged.to_string())?;
            pretty_kv(w, "Embedded", format!("{} ({})", r.report.embedded, r.embedding_model))?;
            pretty_kv(
                w,
                "Store",
                format!(
                    "{} documents, {} embeddings",
                    r.total_documents, r.total_embeddings
                ),
            )
        },
    )
}
