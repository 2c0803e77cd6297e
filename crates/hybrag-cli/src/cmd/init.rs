use anyhow::{Result, bail};
use clap::Args;
use hybrag_core::config::{HYBRAG_DIR, ProjectConfig, config_path, load_project_config, save_project_config};
use hybrag_search::store::DocumentStore;
use serde::Serialize;
use std::path::Path;

use crate::output::{OutputMode, render_mode};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Rewrite the default config even if `.hybrag/` already exists.
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
struct InitOutput {
    root: String,
    config: String,
    database: String,
    documents: usize,
}

/// Execute `hybrag init`. Creates the project skeleton:
///
/// ```text
/// .hybrag/
///   config.toml   (default config)
///   hybrag.db     (document store, migrated to the latest schema)
/// ```
///
/// An existing database is kept and migrated; an existing config is only
/// replaced with `--force`.
///
/// # Errors
///
/// Returns an error if `.hybrag/` already exists without `--force`, or if any
/// filesystem or database operation fails.
pub fn run_init(args: &InitArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let dir = project_root.join(HYBRAG_DIR);
    let cfg_path = config_path(project_root);

    if cfg_path.exists() && !args.force {
        bail!("{HYBRAG_DIR}/ already exists. Use `hybrag init --force` to reinitialize.");
    }

    let config = if args.force && cfg_path.exists() {
        // Keep the store location a previous config chose.
        let previous = load_project_config(project_root).unwrap_or_default();
        ProjectConfig {
            store: previous.store,
            ..ProjectConfig::default()
        }
    } else {
        ProjectConfig::default()
    };

    std::fs::create_dir_all(&dir)?;
    let written = save_project_config(project_root, &config)?;

    let db_path = config.store.resolve(project_root);
    let store = DocumentStore::open(&db_path)?;

    let result = InitOutput {
        root: project_root.display().to_string(),
        config: written.display().to_string(),
        database: db_path.display().to_string(),
        documents: store.count()?,
    };

    render_mode(
        output,
        &result,
        |r, w| {
            writeln!(w, "config\t{}", r.config)?;
            writeln!(w, "database\t{}", r.database)
        },
        |r, w| {
            writeln!(w, "✓ Initialized {HYBRAG_DIR}/ in {}", r.root)?;
            writeln!(w)?;
            writeln!(w, "  Config:    {}", r.config)?;
            writeln!(w, "  Database:  {} ({} documents)", r.database, r.documents)?;
            writeln!(w)?;
            writeln!(w, "Next steps:")?;
            writeln!(w, "  hybrag ingest documents.jsonl")?;
            writeln!(w, "  hybrag search \"your question\"")
        },
    )
}
