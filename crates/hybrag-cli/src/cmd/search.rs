//! `hybrag search`: ranked documents for a query.

use anyhow::{Context, Result};
use clap::Args;
use hybrag_core::fusion::{Breakdown, FusedResult};
use hybrag_core::strategy::Strategy;
use hybrag_search::store::DocumentStore;
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use crate::output::{OutputMode, pretty_rule, render_mode};
use crate::project::Project;

#[derive(Args, Debug)]
#[command(
    about = "Search documents",
    long_about = "Rank documents for a query. The hybrid strategy fuses normalized vector, \
                  fulltext (BM25), and lexical-overlap scores with the configured weights; the \
                  single-source strategies rank by one signal.",
    after_help = "EXAMPLES:\n    # Hybrid search\n    hybrag search \"migraine treatment\"\n\n\
                  # Fulltext only, top 3\n    hybrag search \"migraine treatment\" --strategy fulltext -n 3\n\n\
                  # Machine-readable output\n    hybrag search \"migraine treatment\" --format json"
)]
pub struct SearchArgs {
    /// Free-text query.
    pub query: String,

    /// Number of results (default: retrieval.default_top_k).
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// vector, fulltext (or keyword), semantic, or hybrid.
    #[arg(short, long)]
    pub strategy: Option<Strategy>,
}

/// A single search result row.
#[derive(Debug, Serialize)]
pub struct SearchHit {
    pub rank: usize,
    pub doc_id: String,
    pub title: Option<String>,
    pub score: f64,
    pub breakdown: Breakdown,
}

/// JSON envelope for search output.
#[derive(Debug, Serialize)]
pub struct SearchOutput {
    pub query: String,
    pub strategy: Strategy,
    pub count: usize,
    pub results: Vec<SearchHit>,
}

/// Execute `hybrag search <query>`.
///
/// # Errors
///
/// Returns an error if the project is not initialized, `-n 0` is given, or a
/// source fails under the strict degrade policy.
pub fn run_search(args: &SearchArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let project = Project::open(project_root)?;
    let strategy = project.strategy(args.strategy);
    let top_k = project.top_k(args.limit);

    let ranked = project
        .retriever()?
        .retrieve(&args.query, top_k, strategy)
        .context("search failed")?;

    let result = SearchOutput {
        query: args.query.clone(),
        strategy,
        count: ranked.len(),
        results: with_titles(&project.store, ranked)?,
    };

    render_mode(output, &result, render_search_text, render_search_human)
}

/// Attach stored titles to ranked results.
///
/// # Errors
///
/// Returns an error if the store lookup fails.
pub fn with_titles(store: &DocumentStore, ranked: Vec<FusedResult>) -> Result<Vec<SearchHit>> {
    let ids: Vec<&str> = ranked.iter().map(|hit| hit.doc_id.as_str()).collect();
    let mut titles: HashMap<String, Option<String>> = store
        .get_many(&ids)?
        .into_iter()
        .map(|doc| (doc.doc_id, doc.title))
        .collect();

    Ok(ranked
        .into_iter()
        .enumerate()
        .map(|(idx, hit)| SearchHit {
            rank: idx + 1,
            title: titles.remove(&hit.doc_id).flatten(),
            doc_id: hit.doc_id,
            score: hit.fused_score,
            breakdown: hit.breakdown,
        })
        .collect())
}

pub fn render_hits_human(hits: &[SearchHit], w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "{:>4}  {:<20}  {:>8}  TITLE", "RANK", "ID", "SCORE")?;
    pretty_rule(w)?;
    for hit in hits {
        writeln!(
            w,
            "{:>4}  {:<20}  {:>8.4}  {}",
            hit.rank,
            hit.doc_id,
            hit.score,
            hit.title.as_deref().unwrap_or("-")
        )?;
    }
    Ok(())
}

fn render_search_human(out: &SearchOutput, w: &mut dyn Write) -> std::io::Result<()> {
    if out.results.is_empty() {
        writeln!(w, "No results for '{}' ({})", out.query, out.strategy)?;
        writeln!(w, "Try broader terms, another --strategy, or `hybrag ingest` more documents")?;
        return Ok(());
    }

    writeln!(
        w,
        "{} result(s) for '{}' ({}):",
        out.count, out.query, out.strategy
    )?;
    pretty_rule(w)?;
    render_hits_human(&out.results, w)
}

fn render_search_text(out: &SearchOutput, w: &mut dyn Write) -> std::io::Result<()> {
    for hit in &out.results {
        writeln!(
            w,
            "{}\t{}\t{:.6}\t{}",
            hit.rank,
            hit.doc_id,
            hit.score,
            hit.title.as_deref().unwrap_or("")
        )?;
    }
    Ok(())
}
