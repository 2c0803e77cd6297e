//! `hybrag explain`: how each source shaped a hybrid ranking.

use anyhow::{Context, Result};
use clap::Args;
use hybrag_core::candidate::SourceKind;
use hybrag_core::fusion::{Explanation, SourceContribution};
use std::io::Write;
use std::path::Path;

use crate::output::{OutputMode, pretty_kv, pretty_rule, pretty_section, render_mode};
use crate::project::Project;

#[derive(Args, Debug)]
#[command(
    about = "Explain a hybrid ranking",
    long_about = "Show the weights, each source's raw score range, and the per-source raw, \
                  normalized, and weighted contribution behind every ranked document.",
    after_help = "EXAMPLES:\n    hybrag explain \"migraine treatment\"\n    hybrag explain \"migraine\" -n 3 --format json"
)]
pub struct ExplainArgs {
    /// Free-text query.
    pub query: String,

    /// Number of results (default: retrieval.default_top_k).
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

/// Execute `hybrag explain <query>`.
///
/// # Errors
///
/// Returns an error if the project is not initialized or retrieval fails.
pub fn run_explain(args: &ExplainArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let project = Project::open(project_root)?;
    let explanation = project
        .retriever()?
        .explain(&args.query, project.top_k(args.limit))
        .context("explain failed")?;

    render_mode(output, &explanation, render_explain_text, render_explain_human)
}

fn cell(part: &SourceContribution) -> String {
    match part.raw {
        Some(raw) => format!("{raw:>8.3} {:>5.3} {:>6.3}", part.normalized, part.contribution),
        None => format!("{:>8} {:>5} {:>6}", "-", "-", "0"),
    }
}

pub fn render_explain_human(ex: &Explanation, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, &format!("Explanation for '{}'", ex.query))?;
    pretty_kv(
        w,
        "Weights",
        format!(
            "vector={:.3} fulltext={:.3} semantic={:.3}",
            ex.weights.vector, ex.weights.fulltext, ex.weights.semantic
        ),
    )?;
    pretty_kv(
        w,
        "Weight shares",
        format!(
            "vector={:.1}% fulltext={:.1}% semantic={:.1}%",
            ex.weight_shares.vector * 100.0,
            ex.weight_shares.fulltext * 100.0,
            ex.weight_shares.semantic * 100.0
        ),
    )?;
    for kind in SourceKind::ALL {
        if let Some(report) = ex.source(kind) {
            let range = match (report.min_raw, report.max_raw) {
                (Some(min), Some(max)) => format!("raw {min:.3}..{max:.3}"),
                _ => "no candidates".to_string(),
            };
            pretty_kv(w, &format!("{kind} source"), format!("{} candidates, {range}", report.count))?;
        }
    }
    pretty_kv(w, "Candidate pool", ex.candidate_pool().to_string())?;
    writeln!(w)?;

    if ex.results.is_empty() {
        return writeln!(w, "No documents ranked.");
    }

    writeln!(
        w,
        "{:>4}  {:<16} {:>7}  {:<22}  {:<22}  {:<22}",
        "RANK", "ID", "FUSED", "VECTOR raw/norm/contr", "FULLTEXT raw/norm/contr", "SEMANTIC raw/norm/contr"
    )?;
    pretty_rule(w)?;
    for ranked in &ex.results {
        let b = &ranked.result.breakdown;
        writeln!(
            w,
            "{:>4}  {:<16} {:>7.4}  {}  {}  {}",
            ranked.rank,
            ranked.result.doc_id,
            ranked.result.fused_score,
            cell(&b.vector),
            cell(&b.fulltext),
            cell(&b.semantic)
        )?;
    }
    Ok(())
}

fn render_explain_text(ex: &Explanation, w: &mut dyn Write) -> std::io::Result<()> {
    for ranked in &ex.results {
        write!(w, "{}\t{}\t{:.6}", ranked.rank, ranked.result.doc_id, ranked.result.fused_score)?;
        for kind in SourceKind::ALL {
            let part = ranked.result.breakdown.get(kind);
            match part.raw {
                Some(raw) => write!(w, "\t{kind}={raw:.6}/{:.6}/{:.6}", part.normalized, part.contribution)?,
                None => write!(w, "\t{kind}=-")?,
            }
        }
        writeln!(w)?;
    }
    Ok(())
}
