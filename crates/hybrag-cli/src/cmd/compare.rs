//! `hybrag compare`: every strategy on the same query, side by side.

use anyhow::Result;
use clap::Args;
use hybrag_core::strategy::Strategy;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::cmd::search::{SearchHit, render_hits_human, with_titles};
use crate::output::{CliError, OutputMode, pretty_section, render_mode};
use crate::project::Project;

#[derive(Args, Debug)]
#[command(
    about = "Compare all retrieval strategies",
    long_about = "Run the vector, fulltext, semantic, and hybrid strategies on one query and \
                  show their rankings side by side. A failing strategy is reported in place \
                  and does not stop the others.",
    after_help = "EXAMPLES:\n    hybrag compare \"insulin resistance\" -n 3"
)]
pub struct CompareArgs {
    /// Free-text query.
    pub query: String,

    /// Number of results per strategy (default: retrieval.default_top_k).
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct StrategyRun {
    strategy: Strategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    results: Option<Vec<SearchHit>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<CliError>,
}

#[derive(Debug, Serialize)]
struct CompareOutput {
    query: String,
    top_k: usize,
    runs: Vec<StrategyRun>,
    /// Documents ranked by every strategy that succeeded.
    common: Vec<String>,
}

/// Execute `hybrag compare <query>`.
///
/// # Errors
///
/// Returns an error if the project is not initialized or the store cannot be
/// read. Per-strategy retrieval errors are reported in the output.
pub fn run_compare(args: &CompareArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let project = Project::open(project_root)?;
    let retriever = project.retriever()?;
    let top_k = project.top_k(args.limit);

    let mut runs = Vec::with_capacity(Strategy::ALL.len());
    for strategy in Strategy::ALL {
        let run = match retriever.retrieve(&args.query, top_k, strategy) {
            Ok(ranked) => StrategyRun {
                strategy,
                results: Some(with_titles(&project.store, ranked)?),
                error: None,
            },
            Err(err) => StrategyRun {
                strategy,
                results: None,
                error: Some(CliError::from(&err)),
            },
        };
        runs.push(run);
    }

    let result = CompareOutput {
        query: args.query.clone(),
        top_k,
        common: common_ids(&runs),
        runs,
    };

    render_mode(output, &result, render_compare_text, render_compare_human)
}

fn common_ids(runs: &[StrategyRun]) -> Vec<String> {
    let mut ok = runs.iter().filter_map(|run| run.results.as_deref());
    let Some(first) = ok.next() else {
        return Vec::new();
    };
    let rest: Vec<&[SearchHit]> = ok.collect();
    first
        .iter()
        .filter(|hit| {
            rest.iter()
                .all(|hits| hits.iter().any(|other| other.doc_id == hit.doc_id))
        })
        .map(|hit| hit.doc_id.clone())
        .collect()
}

fn render_compare_human(out: &CompareOutput, w: &mut dyn Write) -> std::io::Result<()> {
    for run in &out.runs {
        pretty_section(w, &format!("{} (top {})", run.strategy, out.top_k))?;
        match (&run.results, &run.error) {
            (Some(hits), _) if hits.is_empty() => writeln!(w, "  no results")?,
            (Some(hits), _) => render_hits_human(hits, w)?,
            (None, Some(err)) => writeln!(w, "  error: {}", err.message)?,
            (None, None) => {}
        }
        writeln!(w)?;
    }
    if out.common.is_empty() {
        writeln!(w, "No document appears in every ranking.")
    } else {
        writeln!(w, "In every ranking: {}", out.common.join(", "))
    }
}

fn render_compare_text(out: &CompareOutput, w: &mut dyn Write) -> std::io::Result<()> {
    for run in &out.runs {
        match (&run.results, &run.error) {
            (Some(hits), _) => {
                for hit in hits {
                    writeln!(w, "{}\t{}\t{}\t{:.6}", run.strategy, hit.rank, hit.doc_id, hit.score)?;
                }
            }
            (None, Some(err)) => writeln!(w, "{}\terror\t{}", run.strategy, err.message)?,
            (None, None) => {}
        }
    }
    Ok(())
}
