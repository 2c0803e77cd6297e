//! `hybrag ask`: retrieve, build context, then answer.

use anyhow::Result;
use clap::Args;
use hybrag_core::strategy::Strategy;
use hybrag_search::pipeline::Answer;
use std::io::Write;
use std::path::Path;

use crate::cmd::explain::render_explain_human;
use crate::output::{OutputMode, pretty_rule, pretty_section, render_mode};
use crate::project::Project;

#[derive(Args, Debug)]
#[command(
    about = "Answer a question from the indexed documents",
    long_about = "Retrieve the top documents, assemble them into a bounded context, and answer \
                  with the configured language model. Without a model (no API key, or built \
                  without the `openai` feature) the answer echoes the retrieved context.",
    after_help = "EXAMPLES:\n    hybrag ask \"How are migraines treated?\"\n\n\
                  # Include the hybrid ranking explanation\n    hybrag ask \"How are migraines treated?\" --explain"
)]
pub struct AskArgs {
    /// The question.
    pub query: String,

    /// Number of documents to retrieve (default: retrieval.default_top_k).
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// vector, fulltext (or keyword), semantic, or hybrid.
    #[arg(short, long)]
    pub strategy: Option<Strategy>,

    /// Include the hybrid ranking explanation.
    #[arg(long)]
    pub explain: bool,

    /// Override llm.max_context_length for this call.
    #[arg(long)]
    pub max_context: Option<usize>,
}

/// Execute `hybrag ask <query>`.
///
/// # Errors
///
/// Returns an error if the project is not initialized or retrieval fails.
/// Generation failures are reported inside the answer instead.
pub fn run_ask(args: &AskArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let project = Project::open(project_root)?;
    let mut pipeline = project.pipeline()?;
    pipeline.configure(args.max_context, None, None);

    let answer = pipeline.answer(
        &args.query,
        project.strategy(args.strategy),
        project.top_k(args.limit),
        args.explain,
    )?;

    render_mode(
        output,
        &answer,
        |a, w| writeln!(w, "{}", a.response),
        render_ask_human,
    )
}

fn render_ask_human(answer: &Answer, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, &format!("Q: {}", answer.query))?;
    writeln!(w, "{}", answer.response)?;
    writeln!(w)?;

    pretty_section(
        w,
        &format!(
            "Sources ({}, {} documents, {} context chars{})",
            answer.strategy,
            answer.retrieved.len(),
            answer.context_length,
            if answer.generated { "" } else { ", no model" }
        ),
    )?;
    for doc in &answer.retrieved {
        writeln!(
            w,
            "{:>3}. {:<20} {:>7.4}  {}",
            doc.rank,
            doc.doc_id,
            doc.score,
            doc.title.as_deref().unwrap_or("-")
        )?;
    }

    if let Some(explanation) = &answer.explanation {
        writeln!(w)?;
        render_explain_human(explanation, w)?;
    }
    pretty_rule(w)
}
