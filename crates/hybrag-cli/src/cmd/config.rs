use anyhow::{Context, Result};
use clap::Args;
use hybrag_core::config::{ProjectConfig, config_path};
use hybrag_search::pipeline::PipelineStats;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use crate::project::Project;

#[derive(Args, Debug)]
#[command(
    about = "Show the effective configuration",
    long_about = "Print the configuration after HYBRAG_* environment overrides, optionally \
                  with store counts and the active answer generator.",
    after_help = "EXAMPLES:\n    hybrag config\n    hybrag config --stats --format json"
)]
pub struct ConfigArgs {
    /// Also report document/embedding counts and the answer generator.
    #[arg(long)]
    pub stats: bool,
}

#[derive(Debug, Serialize)]
struct ConfigOutput {
    path: String,
    config: ProjectConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<PipelineStats>,
}

/// Execute `hybrag config`.
///
/// # Errors
///
/// Returns an error if the project is not initialized or the store cannot be
/// read for `--stats`.
pub fn run_config(args: &ConfigArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let project = Project::open(project_root)?;
    let stats = if args.stats {
        Some(project.pipeline()?.stats().context("read pipeline stats")?)
    } else {
        None
    };

    let result = ConfigOutput {
        path: config_path(project_root).display().to_string(),
        config: project.config,
        stats,
    };

    // Both human modes print the on-disk TOML form.
    let toml = toml::to_string_pretty(&result.config).context("serialize config")?;
    render_mode(
        output,
        &result,
        |_, w| write!(w, "{toml}"),
        |r, w| {
            pretty_section(w, &format!("Configuration ({})", r.path))?;
            write!(w, "{toml}")?;
            if let Some(stats) = &r.stats {
                writeln!(w)?;
                render_stats_human(stats, w)?;
            }
            Ok(())
        },
    )
}

fn render_stats_human(stats: &PipelineStats, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, "Pipeline")?;
    pretty_kv(w, "Documents", stats.documents.to_string())?;
    pretty_kv(w, "Embeddings", stats.embeddings.to_string())?;
    pretty_kv(w, "Degrade policy", stats.degrade.to_string())?;
    pretty_kv(
        w,
        "Generator",
        if stats.generator_configured {
            stats.generator.clone()
        } else {
            format!("{} (no language model configured)", stats.generator)
        },
    )?;
    pretty_kv(w, "Max context", format!("{} chars", stats.max_context_length))?;
    pretty_kv(w, "Temperature", format!("{:.2}", stats.temperature))?;
    pretty_kv(w, "Max tokens", stats.max_tokens.to_string())
}
