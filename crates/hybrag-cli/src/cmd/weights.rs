use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand};
use hybrag_core::config::{load_project_config, save_project_config};
use hybrag_core::engine::FusionEngine;
use hybrag_core::weights::WeightConfig;
use serde::Serialize;
use std::path::Path;

use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use crate::project::Project;

#[derive(Args, Debug)]
#[command(
    about = "Show or change fusion weights",
    after_help = "EXAMPLES:\n    hybrag weights show\n\n\
                  # Lean on fulltext; unspecified weights keep their value\n    hybrag weights set --fulltext 0.6 --semantic 0.1"
)]
pub struct WeightsArgs {
    #[command(subcommand)]
    pub command: WeightsCommand,
}

#[derive(Subcommand, Debug)]
pub enum WeightsCommand {
    /// Show the configured weights and their relative shares.
    Show,
    /// Persist new weights to .hybrag/config.toml.
    Set(SetArgs),
}

#[derive(Args, Debug)]
pub struct SetArgs {
    #[arg(long)]
    pub vector: Option<f64>,

    #[arg(long)]
    pub fulltext: Option<f64>,

    #[arg(long)]
    pub semantic: Option<f64>,
}

#[derive(Debug, Serialize)]
struct WeightsOutput {
    weights: WeightConfig,
    shares: WeightConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    saved_to: Option<String>,
}

impl WeightsOutput {
    fn new(weights: WeightConfig, saved_to: Option<String>) -> Self {
        Self {
            weights,
            shares: weights.shares(),
            saved_to,
        }
    }
}

/// Execute `hybrag weights <show|set>`.
///
/// # Errors
///
/// Returns an error if the project is not initialized, no weight is given to
/// `set`, or the new weights are invalid (negative, non-finite, all zero).
pub fn run_weights(args: &WeightsArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let result = match &args.command {
        WeightsCommand::Show => {
            let project = Project::open(project_root)?;
            WeightsOutput::new(project.config.retrieval.weights, None)
        }
        WeightsCommand::Set(set) => {
            Project::open(project_root)?;
            let weights = set_weights(set, project_root)?;
            let path = hybrag_core::config::config_path(project_root);
            WeightsOutput::new(weights, Some(path.display().to_string()))
        }
    };

    render_mode(
        output,
        &result,
        |r, w| {
            writeln!(
                w,
                "vector={}\tfulltext={}\tsemantic={}",
                r.weights.vector, r.weights.fulltext, r.weights.semantic
            )
        },
        |r, w| {
            pretty_section(w, "Fusion weights")?;
            for (name, weight, share) in [
                ("vector", r.weights.vector, r.shares.vector),
                ("fulltext", r.weights.fulltext, r.shares.fulltext),
                ("semantic", r.weights.semantic, r.shares.semantic),
            ] {
                pretty_kv(w, name, format!("{weight:.3}  ({:.1}%)", share * 100.0))?;
            }
            if let Some(path) = &r.saved_to {
                writeln!(w)?;
                writeln!(w, "✓ Saved to {path}")?;
            }
            Ok(())
        },
    )
}

/// Merge the given flags over the file's current weights, validate, and save.
fn set_weights(args: &SetArgs, project_root: &Path) -> Result<WeightConfig> {
    if args.vector.is_none() && args.fulltext.is_none() && args.semantic.is_none() {
        bail!("give at least one of --vector, --fulltext, --semantic");
    }

    // The file config, not the effective one, so env overrides are not
    // persisted.
    let mut config = load_project_config(project_root)?;
    let current = config.retrieval.weights;

    // Validation shares the engine's rules for live weight swaps.
    let engine = FusionEngine::new(current);
    let weights = engine
        .set_weights(
            args.vector.unwrap_or(current.vector),
            args.fulltext.unwrap_or(current.fulltext),
            args.semantic.unwrap_or(current.semantic),
        )
        .context("weights not changed")?;

    config.retrieval.weights = weights;
    save_project_config(project_root, &config)?;
    Ok(weights)
}
