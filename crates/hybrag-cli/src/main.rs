#![forbid(unsafe_code)]

mod cmd;
mod output;
mod project;

use clap::{CommandFactory, Parser, Subcommand};
use output::{CliError, OutputMode, render_error, resolve_output_mode};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "hybrag: hybrid retrieval and answering over local documents",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON output (shorthand for `--format json`).
    #[arg(long, global = true)]
    json: bool,

    /// Output format: pretty, text, or json (default: pretty on a TTY, text when piped).
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Project root (default: current directory).
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        resolve_output_mode(self.format, self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Initialize a hybrag project",
        long_about = "Create .hybrag/ with a default config.toml and an empty document store.",
        after_help = "EXAMPLES:\n    # Initialize in the current directory\n    hybrag init\n\n    # Reset the config, keeping the store\n    hybrag init --force"
    )]
    Init(cmd::init::InitArgs),

    #[command(next_help_heading = "Setup")]
    Ingest(cmd::ingest::IngestArgs),

    #[command(next_help_heading = "Retrieve")]
    Search(cmd::search::SearchArgs),

    #[command(next_help_heading = "Retrieve")]
    Explain(cmd::explain::ExplainArgs),

    #[command(next_help_heading = "Retrieve")]
    Compare(cmd::compare::CompareArgs),

    #[command(next_help_heading = "Answer")]
    Ask(cmd::ask::AskArgs),

    #[command(next_help_heading = "Configure")]
    Weights(cmd::weights::WeightsArgs),

    #[command(next_help_heading = "Configure")]
    Config(cmd::config::ConfigArgs),

    #[command(
        next_help_heading = "Configure",
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n    hybrag completions bash > ~/.local/share/bash-completion/completions/hybrag"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("HYBRAG_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "hybrag=debug,info"
        } else {
            "hybrag=info,warn"
        })
    });

    let format = env::var("HYBRAG_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    // Logs go to stderr so stdout stays parseable.
    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    init_tracing();

    let cli = Cli::parse();
    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let output = cli.output_mode();
    let project_root = match cli.root.clone() {
        Some(root) => root,
        None => env::current_dir()?,
    };
    debug!(root = %project_root.display(), ?output, "resolved invocation");

    let command_result = match &cli.command {
        Commands::Init(args) => cmd::init::run_init(args, output, &project_root),
        Commands::Ingest(args) => cmd::ingest::run_ingest(args, output, &project_root),
        Commands::Search(args) => cmd::search::run_search(args, output, &project_root),
        Commands::Explain(args) => cmd::explain::run_explain(args, output, &project_root),
        Commands::Compare(args) => cmd::compare::run_compare(args, output, &project_root),
        Commands::Ask(args) => cmd::ask::run_ask(args, output, &project_root),
        Commands::Weights(args) => cmd::weights::run_weights(args, output, &project_root),
        Commands::Config(args) => cmd::config::run_config(args, output, &project_root),
        Commands::Completions(args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    };

    match command_result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            debug!("command failed: {err:?}");
            render_error(output, &CliError::from_anyhow(&err))?;
            Ok(ExitCode::FAILURE)
        }
    }
}
