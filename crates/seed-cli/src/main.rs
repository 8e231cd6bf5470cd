mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use seed_core::SeedError;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "seed",
    about = "Run project commands, call collaborator tools, and keep a timestamped record of every run",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .seed/ or .git/)
    #[arg(long, global = true, env = "SEED_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Seconds before a collaborator run is killed (0 disables; overrides config)
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mine source files for recurring patterns (scan, analyze, export, all)
    Mine {
        /// Command name followed by its arguments (default: help)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Time, improve and report on the engine (baseline, improve, benchmark, report, all)
    Ci {
        /// Command name followed by its arguments (default: help)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Prepare tools, config and the engine (install, configure, start, verify, all)
    Bootstrap {
        /// Command name followed by its arguments (default: all)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// List recorded artifacts of a category, oldest first
    History {
        /// Artifact category (e.g. scan, baseline, workflow)
        category: String,

        /// Show only the newest N
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show root, config, collaborator availability and provider key presence
    Status,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    tracing::debug!(root = %root.display(), "resolved project root");

    let result = match cli.command {
        Commands::Mine { args } => cmd::mine::run(&root, &args, cli.json, cli.timeout),
        Commands::Ci { args } => cmd::ci::run(&root, &args, cli.json, cli.timeout),
        Commands::Bootstrap { args } => cmd::bootstrap::run(&root, &args, cli.json, cli.timeout),
        Commands::History { category, limit } => {
            cmd::history::run(&root, &category, limit, cli.json)
        }
        Commands::Status => cmd::status::run(&root, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        let code = e.downcast_ref::<SeedError>().map_or(1, SeedError::exit_code);
        std::process::exit(code);
    }
}
