//! Chronicle CLI — the main entry point.
//!
//! Commands:
//! - `context` — Assemble the generation context for the next chapter
//! - `queries` — Show the search queries derived from recent text
//! - `arcs`    — Show the most relevant arc memories
//! - `budget`  — Show the per-category token allocation
//! - `config`  — Print the configuration as TOML

use std::path::PathBuf;

use chronicle_config::{AssemblyStrategy, EngineConfig};
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "chronicle",
    about = "Chronicle — memory-tiered context assembly for long-form fiction",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.chronicle/config.toml)
    #[arg(short, long, global = true, env = "CHRONICLE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble the context for the next chapter
    Context {
        /// Novel snapshot (JSON)
        #[arg(short, long)]
        state: PathBuf,

        /// Override the token budget
        #[arg(short, long)]
        budget: Option<usize>,

        /// Compact context under the quick budget
        #[arg(long, conflicts_with_all = ["strategy", "budget"])]
        quick: bool,

        /// tiered | prioritized
        #[arg(long)]
        strategy: Option<AssemblyStrategy>,

        /// Author notes for the next chapter, analyzed with the recent text
        #[arg(short, long, default_value = "")]
        extra: String,

        /// Print the budget report to stderr
        #[arg(long)]
        report: bool,
    },

    /// Analyze recent text and print the generated queries as JSON
    Queries {
        #[arg(short, long)]
        state: PathBuf,

        #[arg(short, long, default_value = "")]
        extra: String,

        /// Maximum number of queries
        #[arg(short, long)]
        max: Option<usize>,
    },

    /// Print the most relevant arc memories as JSON
    Arcs {
        #[arg(short, long)]
        state: PathBuf,

        /// Chapter being written (defaults to latest + 1)
        #[arg(long)]
        chapter: Option<u32>,

        #[arg(short, long)]
        max: Option<usize>,
    },

    /// Print the per-category allocation of a token budget as JSON
    Budget {
        /// Total tokens (defaults to the configured budget)
        #[arg(short, long)]
        total: Option<usize>,
    },

    /// Print the configuration as TOML
    Config {
        /// Print the built-in defaults instead of the loaded config
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::load_path(path)?,
        None => EngineConfig::load()?,
    };

    // Initialize tracing. Logs go to stderr so stdout stays machine-readable.
    let filter = if cli.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false);
    if config.logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Context {
            state,
            budget,
            quick,
            strategy,
            extra,
            report,
        } => {
            let args = commands::context::ContextArgs {
                state,
                budget,
                quick,
                strategy,
                extra,
                report,
            };
            commands::context::run(&config, args).await?
        }
        Commands::Queries { state, extra, max } => {
            commands::queries::run(&config, &state, extra, max)?
        }
        Commands::Arcs {
            state,
            chapter,
            max,
        } => commands::arcs::run(&config, &state, chapter, max)?,
        Commands::Budget { total } => commands::budget::run(&config, total)?,
        Commands::Config { default } => commands::config_cmd::show(&config, default)?,
    }

    Ok(())
}
