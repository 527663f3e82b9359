// crates/lexis-cli/src/main.rs
//
// CLI entrypoint for Lexis.
//
// Loads configuration, initializes tracing (to stderr, so stdout stays
// machine-readable JSON) and dispatches to the plan, run, trace and prune
// subcommands.

mod commands;
mod config;
mod context;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use commands::prune::PruneCmd;
use commands::query::QueryArgs;
use commands::run::RunCmd;
use commands::trace::TraceCmd;
use config::LexisConfig;
use context::AppContext;

/// Lexis: classical-language dictionary lookups with recorded provenance.
#[derive(Parser, Debug)]
#[command(
    name = "lexis",
    version = "0.1.0",
    about = "Plan and run Latin, Greek and Sanskrit dictionary lookups"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "~/.lexis/config.toml")]
    config: String,

    /// Answer every fetch with the contents of this file (offline mode).
    #[arg(long, global = true)]
    fixture: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the tool plan for a query without executing it.
    Plan(QueryArgs),

    /// Plan and execute a query, printing the run summary and claims.
    Run(RunCmd),

    /// Print a stored claim and the effects it was derived from.
    Trace(TraceCmd),

    /// Drop stale plan cache entries.
    Prune(PruneCmd),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load before tracing starts so the configured level applies; report after.
    let (config, load_error) = match LexisConfig::load(&cli.config) {
        Ok(cfg) => (cfg, None),
        Err(e) => (LexisConfig::default(), Some(e.to_string())),
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    match load_error {
        None => tracing::info!("Loaded configuration from {}", cli.config),
        Some(e) => tracing::warn!(
            "Could not load config from {}: {}. Using defaults.",
            cli.config,
            e
        ),
    }
    tracing::debug!("Database: {}", config.database_path().display());

    let ctx = AppContext {
        config,
        fixture: cli.fixture.clone(),
    };

    match &cli.command {
        Commands::Plan(args) => commands::plan::run(args, &ctx).await?,
        Commands::Run(cmd) => commands::run::run(cmd, &ctx).await?,
        Commands::Trace(cmd) => commands::trace::run(cmd, &ctx).await?,
        Commands::Prune(cmd) => commands::prune::run(cmd, &ctx).await?,
    }

    Ok(())
}
