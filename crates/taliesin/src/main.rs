//! Taliesin - a transactional dialogue agent.
//!
//! Main entry point for the Taliesin CLI.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod demo;
mod display;

use commands::converse;

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Taliesin - a transactional dialogue agent
#[derive(Parser)]
#[command(name = "taliesin")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Talk to the agent in an interactive REPL
    Converse(converse::ConverseArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "taliesin=debug,taliesin_dialogue=debug,taliesin_nlu=debug,taliesin_ast=debug,info"
    } else {
        "taliesin=info,taliesin_dialogue=info,taliesin_nlu=info,warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Converse(args) => converse::run(args).await,
    }
}
