//! Budget CLI - Command line interface for the budget reallocation agent
//!
//! Trains a DQN policy for a user profile, queries a trained checkpoint for
//! the next recommended move, and summarizes spending history.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::unused_async)]
#![allow(clippy::float_cmp)]

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use commands::{recommend, summary, train};
use crate::config::{Config, LoggingConfig};

#[derive(Parser)]
#[command(name = "budget")]
#[command(author, version, about = "Budget RL - savings-focused budget reallocation agent", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to $BUDGET_CONFIG, ./budget.toml, ~/.config/budget/budget.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train an agent and write a checkpoint
    Train(train::TrainArgs),

    /// Recommend the next reallocation move from a checkpoint
    Recommend(recommend::RecommendArgs),

    /// Summarize a user's spending history
    Summary(summary::SummaryArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(commands::config::ConfigCommands),
}

fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("budget={level},budget_rl={level},budget_core={level}").into()
    });

    let (plain, json) = if logging.json {
        (None, Some(tracing_subscriber::fmt::layer().json()))
    } else {
        (Some(tracing_subscriber::fmt::layer()), None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(plain)
        .with(json)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    init_tracing(&config.logging, cli.verbose);

    match cli.command {
        Commands::Train(args) => train::run(args, config).await,
        Commands::Recommend(args) => recommend::run(args, &config).await,
        Commands::Summary(args) => summary::run(args, &config).await,
        Commands::Config(cmd) => commands::config::run(cmd, &config).await,
    }
}
