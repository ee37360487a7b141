//! Training command

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use budget_core::RiskPreference;
use budget_rl::{BudgetEnvironment, DqnAgent, TrainingLoop, TrainingReport};
use clap::Args;
use tracing::{info, warn};

use crate::config::Config;

#[derive(Args)]
pub struct TrainArgs {
    /// Monthly income for the training profile
    #[arg(long)]
    income: Option<f64>,

    /// Risk preference: conservative, moderate or aggressive
    #[arg(long)]
    risk: Option<RiskPreference>,

    /// Number of episodes
    #[arg(short, long)]
    episodes: Option<usize>,

    /// Checkpoint output path
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Continue from the existing checkpoint instead of a fresh agent
    #[arg(long)]
    resume: bool,

    /// Write the training report as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

pub async fn run(args: TrainArgs, config: Config) -> Result<()> {
    let profile = config.profile.resolve(args.income, args.risk)?;

    let mut training = config.training;
    if let Some(episodes) = args.episodes {
        training.episodes = episodes;
    }
    if let Some(path) = args.checkpoint {
        training.checkpoint_path = path;
    }
    if args.seed.is_some() {
        training.seed = args.seed;
    }
    let agent_config = config.agent;
    let resume = args.resume;

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current episode");
            flag.store(true, Ordering::Relaxed);
        }
    });

    let report = tokio::task::spawn_blocking(move || -> Result<TrainingReport> {
        let env = BudgetEnvironment::new(profile)?;
        let mut agent = DqnAgent::with_seed(agent_config, training.seed)?;
        if resume {
            agent.load(&training.checkpoint_path).with_context(|| {
                format!(
                    "Cannot resume from {}; rerun without --resume to start fresh",
                    training.checkpoint_path.display()
                )
            })?;
        }

        let mut training_loop = TrainingLoop::with_agent(env, agent, training)?;
        Ok(training_loop.run_with_cancel(&cancel)?)
    })
    .await
    .context("Training task failed")??;

    print_report(&report);

    if let Some(path) = args.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!(path = %path.display(), "Training report written");
    }

    Ok(())
}

fn print_report(report: &TrainingReport) {
    println!("Training Run {}", report.run_id);
    println!("========================================\n");
    if report.cancelled {
        println!("Status:        cancelled");
    } else {
        println!("Status:        complete");
    }
    println!("Episodes:      {}", report.episodes_completed);
    println!("Learn steps:   {}", report.learn_steps);
    println!("Final epsilon: {:.4}", report.final_epsilon);
    if let Some(mean) = report.mean_reward(50) {
        println!("Mean reward (last 50): {mean:.3}");
    }
    println!("Checkpoint:    {}", report.checkpoint_path.display());
}
