//! Recommendation command

use std::path::PathBuf;

use anyhow::{Context, Result};
use budget_core::RiskPreference;
use budget_rl::{BudgetAction, Recommendation, Recommender};
use clap::Args;

use crate::commands::history;
use crate::config::Config;

#[derive(Args)]
pub struct RecommendArgs {
    /// Checkpoint to load (defaults to training.checkpoint_path)
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Monthly income, when not reading a profile from --history
    #[arg(long)]
    income: Option<f64>,

    /// Risk preference, when not reading a profile from --history
    #[arg(long)]
    risk: Option<RiskPreference>,

    /// History file; starts from the user's observed split instead of the canonical one
    #[arg(long, requires = "uid")]
    history: Option<PathBuf>,

    /// User id within the history file
    #[arg(long, requires = "history")]
    uid: Option<String>,

    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
}

pub async fn run(args: RecommendArgs, config: &Config) -> Result<()> {
    let path = args
        .checkpoint
        .unwrap_or_else(|| config.training.checkpoint_path.clone());
    let recommender = Recommender::from_checkpoint(&path)
        .with_context(|| format!("No usable trained agent at {}", path.display()))?;

    let recommendation = match (&args.history, &args.uid) {
        (Some(file), Some(uid)) => {
            let store = history::load_store(file)?;
            let (profile, transactions) = history::fetch(&store, uid, None, None)?;
            let baseline = history::baseline(&profile, &transactions)?;
            recommender.recommend_from(&profile, baseline)?
        }
        _ => {
            let profile = config.profile.resolve(args.income, args.risk)?;
            recommender.recommend(&profile)?
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&recommendation)?);
    } else {
        print_recommendation(&recommendation);
    }
    Ok(())
}

fn print_recommendation(rec: &Recommendation) {
    println!("Recommended action: {} ({})", rec.action, rec.description);
    println!("Current savings:    {:.1}%\n", rec.observation.savings() * 100.0);
    println!("{:<24} {:>10}", "ACTION", "Q-VALUE");
    println!("{}", "-".repeat(35));
    for (action, q) in BudgetAction::ALL.iter().zip(&rec.q_values) {
        let marker = if *action == rec.action { "*" } else { " " };
        println!("{marker}{:<23} {:>10.4}", action.to_string(), q);
    }
}
