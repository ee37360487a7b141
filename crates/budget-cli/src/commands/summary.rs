//! Spending summary command

use std::path::PathBuf;

use anyhow::Result;
use budget_core::{monthly_history, Category, MonthlyHistory, SpendingSummary};
use chrono::NaiveDate;
use clap::Args;
use serde::Serialize;

use crate::commands::history;
use crate::config::Config;

#[derive(Args)]
pub struct SummaryArgs {
    /// History file (JSON)
    #[arg(long)]
    history: PathBuf,

    /// User id within the history file
    #[arg(long)]
    uid: String,

    /// First day of the window (YYYY-MM-DD); without a window the latest month is summarized
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last day of the window (YYYY-MM-DD)
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Print JSON instead of tables
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct SummaryOutput {
    summary: SpendingSummary,
    months: Vec<MonthlyHistory>,
}

pub async fn run(args: SummaryArgs, _config: &Config) -> Result<()> {
    let store = history::load_store(&args.history)?;
    let (profile, transactions) = history::fetch(&store, &args.uid, args.start, args.end)?;

    let output = SummaryOutput {
        summary: history::summarize(
            &profile,
            &transactions,
            args.start.is_some() || args.end.is_some(),
        )?,
        months: monthly_history(profile.monthly_income, &transactions),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let summary = &output.summary;
    println!("Spending Summary: {}", args.uid);
    println!("========================================\n");
    println!("Monthly income: {:.2}", summary.monthly_income);
    println!("Total spent:    {:.2}", summary.total_spent);
    println!("Savings rate:   {:.1}%\n", summary.savings_rate * 100.0);

    println!("{:<16} {:>12}", "CATEGORY", "SPENT");
    println!("{}", "-".repeat(29));
    for category in &Category::ALL[1..] {
        println!("{:<16} {:>12.2}", category.to_string(), summary.spent_on(*category));
    }

    if !output.months.is_empty() {
        println!("\n{:<10} {:>12} {:>12} {:>8}", "MONTH", "SPENT", "SAVED", "RATE");
        println!("{}", "-".repeat(45));
        for month in &output.months {
            println!(
                "{:<10} {:>12.2} {:>12.2} {:>7.1}%",
                month.month,
                month.spent,
                month.savings,
                month.savings_rate * 100.0
            );
        }
    }

    Ok(())
}
