//! JSON history input shared by `summary` and `recommend`
//!
//! File layout:
//!
//! ```json
//! {
//!   "users": [
//!     {
//!       "uid": "u1",
//!       "profile": { "monthlyIncome": 50000, "riskPreference": "moderate" },
//!       "transactions": [
//!         { "amount": 1200.0, "category": "food", "date": "2026-01-04" }
//!       ]
//!     }
//!   ]
//! }
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use budget_core::{
    latest_month, AllocationVector, BudgetError, InMemoryStore, ProfileSource, SpendingSummary,
    Transaction, TransactionSource, UserProfile,
};
use chrono::NaiveDate;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct HistoryFile {
    users: Vec<UserRecord>,
}

#[derive(Debug, Deserialize)]
struct UserRecord {
    uid: String,
    profile: UserProfile,
    #[serde(default)]
    transactions: Vec<Transaction>,
}

/// Read a history file into an in-memory store
pub fn load_store(path: &Path) -> Result<InMemoryStore> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open history file {}", path.display()))?;
    let parsed: HistoryFile = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse history file {}", path.display()))?;

    let mut store = InMemoryStore::new();
    for record in parsed.users {
        store.insert_user(record.uid.clone(), record.profile);
        store.extend_transactions(record.uid, record.transactions);
    }
    Ok(store)
}

/// Profile and transactions for one user within an optional date window
pub fn fetch<S>(
    store: &S,
    uid: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<(UserProfile, Vec<Transaction>)>
where
    S: ProfileSource + TransactionSource,
{
    let profile = store
        .get_user(uid)?
        .ok_or_else(|| BudgetError::NotFound(format!("user {uid}")))?;
    let transactions = store.get_transactions(
        uid,
        start.unwrap_or(NaiveDate::MIN),
        end.unwrap_or(NaiveDate::MAX),
    )?;
    Ok((profile, transactions))
}

/// Spending summary for one month of income. Without an explicit window
/// only the latest calendar month of `transactions` is aggregated.
pub fn summarize(
    profile: &UserProfile,
    transactions: &[Transaction],
    windowed: bool,
) -> Result<SpendingSummary> {
    let summary = if windowed {
        SpendingSummary::from_transactions(profile.monthly_income, transactions)?
    } else {
        SpendingSummary::from_transactions(profile.monthly_income, &latest_month(transactions))?
    };
    Ok(summary)
}

/// Starting allocation observed in the user's latest month
pub fn baseline(profile: &UserProfile, transactions: &[Transaction]) -> Result<AllocationVector> {
    Ok(summarize(profile, transactions, false)?.baseline_allocation()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "users": [
            {
                "uid": "u1",
                "profile": { "monthlyIncome": 50000, "riskPreference": "moderate" },
                "transactions": [
                    { "amount": 15000.0, "category": "rent", "date": "2026-01-01" },
                    { "amount": 5000.0, "category": "food", "date": "2026-01-09" },
                    { "amount": 4000.0, "category": "food", "date": "2026-02-03" }
                ]
            },
            {
                "uid": "u2",
                "profile": { "monthlyIncome": 20000, "riskPreference": "aggressive" }
            }
        ]
    }"#;

    fn write_sample(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("history.json");
        std::fs::write(&path, SAMPLE).unwrap();
        path
    }

    #[test]
    fn test_load_and_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let store = load_store(&write_sample(dir.path())).unwrap();

        let (profile, txns) = fetch(&store, "u1", None, None).unwrap();
        assert_eq!(profile.monthly_income, 50000.0);
        assert_eq!(txns.len(), 3);

        let (_, january) = fetch(
            &store,
            "u1",
            NaiveDate::from_ymd_opt(2026, 1, 1),
            NaiveDate::from_ymd_opt(2026, 1, 31),
        )
        .unwrap();
        assert_eq!(january.len(), 2);

        let (_, none) = fetch(&store, "u2", None, None).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_unwindowed_summary_uses_latest_month() {
        let dir = tempfile::tempdir().unwrap();
        let store = load_store(&write_sample(dir.path())).unwrap();
        let (profile, txns) = fetch(&store, "u1", None, None).unwrap();

        let latest = summarize(&profile, &txns, false).unwrap();
        assert_eq!(latest.total_spent, 4000.0);
        assert!((latest.savings_rate - 0.92).abs() < 1e-12);

        let whole = summarize(&profile, &txns, true).unwrap();
        assert_eq!(whole.total_spent, 24000.0);

        let alloc = baseline(&profile, &txns).unwrap();
        assert!((alloc.savings() - 0.92).abs() < 1e-12);
        assert!((alloc.get(budget_core::Category::Food) - 0.08).abs() < 1e-12);
        assert_eq!(alloc.get(budget_core::Category::Rent), 0.0);
    }

    #[test]
    fn test_unknown_user() {
        let dir = tempfile::tempdir().unwrap();
        let store = load_store(&write_sample(dir.path())).unwrap();
        let err = fetch(&store, "nobody", None, None).unwrap_err();
        assert!(err.to_string().contains("nobody"));
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{\"users\": 3}").unwrap();
        assert!(load_store(&path).is_err());
    }
}
