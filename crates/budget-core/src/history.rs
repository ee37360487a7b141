//! Spending history aggregation and upstream data sources
//!
//! The RL core never talks to storage. Callers fetch a profile and a
//! window of transactions through [`ProfileSource`] / [`TransactionSource`]
//! and hand the aggregates below to the engine.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::allocation::{AllocationVector, Category, CATEGORY_COUNT};
use crate::error::{BudgetError, Result};
use crate::profile::UserProfile;

/// A single spending record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub amount: f64,
    pub category: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Transaction {
    pub fn new(amount: f64, category: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            amount,
            category: category.into(),
            date,
            description: None,
        }
    }

    pub fn category(&self) -> Category {
        Category::from_label(&self.category)
    }
}

/// Looks up a user's profile
pub trait ProfileSource {
    fn get_user(&self, uid: &str) -> Result<Option<UserProfile>>;
}

/// Fetches a user's transactions dated within `[start, end]`
pub trait TransactionSource {
    fn get_transactions(
        &self,
        uid: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Transaction>>;
}

/// Spending aggregated over a window against one month of income
#[derive(Debug, Clone, Serialize)]
pub struct SpendingSummary {
    pub monthly_income: f64,
    pub total_spent: f64,
    /// Fraction of income left over; negative when overspent
    pub savings_rate: f64,
    pub by_category: BTreeMap<Category, f64>,
}

impl SpendingSummary {
    pub fn from_transactions(monthly_income: f64, transactions: &[Transaction]) -> Result<Self> {
        if !monthly_income.is_finite() || monthly_income <= 0.0 {
            return Err(BudgetError::Config(format!(
                "monthly income must be a positive number, got {monthly_income}"
            )));
        }

        let mut by_category = BTreeMap::new();
        let mut total_spent = 0.0;
        for txn in transactions {
            *by_category.entry(txn.category()).or_insert(0.0) += txn.amount;
            total_spent += txn.amount;
        }

        debug!(
            transactions = transactions.len(),
            total_spent, "Aggregated spending summary"
        );

        Ok(Self {
            monthly_income,
            total_spent,
            savings_rate: (monthly_income - total_spent) / monthly_income,
            by_category,
        })
    }

    pub fn spent_on(&self, category: Category) -> f64 {
        self.by_category.get(&category).copied().unwrap_or(0.0)
    }

    /// Observed split of income, usable as a starting allocation.
    /// Savings is whatever income was not spent, floored at zero.
    pub fn baseline_allocation(&self) -> Result<AllocationVector> {
        let mut raw = [0.0; CATEGORY_COUNT];
        raw[Category::Savings.index()] = (self.monthly_income - self.total_spent).max(0.0);
        for category in &Category::ALL[1..] {
            raw[category.index()] = self.spent_on(*category).max(0.0);
        }
        AllocationVector::renormalize(raw).map_err(|e| BudgetError::Allocation(e.to_string()))
    }
}

/// One calendar month of spending
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyHistory {
    /// `YYYY-MM`
    pub month: String,
    pub spent: f64,
    pub income: f64,
    pub savings: f64,
    pub savings_rate: f64,
}

/// Group transactions by calendar month, oldest first. Income is taken
/// from the current profile for every month.
pub fn monthly_history(monthly_income: f64, transactions: &[Transaction]) -> Vec<MonthlyHistory> {
    let mut spent_by_month: BTreeMap<String, f64> = BTreeMap::new();
    for txn in transactions {
        *spent_by_month
            .entry(txn.date.format("%Y-%m").to_string())
            .or_insert(0.0) += txn.amount;
    }

    spent_by_month
        .into_iter()
        .map(|(month, spent)| {
            let savings = (monthly_income - spent).max(0.0);
            let savings_rate = if monthly_income > 0.0 {
                savings / monthly_income
            } else {
                0.0
            };
            MonthlyHistory {
                month,
                spent,
                income: monthly_income,
                savings,
                savings_rate,
            }
        })
        .collect()
}

/// Transactions from the most recent calendar month present, in input order.
/// A [`SpendingSummary`] compares spending against one month of income, so
/// baselines over longer histories are built from this slice.
pub fn latest_month(transactions: &[Transaction]) -> Vec<Transaction> {
    let Some(latest) = transactions.iter().map(|t| (t.date.year(), t.date.month())).max() else {
        return Vec::new();
    };
    transactions
        .iter()
        .filter(|t| (t.date.year(), t.date.month()) == latest)
        .cloned()
        .collect()
}

/// In-process store backing both source traits
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    profiles: HashMap<String, UserProfile>,
    transactions: HashMap<String, Vec<Transaction>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&mut self, uid: impl Into<String>, profile: UserProfile) {
        self.profiles.insert(uid.into(), profile);
    }

    pub fn add_transaction(&mut self, uid: impl Into<String>, transaction: Transaction) {
        self.transactions
            .entry(uid.into())
            .or_default()
            .push(transaction);
    }

    pub fn extend_transactions(
        &mut self,
        uid: impl Into<String>,
        transactions: impl IntoIterator<Item = Transaction>,
    ) {
        self.transactions
            .entry(uid.into())
            .or_default()
            .extend(transactions);
    }
}

impl ProfileSource for InMemoryStore {
    fn get_user(&self, uid: &str) -> Result<Option<UserProfile>> {
        Ok(self.profiles.get(uid).copied())
    }
}

impl TransactionSource for InMemoryStore {
    fn get_transactions(
        &self,
        uid: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Transaction>> {
        if start > end {
            return Err(BudgetError::Config(format!(
                "transaction window start {start} is after end {end}"
            )));
        }
        Ok(self
            .transactions
            .get(uid)
            .map(|txns| {
                txns.iter()
                    .filter(|t| t.date >= start && t.date <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::RiskPreference;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_transactions() -> Vec<Transaction> {
        vec![
            Transaction::new(15000.0, "rent", date(2026, 1, 1)),
            Transaction::new(5000.0, "food", date(2026, 1, 10)),
            Transaction::new(2500.0, "shopping", date(2026, 1, 15)),
            Transaction::new(2500.0, "gym", date(2026, 1, 20)),
            Transaction::new(15000.0, "rent", date(2026, 2, 1)),
            Transaction::new(10000.0, "entertainment", date(2026, 2, 14)),
        ]
    }

    #[test]
    fn test_summary_totals() {
        let txns: Vec<_> = sample_transactions()
            .into_iter()
            .filter(|t| t.date < date(2026, 2, 1))
            .collect();
        let summary = SpendingSummary::from_transactions(50000.0, &txns).unwrap();

        assert_eq!(summary.total_spent, 25000.0);
        assert_eq!(summary.savings_rate, 0.5);
        assert_eq!(summary.spent_on(Category::Rent), 15000.0);
        assert_eq!(summary.spent_on(Category::Other), 2500.0);
        assert_eq!(summary.spent_on(Category::Transport), 0.0);
    }

    #[test]
    fn test_summary_rejects_bad_income() {
        assert!(SpendingSummary::from_transactions(0.0, &[]).is_err());
    }

    #[test]
    fn test_baseline_allocation() {
        let txns = vec![
            Transaction::new(30.0, "rent", date(2026, 3, 1)),
            Transaction::new(20.0, "food", date(2026, 3, 2)),
        ];
        let summary = SpendingSummary::from_transactions(100.0, &txns).unwrap();
        let alloc = summary.baseline_allocation().unwrap();

        assert!((alloc.savings() - 0.5).abs() < 1e-12);
        assert!((alloc.get(Category::Rent) - 0.3).abs() < 1e-12);
        assert!((alloc.get(Category::Food) - 0.2).abs() < 1e-12);
        assert!((alloc.total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_baseline_allocation_overspent_has_zero_savings() {
        let txns = vec![Transaction::new(150.0, "shopping", date(2026, 3, 1))];
        let summary = SpendingSummary::from_transactions(100.0, &txns).unwrap();
        assert!(summary.savings_rate < 0.0);

        let alloc = summary.baseline_allocation().unwrap();
        assert_eq!(alloc.savings(), 0.0);
        assert_eq!(alloc.get(Category::Shopping), 1.0);
    }

    #[test]
    fn test_monthly_history() {
        let history = monthly_history(50000.0, &sample_transactions());

        assert_eq!(history.len(), 2);
        assert_eq!(history[0].month, "2026-01");
        assert_eq!(history[0].spent, 25000.0);
        assert_eq!(history[0].savings_rate, 0.5);
        assert_eq!(history[1].month, "2026-02");
        assert_eq!(history[1].savings, 25000.0);
    }

    #[test]
    fn test_latest_month_selects_newest_bucket() {
        let mut txns = sample_transactions();
        txns.push(Transaction::new(800.0, "food", date(2025, 12, 30)));

        let latest = latest_month(&txns);
        assert_eq!(latest.len(), 2);
        assert!(latest.iter().all(|t| t.date.month() == 2 && t.date.year() == 2026));

        assert!(latest_month(&[]).is_empty());
    }

    #[test]
    fn test_in_memory_store_window() {
        let mut store = InMemoryStore::new();
        store.insert_user(
            "u1",
            UserProfile::new(50000.0, RiskPreference::Moderate).unwrap(),
        );
        store.extend_transactions("u1", sample_transactions());

        let january = store
            .get_transactions("u1", date(2026, 1, 1), date(2026, 1, 31))
            .unwrap();
        assert_eq!(january.len(), 4);

        assert!(store
            .get_transactions("nobody", date(2026, 1, 1), date(2026, 12, 31))
            .unwrap()
            .is_empty());
        assert!(store
            .get_transactions("u1", date(2026, 2, 1), date(2026, 1, 1))
            .is_err());

        assert!(store.get_user("u1").unwrap().is_some());
        assert!(store.get_user("u2").unwrap().is_none());
    }

    #[test]
    fn test_transaction_deserialize() {
        let json = r#"{"amount": 120.5, "category": "Food", "date": "2026-04-03"}"#;
        let txn: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(txn.category(), Category::Food);
        assert_eq!(txn.date, date(2026, 4, 3));
        assert!(txn.description.is_none());
    }
}
