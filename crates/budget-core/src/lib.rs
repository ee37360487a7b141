//! Budget Core - Domain types shared by the RL engine and the CLI
//!
//! This crate provides user profiles, allocation vectors, spending
//! history aggregation and the error type used across all budget crates.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

pub mod allocation;
pub mod error;
pub mod history;
pub mod profile;

pub use allocation::{AllocationVector, Category, DegenerateAllocation};
pub use error::{BudgetError, Result};
pub use history::{
    latest_month, monthly_history, InMemoryStore, MonthlyHistory, ProfileSource, SpendingSummary,
    Transaction, TransactionSource,
};
pub use profile::{RiskPreference, UserProfile};
