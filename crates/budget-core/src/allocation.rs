//! Budget allocation vector over savings and spending categories

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{BudgetError, Result};

/// Number of allocation slots (savings plus six spending categories)
pub const CATEGORY_COUNT: usize = 7;

/// Totals below this are treated as collapsed
pub const DEGENERATE_TOTAL: f64 = 1e-9;

/// Totals this close to 1.0 are left untouched by renormalization
pub const NORMALIZATION_TOLERANCE: f64 = 1e-12;

/// Allowed drift from 1.0 when accepting an externally supplied vector
pub const SUM_TOLERANCE: f64 = 1e-6;

const CANONICAL_SPLIT: [f64; CATEGORY_COUNT] = [0.20, 0.30, 0.15, 0.10, 0.10, 0.10, 0.05];

/// Allocation categories, in vector order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Savings,
    Rent,
    Food,
    Transport,
    Shopping,
    Entertainment,
    Other,
}

impl Category {
    pub const ALL: [Category; CATEGORY_COUNT] = [
        Category::Savings,
        Category::Rent,
        Category::Food,
        Category::Transport,
        Category::Shopping,
        Category::Entertainment,
        Category::Other,
    ];

    /// Categories the user can cut back on month to month
    pub const VARIABLE: [Category; 5] = [
        Category::Food,
        Category::Transport,
        Category::Shopping,
        Category::Entertainment,
        Category::Other,
    ];

    pub fn index(self) -> usize {
        match self {
            Category::Savings => 0,
            Category::Rent => 1,
            Category::Food => 2,
            Category::Transport => 3,
            Category::Shopping => 4,
            Category::Entertainment => 5,
            Category::Other => 6,
        }
    }

    /// Map a free-form transaction label onto a spending category.
    /// Unknown labels land in `Other`; savings is never a spending label.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "rent" | "housing" => Category::Rent,
            "food" | "groceries" | "dining" => Category::Food,
            "transport" | "transportation" | "travel" => Category::Transport,
            "shopping" => Category::Shopping,
            "entertainment" => Category::Entertainment,
            _ => Category::Other,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Category::Savings => "savings",
            Category::Rent => "rent",
            Category::Food => "food",
            Category::Transport => "transport",
            Category::Shopping => "shopping",
            Category::Entertainment => "entertainment",
            Category::Other => "other",
        };
        write!(f, "{name}")
    }
}

/// Raised when a raw allocation cannot be rescaled to sum to one
#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[error("allocation total collapsed to {total}, cannot renormalize")]
pub struct DegenerateAllocation {
    pub total: f64,
}

/// Fractions of monthly income per category. Always sums to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 7]", into = "[f64; 7]")]
pub struct AllocationVector([f64; CATEGORY_COUNT]);

impl AllocationVector {
    /// 20% savings, 30% rent, 15% food, 10% transport, 10% shopping,
    /// 10% entertainment, 5% other
    pub fn canonical() -> Self {
        Self(CANONICAL_SPLIT)
    }

    /// Accept an already-normalized vector, rejecting negative entries or
    /// a total off by more than `SUM_TOLERANCE`
    pub fn from_fractions(fractions: [f64; CATEGORY_COUNT]) -> Result<Self> {
        if fractions.iter().any(|f| !f.is_finite() || *f < 0.0) {
            return Err(BudgetError::Allocation(format!(
                "fractions must be finite and non-negative: {fractions:?}"
            )));
        }
        let total: f64 = fractions.iter().sum();
        if (total - 1.0).abs() > SUM_TOLERANCE {
            return Err(BudgetError::Allocation(format!(
                "fractions must sum to 1.0, got {total}"
            )));
        }
        Ok(Self(fractions))
    }

    /// Rescale raw, non-negative weights so they sum to one
    pub fn renormalize(
        raw: [f64; CATEGORY_COUNT],
    ) -> std::result::Result<Self, DegenerateAllocation> {
        let total: f64 = raw.iter().sum();
        if !total.is_finite() || total < DEGENERATE_TOTAL {
            return Err(DegenerateAllocation { total });
        }
        if (total - 1.0).abs() <= NORMALIZATION_TOLERANCE {
            return Ok(Self(raw));
        }
        let mut scaled = raw;
        for value in &mut scaled {
            *value /= total;
        }
        Ok(Self(scaled))
    }

    pub fn get(&self, category: Category) -> f64 {
        self.0[category.index()]
    }

    pub fn savings(&self) -> f64 {
        self.get(Category::Savings)
    }

    pub fn as_array(&self) -> &[f64; CATEGORY_COUNT] {
        &self.0
    }

    /// Copy of the fractions for in-place transforms
    pub fn to_raw(&self) -> [f64; CATEGORY_COUNT] {
        self.0
    }

    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }
}

impl Default for AllocationVector {
    fn default() -> Self {
        Self::canonical()
    }
}

impl TryFrom<[f64; CATEGORY_COUNT]> for AllocationVector {
    type Error = BudgetError;

    fn try_from(value: [f64; CATEGORY_COUNT]) -> Result<Self> {
        Self::from_fractions(value)
    }
}

impl From<AllocationVector> for [f64; CATEGORY_COUNT] {
    fn from(value: AllocationVector) -> Self {
        value.0
    }
}
