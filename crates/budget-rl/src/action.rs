//! Discrete reallocation moves and their allocation transforms

use serde::{Deserialize, Serialize};

use budget_core::allocation::CATEGORY_COUNT;
use budget_core::Category;

/// Number of discrete actions
pub const ACTION_COUNT: usize = 9;

/// Share of a category moved by the 5% actions
const TRIM_RATE: f64 = 0.05;

/// Share of each variable category moved by the balance action
const BALANCE_RATE: f64 = 0.02;

/// Savings must exceed this before any of it is released to spending
const RELEASE_FLOOR: f64 = 0.05;

/// In-place transform over raw allocation fractions
pub type AllocationTransform = fn(&mut [f64; CATEGORY_COUNT]);

/// A reallocation move the agent can take each period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetAction {
    /// Leave the allocation unchanged
    Hold,
    TrimFood,
    TrimTransport,
    TrimShopping,
    TrimEntertainment,
    TrimOther,
    /// Move 5% of every variable category into savings
    AggressiveSave,
    /// Release 5% of savings into shopping and entertainment
    LoosenDiscretionary,
    /// Move 2% of every variable category into savings
    Balance,
}

fn move_to_savings(alloc: &mut [f64; CATEGORY_COUNT], category: Category, rate: f64) {
    let amount = alloc[category.index()] * rate;
    alloc[category.index()] -= amount;
    alloc[Category::Savings.index()] += amount;
}

fn hold(_alloc: &mut [f64; CATEGORY_COUNT]) {}

fn trim_food(alloc: &mut [f64; CATEGORY_COUNT]) {
    move_to_savings(alloc, Category::Food, TRIM_RATE);
}

fn trim_transport(alloc: &mut [f64; CATEGORY_COUNT]) {
    move_to_savings(alloc, Category::Transport, TRIM_RATE);
}

fn trim_shopping(alloc: &mut [f64; CATEGORY_COUNT]) {
    move_to_savings(alloc, Category::Shopping, TRIM_RATE);
}

fn trim_entertainment(alloc: &mut [f64; CATEGORY_COUNT]) {
    move_to_savings(alloc, Category::Entertainment, TRIM_RATE);
}

fn trim_other(alloc: &mut [f64; CATEGORY_COUNT]) {
    move_to_savings(alloc, Category::Other, TRIM_RATE);
}

fn aggressive_save(alloc: &mut [f64; CATEGORY_COUNT]) {
    for category in Category::VARIABLE {
        move_to_savings(alloc, category, TRIM_RATE);
    }
}

fn loosen_discretionary(alloc: &mut [f64; CATEGORY_COUNT]) {
    let savings = Category::Savings.index();
    if alloc[savings] > RELEASE_FLOOR {
        let amount = alloc[savings] * TRIM_RATE;
        alloc[savings] -= amount;
        alloc[Category::Shopping.index()] += amount / 2.0;
        alloc[Category::Entertainment.index()] += amount / 2.0;
    }
}

fn balance(alloc: &mut [f64; CATEGORY_COUNT]) {
    for category in Category::VARIABLE {
        move_to_savings(alloc, category, BALANCE_RATE);
    }
}

/// Indexed by `BudgetAction::index()`
const TRANSFORMS: [AllocationTransform; ACTION_COUNT] = [
    hold,
    trim_food,
    trim_transport,
    trim_shopping,
    trim_entertainment,
    trim_other,
    aggressive_save,
    loosen_discretionary,
    balance,
];

impl BudgetAction {
    pub const ALL: [BudgetAction; ACTION_COUNT] = [
        BudgetAction::Hold,
        BudgetAction::TrimFood,
        BudgetAction::TrimTransport,
        BudgetAction::TrimShopping,
        BudgetAction::TrimEntertainment,
        BudgetAction::TrimOther,
        BudgetAction::AggressiveSave,
        BudgetAction::LoosenDiscretionary,
        BudgetAction::Balance,
    ];

    /// Convert action to index for discrete action spaces
    pub fn index(self) -> usize {
        self as usize
    }

    /// Create action from index
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Number of discrete actions
    pub fn action_space_size() -> usize {
        ACTION_COUNT
    }

    pub fn transform(self) -> AllocationTransform {
        TRANSFORMS[self.index()]
    }

    /// Apply this action's transform to raw fractions (no renormalization)
    pub fn apply(self, alloc: &mut [f64; CATEGORY_COUNT]) {
        (self.transform())(alloc);
    }

    /// Human readable explanation for recommendations
    pub fn description(self) -> &'static str {
        match self {
            BudgetAction::Hold => "Keep the current allocation",
            BudgetAction::TrimFood => "Move 5% of food spending into savings",
            BudgetAction::TrimTransport => "Move 5% of transport spending into savings",
            BudgetAction::TrimShopping => "Move 5% of shopping spending into savings",
            BudgetAction::TrimEntertainment => "Move 5% of entertainment spending into savings",
            BudgetAction::TrimOther => "Move 5% of other spending into savings",
            BudgetAction::AggressiveSave => "Move 5% of every variable category into savings",
            BudgetAction::LoosenDiscretionary => {
                "Release 5% of savings into shopping and entertainment"
            }
            BudgetAction::Balance => "Move 2% of every variable category into savings",
        }
    }
}

impl std::fmt::Display for BudgetAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BudgetAction::Hold => "hold",
            BudgetAction::TrimFood => "trim_food",
            BudgetAction::TrimTransport => "trim_transport",
            BudgetAction::TrimShopping => "trim_shopping",
            BudgetAction::TrimEntertainment => "trim_entertainment",
            BudgetAction::TrimOther => "trim_other",
            BudgetAction::AggressiveSave => "aggressive_save",
            BudgetAction::LoosenDiscretionary => "loosen_discretionary",
            BudgetAction::Balance => "balance",
        };
        write!(f, "{name}")
    }
}
