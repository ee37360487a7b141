//! Budget reallocation environment
//!
//! A deterministic MDP over a 7-way allocation vector. The only randomness
//! in training comes from the agent; given a state and an action, `step`
//! always produces the same next state and reward.

use serde::Serialize;
use tracing::warn;

use budget_core::allocation::CATEGORY_COUNT;
use budget_core::{AllocationVector, Category, Result, UserProfile};

use crate::action::BudgetAction;
use crate::state::{Observation, Reward, EPISODE_LENGTH};

/// Savings below this fraction incur `LOW_SAVINGS_PENALTY`
pub const MIN_SAVINGS_FRACTION: f64 = 0.05;

/// Food below this fraction incurs `AUSTERITY_PENALTY`
pub const MIN_FOOD_FRACTION: f64 = 0.05;

pub const SAVINGS_REWARD_SCALE: f64 = 100.0;
pub const LOW_SAVINGS_PENALTY: f64 = 50.0;
pub const AUSTERITY_PENALTY: f64 = 20.0;

/// Recoverable conditions reported alongside a step
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EnvironmentWarning {
    /// The allocation total collapsed before renormalization and was reset
    /// to the canonical split
    DegenerateAllocation { total: f64 },
}

/// Outcome of a single environment step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepResult {
    pub observation: Observation,
    pub reward: Reward,
    /// Episode reached its final period
    pub done: bool,
    pub warning: Option<EnvironmentWarning>,
}

/// Budget allocation MDP for one user profile
#[derive(Debug, Clone)]
pub struct BudgetEnvironment {
    profile: UserProfile,
    allocation: AllocationVector,
    current_step: usize,
    max_steps: usize,
}

impl BudgetEnvironment {
    /// Build an environment, failing with a configuration error on an
    /// invalid profile
    pub fn new(profile: UserProfile) -> Result<Self> {
        profile.validate()?;
        Ok(Self {
            profile,
            allocation: AllocationVector::canonical(),
            current_step: 0,
            max_steps: EPISODE_LENGTH,
        })
    }

    /// Start a new episode from the canonical split
    pub fn reset(&mut self) -> Observation {
        self.reset_to(AllocationVector::canonical())
    }

    /// Start a new episode from a caller-supplied allocation, e.g. one
    /// derived from spending history
    pub fn reset_to(&mut self, allocation: AllocationVector) -> Observation {
        self.allocation = allocation;
        self.current_step = 0;
        self.observation()
    }

    /// Apply an action, renormalize, score, and advance one period
    pub fn step(&mut self, action: BudgetAction) -> StepResult {
        let previous_savings = self.allocation.savings();

        let mut raw = self.allocation.to_raw();
        action.apply(&mut raw);

        let (allocation, warning) = settle(raw);
        if let Some(EnvironmentWarning::DegenerateAllocation { total }) = warning {
            warn!(
                total,
                action = %action,
                step = self.current_step,
                "Allocation collapsed before renormalization, reset to canonical split"
            );
        }
        self.allocation = allocation;

        let reward = reward(previous_savings, &self.allocation);
        self.current_step += 1;

        StepResult {
            observation: self.observation(),
            reward,
            done: self.is_done(),
            warning,
        }
    }

    pub fn observation(&self) -> Observation {
        Observation::from_parts(
            &self.allocation,
            &self.profile,
            self.current_step,
            self.max_steps,
        )
    }

    /// Terminal exactly when the step counter reaches the episode length
    pub fn is_done(&self) -> bool {
        self.current_step >= self.max_steps
    }

    pub fn allocation(&self) -> &AllocationVector {
        &self.allocation
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }
}

/// Renormalize raw fractions, falling back to the canonical split when the
/// total has collapsed
pub fn settle(
    raw: [f64; CATEGORY_COUNT],
) -> (AllocationVector, Option<EnvironmentWarning>) {
    match AllocationVector::renormalize(raw) {
        Ok(allocation) => (allocation, None),
        Err(degenerate) => (
            AllocationVector::canonical(),
            Some(EnvironmentWarning::DegenerateAllocation {
                total: degenerate.total,
            }),
        ),
    }
}

/// Reward for moving from `previous_savings` to `allocation`
pub fn reward(previous_savings: f64, allocation: &AllocationVector) -> Reward {
    let new_savings = allocation.savings();
    let mut reward = (new_savings - previous_savings) * SAVINGS_REWARD_SCALE;

    if new_savings < MIN_SAVINGS_FRACTION {
        reward -= LOW_SAVINGS_PENALTY;
    }
    if allocation.get(Category::Food) < MIN_FOOD_FRACTION {
        reward -= AUSTERITY_PENALTY;
    }

    reward
}
