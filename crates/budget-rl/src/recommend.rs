//! Greedy inference over a trained policy network

use std::path::Path;

use rand::Rng;
use serde::Serialize;
use tracing::debug;

use budget_core::{AllocationVector, Result, UserProfile};

use crate::action::BudgetAction;
use crate::agent::DqnAgent;
use crate::checkpoint::Checkpoint;
use crate::env::BudgetEnvironment;
use crate::network::{argmax, QNetwork};
use crate::state::Observation;

/// Suggested next action for a profile
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub action: BudgetAction,
    pub description: &'static str,
    pub observation: Observation,
    pub q_values: Vec<f64>,
}

/// Read-only view of a trained policy. Never explores.
#[derive(Debug, Clone)]
pub struct Recommender {
    policy: QNetwork,
}

impl Recommender {
    /// Load the policy from a checkpoint. A missing or corrupt file is a
    /// `CheckpointLoad` error.
    pub fn from_checkpoint(path: &Path) -> Result<Self> {
        let checkpoint = Checkpoint::load(path)?;
        debug!(
            path = %path.display(),
            run_id = ?checkpoint.run_id,
            "Recommender loaded policy"
        );
        Ok(Self {
            policy: checkpoint.policy_parameters,
        })
    }

    /// Snapshot the policy of a live agent
    pub fn from_agent<R: Rng>(agent: &DqnAgent<R>) -> Self {
        Self {
            policy: agent.policy_network().clone(),
        }
    }

    /// Recommend from the canonical starting split
    pub fn recommend(&self, profile: &UserProfile) -> Result<Recommendation> {
        self.recommend_from(profile, AllocationVector::canonical())
    }

    /// Recommend from a supplied allocation, e.g. a baseline derived from
    /// spending history
    pub fn recommend_from(
        &self,
        profile: &UserProfile,
        allocation: AllocationVector,
    ) -> Result<Recommendation> {
        let mut env = BudgetEnvironment::new(*profile)?;
        let observation = env.reset_to(allocation);

        let q_values = self.policy.predict(observation.as_slice()).to_vec();
        let action = BudgetAction::from_index(argmax(&q_values)).unwrap_or(BudgetAction::Hold);

        Ok(Recommendation {
            action,
            description: action.description(),
            observation,
            q_values,
        })
    }
}
