//! Observation and reward types for RL

use serde::{Deserialize, Serialize};

use budget_core::{AllocationVector, Category, UserProfile};

/// Reward value from environment
pub type Reward = f64;

/// Number of features the agent observes
pub const OBSERVATION_SIZE: usize = 10;

/// Simulated periods per episode
pub const EPISODE_LENGTH: usize = 12;

/// Normalized snapshot the agent sees each period. Every entry is in [0, 1].
///
/// Layout: savings fraction, income marker (always 1.0), rent, food,
/// transport, shopping, entertainment, other, risk scalar, episode progress.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation([f64; OBSERVATION_SIZE]);

impl Observation {
    pub const INCOME_MARKER: usize = 1;
    pub const RISK: usize = 8;
    pub const PROGRESS: usize = 9;

    /// Derive the observation from the current allocation, profile and step
    pub fn from_parts(
        allocation: &AllocationVector,
        profile: &UserProfile,
        step: usize,
        episode_length: usize,
    ) -> Self {
        let mut features = [0.0; OBSERVATION_SIZE];
        features[0] = allocation.savings();
        features[Self::INCOME_MARKER] = 1.0;
        for category in &Category::ALL[1..] {
            // Spending categories occupy slots 2..8 in allocation order
            features[category.index() + 1] = allocation.get(*category);
        }
        features[Self::RISK] = profile.risk_scalar();
        features[Self::PROGRESS] = if episode_length == 0 {
            0.0
        } else {
            step as f64 / episode_length as f64
        };
        Self(features)
    }

    pub fn savings(&self) -> f64 {
        self.0[0]
    }

    pub fn progress(&self) -> f64 {
        self.0[Self::PROGRESS]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Convert to feature vector for the network
    pub fn to_features(&self) -> Vec<f64> {
        self.0.to_vec()
    }
}
