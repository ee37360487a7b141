//! Budget RL - Reinforcement learning for household budget reallocation
//!
//! This crate provides the budget allocation environment, a DQN agent with
//! experience replay and a target network, and the episodic training loop
//! that couples them.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::float_cmp)]
#![allow(clippy::similar_names)]

pub mod action;
pub mod agent;
pub mod checkpoint;
pub mod env;
pub mod experience;
pub mod network;
pub mod recommend;
pub mod state;
pub mod trainer;

pub use action::{BudgetAction, ACTION_COUNT};
pub use agent::{AgentConfig, DqnAgent};
pub use checkpoint::Checkpoint;
pub use env::{BudgetEnvironment, EnvironmentWarning, StepResult};
pub use experience::{ReplayBuffer, Transition};
pub use network::{AdamOptimizer, QNetwork};
pub use recommend::{Recommendation, Recommender};
pub use state::{Observation, Reward, EPISODE_LENGTH, OBSERVATION_SIZE};
pub use trainer::{EpisodeOutcome, TrainingConfig, TrainingLoop, TrainingReport};
