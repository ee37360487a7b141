//! Episodic training loop
//!
//! Each episode resets the environment, then repeatedly selects an action,
//! steps, stores the transition and runs a learning update until the
//! episode ends. Target sync and checkpointing happen between episodes.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use budget_core::{BudgetError, Result, UserProfile};

use crate::agent::{AgentConfig, DqnAgent};
use crate::env::BudgetEnvironment;
use crate::experience::Transition;

/// Training run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Number of episodes in the run
    #[serde(default = "default_episodes")]
    pub episodes: usize,

    /// Sync the target network after every episode index divisible by this
    #[serde(default = "default_target_sync_interval")]
    pub target_sync_interval: usize,

    /// Emit a progress log every N episodes
    #[serde(default = "default_log_interval")]
    pub log_interval: usize,

    /// Where the final checkpoint is published
    #[serde(default = "default_checkpoint_path")]
    pub checkpoint_path: PathBuf,

    /// Also publish a checkpoint every N episodes. Must be a multiple of
    /// `target_sync_interval`.
    #[serde(default)]
    pub checkpoint_interval: Option<usize>,

    /// Seed for the agent's random source
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_episodes() -> usize {
    500
}
fn default_target_sync_interval() -> usize {
    10
}
fn default_log_interval() -> usize {
    50
}
fn default_checkpoint_path() -> PathBuf {
    PathBuf::from("models/dqn_model.json")
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            episodes: default_episodes(),
            target_sync_interval: default_target_sync_interval(),
            log_interval: default_log_interval(),
            checkpoint_path: default_checkpoint_path(),
            checkpoint_interval: None,
            seed: None,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.target_sync_interval == 0 || self.log_interval == 0 {
            return Err(BudgetError::Config(
                "target_sync_interval and log_interval must be non-zero".into(),
            ));
        }
        if let Some(interval) = self.checkpoint_interval {
            if interval == 0 || interval % self.target_sync_interval != 0 {
                return Err(BudgetError::Config(format!(
                    "checkpoint_interval ({interval}) must be a non-zero multiple of \
                     target_sync_interval ({})",
                    self.target_sync_interval
                )));
            }
        }
        Ok(())
    }
}

/// Result of a single episode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeOutcome {
    pub total_reward: f64,
    pub steps: usize,
    pub learn_updates: usize,
    pub warnings: usize,
}

/// Summary of a finished (or cancelled) run
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub run_id: Uuid,
    pub episodes_completed: usize,
    pub rewards_history: Vec<f64>,
    pub final_epsilon: f64,
    pub learn_steps: u64,
    pub cancelled: bool,
    pub checkpoint_path: PathBuf,
}

impl TrainingReport {
    /// Mean reward over the last `window` episodes
    pub fn mean_reward(&self, window: usize) -> Option<f64> {
        mean_tail(&self.rewards_history, window)
    }

    /// Trailing average at each episode
    pub fn moving_average(&self, window: usize) -> Vec<f64> {
        let window = window.max(1);
        (0..self.rewards_history.len())
            .map(|i| {
                let start = (i + 1).saturating_sub(window);
                let slice = &self.rewards_history[start..=i];
                slice.iter().sum::<f64>() / slice.len() as f64
            })
            .collect()
    }
}

fn mean_tail(values: &[f64], window: usize) -> Option<f64> {
    if values.is_empty() || window == 0 {
        return None;
    }
    let tail = &values[values.len().saturating_sub(window)..];
    Some(tail.iter().sum::<f64>() / tail.len() as f64)
}

/// Couples one environment with one agent for a configured number of episodes
pub struct TrainingLoop<R = StdRng> {
    env: BudgetEnvironment,
    agent: DqnAgent<R>,
    config: TrainingConfig,
    run_id: Uuid,
}

impl TrainingLoop<StdRng> {
    /// Build environment and agent from a profile and configuration
    pub fn new(
        profile: UserProfile,
        agent_config: AgentConfig,
        config: TrainingConfig,
    ) -> Result<Self> {
        let env = BudgetEnvironment::new(profile)?;
        let agent = DqnAgent::with_seed(agent_config, config.seed)?;
        Self::with_agent(env, agent, config)
    }
}

impl<R: Rng> TrainingLoop<R> {
    /// Use an existing agent, e.g. one restored from a checkpoint
    pub fn with_agent(
        env: BudgetEnvironment,
        agent: DqnAgent<R>,
        config: TrainingConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            env,
            agent,
            config,
            run_id: Uuid::new_v4(),
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn agent(&self) -> &DqnAgent<R> {
        &self.agent
    }

    pub fn into_agent(self) -> DqnAgent<R> {
        self.agent
    }

    /// Run the full episode budget
    pub fn run(&mut self) -> Result<TrainingReport> {
        self.run_with_cancel(&AtomicBool::new(false))
    }

    /// Run until the episode budget is spent or `cancel` is set. The flag
    /// is checked between episodes only; a checkpoint is published either way.
    pub fn run_with_cancel(&mut self, cancel: &AtomicBool) -> Result<TrainingReport> {
        let span = info_span!("training_run", run_id = %self.run_id);
        let _guard = span.enter();

        let profile = *self.env.profile();
        info!(
            episodes = self.config.episodes,
            income = profile.monthly_income,
            risk = %profile.risk_preference,
            "Starting training"
        );

        let mut rewards_history = Vec::with_capacity(self.config.episodes);
        let mut cancelled = false;

        for episode in 0..self.config.episodes {
            if cancel.load(Ordering::Relaxed) {
                warn!(episode, "Training cancelled between episodes");
                cancelled = true;
                break;
            }

            let outcome = self.run_episode()?;
            rewards_history.push(outcome.total_reward);

            if episode % self.config.target_sync_interval == 0 {
                self.agent.sync_target_network();
                debug!(episode, "Target network synced");
            }

            if (episode + 1) % self.config.log_interval == 0 {
                let avg = mean_tail(&rewards_history, self.config.log_interval).unwrap_or(0.0);
                info!(
                    episode = episode + 1,
                    total = self.config.episodes,
                    avg_reward = %format!("{avg:.2}"),
                    epsilon = %format!("{:.4}", self.agent.epsilon()),
                    "Training progress"
                );
            }

            if let Some(interval) = self.config.checkpoint_interval {
                // Lands on a sync episode, so the target already equals the policy
                if episode % interval == 0 {
                    self.agent
                        .checkpoint(Some(self.run_id))
                        .save(&self.config.checkpoint_path)?;
                    debug!(episode, "Periodic checkpoint published");
                }
            }
        }

        // Sync before saving so nothing is lost when the target is re-derived on load
        self.agent.sync_target_network();
        self.agent
            .checkpoint(Some(self.run_id))
            .save(&self.config.checkpoint_path)?;

        let report = TrainingReport {
            run_id: self.run_id,
            episodes_completed: rewards_history.len(),
            rewards_history,
            final_epsilon: self.agent.epsilon(),
            learn_steps: self.agent.learn_steps(),
            cancelled,
            checkpoint_path: self.config.checkpoint_path.clone(),
        };

        info!(
            episodes = report.episodes_completed,
            final_epsilon = report.final_epsilon,
            path = %report.checkpoint_path.display(),
            "Training complete, checkpoint saved"
        );

        Ok(report)
    }

    /// Play one episode, learning after every step. Fails if a learning
    /// update produces a non-finite loss.
    pub fn run_episode(&mut self) -> Result<EpisodeOutcome> {
        let mut state = self.env.reset();
        let mut outcome = EpisodeOutcome {
            total_reward: 0.0,
            steps: 0,
            learn_updates: 0,
            warnings: 0,
        };

        loop {
            let action = self.agent.select_action(&state, true);
            let result = self.env.step(action);

            self.agent.remember(Transition::new(
                state,
                action,
                result.reward,
                result.observation,
                result.done,
            ));
            if let Some(loss) = self.agent.learn() {
                if !loss.is_finite() {
                    return Err(BudgetError::Training(format!(
                        "loss diverged to {loss} after {} learning steps",
                        self.agent.learn_steps()
                    )));
                }
                outcome.learn_updates += 1;
            }

            state = result.observation;
            outcome.total_reward += result.reward;
            outcome.steps += 1;
            if result.warning.is_some() {
                outcome.warnings += 1;
            }

            if result.done {
                break;
            }
        }

        Ok(outcome)
    }
}
