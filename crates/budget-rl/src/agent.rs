//! DQN agent with experience replay and a target network

use std::path::Path;

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use budget_core::{BudgetError, Result};

use crate::action::{BudgetAction, ACTION_COUNT};
use crate::checkpoint::Checkpoint;
use crate::experience::{ReplayBuffer, Transition};
use crate::network::{argmax, AdamOptimizer, DenseLayer, QNetwork};
use crate::state::{Observation, OBSERVATION_SIZE};

/// Agent hyper-parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// Discount factor
    #[serde(default = "default_gamma")]
    pub gamma: f64,

    #[serde(default = "default_epsilon_start")]
    pub epsilon_start: f64,

    #[serde(default = "default_epsilon_min")]
    pub epsilon_min: f64,

    /// Multiplied into epsilon after every learning step
    #[serde(default = "default_epsilon_decay")]
    pub epsilon_decay: f64,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    #[serde(default = "default_hidden_sizes")]
    pub hidden_sizes: Vec<usize>,
}

fn default_learning_rate() -> f64 {
    1e-3
}
fn default_gamma() -> f64 {
    0.99
}
fn default_epsilon_start() -> f64 {
    1.0
}
fn default_epsilon_min() -> f64 {
    0.01
}
fn default_epsilon_decay() -> f64 {
    0.995
}
fn default_batch_size() -> usize {
    64
}
fn default_buffer_capacity() -> usize {
    10_000
}
fn default_hidden_sizes() -> Vec<usize> {
    vec![128, 128]
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            learning_rate: default_learning_rate(),
            gamma: default_gamma(),
            epsilon_start: default_epsilon_start(),
            epsilon_min: default_epsilon_min(),
            epsilon_decay: default_epsilon_decay(),
            batch_size: default_batch_size(),
            buffer_capacity: default_buffer_capacity(),
            hidden_sizes: default_hidden_sizes(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(BudgetError::Config(msg));

        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return fail(format!("learning_rate must be positive, got {}", self.learning_rate));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return fail(format!("gamma must be within [0, 1], got {}", self.gamma));
        }
        if !(0.0..=1.0).contains(&self.epsilon_min)
            || !(self.epsilon_min..=1.0).contains(&self.epsilon_start)
        {
            return fail(format!(
                "expected 0 <= epsilon_min ({}) <= epsilon_start ({}) <= 1",
                self.epsilon_min, self.epsilon_start
            ));
        }
        if !(self.epsilon_decay > 0.0 && self.epsilon_decay <= 1.0) {
            return fail(format!(
                "epsilon_decay must be within (0, 1], got {}",
                self.epsilon_decay
            ));
        }
        if self.batch_size == 0 || self.buffer_capacity == 0 {
            return fail("batch_size and buffer_capacity must be non-zero".to_string());
        }
        if self.batch_size > self.buffer_capacity {
            return fail(format!(
                "batch_size ({}) exceeds buffer_capacity ({})",
                self.batch_size, self.buffer_capacity
            ));
        }
        if self.hidden_sizes.is_empty() || self.hidden_sizes.contains(&0) {
            return fail(format!(
                "hidden_sizes must list non-zero layer widths, got {:?}",
                self.hidden_sizes
            ));
        }
        Ok(())
    }
}

/// Value-based learner owning a policy/target network pair, its optimizer,
/// and the replay memory. Nothing outside the agent mutates them.
pub struct DqnAgent<R = StdRng> {
    config: AgentConfig,
    policy_net: QNetwork,
    target_net: QNetwork,
    optimizer: AdamOptimizer,
    memory: ReplayBuffer,
    epsilon: f64,
    learn_steps: u64,
    rng: R,
}

impl DqnAgent<StdRng> {
    /// Agent with a seeded generator, or one seeded from entropy
    pub fn with_seed(config: AgentConfig, seed: Option<u64>) -> Result<Self> {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::new(config, rng)
    }
}

impl<R: Rng> DqnAgent<R> {
    /// Create a fresh agent. `rng` drives initialisation, exploration and
    /// replay sampling.
    pub fn new(config: AgentConfig, mut rng: R) -> Result<Self> {
        config.validate()?;

        let policy_net = QNetwork::new(
            OBSERVATION_SIZE,
            &config.hidden_sizes,
            ACTION_COUNT,
            &mut rng,
        );
        let target_net = policy_net.clone();
        let optimizer = AdamOptimizer::new(&policy_net, config.learning_rate);

        debug!(
            hidden = ?config.hidden_sizes,
            batch_size = config.batch_size,
            capacity = config.buffer_capacity,
            "DQN agent initialized"
        );

        Ok(Self {
            memory: ReplayBuffer::new(config.buffer_capacity),
            epsilon: config.epsilon_start,
            learn_steps: 0,
            policy_net,
            target_net,
            optimizer,
            config,
            rng,
        })
    }

    /// Epsilon-greedy when `training`, greedy otherwise
    pub fn select_action(&mut self, state: &Observation, training: bool) -> BudgetAction {
        if training && self.rng.gen::<f64>() < self.epsilon {
            let idx = self.rng.gen_range(0..ACTION_COUNT);
            return BudgetAction::from_index(idx).unwrap_or(BudgetAction::Hold);
        }
        self.greedy_action(state)
    }

    /// Action with the highest predicted value under the policy network
    pub fn greedy_action(&self, state: &Observation) -> BudgetAction {
        let q_values = self.q_values(state);
        BudgetAction::from_index(argmax(&q_values)).unwrap_or(BudgetAction::Hold)
    }

    /// Policy network values for every action
    pub fn q_values(&self, state: &Observation) -> Vec<f64> {
        self.policy_net.predict(state.as_slice()).to_vec()
    }

    /// Target network values for every action
    pub fn target_q_values(&self, state: &Observation) -> Vec<f64> {
        self.target_net.predict(state.as_slice()).to_vec()
    }

    /// Store a transition in replay memory
    pub fn remember(&mut self, transition: Transition) {
        self.memory.remember(transition);
    }

    /// One temporal-difference update from a replay batch.
    ///
    /// Returns the batch loss, or `None` without touching any state when
    /// memory holds fewer than `batch_size` transitions.
    pub fn learn(&mut self) -> Option<f64> {
        let batch = self.memory.sample(self.config.batch_size, &mut self.rng)?;

        let states = stack(batch.iter().map(|t| &t.state));
        let next_states = stack(batch.iter().map(|t| &t.next_state));
        let actions: Vec<usize> = batch.iter().map(|t| t.action.index()).collect();

        let next_q = self.target_net.predict_batch(&next_states);
        let targets: Vec<f64> = batch
            .iter()
            .zip(next_q.rows())
            .map(|(t, row)| {
                let max_next = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let not_done = if t.done { 0.0 } else { 1.0 };
                t.reward + self.config.gamma * max_next * not_done
            })
            .collect();

        let (loss, gradients) = self.policy_net.mse_gradients(&states, &actions, &targets);
        self.optimizer.step(&mut self.policy_net, &gradients);

        self.learn_steps += 1;
        self.decay_epsilon();

        debug!(
            loss,
            epsilon = self.epsilon,
            step = self.learn_steps,
            "Learning step complete"
        );

        Some(loss)
    }

    fn decay_epsilon(&mut self) {
        if self.epsilon > self.config.epsilon_min {
            self.epsilon = (self.epsilon * self.config.epsilon_decay).max(self.config.epsilon_min);
        }
    }

    /// Copy the policy network into the target network
    pub fn sync_target_network(&mut self) {
        self.target_net.clone_from(&self.policy_net);
    }

    /// Snapshot of the policy parameters, optimizer state and epsilon
    pub fn checkpoint(&self, run_id: Option<Uuid>) -> Checkpoint {
        Checkpoint::new(
            self.policy_net.clone(),
            self.optimizer.clone(),
            self.epsilon,
            run_id,
        )
    }

    /// Replace learned state from a checkpoint. The target network is
    /// re-derived from the loaded policy network; a missing epsilon falls
    /// back to `epsilon_min`. The checkpoint's hidden layer widths must
    /// match `hidden_sizes`; the configured learning rate is kept.
    pub fn restore(&mut self, checkpoint: Checkpoint) -> Result<()> {
        checkpoint.validate()?;

        let layers = checkpoint.policy_parameters.layers();
        let hidden: Vec<usize> = layers[..layers.len() - 1]
            .iter()
            .map(DenseLayer::outputs)
            .collect();
        if hidden != self.config.hidden_sizes {
            return Err(BudgetError::CheckpointLoad(format!(
                "checkpoint hidden layers {hidden:?} do not match configured {:?}",
                self.config.hidden_sizes
            )));
        }

        let mut optimizer = checkpoint.optimizer_state;
        if optimizer.learning_rate != self.config.learning_rate {
            warn!(
                checkpoint = optimizer.learning_rate,
                configured = self.config.learning_rate,
                "Checkpoint learning rate differs from config, using configured rate"
            );
            optimizer.learning_rate = self.config.learning_rate;
        }

        self.epsilon = checkpoint.epsilon.unwrap_or(self.config.epsilon_min);
        self.policy_net = checkpoint.policy_parameters;
        self.optimizer = optimizer;
        self.sync_target_network();
        Ok(())
    }

    /// Atomically write a checkpoint to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        self.checkpoint(None).save(path)
    }

    /// Load a checkpoint from `path`; fails with `CheckpointLoad` when the
    /// file is missing or corrupt and leaves the agent unchanged
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let checkpoint = Checkpoint::load(path)?;
        self.restore(checkpoint)?;
        info!(path = %path.display(), epsilon = self.epsilon, "Agent restored from checkpoint");
        Ok(())
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn learn_steps(&self) -> u64 {
        self.learn_steps
    }

    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn policy_network(&self) -> &QNetwork {
        &self.policy_net
    }

    pub fn target_network(&self) -> &QNetwork {
        &self.target_net
    }
}

fn stack<'a>(observations: impl Iterator<Item = &'a Observation>) -> Array2<f64> {
    let flat: Vec<f64> = observations
        .flat_map(|o| o.as_slice().iter().copied())
        .collect();
    let rows = flat.len() / OBSERVATION_SIZE;
    Array2::from_shape_vec((rows, OBSERVATION_SIZE), flat)
        .unwrap_or_else(|_| Array2::zeros((0, OBSERVATION_SIZE)))
}
