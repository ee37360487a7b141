//! Experience replay buffer for RL

use std::collections::VecDeque;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::action::BudgetAction;
use crate::state::{Observation, Reward};

/// Default replay capacity
pub const DEFAULT_CAPACITY: usize = 10_000;

/// A single transition tuple (s, a, r, s', done)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub state: Observation,
    pub action: BudgetAction,
    pub reward: Reward,
    pub next_state: Observation,
    pub done: bool,
}

impl Transition {
    /// Create a new transition
    pub fn new(
        state: Observation,
        action: BudgetAction,
        reward: Reward,
        next_state: Observation,
        done: bool,
    ) -> Self {
        Self {
            state,
            action,
            reward,
            next_state,
            done,
        }
    }
}

/// Bounded FIFO replay memory
#[derive(Debug, Clone)]
pub struct ReplayBuffer {
    buffer: VecDeque<Transition>,
    capacity: usize,
}

impl ReplayBuffer {
    /// Create a new replay buffer with given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a transition, evicting the oldest one when full
    pub fn remember(&mut self, transition: Transition) {
        if self.capacity == 0 {
            return;
        }
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(transition);
    }

    /// Uniform sample without replacement over the current contents.
    /// Returns `None` when fewer than `batch_size` transitions are stored.
    pub fn sample<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Option<Vec<Transition>> {
        if batch_size == 0 || self.buffer.len() < batch_size {
            return None;
        }
        let picked = rand::seq::index::sample(rng, self.buffer.len(), batch_size);
        Some(picked.iter().map(|i| self.buffer[i]).collect())
    }

    /// Get buffer length
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.buffer.iter()
    }
}

impl Default for ReplayBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
