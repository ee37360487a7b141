//! Error types for budget RL

use thiserror::Error;

/// Main error type for budget RL
#[derive(Error, Debug)]
pub enum BudgetError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Allocation error: {0}")]
    Allocation(String),

    #[error("Checkpoint load error: {0}")]
    CheckpointLoad(String),

    #[error("Checkpoint save error: {0}")]
    CheckpointSave(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl BudgetError {
    /// True for errors raised while reading a checkpoint artifact
    pub fn is_checkpoint_load(&self) -> bool {
        matches!(self, BudgetError::CheckpointLoad(_))
    }
}

/// Result type alias for budget RL operations
pub type Result<T> = std::result::Result<T, BudgetError>;
