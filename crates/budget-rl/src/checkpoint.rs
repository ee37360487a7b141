//! Agent checkpoint artifact
//!
//! A checkpoint is the only hand-off between a training process and an
//! inference reader, so it is always published by writing a temp file in
//! the destination directory and renaming it over the target.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;
use uuid::Uuid;

use budget_core::{BudgetError, Result};

use crate::action::ACTION_COUNT;
use crate::network::{AdamOptimizer, QNetwork};
use crate::state::OBSERVATION_SIZE;

pub const CHECKPOINT_VERSION: u32 = 1;

fn default_version() -> u32 {
    CHECKPOINT_VERSION
}

/// Persisted agent state. The target network is never stored; it is
/// re-derived from `policy_parameters` on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    #[serde(default = "default_version")]
    pub version: u32,
    pub policy_parameters: QNetwork,
    pub optimizer_state: AdamOptimizer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epsilon: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
}

fn validate_optimizer(optimizer: &AdamOptimizer) -> Result<()> {
    let invalid = |name: &str, value: f64| {
        Err(BudgetError::CheckpointLoad(format!(
            "optimizer {name} {value} is out of range"
        )))
    };
    if !optimizer.learning_rate.is_finite() || optimizer.learning_rate <= 0.0 {
        return invalid("learning rate", optimizer.learning_rate);
    }
    for (name, beta) in [("beta1", optimizer.beta1), ("beta2", optimizer.beta2)] {
        if !(0.0..1.0).contains(&beta) {
            return invalid(name, beta);
        }
    }
    if !optimizer.epsilon.is_finite() || optimizer.epsilon <= 0.0 {
        return invalid("epsilon", optimizer.epsilon);
    }
    Ok(())
}

impl Checkpoint {
    pub fn new(
        policy_parameters: QNetwork,
        optimizer_state: AdamOptimizer,
        epsilon: f64,
        run_id: Option<Uuid>,
    ) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            policy_parameters,
            optimizer_state,
            epsilon: Some(epsilon),
            saved_at: Some(Utc::now()),
            run_id,
        }
    }

    /// Reject checkpoints this build cannot use
    pub fn validate(&self) -> Result<()> {
        if self.version > CHECKPOINT_VERSION {
            return Err(BudgetError::CheckpointLoad(format!(
                "checkpoint version {} is newer than supported version {CHECKPOINT_VERSION}",
                self.version
            )));
        }
        self.policy_parameters
            .validate(OBSERVATION_SIZE, ACTION_COUNT)?;
        if !self.optimizer_state.matches(&self.policy_parameters) {
            return Err(BudgetError::CheckpointLoad(
                "optimizer state does not match policy network shape".into(),
            ));
        }
        validate_optimizer(&self.optimizer_state)?;
        if let Some(epsilon) = self.epsilon {
            if !(0.0..=1.0).contains(&epsilon) {
                return Err(BudgetError::CheckpointLoad(format!(
                    "epsilon {epsilon} outside [0, 1]"
                )));
            }
        }
        Ok(())
    }

    /// Write atomically: readers see either the previous file or this one
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let save_err = |e: std::io::Error| {
            BudgetError::CheckpointSave(format!("{}: {e}", path.display()))
        };

        fs::create_dir_all(dir).map_err(save_err)?;
        let mut tmp = NamedTempFile::new_in(dir).map_err(save_err)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut writer, self)
                .map_err(|e| BudgetError::CheckpointSave(e.to_string()))?;
            writer.flush().map_err(save_err)?;
        }
        tmp.as_file().sync_all().map_err(save_err)?;
        tmp.persist(path).map_err(|e| save_err(e.error))?;

        debug!(path = %path.display(), "Checkpoint written");
        Ok(())
    }

    /// Read and validate a checkpoint. Every failure, including a missing
    /// file, is reported as `CheckpointLoad`.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            BudgetError::CheckpointLoad(format!("{}: {e}", path.display()))
        })?;
        let checkpoint: Checkpoint = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| BudgetError::CheckpointLoad(format!("{}: {e}", path.display())))?;
        checkpoint.validate()?;
        Ok(checkpoint)
    }
}
