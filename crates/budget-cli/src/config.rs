//! Layered configuration for the budget CLI
//!
//! Sources, lowest precedence first: built-in defaults, a `budget.toml`
//! file, then `BUDGET__`-prefixed environment variables
//! (e.g. `BUDGET__TRAINING__EPISODES=200`). Command line flags are applied
//! by each command on top of the loaded value.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use budget_core::{RiskPreference, UserProfile};
use budget_rl::{AgentConfig, TrainingConfig};
use config::{ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};

/// Full CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub profile: ProfileConfig,
    pub agent: AgentConfig,
    pub training: TrainingConfig,

    /// File the configuration was read from, if any
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Emit newline-delimited JSON instead of human-readable lines
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Default profile used when a command gets no `--income` / `--risk`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    pub monthly_income: Option<f64>,
    pub risk_preference: Option<RiskPreference>,
}

impl ProfileConfig {
    /// Merge flag values over configured ones and validate the result.
    /// Risk preference falls back to moderate; income has no default.
    pub fn resolve(&self, income: Option<f64>, risk: Option<RiskPreference>) -> Result<UserProfile> {
        let monthly_income = income.or(self.monthly_income).context(
            "monthly income is required (pass --income or set profile.monthly_income)",
        )?;
        let risk_preference = risk
            .or(self.risk_preference)
            .unwrap_or(RiskPreference::Moderate);
        UserProfile::new(monthly_income, risk_preference).context("invalid user profile")
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::find_config_file(),
        };
        Self::load_with(path, Self::environment())
    }

    fn environment() -> Environment {
        Environment::with_prefix("BUDGET")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
    }

    fn load_with(path: Option<PathBuf>, env: Environment) -> Result<Self> {
        let mut builder = ConfigBuilder::<config::builder::DefaultState>::default();

        if let Some(path) = &path {
            tracing::debug!("Loading config from: {:?}", path);
            builder = builder.add_source(File::from(path.clone()).required(true));
        }
        builder = builder.add_source(env);

        let mut config: Config = builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.agent.validate()?;
        config.training.validate()?;
        config.source = path;
        Ok(config)
    }

    /// Find the configuration file
    fn find_config_file() -> Option<PathBuf> {
        // Check in order: BUDGET_CONFIG env, ./budget.toml, ~/.config/budget/budget.toml
        if let Ok(path) = std::env::var("BUDGET_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let local = PathBuf::from("budget.toml");
        if local.exists() {
            return Some(local);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".config").join("budget").join("budget.toml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> Environment {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::environment().source(Some(vars))
    }

    #[test]
    fn test_defaults() {
        let config = Config::load_with(None, env_from(&[])).unwrap();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.training.episodes, 500);
        assert_eq!(config.agent.batch_size, 64);
        assert!(config.profile.monthly_income.is_none());
        assert!(config.source.is_none());
    }

    #[test]
    fn test_file_then_env_layering() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("budget.toml");
        std::fs::write(
            &path,
            r#"
[training]
episodes = 50
seed = 3

[agent]
gamma = 0.9
hidden_sizes = [32, 32]

[profile]
monthly_income = 42000.0
risk_preference = "aggressive"
"#,
        )
        .unwrap();

        let config = Config::load_with(
            Some(path.clone()),
            env_from(&[("BUDGET__TRAINING__EPISODES", "75")]),
        )
        .unwrap();

        assert_eq!(config.training.episodes, 75);
        assert_eq!(config.training.seed, Some(3));
        assert_eq!(config.agent.gamma, 0.9);
        assert_eq!(config.agent.hidden_sizes, vec![32, 32]);
        assert_eq!(config.agent.batch_size, 64);
        assert_eq!(config.profile.risk_preference, Some(RiskPreference::Aggressive));
        assert_eq!(config.source, Some(path));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let result = Config::load_with(None, env_from(&[("BUDGET__AGENT__GAMMA", "2.5")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load_with(Some(dir.path().join("absent.toml")), env_from(&[]));
        assert!(result.is_err());
    }

    #[test]
    fn test_profile_resolution() {
        let profile = ProfileConfig {
            monthly_income: Some(30000.0),
            risk_preference: None,
        };

        let resolved = profile.resolve(None, None).unwrap();
        assert_eq!(resolved.monthly_income, 30000.0);
        assert_eq!(resolved.risk_preference, RiskPreference::Moderate);

        let overridden = profile
            .resolve(Some(60000.0), Some(RiskPreference::Conservative))
            .unwrap();
        assert_eq!(overridden.monthly_income, 60000.0);

        assert!(ProfileConfig::default().resolve(None, None).is_err());
        assert!(profile.resolve(Some(-5.0), None).is_err());
    }

    #[test]
    fn test_example_file_parses() {
        let config: Config = toml::from_str(include_str!("../../../budget.toml.example")).unwrap();
        assert!(config.agent.validate().is_ok());
        assert!(config.training.validate().is_ok());
    }
}
