//! User profile types

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{BudgetError, Result};

/// How much risk the user is willing to take with their savings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskPreference {
    Conservative,
    Moderate,
    Aggressive,
}

impl RiskPreference {
    /// Scalar fed into the observation vector
    pub fn scalar(self) -> f64 {
        match self {
            RiskPreference::Conservative => 0.0,
            RiskPreference::Moderate => 0.5,
            RiskPreference::Aggressive => 1.0,
        }
    }
}

impl std::fmt::Display for RiskPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskPreference::Conservative => write!(f, "conservative"),
            RiskPreference::Moderate => write!(f, "moderate"),
            RiskPreference::Aggressive => write!(f, "aggressive"),
        }
    }
}

impl FromStr for RiskPreference {
    type Err = BudgetError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "conservative" => Ok(RiskPreference::Conservative),
            "moderate" => Ok(RiskPreference::Moderate),
            "aggressive" => Ok(RiskPreference::Aggressive),
            other => Err(BudgetError::Config(format!(
                "unrecognized risk preference: {other:?}"
            ))),
        }
    }
}

/// Profile the environment is built from. Immutable for one training run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub monthly_income: f64,
    pub risk_preference: RiskPreference,
}

impl UserProfile {
    /// Create a validated profile
    pub fn new(monthly_income: f64, risk_preference: RiskPreference) -> Result<Self> {
        let profile = Self {
            monthly_income,
            risk_preference,
        };
        profile.validate()?;
        Ok(profile)
    }

    /// Reject non-positive or non-finite income
    pub fn validate(&self) -> Result<()> {
        if !self.monthly_income.is_finite() || self.monthly_income <= 0.0 {
            return Err(BudgetError::Config(format!(
                "monthly income must be a positive number, got {}",
                self.monthly_income
            )));
        }
        Ok(())
    }

    pub fn risk_scalar(&self) -> f64 {
        self.risk_preference.scalar()
    }
}
