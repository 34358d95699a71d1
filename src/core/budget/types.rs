//! Budget entity types

use crate::core::counter_store::ScopeKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Level of the budget hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetLevel {
    Org,
    Team,
    Key,
}

impl BudgetLevel {
    /// Counter scope used for this level's spend and rate counters
    pub fn scope_kind(&self) -> ScopeKind {
        match self {
            BudgetLevel::Org => ScopeKind::Org,
            BudgetLevel::Team => ScopeKind::Team,
            BudgetLevel::Key => ScopeKind::Key,
        }
    }
}

impl fmt::Display for BudgetLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BudgetLevel::Org => "org",
            BudgetLevel::Team => "team",
            BudgetLevel::Key => "key",
        })
    }
}

/// Budget record shared by organizations, teams and API keys
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetEntity {
    pub id: String,
    /// Maximum spend per period in USD (None = unlimited)
    #[serde(default)]
    pub max_budget: Option<f64>,
    /// Spend already accumulated in the current period
    #[serde(default)]
    pub spend: f64,
    /// Period spec such as "30s", "1h", "1d", "1w" or "1mo"
    #[serde(default)]
    pub budget_duration: Option<String>,
    /// End of the current period (only meaningful with a duration)
    #[serde(default)]
    pub budget_reset_at: Option<DateTime<Utc>>,
    /// Requests per minute for this scope
    #[serde(default)]
    pub rpm_limit: Option<u64>,
    /// Tokens per minute for this scope
    #[serde(default)]
    pub tpm_limit: Option<u64>,
}

impl BudgetEntity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            max_budget: None,
            spend: 0.0,
            budget_duration: None,
            budget_reset_at: None,
            rpm_limit: None,
            tpm_limit: None,
        }
    }

    pub fn with_max_budget(mut self, max_budget: f64) -> Self {
        self.max_budget = Some(max_budget);
        self
    }

    pub fn with_spend(mut self, spend: f64) -> Self {
        self.spend = spend;
        self
    }

    pub fn with_budget_duration(mut self, duration: impl Into<String>) -> Self {
        self.budget_duration = Some(duration.into());
        self
    }

    pub fn with_budget_reset_at(mut self, reset_at: DateTime<Utc>) -> Self {
        self.budget_reset_at = Some(reset_at);
        self
    }

    pub fn with_rate_limits(mut self, rpm_limit: Option<u64>, tpm_limit: Option<u64>) -> Self {
        self.rpm_limit = rpm_limit;
        self.tpm_limit = tpm_limit;
        self
    }
}

/// Admission rejected because a level would exceed its budget
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error(
    "Budget exceeded at {level} level for '{entity_id}': spend {spend:.6} + estimate {estimated_cost:.6} > max {max_budget:.6}"
)]
pub struct BudgetExceeded {
    pub level: BudgetLevel,
    pub entity_id: String,
    pub spend: f64,
    pub max_budget: f64,
    pub estimated_cost: f64,
}
