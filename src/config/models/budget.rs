//! The `budgets` section

use crate::core::budget::{BudgetEntity, BudgetLevel};
use serde::{Deserialize, Serialize};

/// Budget entities per hierarchy level
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetsConfig {
    pub organizations: Vec<BudgetEntity>,
    pub teams: Vec<BudgetEntity>,
    pub keys: Vec<BudgetEntity>,
}

impl BudgetsConfig {
    /// Every entity with its level, organizations first
    pub fn entries(&self) -> impl Iterator<Item = (BudgetLevel, &BudgetEntity)> {
        self.organizations
            .iter()
            .map(|entity| (BudgetLevel::Org, entity))
            .chain(self.teams.iter().map(|entity| (BudgetLevel::Team, entity)))
            .chain(self.keys.iter().map(|entity| (BudgetLevel::Key, entity)))
    }

    pub fn len(&self) -> usize {
        self.organizations.len() + self.teams.len() + self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
