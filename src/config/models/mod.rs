//! Configuration data models

pub mod budget;
pub mod deployment;

pub use budget::BudgetsConfig;
pub use deployment::DeploymentEntry;

/// Default deployment weight
pub fn default_weight() -> u32 {
    1
}

pub fn default_true() -> bool {
    true
}
