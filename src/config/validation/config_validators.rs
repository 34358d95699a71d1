//! Validators for model list, pricing and budget entries

use super::trait_def::Validate;
use crate::config::models::{BudgetsConfig, DeploymentEntry};
use crate::core::budget::parse_budget_duration;
use crate::core::cost::ModelPricing;
use std::collections::HashSet;

fn non_negative(value: Option<f64>, field: &str) -> Result<(), String> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => {
            Err(format!("{} must be a non-negative number", field))
        }
        _ => Ok(()),
    }
}

fn positive(value: Option<u64>, field: &str) -> Result<(), String> {
    match value {
        Some(0) => Err(format!("{} must be greater than 0", field)),
        _ => Ok(()),
    }
}

impl Validate for DeploymentEntry {
    fn validate(&self) -> Result<(), String> {
        if self.model_name.trim().is_empty() {
            return Err("model_name cannot be empty".to_string());
        }
        if self.model.trim().is_empty() {
            return Err(format!("model cannot be empty for {}", self.model_name));
        }
        if matches!(&self.id, Some(id) if id.trim().is_empty()) {
            return Err(format!("id cannot be empty for {}", self.model_name));
        }
        positive(self.rpm, "rpm")?;
        positive(self.tpm, "tpm")?;
        positive(self.timeout, "timeout")?;
        if self.max_parallel_requests == Some(0) {
            return Err("max_parallel_requests must be greater than 0".to_string());
        }
        non_negative(self.input_cost_per_token, "input_cost_per_token")?;
        non_negative(self.output_cost_per_token, "output_cost_per_token")?;
        Ok(())
    }
}

impl Validate for ModelPricing {
    fn validate(&self) -> Result<(), String> {
        non_negative(Some(self.input_cost_per_token), "input_cost_per_token")?;
        non_negative(Some(self.output_cost_per_token), "output_cost_per_token")?;
        positive(self.default_rpm, "default_rpm")?;
        positive(self.default_tpm, "default_tpm")?;
        Ok(())
    }
}

impl Validate for BudgetsConfig {
    fn validate(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for (level, entity) in self.entries() {
            if entity.id.trim().is_empty() {
                return Err(format!("{} budget entity has an empty id", level));
            }
            if !seen.insert((level, entity.id.as_str())) {
                return Err(format!("duplicate {} id: {}", level, entity.id));
            }
            non_negative(entity.max_budget, &format!("{} '{}' max_budget", level, entity.id))?;
            non_negative(Some(entity.spend), &format!("{} '{}' spend", level, entity.id))?;
            if let Some(duration) = &entity.budget_duration {
                parse_budget_duration(duration)
                    .map_err(|e| format!("{} '{}' budget_duration: {}", level, entity.id, e))?;
            }
            positive(entity.rpm_limit, &format!("{} '{}' rpm_limit", level, entity.id))?;
            positive(entity.tpm_limit, &format!("{} '{}' tpm_limit", level, entity.id))?;
        }
        Ok(())
    }
}
