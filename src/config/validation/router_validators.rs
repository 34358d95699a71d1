//! Router settings validators

use super::trait_def::Validate;
use crate::core::router::RouterConfig;
use tracing::debug;

impl Validate for RouterConfig {
    fn validate(&self) -> Result<(), String> {
        debug!("Validating router settings");

        if self.request_timeout == 0 {
            return Err("request_timeout must be greater than 0".to_string());
        }
        if self.stream_timeout == 0 {
            return Err("stream_timeout must be greater than 0".to_string());
        }
        if self.failure_threshold == 0 {
            return Err("failure_threshold must be greater than 0".to_string());
        }
        if self.cooldown_base_seconds == 0 {
            return Err("cooldown_base_seconds must be greater than 0".to_string());
        }
        if self.cooldown_max_seconds < self.cooldown_base_seconds {
            return Err(format!(
                "cooldown_max_seconds ({}) must not be below cooldown_base_seconds ({})",
                self.cooldown_max_seconds, self.cooldown_base_seconds
            ));
        }
        if !(self.latency_ewma_alpha > 0.0 && self.latency_ewma_alpha <= 1.0) {
            return Err("latency_ewma_alpha must be in (0, 1]".to_string());
        }
        if !(self.rate_limit_headroom > 0.0 && self.rate_limit_headroom <= 1.0) {
            return Err("rate_limit_headroom must be in (0, 1]".to_string());
        }

        Ok(())
    }
}
