//! Budget period parsing

use crate::utils::error::{GatewayError, Result};
use chrono::Duration;

/// Parse a budget period like `30s`, `15m`, `1h`, `1d`, `2w` or `1mo` (30 days)
pub fn parse_budget_duration(text: &str) -> Result<Duration> {
    let text = text.trim();
    let split = text
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| GatewayError::validation(format!("budget duration '{}' has no unit", text)))?;
    let (number, unit) = text.split_at(split);

    let count: i64 = number
        .parse()
        .map_err(|_| GatewayError::validation(format!("invalid budget duration '{}'", text)))?;
    if count <= 0 {
        return Err(GatewayError::validation(format!(
            "budget duration '{}' must be positive",
            text
        )));
    }

    let seconds_per_unit: i64 = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        "w" => 7 * 86_400,
        "mo" => 30 * 86_400,
        other => {
            return Err(GatewayError::validation(format!(
                "unknown budget duration unit '{}' in '{}'",
                other, text
            )));
        }
    };

    count
        .checked_mul(seconds_per_unit)
        .map(Duration::seconds)
        .ok_or_else(|| GatewayError::validation(format!("budget duration '{}' overflows", text)))
}
