//! Cost calculation utilities

/// Rough characters-per-token ratio for English text
const CHARS_PER_TOKEN: usize = 4;

/// Pre-call token estimate used for admission
///
/// Counts characters rather than bytes and never returns 0 for a non-empty prompt.
pub fn estimate_tokens(prompt: &str) -> u64 {
    let chars = prompt.chars().count();
    if chars == 0 {
        return 0;
    }
    chars.div_ceil(CHARS_PER_TOKEN) as u64
}

/// Format cost for display
pub fn format_cost(cost: f64) -> String {
    if cost < 0.01 {
        format!("${:.6}", cost)
    } else {
        format!("${:.4}", cost)
    }
}
