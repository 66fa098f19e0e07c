//! Shared query parameter types for API handlers.

use serde::Deserialize;

/// `?limit=` for list endpoints, clamped by [`clamp_limit`].
#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

/// Clamp a user-provided limit to `1..=max`, using `default` when absent.
pub fn clamp_limit(limit: Option<i64>, default: i64, max: i64) -> i64 {
    limit.unwrap_or(default).max(1).min(max)
}
