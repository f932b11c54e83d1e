//! Usage-log statistics returned by [`crate::ports::UsageLogRepository`]

use serde::{Deserialize, Serialize};

/// Aggregate over a time range
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountStats {
    /// Number of requests
    pub requests: i64,
    /// Input + output + cache tokens
    pub tokens: i64,
    /// Standard cost in USD
    pub cost: f64,
}

/// One day of account usage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyUsage {
    /// Day in `YYYY-MM-DD` (UTC)
    pub date: String,
    /// Requests that day
    pub requests: i64,
    /// Tokens that day
    pub tokens: i64,
    /// Standard cost in USD
    pub cost: f64,
    /// Cost actually billed (after rate multipliers)
    pub actual_cost: f64,
}

/// Totals over the requested range
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    /// Days covered by the range
    pub days: i64,
    /// Days with at least one request
    pub active_days: i64,
    /// Total requests
    pub total_requests: i64,
    /// Total tokens
    pub total_tokens: i64,
    /// Total standard cost
    pub total_cost: f64,
    /// Total billed cost
    pub total_actual_cost: f64,
    /// Standard cost averaged over `days`
    pub avg_daily_cost: f64,
}

/// Per-model breakdown
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelUsage {
    /// Model name
    pub model: String,
    /// Requests
    pub requests: i64,
    /// Tokens
    pub tokens: i64,
    /// Standard cost
    pub cost: f64,
    /// Billed cost
    pub actual_cost: f64,
}

/// Account usage report for a time range
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountUsageStatsResponse {
    /// Daily buckets, oldest first
    pub history: Vec<DailyUsage>,
    /// Totals
    pub summary: UsageSummary,
    /// Per-model breakdown, most expensive first
    pub models: Vec<ModelUsage>,
}
