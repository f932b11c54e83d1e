//! Account usage read model
//!
//! [`UsageInfo`] is assembled per request by [`AccountUsageService`] and is
//! serialized as-is by the HTTP layer, so field names and which fields are
//! omitted when empty are part of the external contract.

mod cache;
mod service;


pub use cache::UsageCache;
pub use service::AccountUsageService;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stats::AccountStats;
use crate::upstream::{ClaudeUsageResponse, UsageWindowResponse};

/// Requests, tokens and cost since a window started
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    /// Requests
    pub requests: i64,
    /// Tokens
    pub tokens: i64,
    /// Cost in USD
    pub cost: f64,
}

impl From<AccountStats> for WindowStats {
    fn from(s: AccountStats) -> Self {
        Self {
            requests: s.requests,
            tokens: s.tokens,
            cost: s.cost,
        }
    }
}

/// Utilization of one provider window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageProgress {
    /// Percentage, 100 meaning fully used (may exceed 100)
    pub utilization: f64,
    /// When the window resets; serialized as `null` when unknown
    #[serde(default)]
    pub resets_at: Option<DateTime<Utc>>,
    /// Seconds until reset, never negative
    #[serde(default)]
    pub remaining_seconds: i64,
    /// Local statistics since the window started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_stats: Option<WindowStats>,
}

/// Usage of one account across provider windows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageInfo {
    /// When the upstream data was fetched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Five-hour session window; serialized as `null` when absent
    #[serde(default)]
    pub five_hour: Option<UsageProgress>,
    /// Seven-day window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seven_day: Option<UsageProgress>,
    /// Seven-day Sonnet window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seven_day_sonnet: Option<UsageProgress>,
}

/// Parse an upstream timestamp.
///
/// Accepts RFC 3339 (any fractional precision) and the bare
/// `YYYY-MM-DDTHH:MM:SSZ` / `YYYY-MM-DDTHH:MM:SS.mmmZ` forms.
#[must_use]
pub fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%SZ", "%Y-%m-%dT%H:%M:%S%.3fZ"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn remaining_seconds(until: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (until - now).num_seconds().max(0)
}

/// One window of the upstream response.
///
/// Windows without a reset timestamp are dropped. An unparsable timestamp
/// keeps the utilization with no reset time and zero remaining seconds.
fn build_progress(
    window: Option<&UsageWindowResponse>,
    label: &'static str,
    now: DateTime<Utc>,
) -> Option<UsageProgress> {
    let window = window?;
    let raw = window.resets_at()?;
    match parse_time(raw) {
        Some(resets_at) => Some(UsageProgress {
            utilization: window.utilization,
            resets_at: Some(resets_at),
            remaining_seconds: remaining_seconds(resets_at, now),
            window_stats: None,
        }),
        None => {
            tracing::warn!(window = label, resets_at = raw, "Failed to parse usage reset time");
            Some(UsageProgress {
                utilization: window.utilization,
                ..Default::default()
            })
        }
    }
}

impl UsageInfo {
    /// Build from the Anthropic usage response fetched at `now`
    #[must_use]
    pub fn from_claude(resp: &ClaudeUsageResponse, now: DateTime<Utc>) -> Self {
        Self {
            updated_at: Some(now),
            five_hour: build_progress(resp.five_hour.as_ref(), "five_hour", now),
            seven_day: build_progress(resp.seven_day.as_ref(), "seven_day", now),
            seven_day_sonnet: build_progress(resp.seven_day_sonnet.as_ref(), "seven_day_sonnet", now),
        }
    }

    /// Estimate from the locally tracked session window of a setup-token
    /// account. Only the five-hour window can be estimated.
    #[must_use]
    pub fn estimate_from_session(
        session_window_end: Option<DateTime<Utc>>,
        session_window_status: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let five_hour = match session_window_end {
            Some(end) => UsageProgress {
                utilization: estimated_utilization(session_window_status),
                resets_at: Some(end),
                remaining_seconds: remaining_seconds(end, now),
                window_stats: None,
            },
            None => UsageProgress::default(),
        };
        Self {
            five_hour: Some(five_hour),
            ..Default::default()
        }
    }
}

/// Step function over the last session window status
#[must_use]
pub fn estimated_utilization(status: &str) -> f64 {
    match status {
        "rejected" => 100.0,
        "allowed_warning" => 80.0,
        _ => 0.0,
    }
}
