//! User subscriptions and rolling usage-window accounting
//!
//! A [`UserSubscription`] carries three independent windows (daily, weekly,
//! monthly). Each window has its own anchor and its own USD counter; they
//! are activated lazily and reset independently.
//!
//! Window lengths are fixed: 24 hours, 7 days and 30 days. The monthly
//! window is deliberately a 30-day period, not a calendar month.
//!
//! Every time-dependent query has an `_at(now)` form; the plain form reads
//! the system clock.

mod service;


pub use service::SubscriptionService;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the three rolling windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageWindow {
    /// 24 hours
    Daily,
    /// 7 × 24 hours
    Weekly,
    /// 30 × 24 hours
    Monthly,
}

impl UsageWindow {
    /// All windows in evaluation order
    pub const ALL: [UsageWindow; 3] = [Self::Daily, Self::Weekly, Self::Monthly];

    /// Fixed length of the window
    #[must_use]
    pub fn period(self) -> Duration {
        match self {
            Self::Daily => Duration::hours(24),
            Self::Weekly => Duration::hours(7 * 24),
            Self::Monthly => Duration::hours(30 * 24),
        }
    }
}

impl fmt::Display for UsageWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Daily => write!(f, "daily"),
            Self::Weekly => write!(f, "weekly"),
            Self::Monthly => write!(f, "monthly"),
        }
    }
}

/// Subscription lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    /// Usable until `expires_at`
    #[default]
    Active,
    /// Past expiry (set by the batch sweep)
    Expired,
    /// Suspended by an administrator
    Suspended,
}

/// Rate plan with optional per-window USD limits (absent = unlimited)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    /// Group ID
    pub id: i64,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Daily limit in USD
    #[serde(default)]
    pub daily_limit_usd: Option<f64>,
    /// Weekly limit in USD
    #[serde(default)]
    pub weekly_limit_usd: Option<f64>,
    /// Monthly limit in USD
    #[serde(default)]
    pub monthly_limit_usd: Option<f64>,
}

impl Group {
    /// Limit configured for a window
    #[must_use]
    pub fn limit(&self, window: UsageWindow) -> Option<f64> {
        match window {
            UsageWindow::Daily => self.daily_limit_usd,
            UsageWindow::Weekly => self.weekly_limit_usd,
            UsageWindow::Monthly => self.monthly_limit_usd,
        }
    }

    /// Whether a daily limit is configured
    #[must_use]
    pub fn has_daily_limit(&self) -> bool {
        self.daily_limit_usd.is_some()
    }

    /// Whether a weekly limit is configured
    #[must_use]
    pub fn has_weekly_limit(&self) -> bool {
        self.weekly_limit_usd.is_some()
    }

    /// Whether a monthly limit is configured
    #[must_use]
    pub fn has_monthly_limit(&self) -> bool {
        self.monthly_limit_usd.is_some()
    }
}

/// Outcome of [`UserSubscription::check_all_limits`]; `true` means within limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitCheck {
    /// Daily window allows the cost
    pub daily: bool,
    /// Weekly window allows the cost
    pub weekly: bool,
    /// Monthly window allows the cost
    pub monthly: bool,
}

impl LimitCheck {
    /// All three windows allow the cost
    #[must_use]
    pub fn all_within(&self) -> bool {
        self.daily && self.weekly && self.monthly
    }

    /// First window (daily, weekly, monthly order) that would be exceeded
    #[must_use]
    pub fn first_exceeded(&self) -> Option<UsageWindow> {
        UsageWindow::ALL.into_iter().find(|w| !self.get(*w))
    }

    /// Result for one window
    #[must_use]
    pub fn get(&self, window: UsageWindow) -> bool {
        match window {
            UsageWindow::Daily => self.daily,
            UsageWindow::Weekly => self.weekly,
            UsageWindow::Monthly => self.monthly,
        }
    }
}

/// Binding of a user to a group (rate plan)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSubscription {
    /// Subscription ID
    pub id: i64,
    /// Subscribed user
    pub user_id: i64,
    /// Rate plan
    pub group_id: i64,
    /// Start of validity
    pub starts_at: DateTime<Utc>,
    /// End of validity
    pub expires_at: DateTime<Utc>,
    /// Lifecycle status
    #[serde(default)]
    pub status: SubscriptionStatus,
    /// Daily window anchor (`None` until activated)
    #[serde(default)]
    pub daily_window_start: Option<DateTime<Utc>>,
    /// Weekly window anchor
    #[serde(default)]
    pub weekly_window_start: Option<DateTime<Utc>>,
    /// Monthly window anchor
    #[serde(default)]
    pub monthly_window_start: Option<DateTime<Utc>>,
    /// USD used in the daily window
    #[serde(default)]
    pub daily_usage_usd: f64,
    /// USD used in the weekly window
    #[serde(default)]
    pub weekly_usage_usd: f64,
    /// USD used in the monthly window
    #[serde(default)]
    pub monthly_usage_usd: f64,
    /// Administrator who granted the subscription
    #[serde(default)]
    pub assigned_by: Option<i64>,
    /// When it was granted
    pub assigned_at: DateTime<Utc>,
    /// Free-form notes
    #[serde(default)]
    pub notes: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl UserSubscription {
    /// New active subscription valid from `starts_at` to `expires_at`
    pub fn new(
        id: i64,
        user_id: i64,
        group_id: i64,
        starts_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            group_id,
            starts_at,
            expires_at,
            status: SubscriptionStatus::Active,
            daily_window_start: None,
            weekly_window_start: None,
            monthly_window_start: None,
            daily_usage_usd: 0.0,
            weekly_usage_usd: 0.0,
            monthly_usage_usd: 0.0,
            assigned_by: None,
            assigned_at: starts_at,
            notes: String::new(),
            created_at: starts_at,
            updated_at: starts_at,
        }
    }

    // ------------------------------------------------------------------
    // Validity
    // ------------------------------------------------------------------

    /// Status is active and expiry lies in the future
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active_at(Utc::now())
    }

    /// [`Self::is_active`] at a given instant
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && now < self.expires_at
    }

    /// Expiry lies in the past
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// [`Self::is_expired`] at a given instant
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Whole days until expiry, floored, never negative
    #[must_use]
    pub fn days_remaining(&self) -> i64 {
        self.days_remaining_at(Utc::now())
    }

    /// [`Self::days_remaining`] at a given instant
    #[must_use]
    pub fn days_remaining_at(&self, now: DateTime<Utc>) -> i64 {
        if self.is_expired_at(now) {
            return 0;
        }
        ((self.expires_at - now).num_seconds() / 86_400).max(0)
    }

    // ------------------------------------------------------------------
    // Windows
    // ------------------------------------------------------------------

    /// At least one window has been activated
    #[must_use]
    pub fn is_window_activated(&self) -> bool {
        self.daily_window_start.is_some()
            || self.weekly_window_start.is_some()
            || self.monthly_window_start.is_some()
    }

    /// Anchor of a window
    #[must_use]
    pub fn window_start(&self, window: UsageWindow) -> Option<DateTime<Utc>> {
        match window {
            UsageWindow::Daily => self.daily_window_start,
            UsageWindow::Weekly => self.weekly_window_start,
            UsageWindow::Monthly => self.monthly_window_start,
        }
    }

    /// USD counter of a window
    #[must_use]
    pub fn usage(&self, window: UsageWindow) -> f64 {
        match window {
            UsageWindow::Daily => self.daily_usage_usd,
            UsageWindow::Weekly => self.weekly_usage_usd,
            UsageWindow::Monthly => self.monthly_usage_usd,
        }
    }

    /// Window has been activated and a full period has elapsed at `now`.
    ///
    /// A window that was never activated never needs a reset.
    #[must_use]
    pub fn needs_reset_at(&self, window: UsageWindow, now: DateTime<Utc>) -> bool {
        self.window_start(window)
            .is_some_and(|start| now - start >= window.period())
    }

    /// Daily window needs a reset
    #[must_use]
    pub fn needs_daily_reset(&self) -> bool {
        self.needs_reset_at(UsageWindow::Daily, Utc::now())
    }

    /// Weekly window needs a reset
    #[must_use]
    pub fn needs_weekly_reset(&self) -> bool {
        self.needs_reset_at(UsageWindow::Weekly, Utc::now())
    }

    /// Monthly window needs a reset
    #[must_use]
    pub fn needs_monthly_reset(&self) -> bool {
        self.needs_reset_at(UsageWindow::Monthly, Utc::now())
    }

    /// When a window resets (anchor + period)
    #[must_use]
    pub fn reset_time(&self, window: UsageWindow) -> Option<DateTime<Utc>> {
        self.window_start(window).map(|start| start + window.period())
    }

    /// Daily reset time
    #[must_use]
    pub fn daily_reset_time(&self) -> Option<DateTime<Utc>> {
        self.reset_time(UsageWindow::Daily)
    }

    /// Weekly reset time
    #[must_use]
    pub fn weekly_reset_time(&self) -> Option<DateTime<Utc>> {
        self.reset_time(UsageWindow::Weekly)
    }

    /// Monthly reset time
    #[must_use]
    pub fn monthly_reset_time(&self) -> Option<DateTime<Utc>> {
        self.reset_time(UsageWindow::Monthly)
    }

    // ------------------------------------------------------------------
    // Limits
    // ------------------------------------------------------------------

    /// Pre-flight check: would `additional_cost` keep the window within
    /// the group's limit? The limit itself is allowed (inclusive).
    #[must_use]
    pub fn check_limit(&self, window: UsageWindow, group: &Group, additional_cost: f64) -> bool {
        match group.limit(window) {
            None => true,
            Some(limit) => self.usage(window) + additional_cost <= limit,
        }
    }

    /// Daily pre-flight check
    #[must_use]
    pub fn check_daily_limit(&self, group: &Group, additional_cost: f64) -> bool {
        self.check_limit(UsageWindow::Daily, group, additional_cost)
    }

    /// Weekly pre-flight check
    #[must_use]
    pub fn check_weekly_limit(&self, group: &Group, additional_cost: f64) -> bool {
        self.check_limit(UsageWindow::Weekly, group, additional_cost)
    }

    /// Monthly pre-flight check
    #[must_use]
    pub fn check_monthly_limit(&self, group: &Group, additional_cost: f64) -> bool {
        self.check_limit(UsageWindow::Monthly, group, additional_cost)
    }

    /// All three pre-flight checks, each evaluated independently
    #[must_use]
    pub fn check_all_limits(&self, group: &Group, additional_cost: f64) -> LimitCheck {
        LimitCheck {
            daily: self.check_daily_limit(group, additional_cost),
            weekly: self.check_weekly_limit(group, additional_cost),
            monthly: self.check_monthly_limit(group, additional_cost),
        }
    }

    // ------------------------------------------------------------------
    // Local mirrors of repository mutations
    // ------------------------------------------------------------------

    pub(crate) fn apply_activation(&mut self, start: DateTime<Utc>) {
        self.daily_window_start = Some(start);
        self.weekly_window_start = Some(start);
        self.monthly_window_start = Some(start);
        self.updated_at = start;
    }

    pub(crate) fn apply_reset(&mut self, window: UsageWindow, start: DateTime<Utc>) {
        match window {
            UsageWindow::Daily => {
                self.daily_usage_usd = 0.0;
                self.daily_window_start = Some(start);
            }
            UsageWindow::Weekly => {
                self.weekly_usage_usd = 0.0;
                self.weekly_window_start = Some(start);
            }
            UsageWindow::Monthly => {
                self.monthly_usage_usd = 0.0;
                self.monthly_window_start = Some(start);
            }
        }
        self.updated_at = start;
    }

    pub(crate) fn apply_increment(&mut self, cost_usd: f64, at: DateTime<Utc>) {
        self.daily_usage_usd += cost_usd;
        self.weekly_usage_usd += cost_usd;
        self.monthly_usage_usd += cost_usd;
        self.updated_at = at;
    }
}
