//! Ports consumed by the core services
//!
//! Persistence and upstream HTTP access are implemented elsewhere (the
//! in-memory [`crate::store::MemoryStore`], the `sub2api-upstream` crate, or
//! a database layer); the services only see these traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::account::Account;
use crate::error::Result;
use crate::proxy::Proxy;
use crate::stats::{AccountStats, AccountUsageStatsResponse};
use crate::subscription::UserSubscription;
use crate::upstream::{
    ClaudeUsageResponse, FetchAvailableModelsResponse, LoadCodeAssistResponse, TokenInfo,
};

/// Account persistence
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Load one account
    async fn get_by_id(&self, id: i64) -> Result<Account>;

    /// All accounts with `active` status, every platform
    async fn list_active(&self) -> Result<Vec<Account>>;

    /// Persist credentials, metadata and status of an account
    async fn update(&self, account: &Account) -> Result<()>;
}

/// Proxy lookup
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProxyRepository: Send + Sync {
    /// Load one proxy
    async fn get_by_id(&self, id: i64) -> Result<Proxy>;
}

/// Read-only usage log statistics
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsageLogRepository: Send + Sync {
    /// Requests/tokens/cost of an account since `since`
    async fn get_account_window_stats(
        &self,
        account_id: i64,
        since: DateTime<Utc>,
    ) -> Result<AccountStats>;

    /// Requests/tokens/cost of an account since the start of today (UTC)
    async fn get_account_today_stats(&self, account_id: i64) -> Result<AccountStats>;

    /// Daily history, summary and per-model breakdown for a range
    async fn get_account_usage_stats(
        &self,
        account_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<AccountUsageStatsResponse>;
}

/// Subscription persistence.
///
/// Implementations must apply each mutation atomically with respect to
/// concurrent callers of the same subscription.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Load one subscription
    async fn get_by_id(&self, id: i64) -> Result<UserSubscription>;

    /// Active, unexpired subscription binding a user to a group
    async fn get_active_by_user_and_group(
        &self,
        user_id: i64,
        group_id: i64,
    ) -> Result<UserSubscription>;

    /// Anchor all three windows at `start`
    async fn activate_windows(&self, id: i64, start: DateTime<Utc>) -> Result<()>;

    /// Zero the daily counter and move its anchor
    async fn reset_daily_usage(&self, id: i64, new_window_start: DateTime<Utc>) -> Result<()>;

    /// Zero the weekly counter and move its anchor
    async fn reset_weekly_usage(&self, id: i64, new_window_start: DateTime<Utc>) -> Result<()>;

    /// Zero the monthly counter and move its anchor
    async fn reset_monthly_usage(&self, id: i64, new_window_start: DateTime<Utc>) -> Result<()>;

    /// Add `cost_usd` to all three counters
    async fn increment_usage(&self, id: i64, cost_usd: f64) -> Result<()>;

    /// Mark active subscriptions past expiry as expired; returns the count
    async fn batch_update_expired_status(&self) -> Result<u64>;
}

/// Anthropic OAuth usage endpoint
#[async_trait]
pub trait ClaudeUsageFetcher: Send + Sync {
    /// Fetch rolling-window utilization for an OAuth access token
    async fn fetch_usage(
        &self,
        access_token: &str,
        proxy_url: Option<&str>,
    ) -> Result<ClaudeUsageResponse>;
}

/// Antigravity (Cloud Code) internal API
#[async_trait]
pub trait AntigravityApi: Send + Sync {
    /// Tier and eligibility of the account
    async fn load_code_assist(
        &self,
        access_token: &str,
        proxy_url: Option<&str>,
    ) -> Result<LoadCodeAssistResponse>;

    /// Per-model quota fractions
    async fn fetch_available_models(
        &self,
        access_token: &str,
        project_id: &str,
        proxy_url: Option<&str>,
    ) -> Result<FetchAvailableModelsResponse>;
}

/// Platform OAuth token endpoint
#[async_trait]
pub trait OAuthTokenClient: Send + Sync {
    /// Exchange the account's refresh token for a new access token
    async fn refresh_token(&self, account: &Account, proxy_url: Option<&str>)
        -> Result<TokenInfo>;
}
