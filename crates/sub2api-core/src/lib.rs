//! sub2api Core - subscription and upstream-account engine
//!
//! This crate holds the logic of the sub2api gateway that has real
//! invariants, behind async ports for persistence and upstream HTTP:
//! - Subscription: rolling daily/weekly/monthly usage windows and limit checks
//! - Token refresh: per-platform OAuth renewal and its scheduler
//! - Quota refresh: background polling of Antigravity model quota
//! - Usage: cached account usage read path
//! - Store: in-memory implementation of every repository port

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod account;
pub mod clock;
pub mod config;
pub mod error;
pub mod ports;
pub mod proxy;
pub mod quota_refresh;
pub mod retry;
pub mod scheduler;
pub mod stats;
pub mod store;
pub mod subscription;
pub mod token_refresh;
pub mod upstream;
pub mod usage;

#[cfg(test)]
mod testing;

pub use account::{Account, AccountExtra, AccountStatus, AccountType, Credentials, ModelQuota, Platform};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{TokenRefreshConfig, UsageCacheConfig};
pub use error::{Error, Result};
pub use proxy::{Proxy, ProxyResolver};
pub use quota_refresh::AntigravityQuotaRefresher;
pub use retry::{retry_with_backoff, RetryPolicy};
pub use scheduler::{CycleSummary, PeriodicJob, PeriodicTask, SchedulerState};
pub use store::{MemoryStore, Snapshot, UsageLog};
pub use subscription::{Group, LimitCheck, SubscriptionService, SubscriptionStatus, UsageWindow, UserSubscription};
pub use token_refresh::{
    AntigravityTokenRefresher, ClaudeTokenRefresher, TokenRefreshService, TokenRefresher,
};
pub use usage::{AccountUsageService, UsageCache, UsageInfo, UsageProgress, WindowStats};
