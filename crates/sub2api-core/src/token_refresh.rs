//! OAuth access-token renewal
//!
//! A [`TokenRefresher`] answers three questions for one platform: can this
//! account be refreshed at all, is its token close enough to expiry, and
//! what are the new credentials. [`TokenRefreshService`] runs the
//! refreshers on a schedule.

mod antigravity;
mod claude;
mod service;


pub use antigravity::AntigravityTokenRefresher;
pub use claude::ClaudeTokenRefresher;
pub use service::TokenRefreshService;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::account::{Account, Credentials};
use crate::error::Result;

/// Platform-specific token renewal
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Platform/type gate; no I/O
    fn can_refresh(&self, account: &Account) -> bool;

    /// [`Self::needs_refresh`] at a given instant
    fn needs_refresh_at(&self, account: &Account, window: Duration, now: DateTime<Utc>) -> bool {
        self.can_refresh(account) && expires_within(account, window, now)
    }

    /// Whether the token expires within `window` from now.
    ///
    /// A missing or unparsable `expires_at` yields `false`.
    fn needs_refresh(&self, account: &Account, window: Duration) -> bool {
        self.needs_refresh_at(account, window, Utc::now())
    }

    /// Exchange the refresh token and return the merged credential map.
    ///
    /// Never mutates `account`; the caller persists on success.
    async fn refresh(&self, account: &Account) -> Result<Credentials>;
}

/// `expires_at - now < window`; `false` when the expiry is unknown
#[must_use]
pub fn expires_within(account: &Account, window: Duration, now: DateTime<Utc>) -> bool {
    account
        .token_expires_at()
        .is_some_and(|expires_at| expires_at - now < window)
}

/// Fresh values win; existing keys the refresh did not return are kept
#[must_use]
pub fn merge_credentials(mut fresh: Credentials, existing: &Credentials) -> Credentials {
    for (key, value) in existing {
        fresh
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }
    fresh
}
