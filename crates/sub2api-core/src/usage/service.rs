use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{UsageCache, UsageInfo, WindowStats};
use crate::account::{credential, Account, AccountType};
use crate::clock::{system_clock, SharedClock};
use crate::config::UsageCacheConfig;
use crate::error::{Error, Result};
use crate::ports::{AccountRepository, ClaudeUsageFetcher, UsageLogRepository};
use crate::proxy::ProxyResolver;
use crate::stats::AccountUsageStatsResponse;

/// Lookback used for window statistics when no session window is recorded
const DEFAULT_SESSION_HOURS: i64 = 5;

/// On-demand account usage with a short-lived cache for OAuth accounts
pub struct AccountUsageService {
    accounts: Arc<dyn AccountRepository>,
    usage_logs: Arc<dyn UsageLogRepository>,
    fetcher: Arc<dyn ClaudeUsageFetcher>,
    proxies: ProxyResolver,
    cache: UsageCache,
    clock: SharedClock,
}

impl AccountUsageService {
    /// Create a service reading the system clock
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        usage_logs: Arc<dyn UsageLogRepository>,
        fetcher: Arc<dyn ClaudeUsageFetcher>,
        proxies: ProxyResolver,
        config: &UsageCacheConfig,
    ) -> Self {
        Self::with_clock(accounts, usage_logs, fetcher, proxies, config, system_clock())
    }

    /// Create a service with an explicit clock
    pub fn with_clock(
        accounts: Arc<dyn AccountRepository>,
        usage_logs: Arc<dyn UsageLogRepository>,
        fetcher: Arc<dyn ClaudeUsageFetcher>,
        proxies: ProxyResolver,
        config: &UsageCacheConfig,
        clock: SharedClock,
    ) -> Self {
        Self {
            accounts,
            usage_logs,
            fetcher,
            proxies,
            cache: UsageCache::new(config.ttl(), clock.clone()),
            clock,
        }
    }

    /// The OAuth usage cache
    #[must_use]
    pub fn cache(&self) -> &UsageCache {
        &self.cache
    }

    /// Usage of one account.
    ///
    /// OAuth accounts query the provider and are cached for the TTL;
    /// setup-token accounts are estimated from the session window on every
    /// call; every other type is rejected.
    pub async fn get_usage(&self, account_id: i64) -> Result<Arc<UsageInfo>> {
        let account = self
            .accounts
            .get_by_id(account_id)
            .await
            .map_err(|e| e.context("get account failed"))?;

        if account.can_query_usage() {
            if let Some(cached) = self.cache.get(account_id) {
                debug!(account_id, "Usage cache hit");
                return Ok(cached);
            }

            let mut usage = self.fetch_oauth_usage(&account).await?;
            self.add_window_stats(&account, &mut usage).await;

            let usage = Arc::new(usage);
            self.cache.insert(account_id, usage.clone());
            return Ok(usage);
        }

        if account.account_type == AccountType::SetupToken {
            let mut usage = UsageInfo::estimate_from_session(
                account.session_window_end,
                &account.session_window_status,
                self.clock.now(),
            );
            self.add_window_stats(&account, &mut usage).await;
            return Ok(Arc::new(usage));
        }

        Err(Error::UnsupportedUsageQuery {
            account_type: account.account_type,
        })
    }

    /// Today's statistics for an account
    pub async fn get_today_stats(&self, account_id: i64) -> Result<WindowStats> {
        self.usage_logs
            .get_account_today_stats(account_id)
            .await
            .map(WindowStats::from)
            .map_err(|e| e.context("get today stats failed"))
    }

    /// Daily history, summary and per-model breakdown for a range
    pub async fn get_account_usage_stats(
        &self,
        account_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<AccountUsageStatsResponse> {
        self.usage_logs
            .get_account_usage_stats(account_id, start, end)
            .await
            .map_err(|e| e.context("get account usage stats failed"))
    }

    async fn fetch_oauth_usage(&self, account: &Account) -> Result<UsageInfo> {
        let access_token = account
            .credential(credential::ACCESS_TOKEN)
            .ok_or(Error::MissingCredential("access token"))
            .map_err(|e| e.context("fetch usage failed"))?;

        let proxy_url = self.proxies.resolve(account).await;
        let resp = self
            .fetcher
            .fetch_usage(access_token, proxy_url.as_deref())
            .await
            .map_err(|e| e.context("fetch usage failed"))?;

        Ok(UsageInfo::from_claude(&resp, self.clock.now()))
    }

    /// Attach local statistics to the five-hour window; failures are logged
    async fn add_window_stats(&self, account: &Account, usage: &mut UsageInfo) {
        let Some(five_hour) = usage.five_hour.as_mut() else {
            return;
        };

        let since = account
            .session_window_start
            .unwrap_or_else(|| self.clock.now() - Duration::hours(DEFAULT_SESSION_HOURS));

        match self
            .usage_logs
            .get_account_window_stats(account.id, since)
            .await
        {
            Ok(stats) => five_hour.window_stats = Some(stats.into()),
            Err(e) => warn!(account_id = account.id, error = %e, "Failed to get window stats"),
        }
    }
}
