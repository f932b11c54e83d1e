//! Background polling of Antigravity per-model quota
//!
//! Each cycle walks the active Antigravity accounts one at a time. For each
//! account the pipeline is: credential check, expiry check, proxy lookup,
//! tier lookup (best effort), quota fetch, persist. Nothing is written
//! unless the quota fetch succeeds, and token renewal is left entirely to
//! [`crate::token_refresh::TokenRefreshService`].


use async_trait::async_trait;
use chrono::{Duration, SecondsFormat};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::account::{credential, Account, ModelQuota, Platform};
use crate::clock::{system_clock, SharedClock};
use crate::config::TokenRefreshConfig;
use crate::error::Result;
use crate::ports::{AccountRepository, AntigravityApi};
use crate::proxy::ProxyResolver;
use crate::scheduler::{CycleSummary, PeriodicJob, PeriodicTask, SchedulerState};
use crate::upstream::{FetchAvailableModelsResponse, LoadCodeAssistResponse};

/// Tokens expiring within this buffer are left alone
const EXPIRY_BUFFER_MINUTES: i64 = 5;

/// Outcome for one account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AccountOutcome {
    Refreshed,
    Skipped,
}

/// Scheduler that keeps `extra.quota` of Antigravity accounts current
pub struct AntigravityQuotaRefresher {
    cycle: Arc<QuotaRefreshCycle>,
    task: PeriodicTask,
    enabled: bool,
}

struct QuotaRefreshCycle {
    accounts: Arc<dyn AccountRepository>,
    proxies: ProxyResolver,
    api: Arc<dyn AntigravityApi>,
    clock: SharedClock,
}

impl AntigravityQuotaRefresher {
    /// Create a stopped refresher
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        proxies: ProxyResolver,
        api: Arc<dyn AntigravityApi>,
        config: &TokenRefreshConfig,
    ) -> Self {
        Self::with_clock(accounts, proxies, api, config, system_clock())
    }

    /// Create a stopped refresher with an explicit clock
    pub fn with_clock(
        accounts: Arc<dyn AccountRepository>,
        proxies: ProxyResolver,
        api: Arc<dyn AntigravityApi>,
        config: &TokenRefreshConfig,
        clock: SharedClock,
    ) -> Self {
        Self {
            cycle: Arc::new(QuotaRefreshCycle {
                accounts,
                proxies,
                api,
                clock,
            }),
            task: PeriodicTask::new("antigravity_quota", config.effective_check_interval()),
            enabled: config.enabled,
        }
    }

    /// Spawn the worker, which runs one cycle right away.
    ///
    /// No-op when disabled by configuration.
    pub fn start(&self) {
        if !self.enabled {
            info!("Antigravity quota refresh disabled by configuration");
            return;
        }
        self.task.start(self.cycle.clone());
    }

    /// Stop the worker, letting a cycle in flight finish first
    pub async fn stop(&self) {
        self.task.stop().await;
    }

    /// Scheduler state
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        self.task.state()
    }

    /// Run one cycle in the caller's task
    pub async fn refresh_once(&self) -> CycleSummary {
        self.cycle.process().await
    }
}

#[async_trait]
impl PeriodicJob for QuotaRefreshCycle {
    fn name(&self) -> &'static str {
        "antigravity_quota"
    }

    async fn run_cycle(&self) {
        self.process().await;
    }
}

impl QuotaRefreshCycle {
    async fn process(&self) -> CycleSummary {
        let mut summary = CycleSummary::default();

        let accounts = match self.accounts.list_active().await {
            Ok(accounts) => accounts,
            Err(e) => {
                error!(error = %e, "Antigravity quota: failed to list accounts");
                return summary;
            }
        };

        let accounts: Vec<Account> = accounts
            .into_iter()
            .filter(|a| a.platform == Platform::Antigravity)
            .collect();
        if accounts.is_empty() {
            return summary;
        }

        for account in accounts {
            summary.total += 1;
            let (id, name) = (account.id, account.name.clone());
            match self.refresh_account(account).await {
                Ok(AccountOutcome::Refreshed) => summary.refreshed += 1,
                Ok(AccountOutcome::Skipped) => summary.skipped += 1,
                Err(e) => {
                    warn!(account_id = id, account_name = %name, error = %e, "Antigravity quota refresh failed");
                    summary.failed += 1;
                }
            }
        }

        info!(
            total = summary.total,
            refreshed = summary.refreshed,
            skipped = summary.skipped,
            failed = summary.failed,
            "Antigravity quota cycle completed"
        );
        summary
    }

    async fn refresh_account(&self, mut account: Account) -> Result<AccountOutcome> {
        let (Some(access_token), Some(project_id)) = (
            account.credential(credential::ACCESS_TOKEN).map(str::to_string),
            account.credential(credential::PROJECT_ID).map(str::to_string),
        ) else {
            debug!(account_id = account.id, "Skipping account without token or project");
            return Ok(AccountOutcome::Skipped);
        };

        let now = self.clock.now();
        let expired = account
            .token_expires_at()
            .is_some_and(|expires_at| now + Duration::minutes(EXPIRY_BUFFER_MINUTES) > expires_at);
        if expired {
            debug!(account_id = account.id, "Skipping account with expiring token");
            return Ok(AccountOutcome::Skipped);
        }

        let proxy_url = self.proxies.resolve(&account).await;

        match self
            .api
            .load_code_assist(&access_token, proxy_url.as_deref())
            .await
        {
            Ok(resp) => apply_tier(&mut account, &resp),
            Err(e) => debug!(account_id = account.id, error = %e, "Tier lookup failed"),
        }

        let models = self
            .api
            .fetch_available_models(&access_token, &project_id, proxy_url.as_deref())
            .await?;

        apply_quota(&mut account, &models);
        account.extra.last_quota_check = Some(now.to_rfc3339_opts(SecondsFormat::Secs, true));

        self.accounts.update(&account).await?;
        Ok(AccountOutcome::Refreshed)
    }
}

fn apply_tier(account: &mut Account, resp: &LoadCodeAssistResponse) {
    if let Some(tier) = resp.tier() {
        account.extra.tier = Some(tier.to_string());
    }
    if let Some(ineligible) = resp.ineligible_tiers.first() {
        if !ineligible.reason_code.is_empty() {
            account.extra.ineligible_reason_code = Some(ineligible.reason_code.clone());
        }
        if !ineligible.reason_message.is_empty() {
            account.extra.ineligible_reason_message = Some(ineligible.reason_message.clone());
        }
    }
}

/// `remainingFraction` to a whole percentage, truncating
fn remaining_percent(fraction: f64) -> i32 {
    (fraction * 100.0) as i32
}

fn apply_quota(account: &mut Account, resp: &FetchAvailableModelsResponse) {
    let quota: BTreeMap<String, ModelQuota> = resp
        .models
        .iter()
        .filter_map(|(model, info)| {
            let q = info.quota_info.as_ref()?;
            Some((
                model.clone(),
                ModelQuota {
                    remaining: remaining_percent(q.remaining_fraction),
                    reset_time: q.reset_time.clone(),
                },
            ))
        })
        .collect();
    account.extra.quota = Some(quota);
}
