use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::TokenRefresher;
use crate::clock::{system_clock, SharedClock};
use crate::config::TokenRefreshConfig;
use crate::ports::AccountRepository;
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::scheduler::{CycleSummary, PeriodicJob, PeriodicTask, SchedulerState};

/// Scheduler that renews tokens before they expire
pub struct TokenRefreshService {
    cycle: Arc<TokenRefreshCycle>,
    task: PeriodicTask,
    enabled: bool,
}

struct TokenRefreshCycle {
    accounts: Arc<dyn AccountRepository>,
    refreshers: Vec<Arc<dyn TokenRefresher>>,
    config: TokenRefreshConfig,
    retry: RetryPolicy,
    clock: SharedClock,
}

impl TokenRefreshService {
    /// Create a stopped service
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        refreshers: Vec<Arc<dyn TokenRefresher>>,
        config: TokenRefreshConfig,
    ) -> Self {
        Self::with_clock(accounts, refreshers, config, system_clock())
    }

    /// Create a stopped service with an explicit clock
    pub fn with_clock(
        accounts: Arc<dyn AccountRepository>,
        refreshers: Vec<Arc<dyn TokenRefresher>>,
        config: TokenRefreshConfig,
        clock: SharedClock,
    ) -> Self {
        let task = PeriodicTask::new("token_refresh", config.effective_check_interval());
        let enabled = config.enabled;
        let retry = RetryPolicy::from_config(&config);
        Self {
            cycle: Arc::new(TokenRefreshCycle {
                accounts,
                refreshers,
                config,
                retry,
                clock,
            }),
            task,
            enabled,
        }
    }

    /// Override the retry policy
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        if let Some(cycle) = Arc::get_mut(&mut self.cycle) {
            cycle.retry = retry;
        }
        self
    }

    /// Spawn the background worker unless disabled
    pub fn start(&self) {
        if !self.enabled {
            info!("Token refresh disabled by configuration");
            return;
        }
        self.task.start(self.cycle.clone());
    }

    /// Stop the worker and wait for it to exit
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
impl PeriodicJob for TokenRefreshCycle {
    fn name(&self) -> &'static str {
        "token_refresh"
    }

    async fn run_cycle(&self) {
        self.process().await;
    }
}

impl TokenRefreshCycle {
    async fn process(&self) -> CycleSummary {
        let mut summary = CycleSummary::default();

        let accounts = match self.accounts.list_active().await {
            Ok(accounts) => accounts,
            Err(e) => {
                error!(error = %e, "Token refresh: failed to list accounts");
                return summary;
            }
        };

        let window = self.config.refresh_window();
        let now = self.clock.now();

        for account in accounts {
            let Some(refresher) = self.refreshers.iter().find(|r| r.can_refresh(&account)) else {
                continue;
            };
            summary.total += 1;

            if !refresher.needs_refresh_at(&account, window, now) {
                summary.skipped += 1;
                continue;
            }

            let credentials =
                match retry_with_backoff(&self.retry, || refresher.refresh(&account)).await {
                    Ok(credentials) => credentials,
                    Err(e) => {
                        warn!(
                            account_id = account.id,
                            refresher = refresher.name(),
                            error = %e,
                            "Token refresh failed"
                        );
                        summary.failed += 1;
                        continue;
                    }
                };

            let mut updated = account;
            updated.credentials = credentials;
            match self.accounts.update(&updated).await {
                Ok(()) => {
                    debug!(account_id = updated.id, refresher = refresher.name(), "Token refreshed");
                    summary.refreshed += 1;
                }
                Err(e) => {
                    warn!(account_id = updated.id, error = %e, "Failed to persist refreshed token");
                    summary.failed += 1;
                }
            }
        }

        info!(
            total = summary.total,
            refreshed = summary.refreshed,
            skipped = summary.skipped,
            failed = summary.failed,
            "Token refresh cycle completed"
        );
        summary
    }
}
