//! Billing-facing operations over [`SubscriptionRepository`]

use std::sync::Arc;
use tracing::{debug, info};

use super::{Group, UsageWindow, UserSubscription};
use crate::clock::{system_clock, SharedClock};
use crate::error::{Error, Result};
use crate::ports::SubscriptionRepository;

/// Window activation, reset, limit checks and usage recording
pub struct SubscriptionService {
    repo: Arc<dyn SubscriptionRepository>,
    clock: SharedClock,
}

impl SubscriptionService {
    /// Create a service reading the system clock
    pub fn new(repo: Arc<dyn SubscriptionRepository>) -> Self {
        Self::with_clock(repo, system_clock())
    }

    /// Create a service with an explicit clock
    pub fn with_clock(repo: Arc<dyn SubscriptionRepository>, clock: SharedClock) -> Self {
        Self { repo, clock }
    }

    /// Active subscription of a user for a group
    pub async fn get_active(&self, user_id: i64, group_id: i64) -> Result<UserSubscription> {
        self.repo
            .get_active_by_user_and_group(user_id, group_id)
            .await
            .map_err(|e| e.context("get active subscription failed"))
    }

    /// Bring the windows of `sub` up to date before a limit check.
    ///
    /// Activates all windows at the current time when none is active yet,
    /// then resets every window whose period has elapsed. Storage is
    /// updated first; the local copy mirrors each successful write.
    pub async fn prepare_windows(&self, sub: &mut UserSubscription) -> Result<()> {
        let now = self.clock.now();

        if !sub.is_window_activated() {
            self.repo.activate_windows(sub.id, now).await?;
            sub.apply_activation(now);
            debug!(subscription_id = sub.id, "Activated usage windows");
            return Ok(());
        }

        for window in UsageWindow::ALL {
            if !sub.needs_reset_at(window, now) {
                continue;
            }
            match window {
                UsageWindow::Daily => self.repo.reset_daily_usage(sub.id, now).await?,
                UsageWindow::Weekly => self.repo.reset_weekly_usage(sub.id, now).await?,
                UsageWindow::Monthly => self.repo.reset_monthly_usage(sub.id, now).await?,
            }
            sub.apply_reset(window, now);
            debug!(subscription_id = sub.id, %window, "Reset usage window");
        }
        Ok(())
    }

    /// Pre-flight check of `additional_cost` against every window.
    ///
    /// All three windows are evaluated; the error names the first one
    /// exceeded in daily, weekly, monthly order.
    pub fn check_limits(
        &self,
        sub: &UserSubscription,
        group: &Group,
        additional_cost: f64,
    ) -> Result<()> {
        if !sub.is_active_at(self.clock.now()) {
            return Err(Error::SubscriptionInactive(sub.id));
        }
        match sub.check_all_limits(group, additional_cost).first_exceeded() {
            Some(window) => Err(Error::UsageLimitExceeded { window }),
            None => Ok(()),
        }
    }

    /// Add a committed cost to all three counters
    pub async fn record_usage(&self, subscription_id: i64, cost_usd: f64) -> Result<()> {
        if !cost_usd.is_finite() || cost_usd < 0.0 {
            return Err(Error::InvalidCost(cost_usd));
        }
        self.repo.increment_usage(subscription_id, cost_usd).await
    }

    /// [`Self::record_usage`] that also updates a local copy
    pub async fn record_usage_local(&self, sub: &mut UserSubscription, cost_usd: f64) -> Result<()> {
        self.record_usage(sub.id, cost_usd).await?;
        sub.apply_increment(cost_usd, self.clock.now());
        Ok(())
    }

    /// Mark overdue subscriptions as expired; returns how many changed
    pub async fn expire_overdue(&self) -> Result<u64> {
        let count = self.repo.batch_update_expired_status().await?;
        if count > 0 {
            info!(count, "Expired overdue subscriptions");
        }
        Ok(count)
    }
}
