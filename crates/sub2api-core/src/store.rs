//! In-memory implementation of every repository port
//!
//! Backs the CLI and the tests. All state sits behind one mutex, so each
//! repository call is atomic with respect to every other. The whole state
//! can be loaded from and saved to a JSON snapshot.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::account::Account;
use crate::clock::{system_clock, SharedClock};
use crate::error::{Error, Result};
use crate::ports::{AccountRepository, ProxyRepository, SubscriptionRepository, UsageLogRepository};
use crate::proxy::Proxy;
use crate::stats::{AccountStats, AccountUsageStatsResponse, DailyUsage, ModelUsage, UsageSummary};
use crate::subscription::{SubscriptionStatus, UsageWindow, UserSubscription};

/// One metered request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageLog {
    /// Upstream account that served the request
    pub account_id: i64,
    /// Model name
    pub model: String,
    /// Input + output + cache tokens
    pub tokens: i64,
    /// Standard cost in USD
    pub cost: f64,
    /// Billed cost in USD
    pub actual_cost: f64,
    /// Request time
    pub created_at: DateTime<Utc>,
}

/// Serialized store contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Upstream accounts
    #[serde(default)]
    pub accounts: Vec<Account>,
    /// Outbound proxies
    #[serde(default)]
    pub proxies: Vec<Proxy>,
    /// User subscriptions
    #[serde(default)]
    pub subscriptions: Vec<UserSubscription>,
    /// Usage log
    #[serde(default)]
    pub usage_logs: Vec<UsageLog>,
}

#[derive(Default)]
struct State {
    accounts: BTreeMap<i64, Account>,
    proxies: BTreeMap<i64, Proxy>,
    subscriptions: BTreeMap<i64, UserSubscription>,
    usage_logs: Vec<UsageLog>,
}

impl From<Snapshot> for State {
    fn from(s: Snapshot) -> Self {
        Self {
            accounts: s.accounts.into_iter().map(|a| (a.id, a)).collect(),
            proxies: s.proxies.into_iter().map(|p| (p.id, p)).collect(),
            subscriptions: s.subscriptions.into_iter().map(|s| (s.id, s)).collect(),
            usage_logs: s.usage_logs,
        }
    }
}

/// Mutex-guarded in-memory store
pub struct MemoryStore {
    state: Mutex<State>,
    clock: SharedClock,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Empty store on the system clock
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    /// Empty store with an explicit clock
    #[must_use]
    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            state: Mutex::new(State::default()),
            clock,
        }
    }

    /// Store seeded from a snapshot
    #[must_use]
    pub fn from_snapshot(snapshot: Snapshot, clock: SharedClock) -> Self {
        Self {
            state: Mutex::new(snapshot.into()),
            clock,
        }
    }

    /// Load a snapshot file; a missing file yields an empty store
    pub async fn load(path: impl AsRef<Path>, clock: SharedClock) -> Result<Self> {
        let path = path.as_ref();
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
                debug!(
                    path = %path.display(),
                    accounts = snapshot.accounts.len(),
                    subscriptions = snapshot.subscriptions.len(),
                    "Loaded store snapshot"
                );
                Ok(Self::from_snapshot(snapshot, clock))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::with_clock(clock)),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the current state as pretty JSON
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&self.snapshot())?;
        if let Some(parent) = path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }

    /// Copy of the current state
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let state = self.lock();
        Snapshot {
            accounts: state.accounts.values().cloned().collect(),
            proxies: state.proxies.values().cloned().collect(),
            subscriptions: state.subscriptions.values().cloned().collect(),
            usage_logs: state.usage_logs.clone(),
        }
    }

    /// Insert or replace an account
    pub fn put_account(&self, account: Account) {
        self.lock().accounts.insert(account.id, account);
    }

    /// Insert or replace a proxy
    pub fn put_proxy(&self, proxy: Proxy) {
        self.lock().proxies.insert(proxy.id, proxy);
    }

    /// Insert or replace a subscription
    pub fn put_subscription(&self, sub: UserSubscription) {
        self.lock().subscriptions.insert(sub.id, sub);
    }

    /// Append a usage log entry
    pub fn record_usage_log(&self, log: UsageLog) {
        self.lock().usage_logs.push(log);
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn with_subscription<T>(
        &self,
        id: i64,
        f: impl FnOnce(&mut UserSubscription, DateTime<Utc>) -> T,
    ) -> Result<T> {
        let now = self.clock.now();
        let mut state = self.lock();
        let sub = state
            .subscriptions
            .get_mut(&id)
            .ok_or(Error::SubscriptionNotFound(id))?;
        let out = f(sub, now);
        sub.updated_at = now;
        Ok(out)
    }

    fn sum_since(&self, account_id: i64, since: DateTime<Utc>) -> AccountStats {
        let state = self.lock();
        state
            .usage_logs
            .iter()
            .filter(|l| l.account_id == account_id && l.created_at >= since)
            .fold(AccountStats::default(), |mut acc, l| {
                acc.requests += 1;
                acc.tokens += l.tokens;
                acc.cost += l.cost;
                acc
            })
    }
}

#[async_trait]
impl AccountRepository for MemoryStore {
    async fn get_by_id(&self, id: i64) -> Result<Account> {
        self.lock()
            .accounts
            .get(&id)
            .cloned()
            .ok_or(Error::AccountNotFound(id))
    }

    async fn list_active(&self) -> Result<Vec<Account>> {
        Ok(self
            .lock()
            .accounts
            .values()
            .filter(|a| a.is_active())
            .cloned()
            .collect())
    }

    async fn update(&self, account: &Account) -> Result<()> {
        let mut state = self.lock();
        let slot = state
            .accounts
            .get_mut(&account.id)
            .ok_or(Error::AccountNotFound(account.id))?;
        *slot = account.clone();
        Ok(())
    }
}

#[async_trait]
impl ProxyRepository for MemoryStore {
    async fn get_by_id(&self, id: i64) -> Result<Proxy> {
        self.lock()
            .proxies
            .get(&id)
            .cloned()
            .ok_or(Error::ProxyNotFound(id))
    }
}

#[async_trait]
impl SubscriptionRepository for MemoryStore {
    async fn get_by_id(&self, id: i64) -> Result<UserSubscription> {
        self.lock()
            .subscriptions
            .get(&id)
            .cloned()
            .ok_or(Error::SubscriptionNotFound(id))
    }

    async fn get_active_by_user_and_group(
        &self,
        user_id: i64,
        group_id: i64,
    ) -> Result<UserSubscription> {
        let now = self.clock.now();
        self.lock()
            .subscriptions
            .values()
            .find(|s| s.user_id == user_id && s.group_id == group_id && s.is_active_at(now))
            .cloned()
            .ok_or_else(|| Error::Repository(format!(
                "no active subscription for user {user_id} in group {group_id}"
            )))
    }

    async fn activate_windows(&self, id: i64, start: DateTime<Utc>) -> Result<()> {
        self.with_subscription(id, |sub, _| sub.apply_activation(start))
    }

    async fn reset_daily_usage(&self, id: i64, new_window_start: DateTime<Utc>) -> Result<()> {
        self.with_subscription(id, |sub, _| sub.apply_reset(UsageWindow::Daily, new_window_start))
    }

    async fn reset_weekly_usage(&self, id: i64, new_window_start: DateTime<Utc>) -> Result<()> {
        self.with_subscription(id, |sub, _| sub.apply_reset(UsageWindow::Weekly, new_window_start))
    }

    async fn reset_monthly_usage(&self, id: i64, new_window_start: DateTime<Utc>) -> Result<()> {
        self.with_subscription(id, |sub, _| sub.apply_reset(UsageWindow::Monthly, new_window_start))
    }

    async fn increment_usage(&self, id: i64, cost_usd: f64) -> Result<()> {
        self.with_subscription(id, |sub, now| sub.apply_increment(cost_usd, now))
    }

    async fn batch_update_expired_status(&self) -> Result<u64> {
        let now = self.clock.now();
        let mut state = self.lock();
        let mut count = 0;
        for sub in state.subscriptions.values_mut() {
            if sub.status == SubscriptionStatus::Active && sub.expires_at <= now {
                sub.status = SubscriptionStatus::Expired;
                sub.updated_at = now;
                count += 1;
            }
        }
        Ok(count)
    }
}

#[async_trait]
impl UsageLogRepository for MemoryStore {
    async fn get_account_window_stats(
        &self,
        account_id: i64,
        since: DateTime<Utc>,
    ) -> Result<AccountStats> {
        Ok(self.sum_since(account_id, since))
    }

    async fn get_account_today_stats(&self, account_id: i64) -> Result<AccountStats> {
        let midnight = self.clock.now().date_naive().and_time(chrono::NaiveTime::MIN).and_utc();
        Ok(self.sum_since(account_id, midnight))
    }

    async fn get_account_usage_stats(
        &self,
        account_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<AccountUsageStatsResponse> {
        let logs: Vec<UsageLog> = self
            .lock()
            .usage_logs
            .iter()
            .filter(|l| l.account_id == account_id && l.created_at >= start && l.created_at < end)
            .cloned()
            .collect();
        Ok(aggregate(&logs, start, end))
    }
}

/// Daily buckets (every day in range, oldest first), totals and models
fn aggregate(logs: &[UsageLog], start: DateTime<Utc>, end: DateTime<Utc>) -> AccountUsageStatsResponse {
    let first = start.date_naive();
    let last = (end - Duration::nanoseconds(1)).date_naive().max(first);

    let mut days: BTreeMap<NaiveDate, DailyUsage> = first
        .iter_days()
        .take_while(|d| *d <= last)
        .map(|d| {
            (
                d,
                DailyUsage {
                    date: d.format("%Y-%m-%d").to_string(),
                    ..Default::default()
                },
            )
        })
        .collect();
    let mut models: BTreeMap<&str, ModelUsage> = BTreeMap::new();

    for log in logs {
        if let Some(day) = days.get_mut(&log.created_at.date_naive()) {
            day.requests += 1;
            day.tokens += log.tokens;
            day.cost += log.cost;
            day.actual_cost += log.actual_cost;
        }
        let model = models.entry(log.model.as_str()).or_insert_with(|| ModelUsage {
            model: log.model.clone(),
            ..Default::default()
        });
        model.requests += 1;
        model.tokens += log.tokens;
        model.cost += log.cost;
        model.actual_cost += log.actual_cost;
    }

    let history: Vec<DailyUsage> = days.into_values().collect();
    let mut summary = UsageSummary {
        days: history.len() as i64,
        ..Default::default()
    };
    for day in &history {
        if day.requests > 0 {
            summary.active_days += 1;
        }
        summary.total_requests += day.requests;
        summary.total_tokens += day.tokens;
        summary.total_cost += day.cost;
        summary.total_actual_cost += day.actual_cost;
    }
    if summary.days > 0 {
        summary.avg_daily_cost = summary.total_cost / summary.days as f64;
    }

    let mut models: Vec<ModelUsage> = models.into_values().collect();
    models.sort_by(|a, b| b.cost.total_cmp(&a.cost));

    AccountUsageStatsResponse {
        history,
        summary,
        models,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{AccountType, Platform};
    use crate::clock::ManualClock;
    use crate::subscription::SubscriptionService;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 8, 10, 0, 0).unwrap()
    }

    fn store() -> (MemoryStore, ManualClock) {
        let clock = ManualClock::new(now());
        (MemoryStore::with_clock(Arc::new(clock.clone())), clock)
    }

    fn log(account_id: i64, model: &str, cost: f64, at: DateTime<Utc>) -> UsageLog {
        UsageLog {
            account_id,
            model: model.to_string(),
            tokens: 100,
            cost,
            actual_cost: cost * 0.5,
            created_at: at,
        }
    }

    #[tokio::test]
    async fn test_list_active_skips_disabled() {
        let (store, _) = store();
        store.put_account(Account::new(1, Platform::Antigravity, AccountType::OAuth));
        let mut disabled = Account::new(2, Platform::Antigravity, AccountType::OAuth);
        disabled.status = crate::account::AccountStatus::Disabled;
        store.put_account(disabled);

        let active = store.list_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, 1);
    }

    #[tokio::test]
    async fn test_update_unknown_account_fails() {
        let (store, _) = store();
        let err = store
            .update(&Account::new(9, Platform::Anthropic, AccountType::OAuth))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AccountNotFound(9)));
    }

    #[tokio::test]
    async fn test_subscription_flow_through_service() {
        let (store, clock) = store();
        let store = Arc::new(store);
        store.put_subscription(UserSubscription::new(1, 10, 20, now(), now() + Duration::days(30)));
        let svc = SubscriptionService::with_clock(store.clone(), Arc::new(clock.clone()));

        let mut sub = svc.get_active(10, 20).await.unwrap();
        svc.prepare_windows(&mut sub).await.unwrap();
        svc.record_usage(sub.id, 1.25).await.unwrap();
        svc.record_usage(sub.id, 0.75).await.unwrap();

        let stored = SubscriptionRepository::get_by_id(&*store, 1).await.unwrap();
        assert_eq!(stored.daily_window_start, Some(now()));
        assert_eq!(stored.daily_usage_usd, 2.0);
        assert_eq!(stored.monthly_usage_usd, 2.0);

        clock.advance(Duration::days(1));
        let mut sub = svc.get_active(10, 20).await.unwrap();
        svc.prepare_windows(&mut sub).await.unwrap();
        let stored = SubscriptionRepository::get_by_id(&*store, 1).await.unwrap();
        assert_eq!(stored.daily_usage_usd, 0.0);
        assert_eq!(stored.weekly_usage_usd, 2.0);
        assert_eq!(stored, sub);
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let (store, _) = store();
        let store = Arc::new(store);
        store.put_subscription(UserSubscription::new(1, 10, 20, now(), now() + Duration::days(30)));

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.increment_usage(1, 0.5).await })
            })
            .collect();
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let stored = SubscriptionRepository::get_by_id(&*store, 1).await.unwrap();
        assert_eq!(stored.daily_usage_usd, 25.0);
    }

    #[tokio::test]
    async fn test_batch_expiry() {
        let (store, clock) = store();
        store.put_subscription(UserSubscription::new(1, 10, 20, now(), now() + Duration::days(1)));
        store.put_subscription(UserSubscription::new(2, 11, 20, now(), now() + Duration::days(9)));

        clock.advance(Duration::days(2));
        assert_eq!(store.batch_update_expired_status().await.unwrap(), 1);
        assert_eq!(store.batch_update_expired_status().await.unwrap(), 0);

        let expired = SubscriptionRepository::get_by_id(&store, 1).await.unwrap();
        assert_eq!(expired.status, SubscriptionStatus::Expired);
        tokio_test::assert_err!(store.get_active_by_user_and_group(10, 20).await);
    }

    #[tokio::test]
    async fn test_window_and_today_stats() {
        let (store, _) = store();
        store.record_usage_log(log(1, "claude-sonnet", 0.2, now() - Duration::hours(11)));
        store.record_usage_log(log(1, "claude-sonnet", 0.3, now() - Duration::hours(2)));
        store.record_usage_log(log(2, "claude-sonnet", 9.0, now() - Duration::hours(1)));

        let window = store
            .get_account_window_stats(1, now() - Duration::hours(5))
            .await
            .unwrap();
        assert_eq!(window.requests, 1);
        assert_eq!(window.cost, 0.3);

        // 11 hours before 10:00 is yesterday
        let today = store.get_account_today_stats(1).await.unwrap();
        assert_eq!(today.requests, 1);
        assert_eq!(today.tokens, 100);
    }

    #[tokio::test]
    async fn test_usage_stats_fill_every_day() {
        let (store, _) = store();
        let start = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        store.record_usage_log(log(1, "opus", 2.0, start + Duration::hours(3)));
        store.record_usage_log(log(1, "sonnet", 0.5, start + Duration::days(2)));
        store.record_usage_log(log(1, "opus", 1.0, start + Duration::days(2)));

        let stats = store
            .get_account_usage_stats(1, start, start + Duration::days(7))
            .await
            .unwrap();

        assert_eq!(stats.history.len(), 7);
        assert_eq!(stats.history[0].date, "2026-02-01");
        assert_eq!(stats.history[2].requests, 2);
        assert_eq!(stats.summary.days, 7);
        assert_eq!(stats.summary.active_days, 2);
        assert_eq!(stats.summary.total_cost, 3.5);
        assert_eq!(stats.summary.total_actual_cost, 1.75);
        assert_eq!(stats.summary.avg_daily_cost, 0.5);
        assert_eq!(stats.models[0].model, "opus");
        assert_eq!(stats.models[0].requests, 2);
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("store.json");

        let (store, clock) = store();
        store.put_account(
            Account::new(1, Platform::Antigravity, AccountType::OAuth).with_name("ag"),
        );
        store.put_subscription(UserSubscription::new(1, 10, 20, now(), now() + Duration::days(30)));
        store.save(&path).await.unwrap();

        let loaded = MemoryStore::load(&path, Arc::new(clock)).await.unwrap();
        assert_eq!(loaded.snapshot(), store.snapshot());

        let missing = MemoryStore::load(dir.path().join("nope.json"), system_clock())
            .await
            .unwrap();
        assert_eq!(missing.snapshot(), Snapshot::default());
    }
}
