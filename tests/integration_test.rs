//! Integration tests for sub2api
//!
//! These tests wire the core services to the in-memory store the way the
//! binary does, with scripted upstreams in place of the HTTP clients:
//! - token refresh writes merged credentials back to the store
//! - quota refresh records per-model quota on Antigravity accounts
//! - subscription windows activate, accumulate and reset over time
//! - account usage combines provider windows with local usage logs

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use sub2api_core::account::credential;
use sub2api_core::ports::{
    AccountRepository, AntigravityApi, ClaudeUsageFetcher, OAuthTokenClient, ProxyRepository,
};
use sub2api_core::upstream::{
    ClaudeUsageResponse, FetchAvailableModelsResponse, LoadCodeAssistResponse, ModelInfo,
    QuotaInfo, TierInfo, TokenInfo, UsageWindowResponse,
};
use sub2api_core::{
    Account, AccountType, AccountUsageService, AntigravityQuotaRefresher,
    AntigravityTokenRefresher, ClaudeTokenRefresher, Error, Group, ManualClock, MemoryStore,
    Platform, Proxy, ProxyResolver, RetryPolicy, SharedClock, SubscriptionService,
    TokenRefreshConfig, TokenRefreshService, TokenRefresher, UsageCacheConfig, UsageLog,
    UsageWindow, UserSubscription,
};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 8, 10, 0, 0).unwrap()
}

fn setup() -> (ManualClock, SharedClock, Arc<MemoryStore>) {
    let clock = ManualClock::new(start());
    let shared: SharedClock = Arc::new(clock.clone());
    let store = Arc::new(MemoryStore::with_clock(shared.clone()));
    (clock, shared, store)
}

fn oauth_account(id: i64, platform: Platform, expires_in: Duration) -> Account {
    Account::new(id, platform, AccountType::OAuth)
        .with_name(format!("account-{id}"))
        .with_credential(credential::ACCESS_TOKEN, format!("at-{id}"))
        .with_credential(credential::REFRESH_TOKEN, format!("rt-{id}"))
        .with_credential(
            credential::EXPIRES_AT,
            (start() + expires_in).timestamp().to_string(),
        )
}

async fn load_account(store: &MemoryStore, id: i64) -> Account {
    AccountRepository::get_by_id(store, id).await.unwrap()
}

// ============================================================================
// Scripted upstreams
// ============================================================================

#[derive(Default)]
struct ScriptedOAuth {
    calls: AtomicU32,
    proxies: std::sync::Mutex<Vec<Option<String>>>,
}

#[async_trait]
impl OAuthTokenClient for ScriptedOAuth {
    async fn refresh_token(
        &self,
        account: &Account,
        proxy_url: Option<&str>,
    ) -> sub2api_core::Result<TokenInfo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.proxies
            .lock()
            .unwrap()
            .push(proxy_url.map(str::to_string));
        Ok(TokenInfo {
            access_token: format!("fresh-{}", account.id),
            expires_at: (start() + Duration::hours(1)).timestamp(),
            token_type: Some("Bearer".to_string()),
            ..Default::default()
        })
    }
}

struct ScriptedCloudCode;

#[async_trait]
impl AntigravityApi for ScriptedCloudCode {
    async fn load_code_assist(
        &self,
        _access_token: &str,
        _proxy_url: Option<&str>,
    ) -> sub2api_core::Result<LoadCodeAssistResponse> {
        Ok(LoadCodeAssistResponse {
            current_tier: Some(TierInfo {
                id: Some("free-tier".to_string()),
                name: None,
            }),
            ..Default::default()
        })
    }

    async fn fetch_available_models(
        &self,
        _access_token: &str,
        _project_id: &str,
        _proxy_url: Option<&str>,
    ) -> sub2api_core::Result<FetchAvailableModelsResponse> {
        let mut models = HashMap::new();
        models.insert(
            "gemini-2.5-pro".to_string(),
            ModelInfo {
                quota_info: Some(QuotaInfo {
                    remaining_fraction: 0.42,
                    reset_time: "2026-02-08T15:30:00Z".to_string(),
                }),
            },
        );
        models.insert("chat_20706".to_string(), ModelInfo { quota_info: None });
        Ok(FetchAvailableModelsResponse { models })
    }
}

#[derive(Default)]
struct ScriptedUsage {
    calls: AtomicU32,
}

#[async_trait]
impl ClaudeUsageFetcher for ScriptedUsage {
    async fn fetch_usage(
        &self,
        _access_token: &str,
        _proxy_url: Option<&str>,
    ) -> sub2api_core::Result<ClaudeUsageResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ClaudeUsageResponse {
            five_hour: Some(UsageWindowResponse {
                utilization: 37.5,
                resets_at: Some("2026-02-08T12:00:00Z".to_string()),
            }),
            seven_day: Some(UsageWindowResponse {
                utilization: 12.0,
                resets_at: Some("2026-02-12T00:00:00.000Z".to_string()),
            }),
            seven_day_sonnet: None,
        })
    }
}

// ============================================================================
// Token refresh
// ============================================================================

#[tokio::test]
async fn test_token_refresh_cycle_persists_merged_credentials() {
    let (_clock, shared, store) = setup();
    store.put_proxy(Proxy {
        id: 7,
        name: "egress".to_string(),
        protocol: "socks5".to_string(),
        host: "10.0.0.7".to_string(),
        port: 1080,
        username: None,
        password: None,
        status: "active".to_string(),
    });

    let mut expiring = oauth_account(1, Platform::Antigravity, Duration::minutes(10));
    expiring.proxy_id = Some(7);
    expiring
        .credentials
        .insert(credential::PROJECT_ID.to_string(), "bamboo-precept".to_string());
    store.put_account(expiring);
    store.put_account(oauth_account(2, Platform::Anthropic, Duration::days(2)));
    store.put_account(Account::new(3, Platform::OpenAi, AccountType::ApiKey));

    let oauth = Arc::new(ScriptedOAuth::default());
    let proxy_repo: Arc<dyn ProxyRepository> = store.clone();
    let proxies = ProxyResolver::new(proxy_repo);
    let refreshers: Vec<Arc<dyn TokenRefresher>> = vec![
        Arc::new(AntigravityTokenRefresher::new(oauth.clone()).with_proxy_resolver(proxies.clone())),
        Arc::new(ClaudeTokenRefresher::new(oauth.clone()).with_proxy_resolver(proxies)),
    ];
    let service = TokenRefreshService::with_clock(
        store.clone(),
        refreshers,
        TokenRefreshConfig::default(),
        shared,
    )
    .with_retry_policy(RetryPolicy::default().with_initial_delay(std::time::Duration::ZERO));

    let summary = service.refresh_once().await;
    assert_eq!(summary.total, 2);
    assert_eq!(summary.refreshed, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(oauth.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        oauth.proxies.lock().unwrap().as_slice(),
        &[Some("socks5://10.0.0.7:1080".to_string())]
    );

    let refreshed = load_account(&store, 1).await;
    assert_eq!(refreshed.credential(credential::ACCESS_TOKEN), Some("fresh-1"));
    // Keys the refresh did not return survive the merge
    assert_eq!(refreshed.credential(credential::REFRESH_TOKEN), Some("rt-1"));
    assert_eq!(refreshed.credential(credential::PROJECT_ID), Some("bamboo-precept"));

    let untouched = load_account(&store, 2).await;
    assert_eq!(untouched.credential(credential::ACCESS_TOKEN), Some("at-2"));
}

// ============================================================================
// Quota refresh
// ============================================================================

#[tokio::test]
async fn test_quota_refresh_records_quota_and_survives_snapshot() {
    let (_clock, shared, store) = setup();
    store.put_account(
        oauth_account(1, Platform::Antigravity, Duration::hours(1))
            .with_credential(credential::PROJECT_ID, "bamboo-precept"),
    );
    // Token expires inside the five-minute margin
    store.put_account(
        oauth_account(2, Platform::Antigravity, Duration::minutes(2))
            .with_credential(credential::PROJECT_ID, "other-project"),
    );

    let proxy_repo: Arc<dyn ProxyRepository> = store.clone();
    let refresher = AntigravityQuotaRefresher::with_clock(
        store.clone(),
        ProxyResolver::new(proxy_repo),
        Arc::new(ScriptedCloudCode),
        &TokenRefreshConfig::default(),
        shared.clone(),
    );

    let summary = refresher.refresh_once().await;
    assert_eq!(summary.refreshed, 1);
    assert_eq!(summary.skipped, 1);

    let account = load_account(&store, 1).await;
    let quota = account.extra.quota.as_ref().unwrap();
    assert_eq!(quota.len(), 1);
    assert_eq!(quota["gemini-2.5-pro"].remaining, 42);
    assert_eq!(account.extra.tier.as_deref(), Some("free-tier"));
    assert_eq!(
        account.extra.last_quota_check.as_deref(),
        Some("2026-02-08T10:00:00Z")
    );
    assert!(load_account(&store, 2).await.extra.quota.is_none());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("store.json");
    store.save(&path).await.unwrap();
    let reloaded = MemoryStore::load(&path, shared).await.unwrap();
    assert_eq!(reloaded.snapshot(), store.snapshot());
}

// ============================================================================
// Subscriptions
// ============================================================================

#[tokio::test]
async fn test_subscription_windows_over_two_days() {
    let (clock, shared, store) = setup();
    store.put_subscription(UserSubscription::new(
        11,
        100,
        5,
        start(),
        start() + Duration::days(30),
    ));
    let group = Group {
        id: 5,
        name: "pro".to_string(),
        daily_limit_usd: Some(10.0),
        weekly_limit_usd: Some(50.0),
        monthly_limit_usd: None,
    };
    let service = SubscriptionService::with_clock(store.clone(), shared);

    // First request activates every window
    let mut sub = service.get_active(100, 5).await.unwrap();
    service.prepare_windows(&mut sub).await.unwrap();
    assert!(sub.is_window_activated());
    service.check_limits(&sub, &group, 9.0).unwrap();
    service.record_usage_local(&mut sub, 9.0).await.unwrap();

    let err = service.check_limits(&sub, &group, 1.5).unwrap_err();
    assert!(matches!(
        err,
        Error::UsageLimitExceeded {
            window: UsageWindow::Daily
        }
    ));
    // Exactly at the limit is allowed
    service.check_limits(&sub, &group, 1.0).unwrap();

    // A day later only the daily window rolls over
    clock.advance(Duration::hours(24));
    let mut sub = service.get_active(100, 5).await.unwrap();
    service.prepare_windows(&mut sub).await.unwrap();
    assert_eq!(sub.usage(UsageWindow::Daily), 0.0);
    assert_eq!(sub.usage(UsageWindow::Weekly), 9.0);
    assert_eq!(sub.window_start(UsageWindow::Daily), Some(start() + Duration::hours(24)));
    assert_eq!(sub.window_start(UsageWindow::Weekly), Some(start()));

    let stored = store.snapshot().subscriptions.remove(0);
    assert_eq!(stored.daily_usage_usd, 0.0);
    assert_eq!(stored.weekly_usage_usd, 9.0);

    assert!(matches!(
        service.record_usage(11, f64::NAN).await,
        Err(Error::InvalidCost(_))
    ));
}

#[tokio::test]
async fn test_expiry_sweep_hides_subscription() {
    let (clock, shared, store) = setup();
    store.put_subscription(UserSubscription::new(
        12,
        200,
        5,
        start(),
        start() + Duration::days(1),
    ));
    let service = SubscriptionService::with_clock(store.clone(), shared);

    assert_eq!(service.expire_overdue().await.unwrap(), 0);
    clock.advance(Duration::days(1));
    assert_eq!(service.expire_overdue().await.unwrap(), 1);
    assert!(service.get_active(200, 5).await.is_err());
}

// ============================================================================
// Account usage
// ============================================================================

#[tokio::test]
async fn test_usage_combines_provider_windows_with_local_logs() {
    let (clock, shared, store) = setup();
    let mut account = oauth_account(1, Platform::Anthropic, Duration::hours(8));
    account.session_window_start = Some(start() - Duration::hours(2));
    store.put_account(account);

    for (minutes_ago, cost) in [(30, 0.25), (90, 0.5), (300, 4.0)] {
        store.record_usage_log(UsageLog {
            account_id: 1,
            model: "claude-sonnet-4-5".to_string(),
            tokens: 1_000,
            cost,
            actual_cost: cost,
            created_at: start() - Duration::minutes(minutes_ago),
        });
    }

    let fetcher = Arc::new(ScriptedUsage::default());
    let proxy_repo: Arc<dyn ProxyRepository> = store.clone();
    let service = AccountUsageService::with_clock(
        store.clone(),
        store.clone(),
        fetcher.clone(),
        ProxyResolver::new(proxy_repo),
        &UsageCacheConfig::default(),
        shared,
    );

    let usage = service.get_usage(1).await.unwrap();
    let five_hour = usage.five_hour.as_ref().unwrap();
    assert_eq!(five_hour.utilization, 37.5);
    assert_eq!(five_hour.remaining_seconds, 7_200);
    // Only logs since the session window started count
    let stats = five_hour.window_stats.as_ref().unwrap();
    assert_eq!(stats.requests, 2);
    assert_eq!(stats.cost, 0.75);

    // Served from cache inside the TTL
    clock.advance(Duration::minutes(5));
    let again = service.get_usage(1).await.unwrap();
    assert!(Arc::ptr_eq(&usage, &again));
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

    let json = serde_json::to_value(usage.as_ref()).unwrap();
    assert!(json.get("seven_day_sonnet").is_none());
    assert_eq!(json["seven_day"]["utilization"], 12.0);
}
