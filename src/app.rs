//! Service wiring shared by the subcommands

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use sub2api_core::ports::{AccountRepository, ProxyRepository, SubscriptionRepository};
use sub2api_core::{
    AccountUsageService, AntigravityQuotaRefresher, AntigravityTokenRefresher,
    ClaudeTokenRefresher, MemoryStore, ProxyResolver, SubscriptionService, TokenRefreshService,
    TokenRefresher,
};
use sub2api_upstream::{AntigravityClient, ClaudeOAuthClient, ClaudeUsageClient, GoogleOAuthClient};

use crate::config::AppConfig;

/// Store plus every service built over it
pub struct App {
    pub config: AppConfig,
    pub store: Arc<MemoryStore>,
    pub token_refresh: TokenRefreshService,
    pub quota_refresh: AntigravityQuotaRefresher,
    pub usage: AccountUsageService,
    pub subscriptions: SubscriptionService,
}

impl App {
    /// Load the store snapshot and build the services
    pub async fn build(config: AppConfig) -> Result<Self> {
        let store = Arc::new(
            MemoryStore::load(&config.store.snapshot_path, sub2api_core::clock::system_clock())
                .await
                .with_context(|| {
                    format!(
                        "Failed to load store snapshot {}",
                        config.store.snapshot_path.display()
                    )
                })?,
        );

        let accounts: Arc<dyn AccountRepository> = store.clone();
        let proxy_repo: Arc<dyn ProxyRepository> = store.clone();
        let subscription_repo: Arc<dyn SubscriptionRepository> = store.clone();
        let proxies = ProxyResolver::new(proxy_repo);

        let upstream = &config.upstream;
        let google = Arc::new(GoogleOAuthClient::new(upstream)?);
        let claude_oauth = Arc::new(ClaudeOAuthClient::new(upstream)?);
        let antigravity = Arc::new(AntigravityClient::new(upstream)?);
        let claude_usage = Arc::new(ClaudeUsageClient::new(upstream)?);

        let refreshers: Vec<Arc<dyn TokenRefresher>> = vec![
            Arc::new(AntigravityTokenRefresher::new(google).with_proxy_resolver(proxies.clone())),
            Arc::new(ClaudeTokenRefresher::new(claude_oauth).with_proxy_resolver(proxies.clone())),
        ];

        let token_refresh =
            TokenRefreshService::new(accounts.clone(), refreshers, config.token_refresh.clone());
        let quota_refresh = AntigravityQuotaRefresher::new(
            accounts.clone(),
            proxies.clone(),
            antigravity,
            &config.token_refresh,
        );
        let usage = AccountUsageService::new(
            accounts,
            store.clone(),
            claude_usage,
            proxies,
            &config.usage_cache,
        );
        let subscriptions = SubscriptionService::new(subscription_repo);

        Ok(Self {
            config,
            store,
            token_refresh,
            quota_refresh,
            usage,
            subscriptions,
        })
    }

    /// Persist the store when configured to
    pub async fn save(&self) -> Result<()> {
        if !self.config.store.save_on_shutdown {
            return Ok(());
        }
        let path = &self.config.store.snapshot_path;
        self.store
            .save(path)
            .await
            .with_context(|| format!("Failed to save store snapshot {}", path.display()))?;
        info!(path = %path.display(), "Store snapshot saved");
        Ok(())
    }

    /// Run both schedulers until Ctrl-C
    pub async fn serve(&self) -> Result<()> {
        if let Err(e) = self.subscriptions.expire_overdue().await {
            warn!(error = %e, "Subscription expiry sweep failed");
        }

        self.token_refresh.start();
        self.quota_refresh.start();
        info!("sub2api background services running, press Ctrl-C to stop");

        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")?;
        info!("Shutdown signal received");

        self.token_refresh.stop().await;
        self.quota_refresh.stop().await;
        self.save().await
    }
}
