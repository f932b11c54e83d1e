use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{merge_credentials, TokenRefresher};
use crate::account::{credential, Account, AccountType, Credentials, Platform};
use crate::error::{Error, Result};
use crate::ports::OAuthTokenClient;
use crate::proxy::ProxyResolver;

/// Renews Antigravity OAuth tokens through the Google token endpoint
pub struct AntigravityTokenRefresher {
    oauth: Arc<dyn OAuthTokenClient>,
    proxies: Option<ProxyResolver>,
}

impl AntigravityTokenRefresher {
    /// Create a refresher without proxy support
    pub fn new(oauth: Arc<dyn OAuthTokenClient>) -> Self {
        Self {
            oauth,
            proxies: None,
        }
    }

    /// Route token exchanges through the account's proxy
    #[must_use]
    pub fn with_proxy_resolver(mut self, proxies: ProxyResolver) -> Self {
        self.proxies = Some(proxies);
        self
    }
}

#[async_trait]
impl TokenRefresher for AntigravityTokenRefresher {
    fn name(&self) -> &'static str {
        "antigravity"
    }

    fn can_refresh(&self, account: &Account) -> bool {
        account.platform == Platform::Antigravity && account.account_type == AccountType::OAuth
    }

    async fn refresh(&self, account: &Account) -> Result<Credentials> {
        if account.credential(credential::REFRESH_TOKEN).is_none() {
            return Err(Error::MissingCredential(credential::REFRESH_TOKEN));
        }

        let proxy_url = match &self.proxies {
            Some(resolver) => resolver.resolve(account).await,
            None => None,
        };

        let token = self.oauth.refresh_token(account, proxy_url.as_deref()).await?;
        debug!(
            account_id = account.id,
            expires_at = token.expires_at,
            "Antigravity token refreshed"
        );
        Ok(merge_credentials(token.into_credentials(), &account.credentials))
    }
}
