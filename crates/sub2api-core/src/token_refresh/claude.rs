use async_trait::async_trait;
use std::sync::Arc;

use super::{merge_credentials, TokenRefresher};
use crate::account::{credential, Account, AccountType, Credentials, Platform};
use crate::error::{Error, Result};
use crate::ports::OAuthTokenClient;
use crate::proxy::ProxyResolver;

/// Renews Anthropic OAuth and setup-token credentials
pub struct ClaudeTokenRefresher {
    oauth: Arc<dyn OAuthTokenClient>,
    proxies: Option<ProxyResolver>,
}

impl ClaudeTokenRefresher {
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
impl TokenRefresher for ClaudeTokenRefresher {
    fn name(&self) -> &'static str {
        "claude"
    }

    fn can_refresh(&self, account: &Account) -> bool {
        account.platform == Platform::Anthropic
            && matches!(
                account.account_type,
                AccountType::OAuth | AccountType::SetupToken
            )
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
        Ok(merge_credentials(token.into_credentials(), &account.credentials))
    }
}
