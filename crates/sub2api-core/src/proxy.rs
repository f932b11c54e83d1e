//! Outbound proxy entity and best-effort URL resolution

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::account::Account;
use crate::ports::ProxyRepository;

/// Outbound HTTP/SOCKS proxy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proxy {
    /// Proxy ID
    pub id: i64,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Scheme (`http`, `https`, `socks5`, ...)
    pub protocol: String,
    /// Host name or address
    pub host: String,
    /// Port
    pub port: u16,
    /// Optional user name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Optional password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// `active` or `disabled`
    #[serde(default = "default_status")]
    pub status: String,
}

fn default_status() -> String {
    "active".to_string()
}

impl Proxy {
    /// Proxy URL in `protocol://[user[:pass]@]host:port` form.
    ///
    /// Credentials are percent-encoded. Returns `None` when the parts do
    /// not form a valid URL.
    #[must_use]
    pub fn url(&self) -> Option<String> {
        let mut url = Url::parse(&format!("{}://{}:{}", self.protocol, self.host, self.port)).ok()?;
        if let Some(user) = self.username.as_deref().filter(|u| !u.is_empty()) {
            url.set_username(user).ok()?;
            if let Some(pass) = self.password.as_deref().filter(|p| !p.is_empty()) {
                url.set_password(Some(pass)).ok()?;
            }
        }
        let mut rendered = url.to_string();
        // Url appends a root path for special schemes
        if rendered.ends_with('/') {
            rendered.pop();
        }
        Some(rendered)
    }
}

/// Resolves the proxy URL for an account, degrading to "no proxy" on any
/// lookup failure.
#[derive(Clone)]
pub struct ProxyResolver {
    repo: Arc<dyn ProxyRepository>,
}

impl ProxyResolver {
    /// Create a resolver over a proxy repository
    pub fn new(repo: Arc<dyn ProxyRepository>) -> Self {
        Self { repo }
    }

    /// Proxy URL for the account, preferring a preloaded proxy
    pub async fn resolve(&self, account: &Account) -> Option<String> {
        if let Some(proxy) = &account.proxy {
            return proxy.url();
        }
        let proxy_id = account.proxy_id?;
        match self.repo.get_by_id(proxy_id).await {
            Ok(proxy) => proxy.url(),
            Err(e) => {
                debug!(
                    account_id = account.id,
                    proxy_id,
                    error = %e,
                    "Proxy lookup failed, continuing without proxy"
                );
                None
            }
        }
    }
}
