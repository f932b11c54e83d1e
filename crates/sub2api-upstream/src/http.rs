//! Shared reqwest plumbing: one client per outbound proxy, status handling

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};

/// Longest response body kept in error messages
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Lazily built clients keyed by proxy URL
pub struct HttpClients {
    timeout: Duration,
    direct: Client,
    proxied: DashMap<String, Client>,
}

impl HttpClients {
    /// Create the direct client; proxied ones are built on first use
    pub fn new(timeout: Duration) -> Result<Self> {
        let direct = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Build(e.to_string()))?;
        Ok(Self {
            timeout,
            direct,
            proxied: DashMap::new(),
        })
    }

    /// Client routing through `proxy_url`, or the direct client
    pub fn get(&self, proxy_url: Option<&str>) -> Result<Client> {
        let Some(url) = proxy_url.filter(|u| !u.is_empty()) else {
            return Ok(self.direct.clone());
        };
        if let Some(client) = self.proxied.get(url) {
            return Ok(client.clone());
        }

        let proxy = reqwest::Proxy::all(url).map_err(|e| Error::Build(e.to_string()))?;
        let client = Client::builder()
            .timeout(self.timeout)
            .proxy(proxy)
            .build()
            .map_err(|e| Error::Build(e.to_string()))?;
        debug!("Built proxied HTTP client");
        self.proxied.insert(url.to_string(), client.clone());
        Ok(client)
    }
}

/// Send, require a 2xx status and decode the JSON body
pub async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
    let resp = request.send().await?;
    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        return Err(Error::Api {
            status: status.as_u16(),
            body: truncate(&body, MAX_ERROR_BODY_CHARS),
        });
    }
    serde_json::from_str(&body).map_err(|e| Error::InvalidResponse(e.to_string()))
}

/// `now + expires_in` as Unix seconds; rejects negative or overflowing lifetimes
pub fn absolute_expiry(now: DateTime<Utc>, expires_in: i64) -> Result<i64> {
    if expires_in < 0 {
        return Err(Error::InvalidResponse(format!("negative expires_in: {expires_in}")));
    }
    now.timestamp()
        .checked_add(expires_in)
        .ok_or_else(|| Error::InvalidResponse(format!("expires_in out of range: {expires_in}")))
}

/// Cut at a char boundary
pub(crate) fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_expiry_bounds() {
        let now = DateTime::from_timestamp(1_770_544_800, 0).unwrap();
        assert_eq!(absolute_expiry(now, 3600).unwrap(), 1_770_548_400);
        assert!(absolute_expiry(now, i64::MAX).is_err());
        assert!(absolute_expiry(now, -5).is_err());
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("配额已用尽请稍后", 4), "配额已用...");
    }

    #[test]
    fn test_proxied_clients_are_reused() {
        let clients = HttpClients::new(Duration::from_secs(5)).unwrap();
        clients.get(Some("http://127.0.0.1:8080")).unwrap();
        clients.get(Some("http://127.0.0.1:8080")).unwrap();
        clients.get(None).unwrap();
        clients.get(Some("")).unwrap();
        assert_eq!(clients.proxied.len(), 1);
    }

    #[test]
    fn test_bad_proxy_url_is_build_error() {
        let clients = HttpClients::new(Duration::from_secs(5)).unwrap();
        assert!(matches!(clients.get(Some("::not a url::")), Err(Error::Build(_))));
    }
}
