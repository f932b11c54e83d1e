//! Anthropic OAuth clients: usage windows and token refresh

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use sub2api_core::account::credential;
use sub2api_core::ports::{ClaudeUsageFetcher, OAuthTokenClient};
use sub2api_core::upstream::{ClaudeUsageResponse, TokenInfo};
use sub2api_core::Account;

use crate::config::UpstreamConfig;
use crate::error::Result;
use crate::http::{absolute_expiry, send_json, HttpClients};

/// Beta flag the usage endpoint requires
const OAUTH_BETA: &str = "oauth-2025-04-20";

/// `GET /api/oauth/usage`
pub struct ClaudeUsageClient {
    clients: HttpClients,
    base_url: String,
}

impl ClaudeUsageClient {
    /// Create a client from upstream settings
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        Ok(Self {
            clients: HttpClients::new(config.timeout())?,
            base_url: config.anthropic_base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ClaudeUsageFetcher for ClaudeUsageClient {
    async fn fetch_usage(
        &self,
        access_token: &str,
        proxy_url: Option<&str>,
    ) -> sub2api_core::Result<ClaudeUsageResponse> {
        let client = self.clients.get(proxy_url)?;
        let request = client
            .get(format!("{}/api/oauth/usage", self.base_url))
            .bearer_auth(access_token)
            .header("anthropic-beta", OAUTH_BETA);
        Ok(send_json(request).await?)
    }
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    grant_type: &'static str,
    refresh_token: &'a str,
    client_id: &'a str,
}

/// Anthropic token endpoint response
#[derive(Debug, Deserialize)]
pub struct ClaudeTokenResponse {
    /// New access token
    pub access_token: String,
    /// Rotated refresh token
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds
    #[serde(default)]
    pub expires_in: i64,
    /// Usually `Bearer`
    #[serde(default)]
    pub token_type: Option<String>,
    /// Space separated scopes
    #[serde(default)]
    pub scope: Option<String>,
}

impl ClaudeTokenResponse {
    /// Convert with an absolute expiry
    pub fn into_token_info(self, now: DateTime<Utc>) -> Result<TokenInfo> {
        Ok(TokenInfo {
            expires_at: absolute_expiry(now, self.expires_in)?,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type,
            scope: self.scope,
            project_id: None,
            email: None,
        })
    }
}

/// Refresh-token grant against the Anthropic console
pub struct ClaudeOAuthClient {
    clients: HttpClients,
    token_url: String,
    client_id: String,
}

impl ClaudeOAuthClient {
    /// Create a client from upstream settings
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        Ok(Self {
            clients: HttpClients::new(config.timeout())?,
            token_url: config.anthropic_token_url.clone(),
            client_id: config.anthropic_client_id.clone(),
        })
    }
}

#[async_trait]
impl OAuthTokenClient for ClaudeOAuthClient {
    async fn refresh_token(
        &self,
        account: &Account,
        proxy_url: Option<&str>,
    ) -> sub2api_core::Result<TokenInfo> {
        let refresh_token = account
            .credential(credential::REFRESH_TOKEN)
            .ok_or(sub2api_core::Error::MissingCredential("refresh_token"))?;
        let body = RefreshRequest {
            grant_type: "refresh_token",
            refresh_token,
            client_id: &self.client_id,
        };

        let client = self.clients.get(proxy_url)?;
        let resp: ClaudeTokenResponse =
            send_json(client.post(&self.token_url).json(&body)).await?;
        debug!(account_id = account.id, expires_in = resp.expires_in, "Claude token refreshed");
        Ok(resp.into_token_info(Utc::now())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_token_response_expiry_is_absolute() {
        let now = Utc.with_ymd_and_hms(2026, 2, 8, 10, 0, 0).unwrap();
        let resp: ClaudeTokenResponse = serde_json::from_str(
            r#"{"access_token": "sk-ant-oat01-x", "refresh_token": "sk-ant-ort01-y",
                "expires_in": 28800, "token_type": "Bearer", "scope": "user:inference user:profile"}"#,
        )
        .unwrap();
        let info = resp.into_token_info(now).unwrap();
        assert_eq!(info.expires_at, now.timestamp() + 28800);
        assert_eq!(info.refresh_token.as_deref(), Some("sk-ant-ort01-y"));
        assert_eq!(info.scope.as_deref(), Some("user:inference user:profile"));
    }

    #[test]
    fn test_absurd_lifetime_is_invalid_response() {
        let resp: ClaudeTokenResponse =
            serde_json::from_str(r#"{"access_token": "a", "expires_in": 9223372036854775807}"#)
                .unwrap();
        let err = resp.into_token_info(Utc::now()).unwrap_err();
        assert!(matches!(err, crate::Error::InvalidResponse(_)));
    }

    #[test]
    fn test_refresh_request_shape() {
        let body = RefreshRequest {
            grant_type: "refresh_token",
            refresh_token: "rt",
            client_id: "cid",
        };
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            serde_json::json!({"grant_type": "refresh_token", "refresh_token": "rt", "client_id": "cid"})
        );
    }

    #[tokio::test]
    async fn test_usage_fetch_against_closed_port() {
        let config = UpstreamConfig {
            anthropic_base_url: "http://127.0.0.1:1".to_string(),
            timeout_seconds: 2,
            ..Default::default()
        };
        let client = ClaudeUsageClient::new(&config).unwrap();
        tokio_test::assert_err!(client.fetch_usage("token", None).await);
    }
}
