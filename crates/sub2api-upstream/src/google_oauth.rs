//! Google OAuth refresh for Antigravity accounts

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use sub2api_core::account::credential;
use sub2api_core::ports::OAuthTokenClient;
use sub2api_core::upstream::TokenInfo;
use sub2api_core::Account;

use crate::config::UpstreamConfig;
use crate::error::Result;
use crate::http::{absolute_expiry, send_json, HttpClients};

/// Token endpoint response
#[derive(Debug, Deserialize)]
pub struct GoogleTokenResponse {
    /// New access token
    pub access_token: String,
    /// Lifetime in seconds
    #[serde(default)]
    pub expires_in: i64,
    /// Usually `Bearer`
    #[serde(default)]
    pub token_type: Option<String>,
    /// Google rarely rotates refresh tokens
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Granted scopes
    #[serde(default)]
    pub scope: Option<String>,
}

/// Convert a token response, keeping the previous refresh token when none was issued
pub fn into_token_info(
    resp: GoogleTokenResponse,
    previous_refresh_token: &str,
    now: DateTime<Utc>,
) -> Result<TokenInfo> {
    let refresh_token = resp
        .refresh_token
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| previous_refresh_token.to_string());
    Ok(TokenInfo {
        expires_at: absolute_expiry(now, resp.expires_in)?,
        access_token: resp.access_token,
        refresh_token: Some(refresh_token),
        token_type: resp.token_type,
        scope: resp.scope,
        project_id: None,
        email: None,
    })
}

/// Refresh-token grant against `oauth2.googleapis.com`
pub struct GoogleOAuthClient {
    clients: HttpClients,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl GoogleOAuthClient {
    /// Create a client from upstream settings
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        Ok(Self {
            clients: HttpClients::new(config.timeout())?,
            token_url: config.google_token_url.clone(),
            client_id: config.google_client_id.clone(),
            client_secret: config.google_client_secret.clone(),
        })
    }

    async fn exchange(&self, refresh_token: &str, proxy_url: Option<&str>) -> Result<TokenInfo> {
        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
        ];
        if !self.client_secret.is_empty() {
            form.push(("client_secret", self.client_secret.as_str()));
        }

        let client = self.clients.get(proxy_url)?;
        let resp: GoogleTokenResponse = send_json(client.post(&self.token_url).form(&form)).await?;
        debug!(expires_in = resp.expires_in, "Google token refreshed");
        into_token_info(resp, refresh_token, Utc::now())
    }
}

#[async_trait]
impl OAuthTokenClient for GoogleOAuthClient {
    async fn refresh_token(
        &self,
        account: &Account,
        proxy_url: Option<&str>,
    ) -> sub2api_core::Result<TokenInfo> {
        let refresh_token = account
            .credential(credential::REFRESH_TOKEN)
            .ok_or(sub2api_core::Error::MissingCredential("refresh_token"))?;
        let mut info = self.exchange(refresh_token, proxy_url).await?;
        info.project_id = account.credential(credential::PROJECT_ID).map(str::to_string);
        Ok(info)
    }
}
