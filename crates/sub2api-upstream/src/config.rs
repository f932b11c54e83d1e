//! Upstream endpoint and OAuth client settings

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Endpoints, OAuth clients and HTTP settings for every upstream
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Per-request timeout
    pub timeout_seconds: u64,
    /// User-Agent sent to Cloud Code
    pub antigravity_user_agent: String,
    /// Cloud Code base URL
    pub antigravity_base_url: String,
    /// Google OAuth token endpoint
    pub google_token_url: String,
    /// Google OAuth client id
    pub google_client_id: String,
    /// Google OAuth client secret
    pub google_client_secret: String,
    /// Anthropic API base URL (usage endpoint)
    pub anthropic_base_url: String,
    /// Anthropic OAuth token endpoint
    pub anthropic_token_url: String,
    /// Anthropic OAuth client id
    pub anthropic_client_id: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            antigravity_user_agent: format!(
                "antigravity/1.11.9 {}/{}",
                std::env::consts::OS,
                std::env::consts::ARCH
            ),
            antigravity_base_url: "https://daily-cloudcode-pa.sandbox.googleapis.com".to_string(),
            google_token_url: "https://oauth2.googleapis.com/token".to_string(),
            google_client_id: String::new(),
            google_client_secret: String::new(),
            anthropic_base_url: "https://api.anthropic.com".to_string(),
            anthropic_token_url: "https://console.anthropic.com/v1/oauth/token".to_string(),
            anthropic_client_id: String::new(),
        }
    }
}

// Keep the client secret out of logs
impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("timeout_seconds", &self.timeout_seconds)
            .field("antigravity_user_agent", &self.antigravity_user_agent)
            .field("antigravity_base_url", &self.antigravity_base_url)
            .field("google_token_url", &self.google_token_url)
            .field("google_client_id", &self.google_client_id)
            .field("google_client_secret", &mask(&self.google_client_secret))
            .field("anthropic_base_url", &self.anthropic_base_url)
            .field("anthropic_token_url", &self.anthropic_token_url)
            .field("anthropic_client_id", &self.anthropic_client_id)
            .finish()
    }
}

fn mask(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "****"
    }
}

impl UpstreamConfig {
    /// Request timeout
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.max(1))
    }
}
