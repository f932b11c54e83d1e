//! Upstream response shapes shared between the services and the HTTP clients

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::account::{credential, Credentials};

// ============================================================================
// Antigravity
// ============================================================================

/// Tier descriptor inside `loadCodeAssist`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TierInfo {
    /// Tier identifier (e.g. `free-tier`, `g1-pro-tier`)
    #[serde(default)]
    pub id: Option<String>,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
}

impl TierInfo {
    /// Tier id, `None` when missing or empty
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|s| !s.is_empty())
    }
}

/// Reason the account cannot use a tier
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IneligibleTier {
    /// Machine-readable code (e.g. `INELIGIBLE_ACCOUNT`)
    #[serde(default)]
    pub reason_code: String,
    /// Human readable message
    #[serde(default)]
    pub reason_message: String,
}

/// `v1internal:loadCodeAssist` response
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadCodeAssistResponse {
    /// Project bound to the account
    #[serde(default, rename = "cloudaicompanionProject")]
    pub project_id: Option<String>,
    /// Tier currently in effect
    #[serde(default)]
    pub current_tier: Option<TierInfo>,
    /// Paid tier, when subscribed
    #[serde(default)]
    pub paid_tier: Option<TierInfo>,
    /// Tiers the account is not eligible for
    #[serde(default)]
    pub ineligible_tiers: Vec<IneligibleTier>,
}

impl LoadCodeAssistResponse {
    /// Effective tier id, preferring the paid tier
    #[must_use]
    pub fn tier(&self) -> Option<&str> {
        let paid = self.paid_tier.as_ref().and_then(TierInfo::id);
        paid.or_else(|| self.current_tier.as_ref().and_then(TierInfo::id))
    }
}

/// Quota block of one model
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaInfo {
    /// Remaining share of the quota, 0.0 to 1.0
    #[serde(default)]
    pub remaining_fraction: f64,
    /// When the quota resets, verbatim
    #[serde(default)]
    pub reset_time: String,
}

/// Model entry of `fetchAvailableModels`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    /// Quota, absent for models without metering
    #[serde(default)]
    pub quota_info: Option<QuotaInfo>,
}

/// `v1internal:fetchAvailableModels` response
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FetchAvailableModelsResponse {
    /// Models keyed by name
    #[serde(default)]
    pub models: HashMap<String, ModelInfo>,
}

// ============================================================================
// Anthropic usage
// ============================================================================

/// One window of the Anthropic usage response
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct UsageWindowResponse {
    /// Utilization percentage (100 = 100%)
    #[serde(default)]
    pub utilization: f64,
    /// Reset timestamp as sent upstream
    #[serde(default)]
    pub resets_at: Option<String>,
}

impl UsageWindowResponse {
    /// Reset timestamp, `None` when missing or empty
    #[must_use]
    pub fn resets_at(&self) -> Option<&str> {
        self.resets_at.as_deref().filter(|s| !s.is_empty())
    }
}

/// Anthropic `/api/oauth/usage` response
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ClaudeUsageResponse {
    /// Five-hour session window
    #[serde(default)]
    pub five_hour: Option<UsageWindowResponse>,
    /// Seven-day window
    #[serde(default)]
    pub seven_day: Option<UsageWindowResponse>,
    /// Seven-day Sonnet window
    #[serde(default)]
    pub seven_day_sonnet: Option<UsageWindowResponse>,
}

// ============================================================================
// OAuth
// ============================================================================

/// Result of a token refresh
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TokenInfo {
    /// New access token
    pub access_token: String,
    /// Rotated refresh token, when the provider issued one
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Token type
    #[serde(default)]
    pub token_type: Option<String>,
    /// Absolute expiry in Unix seconds
    pub expires_at: i64,
    /// Granted scopes
    #[serde(default)]
    pub scope: Option<String>,
    /// Project id (Antigravity)
    #[serde(default)]
    pub project_id: Option<String>,
    /// Account e-mail
    #[serde(default)]
    pub email: Option<String>,
}

impl TokenInfo {
    /// Credential map holding only the fields this refresh produced
    #[must_use]
    pub fn into_credentials(self) -> Credentials {
        let mut creds = Credentials::new();
        creds.insert(credential::ACCESS_TOKEN.to_string(), self.access_token);
        creds.insert(credential::EXPIRES_AT.to_string(), self.expires_at.to_string());

        let optional = [
            (credential::REFRESH_TOKEN, self.refresh_token),
            (credential::TOKEN_TYPE, self.token_type),
            (credential::SCOPE, self.scope),
            (credential::PROJECT_ID, self.project_id),
            (credential::EMAIL, self.email),
        ];
        for (key, value) in optional {
            if let Some(v) = value.filter(|v| !v.is_empty()) {
                creds.insert(key.to_string(), v);
            }
        }
        creds
    }
}
