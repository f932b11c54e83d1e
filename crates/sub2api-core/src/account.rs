//! Upstream account model
//!
//! An [`Account`] is one credential set for an upstream provider. Its
//! `extra` metadata used to be a free-form map; it is modelled here as
//! [`AccountExtra`] with the well-known keys as named fields while unknown
//! keys are carried through untouched.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::proxy::Proxy;

/// Credential key names shared by refreshers and clients
pub mod credential {
    /// OAuth access token
    pub const ACCESS_TOKEN: &str = "access_token";
    /// OAuth refresh token
    pub const REFRESH_TOKEN: &str = "refresh_token";
    /// Access token expiry, Unix seconds encoded as a string
    pub const EXPIRES_AT: &str = "expires_at";
    /// Token type (usually `Bearer`)
    pub const TOKEN_TYPE: &str = "token_type";
    /// Granted scopes
    pub const SCOPE: &str = "scope";
    /// Google Cloud project bound to an Antigravity account
    pub const PROJECT_ID: &str = "project_id";
    /// Account e-mail
    pub const EMAIL: &str = "email";
}

/// Credential map (string keys to string values)
pub type Credentials = HashMap<String, String>;

/// Upstream provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Anthropic / Claude
    Anthropic,
    /// OpenAI
    #[serde(rename = "openai")]
    OpenAi,
    /// Google Gemini
    Gemini,
    /// Google Antigravity (Cloud Code)
    Antigravity,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anthropic => write!(f, "anthropic"),
            Self::OpenAi => write!(f, "openai"),
            Self::Gemini => write!(f, "gemini"),
            Self::Antigravity => write!(f, "antigravity"),
        }
    }
}

/// How the account authenticates upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    /// Full OAuth credentials (profile scope, usage API available)
    #[serde(rename = "oauth")]
    OAuth,
    /// Setup token without profile scope
    #[serde(rename = "setup_token")]
    SetupToken,
    /// Plain API key
    #[serde(rename = "api_key")]
    ApiKey,
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OAuth => write!(f, "oauth"),
            Self::SetupToken => write!(f, "setup_token"),
            Self::ApiKey => write!(f, "api_key"),
        }
    }
}

/// Scheduling status of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    /// Eligible for traffic and background refresh
    #[default]
    Active,
    /// Manually disabled
    Disabled,
    /// Disabled after repeated upstream errors
    Error,
}

/// Remaining quota for one upstream model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelQuota {
    /// Remaining percentage (0-100), truncated
    pub remaining: i32,
    /// Upstream reset timestamp, verbatim
    #[serde(default)]
    pub reset_time: String,
}

/// Structured account metadata
///
/// Serialized with the same key names the metadata column has always used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountExtra {
    /// Subscription tier reported by `loadCodeAssist`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    /// Ineligibility reason code (e.g. `INELIGIBLE_ACCOUNT`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ineligible_reason_code: Option<String>,
    /// Human readable ineligibility reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ineligible_reason_message: Option<String>,
    /// Per-model remaining quota
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota: Option<BTreeMap<String, ModelQuota>>,
    /// When quota was last polled (RFC 3339, seconds precision)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_quota_check: Option<String>,
    /// Keys this crate does not interpret
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// One upstream credential set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Account ID
    pub id: i64,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Upstream provider
    pub platform: Platform,
    /// Authentication type
    #[serde(rename = "type")]
    pub account_type: AccountType,
    /// Scheduling status
    #[serde(default)]
    pub status: AccountStatus,
    /// Credential map
    #[serde(default)]
    pub credentials: Credentials,
    /// Structured metadata
    #[serde(default)]
    pub extra: AccountExtra,
    /// Outbound proxy reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_id: Option<i64>,
    /// Proxy preloaded by the repository, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<Proxy>,
    /// Start of the provider session window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_window_start: Option<DateTime<Utc>>,
    /// End of the provider session window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_window_end: Option<DateTime<Utc>>,
    /// Last session window status header (`allowed`, `allowed_warning`, `rejected`)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub session_window_status: String,
}

impl Account {
    /// Create an active account with empty credentials
    pub fn new(id: i64, platform: Platform, account_type: AccountType) -> Self {
        Self {
            id,
            name: String::new(),
            platform,
            account_type,
            status: AccountStatus::Active,
            credentials: Credentials::new(),
            extra: AccountExtra::default(),
            proxy_id: None,
            proxy: None,
            session_window_start: None,
            session_window_end: None,
            session_window_status: String::new(),
        }
    }

    /// Set the display name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Insert a credential
    #[must_use]
    pub fn with_credential(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.credentials.insert(key.into(), value.into());
        self
    }

    /// Credential value; empty strings count as absent
    #[must_use]
    pub fn credential(&self, key: &str) -> Option<&str> {
        self.credentials
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Access token expiry parsed from the `expires_at` credential.
    ///
    /// Returns `None` when the credential is absent or not an integer
    /// number of Unix seconds.
    #[must_use]
    pub fn token_expires_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.credential(credential::EXPIRES_AT)?;
        let secs = raw.trim().parse::<i64>().ok()?;
        Utc.timestamp_opt(secs, 0).single()
    }

    /// Whether the upstream usage API can be queried for this account
    #[must_use]
    pub fn can_query_usage(&self) -> bool {
        self.account_type == AccountType::OAuth
    }

    /// Whether the account is eligible for background work
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_token_expires_at_parsing() {
        let account = Account::new(1, Platform::Antigravity, AccountType::OAuth)
            .with_credential(credential::EXPIRES_AT, "1770564600");
        assert_eq!(account.token_expires_at().unwrap().timestamp(), 1770564600);

        let bad = Account::new(2, Platform::Antigravity, AccountType::OAuth)
            .with_credential(credential::EXPIRES_AT, "tomorrow");
        assert!(bad.token_expires_at().is_none());

        let missing = Account::new(3, Platform::Antigravity, AccountType::OAuth);
        assert!(missing.token_expires_at().is_none());
    }

    #[test]
    fn test_empty_credential_is_absent() {
        let account = Account::new(1, Platform::Anthropic, AccountType::OAuth)
            .with_credential(credential::ACCESS_TOKEN, "");
        assert!(account.credential(credential::ACCESS_TOKEN).is_none());
    }

    #[test]
    fn test_extra_round_trip_keeps_unknown_keys() {
        let stored = json!({
            "tier": "g1-pro-tier",
            "quota": {
                "gemini-2.5-pro": {"remaining": 87, "reset_time": "2026-02-08T15:30:00Z"}
            },
            "last_quota_check": "2026-02-08T10:00:00Z",
            "custom_flag": true,
            "notes": {"owner": "ops"}
        });

        let extra: AccountExtra = serde_json::from_value(stored.clone()).unwrap();
        assert_eq!(extra.tier.as_deref(), Some("g1-pro-tier"));
        assert_eq!(extra.quota.as_ref().unwrap()["gemini-2.5-pro"].remaining, 87);
        assert_eq!(extra.other.get("custom_flag"), Some(&json!(true)));

        let back = serde_json::to_value(&extra).unwrap();
        assert_eq!(back, stored);
    }

    #[test]
    fn test_account_type_wire_names() {
        assert_eq!(
            serde_json::to_value(AccountType::SetupToken).unwrap(),
            json!("setup_token")
        );
        assert_eq!(serde_json::to_value(Platform::OpenAi).unwrap(), json!("openai"));
        let account: Account = serde_json::from_value(json!({
            "id": 9,
            "platform": "antigravity",
            "type": "oauth"
        }))
        .unwrap();
        assert!(account.is_active());
        assert!(account.can_query_usage());
    }
}
