//! Configuration consumed by the core services
//!
//! These sections are embedded in the application config file and
//! deserialized by the binary; every field has a default.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// Interval used when the configured one is below one minute
const FALLBACK_CHECK_INTERVAL_MINUTES: u64 = 5;

/// Longest accepted refresh interval (one week)
const MAX_CHECK_INTERVAL_MINUTES: i64 = 7 * 24 * 60;

/// Longest accepted usage cache TTL (one day)
const MAX_USAGE_CACHE_TTL_SECONDS: u64 = 24 * 60 * 60;

/// Background token/quota refresh settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenRefreshConfig {
    /// Master switch for both refresh schedulers
    pub enabled: bool,
    /// Minutes between refresh cycles
    pub check_interval_minutes: i64,
    /// Refresh tokens expiring within this many hours
    pub refresh_before_expiry_hours: f64,
    /// Attempts per account and cycle for token renewal
    pub max_retries: u32,
    /// Initial delay between renewal attempts
    pub retry_backoff_seconds: u64,
}

impl Default for TokenRefreshConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_minutes: 5,
            refresh_before_expiry_hours: 0.5,
            max_retries: 3,
            retry_backoff_seconds: 2,
        }
    }
}

impl TokenRefreshConfig {
    /// Tick interval with the misconfiguration floor applied.
    ///
    /// Anything below one minute (including zero or negative values) is
    /// replaced by five minutes.
    #[must_use]
    pub fn effective_check_interval(&self) -> Duration {
        let minutes = if self.check_interval_minutes < 1 {
            FALLBACK_CHECK_INTERVAL_MINUTES
        } else {
            self.check_interval_minutes as u64
        };
        Duration::from_secs(minutes.saturating_mul(60))
    }

    /// Window before expiry in which a token is renewed
    #[must_use]
    pub fn refresh_window(&self) -> chrono::Duration {
        let secs = (self.refresh_before_expiry_hours.max(0.0) * 3600.0) as i64;
        chrono::Duration::try_seconds(secs).unwrap_or(chrono::Duration::MAX)
    }

    /// Validate values that cannot be corrected silently
    pub fn validate(&self) -> Result<()> {
        if !self.refresh_before_expiry_hours.is_finite() {
            return Err(Error::InvalidConfig {
                field: "token_refresh.refresh_before_expiry_hours".to_string(),
                message: "must be a finite number".to_string(),
            });
        }
        if self.check_interval_minutes > MAX_CHECK_INTERVAL_MINUTES {
            return Err(Error::InvalidConfig {
                field: "token_refresh.check_interval_minutes".to_string(),
                message: format!("must be at most {MAX_CHECK_INTERVAL_MINUTES}"),
            });
        }
        if self.max_retries == 0 {
            return Err(Error::InvalidConfig {
                field: "token_refresh.max_retries".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Usage cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageCacheConfig {
    /// Time-to-live of cached OAuth usage results
    pub ttl_seconds: u64,
}

impl Default for UsageCacheConfig {
    fn default() -> Self {
        Self { ttl_seconds: 600 }
    }
}

impl UsageCacheConfig {
    /// TTL as a chrono duration
    #[must_use]
    pub fn ttl(&self) -> chrono::Duration {
        let secs = i64::try_from(self.ttl_seconds).unwrap_or(i64::MAX);
        chrono::Duration::try_seconds(secs).unwrap_or(chrono::Duration::MAX)
    }

    /// Validate the cache settings
    pub fn validate(&self) -> Result<()> {
        if self.ttl_seconds == 0 {
            return Err(Error::InvalidConfig {
                field: "usage_cache.ttl_seconds".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.ttl_seconds > MAX_USAGE_CACHE_TTL_SECONDS {
            return Err(Error::InvalidConfig {
                field: "usage_cache.ttl_seconds".to_string(),
                message: format!("must be at most {MAX_USAGE_CACHE_TTL_SECONDS}"),
            });
        }
        Ok(())
    }
}
