//! Error types for sub2api-core

use thiserror::Error;

use crate::account::AccountType;
use crate::subscription::UsageWindow;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Account does not exist
    #[error("account not found: {0}")]
    AccountNotFound(i64),

    /// Proxy does not exist
    #[error("proxy not found: {0}")]
    ProxyNotFound(i64),

    /// Subscription does not exist
    #[error("subscription not found: {0}")]
    SubscriptionNotFound(i64),

    /// The account type cannot answer usage queries
    #[error("account type {account_type} does not support usage query")]
    UnsupportedUsageQuery {
        /// Type of the offending account
        account_type: AccountType,
    },

    /// A credential required for the operation is absent
    #[error("no {0} available")]
    MissingCredential(&'static str),

    /// Upstream provider returned an error
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Network/connection error
    #[error("network error: {0}")]
    Network(String),

    /// Persistence layer error
    #[error("repository error: {0}")]
    Repository(String),

    /// Invalid configuration
    #[error("invalid configuration: {field}: {message}")]
    InvalidConfig {
        /// Config field name
        field: String,
        /// Detailed message
        message: String,
    },

    /// A subscription usage window would be exceeded
    #[error("{window} usage limit exceeded")]
    UsageLimitExceeded {
        /// First window found over its limit
        window: UsageWindow,
    },

    /// The subscription is not active (status or expiry)
    #[error("subscription {0} is not active")]
    SubscriptionInactive(i64),

    /// Cost values must be finite and non-negative
    #[error("invalid cost: {0}")]
    InvalidCost(f64),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Error with added context from the request path
    #[error("{context}: {source}")]
    Context {
        /// What was being attempted
        context: &'static str,
        /// Underlying error
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap this error with a short description of the failed step.
    #[must_use]
    pub fn context(self, context: &'static str) -> Self {
        Error::Context {
            context,
            source: Box::new(self),
        }
    }

    /// Innermost error, skipping any context wrappers.
    #[must_use]
    pub fn root(&self) -> &Error {
        match self {
            Error::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_usage_message() {
        let err = Error::UnsupportedUsageQuery {
            account_type: AccountType::ApiKey,
        };
        assert_eq!(
            err.to_string(),
            "account type api_key does not support usage query"
        );
    }

    #[test]
    fn test_context_wraps_and_unwraps() {
        let err = Error::AccountNotFound(7).context("get account failed");
        assert_eq!(err.to_string(), "get account failed: account not found: 7");
        assert!(matches!(err.root(), Error::AccountNotFound(7)));
    }

    #[test]
    fn test_limit_exceeded_names_window() {
        let err = Error::UsageLimitExceeded {
            window: UsageWindow::Weekly,
        };
        assert_eq!(err.to_string(), "weekly usage limit exceeded");
    }
}
