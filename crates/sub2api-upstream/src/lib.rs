//! sub2api Upstream - HTTP clients behind the core ports
//!
//! - [`AntigravityClient`]: Cloud Code tier and quota lookups
//! - [`GoogleOAuthClient`]: Google refresh-token grant
//! - [`ClaudeUsageClient`] / [`ClaudeOAuthClient`]: Anthropic usage and refresh
//!
//! Every client routes through the account's proxy when one is given.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod antigravity;
pub mod claude;
pub mod config;
pub mod error;
pub mod google_oauth;
pub mod http;

pub use antigravity::AntigravityClient;
pub use claude::{ClaudeOAuthClient, ClaudeUsageClient};
pub use config::UpstreamConfig;
pub use error::{Error, Result};
pub use google_oauth::GoogleOAuthClient;
