//! Configuration types for cloudns-sync
//!
//! Defaults live here, at the boundary, and are applied whenever a value is
//! absent or zero. Nothing downstream reads process-wide state.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default ClouDNS API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.cloudns.net/dns/";

/// Main sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Remote provider configuration
    pub provider: ProviderConfig,

    /// Retry settings applied to every remote call
    #[serde(default)]
    pub retry: RetryConfig,
}

impl SyncConfig {
    /// Create a configuration for the given provider with default retries
    pub fn new(provider: ProviderConfig) -> Self {
        Self {
            provider,
            retry: RetryConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.provider.validate()?;
        self.retry.validate()?;
        Ok(())
    }
}

/// Remote provider configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// ClouDNS HTTP API
    Cloudns {
        /// Main account auth id
        #[serde(default)]
        auth_id: String,

        /// Sub-user auth id, preferred over `auth_id` when set
        #[serde(default)]
        sub_auth_id: String,

        /// API password
        auth_password: String,

        /// API endpoint, trailing slash included
        #[serde(default = "default_base_url")]
        base_url: String,

        /// HTTP request timeout in seconds
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

impl ProviderConfig {
    /// ClouDNS configuration with default endpoint and timeout
    pub fn cloudns(
        auth_id: impl Into<String>,
        sub_auth_id: impl Into<String>,
        auth_password: impl Into<String>,
    ) -> Self {
        ProviderConfig::Cloudns {
            auth_id: auth_id.into(),
            sub_auth_id: sub_auth_id.into(),
            auth_password: auth_password.into(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Validate the provider configuration
    pub fn validate(&self) -> Result<()> {
        match self {
            ProviderConfig::Cloudns {
                auth_id,
                sub_auth_id,
                auth_password,
                base_url,
                ..
            } => {
                if auth_id.is_empty() && sub_auth_id.is_empty() {
                    return Err(Error::config(
                        "ClouDNS auth_id or sub_auth_id must be set",
                    ));
                }
                if auth_password.is_empty() {
                    return Err(Error::config("ClouDNS auth_password cannot be empty"));
                }
                if !base_url.starts_with("https://") && !base_url.starts_with("http://") {
                    return Err(Error::config(format!(
                        "ClouDNS base_url must use HTTP or HTTPS scheme. Got: {}",
                        base_url
                    )));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Cloudns { .. } => "cloudns",
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderConfig::Cloudns {
                auth_id,
                sub_auth_id,
                base_url,
                timeout_secs,
                ..
            } => f
                .debug_struct("Cloudns")
                .field("auth_id", auth_id)
                .field("sub_auth_id", sub_auth_id)
                .field("auth_password", &"<redacted>")
                .field("base_url", base_url)
                .field("timeout_secs", timeout_secs)
                .finish(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Retry settings for remote calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per remote call, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Wait after the first failure (in milliseconds)
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound for any single wait (in milliseconds)
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl RetryConfig {
    /// Attempt budget, zero meaning the default
    pub fn attempts(&self) -> u32 {
        if self.max_attempts == 0 {
            default_max_attempts()
        } else {
            self.max_attempts
        }
    }

    /// First backoff, zero meaning the default
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(non_zero_or(self.initial_backoff_ms, default_initial_backoff_ms()))
    }

    /// Backoff cap, zero meaning the default
    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(non_zero_or(self.max_backoff_ms, default_max_backoff_ms()))
    }

    /// Validate the retry configuration
    pub fn validate(&self) -> Result<()> {
        if self.initial_backoff() > self.max_backoff() {
            return Err(Error::config(format!(
                "initial backoff ({:?}) exceeds max backoff ({:?})",
                self.initial_backoff(),
                self.max_backoff()
            )));
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn non_zero_or(value: u64, default: u64) -> u64 {
    if value == 0 { default } else { value }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}
