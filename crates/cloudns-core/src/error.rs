//! Error types for the cloudns-sync system
//!
//! This module defines all error types used throughout the crate.

use std::fmt;

use thiserror::Error;

use crate::reconcile::OperationKind;

/// Result type alias for cloudns-sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the cloudns-sync system
#[derive(Error, Debug)]
pub enum Error {
    /// TTL field of a provider record is not a non-negative integer
    #[error("Invalid TTL {0:?}")]
    InvalidTtl(String),

    /// A/AAAA record data is not an IP literal
    #[error("Invalid IP {value:?}: {source}")]
    InvalidAddress {
        /// The offending record data
        value: String,
        /// Underlying parse failure
        #[source]
        source: std::net::AddrParseError,
    },

    /// SRV host does not decompose into `_service._transport.name`
    #[error("Name {name:?} does not have enough components (expected >3, got {components})")]
    InvalidName {
        /// The offending host
        name: String,
        /// Number of dot-separated components found
        components: usize,
    },

    /// Presentation-format record data could not be parsed
    #[error("Invalid {record_type} record data {data:?}: {reason}")]
    InvalidRecordData {
        /// Record type tag
        record_type: String,
        /// The offending data string
        data: String,
        /// What was wrong with it
        reason: String,
    },

    /// HTTP transport or server-side errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Provider-specific error (non-success API status)
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Every attempt of a retried operation failed
    #[error("operation failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Number of attempts made
        attempts: u32,
        /// The last failure
        #[source]
        source: Box<Error>,
    },

    /// The caller cancelled the operation
    #[error("operation cancelled")]
    Cancelled,

    /// Some operations of a set request failed
    #[error(transparent)]
    Partial(#[from] OperationErrors),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// DNS propagation verification failed
    #[error("Propagation check failed: {0}")]
    Propagation(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a propagation error
    pub fn propagation(msg: impl Into<String>) -> Self {
        Self::Propagation(msg.into())
    }

    /// Create a record data parse error
    pub fn invalid_data(
        record_type: impl Into<String>,
        data: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidRecordData {
            record_type: record_type.into(),
            data: data.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error is a local decode failure (never sent to the remote side)
    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            Self::InvalidTtl(_)
                | Self::InvalidAddress { .. }
                | Self::InvalidName { .. }
                | Self::InvalidRecordData { .. }
        )
    }

    /// Whether this error, or the failure it wraps, is a cancellation
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::RetriesExhausted { source, .. } => source.is_cancelled(),
            Self::Partial(errors) => errors.is_cancelled(),
            _ => false,
        }
    }
}

/// One failed operation of a set request
#[derive(Debug)]
pub struct OperationFailure {
    /// What was being attempted
    pub kind: OperationKind,
    /// Host of the record the operation carried
    pub host: String,
    /// Type tag of the record the operation carried
    pub record_type: String,
    /// Why it failed
    pub error: Error,
}

impl fmt::Display for OperationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}: {}",
            self.kind, self.record_type, self.host, self.error
        )
    }
}

/// Aggregated failures of a set request
///
/// Operations are applied independently, so a set request reports every
/// failure it met rather than stopping at the first.
#[derive(Debug, Default)]
pub struct OperationErrors {
    failures: Vec<OperationFailure>,
}

impl OperationErrors {
    /// Create an empty aggregate
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure
    pub fn push(&mut self, failure: OperationFailure) {
        self.failures.push(failure);
    }

    /// The recorded failures, in the order they happened
    pub fn failures(&self) -> &[OperationFailure] {
        &self.failures
    }

    /// Number of recorded failures
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// Whether nothing failed
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Whether one of the failures is a cancellation
    pub fn is_cancelled(&self) -> bool {
        self.failures.iter().any(|failure| failure.error.is_cancelled())
    }

    /// `None` when nothing failed
    pub fn into_option(self) -> Option<Self> {
        if self.is_empty() { None } else { Some(self) }
    }
}

impl fmt::Display for OperationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} operation(s) failed", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "\n  {}", failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for OperationErrors {}
