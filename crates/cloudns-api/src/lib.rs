// # ClouDNS API Client
//
// This crate provides the ClouDNS implementation of `RemoteZone` for the
// cloudns-sync system.
//
// ## Behavior
//
// - One HTTP request per trait call
// - No retry, backoff or caching; the `SyncEngine` owns retries
// - HTTP timeout configured (30 seconds by default)
// - Specific error mapping for HTTP status codes (401/403, 404, 429, 5xx)
// - Non-`Success` API statuses surface as provider errors
//
// ## Security Requirements
//
// - The auth password NEVER appears in logs, errors or `Debug` output
// - Request URLs carry credentials as query parameters, so they are never
//   logged and are stripped from transport errors
//
// ## API Reference
//
// - ClouDNS API: https://www.cloudns.net/wiki/article/41/
// - List records: GET `records.json?domain-name=...`
// - Add record: POST `add-record.json?domain-name=...&record-type=...&host=...`
// - Modify record: POST `mod-record.json?domain-name=...&record-id=...`
// - Delete record: POST `delete-record.json?domain-name=...&record-id=...`

pub mod types;

use async_trait::async_trait;
use cloudns_core::config::{DEFAULT_BASE_URL, ProviderConfig};
use cloudns_core::{Error, ProviderRecord, RemoteZone, Result};
use reqwest::{Method, StatusCode, Url};
use serde_json::Value;
use std::time::Duration;

use crate::types::{StatusResponse, parse_listing, record_params};

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// User agent sent with every request
const USER_AGENT: &str = concat!("cloudns-sync/", env!("CARGO_PKG_VERSION"));

const PROVIDER: &str = "cloudns";

/// Account identity used for authentication
#[derive(Clone, PartialEq, Eq)]
enum Identity {
    /// Main account, sent as `auth-id`
    Main(String),
    /// Sub-user, sent as `sub-auth-id`
    Sub(String),
}

/// ClouDNS HTTP API client
///
/// Stateless apart from its HTTP connection pool.
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the password.
pub struct ClouDnsClient {
    identity: Identity,

    /// API password
    /// ⚠️ NEVER log this value
    auth_password: String,

    /// Endpoint root, always ending in a slash
    base_url: Url,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the password
impl std::fmt::Debug for ClouDnsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (kind, id) = match &self.identity {
            Identity::Main(id) => ("auth_id", id),
            Identity::Sub(id) => ("sub_auth_id", id),
        };
        f.debug_struct("ClouDnsClient")
            .field(kind, id)
            .field("auth_password", &"<REDACTED>")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

impl ClouDnsClient {
    /// Create a client against the public ClouDNS endpoint
    ///
    /// `sub_auth_id` takes precedence over `auth_id` when non-empty.
    pub fn new(
        auth_id: impl Into<String>,
        sub_auth_id: impl Into<String>,
        auth_password: impl Into<String>,
    ) -> Result<Self> {
        Self::with_options(
            auth_id,
            sub_auth_id,
            auth_password,
            DEFAULT_BASE_URL,
            DEFAULT_HTTP_TIMEOUT,
        )
    }

    /// Create a client from provider configuration
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        config.validate()?;
        match config {
            ProviderConfig::Cloudns {
                auth_id,
                sub_auth_id,
                auth_password,
                base_url,
                timeout_secs,
            } => {
                let timeout = if *timeout_secs == 0 {
                    DEFAULT_HTTP_TIMEOUT
                } else {
                    Duration::from_secs(*timeout_secs)
                };
                Self::with_options(
                    auth_id.as_str(),
                    sub_auth_id.as_str(),
                    auth_password.as_str(),
                    base_url,
                    timeout,
                )
            }
        }
    }

    /// Create a client with an explicit endpoint and timeout
    pub fn with_options(
        auth_id: impl Into<String>,
        sub_auth_id: impl Into<String>,
        auth_password: impl Into<String>,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let auth_id = auth_id.into();
        let sub_auth_id = sub_auth_id.into();
        let auth_password = auth_password.into();

        let identity = match (auth_id.is_empty(), sub_auth_id.is_empty()) {
            (_, false) => Identity::Sub(sub_auth_id),
            (false, true) => Identity::Main(auth_id),
            (true, true) => {
                return Err(Error::config("ClouDNS auth_id or sub_auth_id must be set"));
            }
        };
        if auth_password.is_empty() {
            return Err(Error::config("ClouDNS auth_password cannot be empty"));
        }

        let base_url = parse_base_url(base_url)?;

        // Build HTTP client with timeout
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            identity,
            auth_password,
            base_url,
            client,
        })
    }

    /// Build the URL for `endpoint` with auth and request parameters
    fn endpoint_url(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Url> {
        let mut url = self
            .base_url
            .join(endpoint)
            .map_err(|e| Error::config(format!("Invalid endpoint {}: {}", endpoint, e)))?;

        {
            let mut query = url.query_pairs_mut();
            match &self.identity {
                Identity::Main(id) => query.append_pair("auth-id", id),
                Identity::Sub(id) => query.append_pair("sub-auth-id", id),
            };
            query.append_pair("auth-password", &self.auth_password);
            for (name, value) in params {
                query.append_pair(name, value);
            }
        }

        Ok(url)
    }

    /// Send one request and return the JSON body of a 2xx response
    async fn send(&self, method: Method, endpoint: &str, params: &[(&str, String)]) -> Result<Value> {
        let url = self.endpoint_url(endpoint, params)?;

        tracing::debug!("{} {}", method, endpoint);

        let response = self
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| Error::http(format!("HTTP request failed: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(endpoint, status, &error_text));
        }

        response
            .json()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse response: {}", e.without_url())))
    }

    /// Send a mutating request and require a `Success` envelope
    async fn send_checked(&self, endpoint: &str, params: &[(&str, String)]) -> Result<StatusResponse> {
        let body = self.send(Method::POST, endpoint, params).await?;
        let envelope: StatusResponse = serde_json::from_value(body)?;
        if !envelope.is_success() {
            return Err(Error::provider(
                PROVIDER,
                format!("{} failed: {}", endpoint, envelope.status_description),
            ));
        }
        Ok(envelope)
    }
}

#[async_trait]
impl RemoteZone for ClouDnsClient {
    async fn fetch_all(&self, zone: &str) -> Result<Vec<ProviderRecord>> {
        let params = [("domain-name", zone.to_string())];
        let body = self.send(Method::GET, "records.json", &params).await?;
        let records = parse_listing(body)?;
        tracing::debug!("Found {} records in zone {}", records.len(), zone);
        Ok(records)
    }

    async fn create(&self, zone: &str, record: &ProviderRecord) -> Result<ProviderRecord> {
        let params = with_zone(zone, record_params(record));
        tracing::info!(
            "Adding {} record {} in {} with value {:?} and TTL {}",
            record.record_type,
            record.host,
            zone,
            record.record,
            record.ttl
        );

        let envelope = self.send_checked("add-record.json", &params).await?;
        let id = envelope
            .record_id()
            .ok_or_else(|| Error::provider(PROVIDER, "add-record.json returned no record id"))?;

        Ok(record.clone().with_id(id))
    }

    async fn update(&self, zone: &str, record: &ProviderRecord) -> Result<ProviderRecord> {
        if record.id.is_empty() {
            return Err(Error::provider(PROVIDER, "cannot update a record without id"));
        }

        let params = with_zone(zone, record_params(record));
        tracing::info!(
            "Updating record {} in {}: {} {} {:?} TTL {}",
            record.id,
            zone,
            record.record_type,
            record.host,
            record.record,
            record.ttl
        );

        self.send_checked("mod-record.json", &params).await?;
        Ok(record.clone())
    }

    async fn delete(&self, zone: &str, id: &str) -> Result<()> {
        let params = [
            ("domain-name", zone.to_string()),
            ("record-id", id.to_string()),
        ];
        tracing::info!("Deleting record {} from {}", id, zone);

        self.send_checked("delete-record.json", &params).await?;
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

fn with_zone(zone: &str, mut params: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
    params.insert(0, ("domain-name", zone.to_string()));
    params
}

fn parse_base_url(base_url: &str) -> Result<Url> {
    let normalized = if base_url.ends_with('/') {
        base_url.to_string()
    } else {
        format!("{}/", base_url)
    };
    Url::parse(&normalized)
        .map_err(|e| Error::config(format!("Invalid ClouDNS base_url {}: {}", base_url, e)))
}

/// Map a non-2xx HTTP status to an error
fn status_error(endpoint: &str, status: StatusCode, error_text: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "Invalid credentials or insufficient permissions. Status: {}",
            status
        )),
        404 => Error::provider(PROVIDER, format!("Endpoint not found: {}", endpoint)),
        429 => Error::rate_limited(format!(
            "Rate limit exceeded. Please retry later. Status: {}",
            status
        )),
        500..=599 => Error::http(format!(
            "ClouDNS server error (transient): {} - {}",
            status, error_text
        )),
        _ => Error::provider(
            PROVIDER,
            format!("{} failed: {} - {}", endpoint, status, error_text),
        ),
    }
}
