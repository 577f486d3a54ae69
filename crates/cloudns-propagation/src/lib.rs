//! DNS propagation checks
//!
//! Polls a fixed set of public resolvers until a record becomes visible.
//! Used after a sync to confirm that the provider's authoritative servers
//! have published the change.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use cloudns_core::{Error, Result};
use hickory_resolver::{
    TokioResolver,
    config::{NameServerConfigGroup, ResolverConfig, ResolverOpts},
    name_server::TokioConnectionProvider,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Public resolvers queried when no explicit list is given
/// (Google, Cloudflare, Quad9, OpenDNS)
pub const DEFAULT_SERVERS: [IpAddr; 4] = [
    IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)),
    IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1)),
    IpAddr::V4(Ipv4Addr::new(9, 9, 9, 9)),
    IpAddr::V4(Ipv4Addr::new(208, 67, 222, 222)),
];

const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Checks record visibility against a list of recursive resolvers
#[derive(Debug, Clone)]
pub struct PropagationChecker {
    servers: Vec<IpAddr>,
}

impl PropagationChecker {
    pub fn new() -> Self {
        Self::with_servers(DEFAULT_SERVERS.to_vec())
    }

    pub fn with_servers(servers: Vec<IpAddr>) -> Self {
        Self { servers }
    }

    pub fn servers(&self) -> &[IpAddr] {
        &self.servers
    }

    /// Wait until `fqdn` is visible on at least one resolver
    ///
    /// A TXT record counts as propagated when one of its strings equals
    /// `expected`. Any other type counts as propagated as soon as the name
    /// resolves to an address.
    ///
    /// Every configured resolver is tried on each attempt, then the check
    /// sleeps for `interval`. After `max_attempts` rounds the last observed
    /// failure is returned inside [`Error::RetriesExhausted`].
    ///
    /// # Errors
    ///
    /// - [`Error::Cancelled`] as soon as `cancel` fires
    /// - [`Error::RetriesExhausted`] when no resolver confirms the record
    pub async fn verify(
        &self,
        fqdn: &str,
        record_type: &str,
        expected: &str,
        max_attempts: u32,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let attempts = max_attempts.max(1);
        let mut last_error = Error::propagation(format!("{} {} not found", record_type, fqdn));

        for attempt in 1..=attempts {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            // no resolver cache carried between rounds
            for server in &self.servers {
                let resolver = build_resolver(*server);
                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    outcome = query(&resolver, fqdn, record_type, expected) => outcome,
                };

                match outcome {
                    Ok(()) => {
                        info!(
                            "{} {} visible on {} after {} attempt(s)",
                            record_type, fqdn, server, attempt
                        );
                        return Ok(());
                    }
                    Err(e) => {
                        debug!("{} {} not yet visible on {}: {}", record_type, fqdn, server, e);
                        last_error = e;
                    }
                }
            }

            if attempt < attempts {
                warn!(
                    "{} {} not propagated (attempt {}/{}), retrying in {:?}",
                    record_type, fqdn, attempt, attempts, interval
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        }

        Err(Error::RetriesExhausted {
            attempts,
            source: Box::new(last_error),
        })
    }
}

impl Default for PropagationChecker {
    fn default() -> Self {
        Self::new()
    }
}

fn build_resolver(server: IpAddr) -> TokioResolver {
    let config = ResolverConfig::from_parts(
        None,
        vec![],
        NameServerConfigGroup::from_ips_clear(&[server], 53, true),
    );
    let mut opts = ResolverOpts::default();
    opts.timeout = QUERY_TIMEOUT;
    opts.attempts = 1;

    TokioResolver::builder_with_config(config, TokioConnectionProvider::default())
        .with_options(opts)
        .build()
}

async fn query(resolver: &TokioResolver, fqdn: &str, record_type: &str, expected: &str) -> Result<()> {
    if record_type.eq_ignore_ascii_case("TXT") {
        let response = resolver
            .txt_lookup(fqdn)
            .await
            .map_err(|e| Error::propagation(e.to_string()))?;

        let found = response.iter().any(|txt| {
            let text: String = txt
                .iter()
                .map(|data| String::from_utf8_lossy(data).to_string())
                .collect();
            text == expected
        });

        if found {
            Ok(())
        } else {
            Err(Error::propagation(format!(
                "TXT record found but value doesn't match: expected {}",
                expected
            )))
        }
    } else {
        let response = resolver
            .lookup_ip(fqdn)
            .await
            .map_err(|e| Error::propagation(e.to_string()))?;

        if response.iter().next().is_some() {
            Ok(())
        } else {
            Err(Error::propagation(format!("{} resolved to no address", fqdn)))
        }
    }
}
