//! Sync engine
//!
//! The SyncEngine is responsible for:
//! - Fetching the existing records of a zone via RemoteZone
//! - Grouping and reconciling them against the caller's records
//! - Applying the resulting operations through the retry policy
//! - Translating provider responses back into generic records
//!
//! ## Architecture
//!
//! ```text
//!   caller ──► SyncEngine ──► RemoteZone::fetch_all
//!                  │
//!                  ├── rrset::group (both sides)
//!                  ├── reconcile::reconcile
//!                  │
//!                  └── for each operation, in order:
//!                        retry ──► RemoteZone::{create, update, delete}
//!                                        │
//!                                        └── codec::decode (echo)
//! ```
//!
//! ## Failure policy
//!
//! `set_records` applies every operation independently and reports all
//! failures together in [`SetOutcome`]; there is no rollback. Cancellation
//! stops a set after the operation in flight and is recorded in the outcome
//! next to what was already applied. The other surface operations stop at
//! the first failure and return [`Error::Cancelled`] when cancelled.
//!
//! Raw records of a type with a dedicated variant are parsed before any
//! remote call, so malformed data never reaches the provider.
//!
//! Operations run strictly one after another. Concurrent calls for the same
//! zone race at the provider and must be serialized by the caller.

use std::collections::HashSet;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::codec::{self, ProviderRecord};
use crate::error::{Error, OperationErrors, OperationFailure, Result};
use crate::reconcile::{self, Operation, OperationKind};
use crate::record::Record;
use crate::retry::{self, RetryPolicy};
use crate::rrset::{self, RrsetKey, Rrsets};
use crate::traits::RemoteZone;

/// Result of a set request
///
/// Holds everything that was applied, plus the failures if any operation
/// did not go through.
#[derive(Debug, Default)]
pub struct SetOutcome {
    /// Records created or modified, as echoed by the provider
    pub applied: Vec<Record>,
    /// Provider records that were deleted
    pub removed: Vec<ProviderRecord>,
    /// Failed operations, `None` when everything succeeded
    pub error: Option<OperationErrors>,
}

impl SetOutcome {
    /// Number of operations that went through
    pub fn succeeded(&self) -> usize {
        self.applied.len() + self.removed.len()
    }

    /// Whether every operation succeeded
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// Whether the set was cut short by cancellation
    pub fn is_cancelled(&self) -> bool {
        self.error.as_ref().is_some_and(OperationErrors::is_cancelled)
    }

    /// The applied records, or the aggregated failures
    pub fn into_result(self) -> Result<Vec<Record>> {
        match self.error {
            Some(errors) => Err(Error::Partial(errors)),
            None => Ok(self.applied),
        }
    }
}

/// Core sync engine
///
/// Owns the remote collaborator and the retry policy applied to each of its
/// calls. Holds no DNS state between calls.
pub struct SyncEngine {
    /// Remote record store
    remote: Box<dyn RemoteZone>,

    /// Retry policy for every remote call
    policy: RetryPolicy,
}

impl SyncEngine {
    /// Create a new sync engine
    pub fn new(remote: Box<dyn RemoteZone>, policy: RetryPolicy) -> Self {
        Self { remote, policy }
    }

    /// The retry policy in effect
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Name of the remote provider
    pub fn provider_name(&self) -> &'static str {
        self.remote.provider_name()
    }

    /// List every record of `zone`
    ///
    /// Fails on the first provider record that does not decode.
    pub async fn get_records(&self, zone: &str, cancel: &CancellationToken) -> Result<Vec<Record>> {
        let zone = normalize_zone(zone);
        let existing = self.fetch(zone, cancel).await?;
        debug!("Fetched {} record(s) from {}", existing.len(), zone);

        existing.iter().map(codec::decode).collect()
    }

    /// Create every record in `records`, in order
    ///
    /// Stops at the first failure; records created before it stay in the zone.
    pub async fn append_records(
        &self,
        zone: &str,
        records: &[Record],
        cancel: &CancellationToken,
    ) -> Result<Vec<Record>> {
        let zone = normalize_zone(zone);
        let records = parse_raw(records)?;
        let mut created = Vec::with_capacity(records.len());

        for record in &records {
            let flat = codec::encode(record, "");
            let echoed = retry::retry(&self.policy, cancel, || self.remote.create(zone, &flat))
                .await
                .inspect_err(|e| {
                    error!("Failed to add {} {} to {}: {}", flat.record_type, flat.host, zone, e)
                })?;
            info!("Added {} {} -> {}", echoed.record_type, echoed.host, echoed.record);
            created.push(codec::decode(&echoed)?);
        }

        Ok(created)
    }

    /// Make the RRsets named in `records` hold exactly those records
    ///
    /// RRsets the caller does not mention are left alone. Every operation is
    /// attempted even after a failure; the outcome lists what went through
    /// and what did not. Cancellation skips the remaining operations and is
    /// reported in the outcome. Invalid record data and fetch failures are
    /// returned as errors before anything is changed.
    pub async fn set_records(
        &self,
        zone: &str,
        records: &[Record],
        cancel: &CancellationToken,
    ) -> Result<SetOutcome> {
        let zone = normalize_zone(zone);
        let records = parse_raw(records)?;

        let existing = self.fetch(zone, cancel).await.inspect_err(|e| {
            error!("Could not get records for zone {}: {}", zone, e);
        })?;

        let desired = rrset::group(records);
        let existing = rrset::group(existing);
        let operations = reconcile::reconcile(&desired, &existing);

        info!(
            "Applying {} operation(s) across {} RRset(s) in {}",
            operations.len(),
            desired.len(),
            zone
        );

        let mut outcome = SetOutcome::default();
        let mut failures = OperationErrors::new();

        for operation in &operations {
            debug!("Applying {}", operation);
            match self.apply(zone, operation, cancel).await {
                Ok(Some(record)) => outcome.applied.push(record),
                Ok(None) => outcome.removed.push(operation.record.clone()),
                Err(e) if e.is_cancelled() => {
                    warn!(
                        "Set on {} cancelled after {} of {} operation(s)",
                        zone,
                        outcome.succeeded(),
                        operations.len()
                    );
                    failures.push(OperationFailure {
                        kind: operation.kind,
                        host: operation.record.host.clone(),
                        record_type: operation.record.record_type.clone(),
                        error: Error::Cancelled,
                    });
                    break;
                }
                Err(e) => {
                    error!("Failed to {}: {}", operation, e);
                    failures.push(OperationFailure {
                        kind: operation.kind,
                        host: operation.record.host.clone(),
                        record_type: operation.record.record_type.clone(),
                        error: e,
                    });
                }
            }
        }

        outcome.error = failures.into_option();
        if let Some(errors) = &outcome.error {
            warn!(
                "Set on {} finished with {} failure(s), {} operation(s) applied",
                zone,
                errors.len(),
                outcome.succeeded()
            );
        }

        Ok(outcome)
    }

    /// Delete the records of `zone` matching each target
    ///
    /// A target matches every record in its RRset whose type, TTL and data
    /// equal the target's; an empty type, zero TTL or empty data matches
    /// anything. The zone is fetched again for every target. Stops at the
    /// first failure.
    pub async fn delete_records(
        &self,
        zone: &str,
        targets: &[Record],
        cancel: &CancellationToken,
    ) -> Result<Vec<Record>> {
        let zone = normalize_zone(zone);
        let mut deleted = Vec::new();

        for target in targets {
            let existing = rrset::group(self.fetch(zone, cancel).await?);

            for candidate in candidates(&existing, target) {
                let decoded = codec::decode(candidate)?;
                if !matches_target(target, &decoded) {
                    continue;
                }

                retry::retry(&self.policy, cancel, || self.remote.delete(zone, &candidate.id))
                    .await
                    .inspect_err(|e| {
                        error!("Failed to delete record {}: {}", candidate.host, e)
                    })?;
                info!(
                    "Deleted {} {} (id {})",
                    candidate.record_type, candidate.host, candidate.id
                );
                deleted.push(decoded);
            }
        }

        Ok(deleted)
    }

    async fn fetch(&self, zone: &str, cancel: &CancellationToken) -> Result<Vec<ProviderRecord>> {
        retry::retry(&self.policy, cancel, || self.remote.fetch_all(zone)).await
    }

    /// Apply one operation, returning the echoed record for adds and modifies
    async fn apply(
        &self,
        zone: &str,
        operation: &Operation,
        cancel: &CancellationToken,
    ) -> Result<Option<Record>> {
        let record = &operation.record;
        match operation.kind {
            OperationKind::Add => {
                let echoed =
                    retry::retry(&self.policy, cancel, || self.remote.create(zone, record)).await?;
                codec::decode(&echoed).map(Some)
            }
            OperationKind::Modify => {
                let echoed =
                    retry::retry(&self.policy, cancel, || self.remote.update(zone, record)).await?;
                codec::decode(&echoed).map(Some)
            }
            OperationKind::Delete => {
                retry::retry(&self.policy, cancel, || self.remote.delete(zone, &record.id)).await?;
                Ok(None)
            }
        }
    }
}

/// Parse raw records whose type has a dedicated variant
///
/// Other records are passed through unchanged.
fn parse_raw(records: &[Record]) -> Result<Vec<Record>> {
    records
        .iter()
        .map(|record| match record {
            Record::Raw(rr) => Record::from_rr(rr.clone()),
            typed => Ok(typed.clone()),
        })
        .collect()
}

/// Strip one trailing dot from a zone name
pub fn normalize_zone(zone: &str) -> &str {
    zone.strip_suffix('.').unwrap_or(zone)
}

/// Existing records a delete target may match
///
/// An empty target type widens the search to every RRset of the name.
fn candidates<'a>(
    existing: &'a Rrsets<ProviderRecord>,
    target: &Record,
) -> Vec<&'a ProviderRecord> {
    let rr = target.rr();
    if rr.record_type.is_empty() {
        let mut seen = HashSet::new();
        existing
            .iter()
            .filter(|(key, _)| key.name == rr.name)
            .flat_map(|(_, records)| records.iter())
            .filter(|record| seen.insert(record.id.as_str()))
            .collect()
    } else {
        existing
            .get(&RrsetKey::new(rr.name, rr.record_type))
            .map(|records| records.iter().collect())
            .unwrap_or_default()
    }
}

/// Wildcard match of a delete target against an existing record
pub fn matches_target(target: &Record, existing: &Record) -> bool {
    let target = target.rr();
    let existing = existing.rr();

    if !target.record_type.is_empty() && target.record_type != existing.record_type {
        return false;
    }
    if !target.ttl.is_zero() && target.ttl != existing.ttl {
        return false;
    }
    if !target.data.is_empty() && target.data != existing.data {
        return false;
    }
    true
}
