// # Remote Zone Trait
//
// Defines the interface to the record store of the remote DNS provider.
//
// ## Implementations
//
// - ClouDNS: `cloudns-api` crate
// - Tests: in-memory zone in `tests/common`
//
// ## Usage
//
// ```rust,ignore
// use cloudns_core::RemoteZone;
//
// async fn dump(zone: &dyn RemoteZone) -> cloudns_core::Result<()> {
//     for record in zone.fetch_all("example.com").await? {
//         println!("{} {} {}", record.host, record.record_type, record.record);
//     }
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::codec::ProviderRecord;
use crate::error::Result;

/// Record store of a remote DNS provider
///
/// Each method performs a single remote call. Implementations do not retry,
/// cache, or deduplicate; the [`SyncEngine`](crate::SyncEngine) wraps every
/// call in its retry policy and owns all ordering decisions.
///
/// None of the mutating calls are idempotent on the remote side: creating
/// the same record twice yields two records, and deleting an identifier
/// twice yields an error the second time.
#[async_trait]
pub trait RemoteZone: Send + Sync {
    /// Fetch every record of `zone` in one unpaginated listing
    async fn fetch_all(&self, zone: &str) -> Result<Vec<ProviderRecord>>;

    /// Create a record
    ///
    /// Returns the submitted record carrying the identifier the provider
    /// assigned to it.
    async fn create(&self, zone: &str, record: &ProviderRecord) -> Result<ProviderRecord>;

    /// Overwrite the record identified by `record.id`
    async fn update(&self, zone: &str, record: &ProviderRecord) -> Result<ProviderRecord>;

    /// Remove the record with identifier `id`
    async fn delete(&self, zone: &str, id: &str) -> Result<()>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
