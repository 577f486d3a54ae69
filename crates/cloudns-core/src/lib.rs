// # cloudns-core
//
// Core library for synchronizing DNS records with a ClouDNS zone.
//
// ## Architecture Overview
//
// - **Record**: Generic, type-polymorphic DNS record (A/AAAA, CAA, CNAME, MX, NS, SRV, TXT, raw)
// - **codec**: Translation between `Record` and the provider's flat `ProviderRecord`
// - **rrset**: Grouping of records by (name, type)
// - **reconcile**: Positional RRset diff producing ordered add/modify/delete operations
// - **retry**: Bounded exponential backoff with cancellation
// - **RemoteZone**: Trait for the provider's record store
// - **SyncEngine**: Orchestrates fetch, reconcile and apply for the get/append/set/delete surface
//
// ## Design Principles
//
// 1. **Pure core**: codec, grouping and reconciliation do no I/O and keep no state
// 2. **Sequential apply**: operations run one at a time, deletes first
// 3. **Best effort set**: a failed operation is reported, never rolled back
// 4. **Library-First**: the binary is a thin layer over `SyncEngine`

pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod reconcile;
pub mod record;
pub mod retry;
pub mod rrset;
pub mod traits;

// Re-export core types for convenience
pub use codec::{ProviderRecord, decode, encode, quantize_ttl};
pub use config::{ProviderConfig, RetryConfig, SyncConfig};
pub use engine::{SetOutcome, SyncEngine};
pub use error::{Error, OperationErrors, OperationFailure, Result};
pub use reconcile::{Operation, OperationKind, reconcile};
pub use record::{Address, Caa, Cname, Mx, Ns, Record, Rr, Srv, Txt};
pub use retry::{RetryPolicy, retry};
pub use rrset::{RrsetKey, Rrsets, group};
pub use traits::RemoteZone;
