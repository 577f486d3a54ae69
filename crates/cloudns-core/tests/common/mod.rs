//! Test doubles and common utilities for engine contract tests
//!
//! [`MemoryZone`] is an in-memory record store that records every call and
//! can be told to fail specific calls. Clones share all state, so a test can
//! keep a handle while the engine owns another.

#![allow(dead_code)]

use cloudns_core::error::{Error, Result};
use cloudns_core::{ProviderRecord, RemoteZone, RetryPolicy, SyncEngine};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Remote method a failure rule applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    FetchAll,
    Create,
    Update,
    Delete,
}

/// A call observed by the zone, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    FetchAll(String),
    Create(ProviderRecord),
    Update(ProviderRecord),
    Delete(String),
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Call::FetchAll(_))
    }
}

#[derive(Debug)]
struct FailureRule {
    method: Method,
    /// Host (or id, for deletes) the rule is limited to
    target: Option<String>,
    /// Failures left, `None` for always
    remaining: Option<usize>,
}

/// In-memory RemoteZone
#[derive(Clone, Default)]
pub struct MemoryZone {
    records: Arc<Mutex<Vec<ProviderRecord>>>,
    next_id: Arc<AtomicUsize>,
    calls: Arc<Mutex<Vec<Call>>>,
    failures: Arc<Mutex<Vec<FailureRule>>>,
}

impl MemoryZone {
    pub fn new() -> Self {
        Self {
            next_id: Arc::new(AtomicUsize::new(100)),
            ..Self::default()
        }
    }

    /// A zone pre-populated with `records`, ids kept as given
    pub fn with_records(records: Vec<ProviderRecord>) -> Self {
        let zone = Self::new();
        *zone.records.lock().unwrap() = records;
        zone
    }

    /// Make every call of `method` on `target` fail
    pub fn fail_always(&self, method: Method, target: Option<&str>) {
        self.failures.lock().unwrap().push(FailureRule {
            method,
            target: target.map(str::to_string),
            remaining: None,
        });
    }

    /// Make the next `times` calls of `method` on `target` fail
    pub fn fail_times(&self, method: Method, target: Option<&str>, times: usize) {
        self.failures.lock().unwrap().push(FailureRule {
            method,
            target: target.map(str::to_string),
            remaining: Some(times),
        });
    }

    /// Current zone content
    pub fn records(&self) -> Vec<ProviderRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Every call so far
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that change the zone
    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    /// Number of calls of `method`
    pub fn call_count(&self, method: Method) -> usize {
        self.calls()
            .iter()
            .filter(|call| {
                matches!(
                    (call, method),
                    (Call::FetchAll(_), Method::FetchAll)
                        | (Call::Create(_), Method::Create)
                        | (Call::Update(_), Method::Update)
                        | (Call::Delete(_), Method::Delete)
                )
            })
            .count()
    }

    fn record_call(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_failure(&self, method: Method, target: &str) -> Result<()> {
        let mut failures = self.failures.lock().unwrap();
        for rule in failures.iter_mut() {
            if rule.method != method {
                continue;
            }
            if rule.target.as_deref().is_some_and(|t| t != target) {
                continue;
            }
            match rule.remaining {
                None => return Err(Error::http(format!("injected {:?} failure", method))),
                Some(0) => continue,
                Some(ref mut left) => {
                    *left -= 1;
                    return Err(Error::http(format!("injected {:?} failure", method)));
                }
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl RemoteZone for MemoryZone {
    async fn fetch_all(&self, zone: &str) -> Result<Vec<ProviderRecord>> {
        self.record_call(Call::FetchAll(zone.to_string()));
        self.check_failure(Method::FetchAll, zone)?;
        Ok(self.records())
    }

    async fn create(&self, _zone: &str, record: &ProviderRecord) -> Result<ProviderRecord> {
        self.record_call(Call::Create(record.clone()));
        self.check_failure(Method::Create, &record.host)?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        let created = record.clone().with_id(id);
        self.records.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn update(&self, _zone: &str, record: &ProviderRecord) -> Result<ProviderRecord> {
        self.record_call(Call::Update(record.clone()));
        self.check_failure(Method::Update, &record.host)?;

        let mut records = self.records.lock().unwrap();
        let slot = records
            .iter_mut()
            .find(|r| r.id == record.id)
            .ok_or_else(|| Error::provider("memory", format!("no record with id {}", record.id)))?;
        *slot = record.clone();
        Ok(record.clone())
    }

    async fn delete(&self, _zone: &str, id: &str) -> Result<()> {
        self.record_call(Call::Delete(id.to_string()));
        self.check_failure(Method::Delete, id)?;

        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Err(Error::provider("memory", format!("no record with id {}", id)));
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}

/// Flat record with a 60 second TTL
pub fn flat(id: &str, record_type: &str, host: &str, data: &str) -> ProviderRecord {
    ProviderRecord {
        id: id.to_string(),
        record_type: record_type.to_string(),
        host: host.to_string(),
        record: data.to_string(),
        ttl: "60".to_string(),
        ..ProviderRecord::default()
    }
}

/// Retry policy with short waits, for use with paused time
pub fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::from_millis(10), Duration::from_millis(40))
}

/// Engine over a shared handle of `zone`
pub fn engine_for(zone: &MemoryZone, policy: RetryPolicy) -> SyncEngine {
    SyncEngine::new(Box::new(zone.clone()), policy)
}
