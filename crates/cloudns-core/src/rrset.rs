//! RRset grouping
//!
//! Indexes a flat list of records, generic or provider-side, by
//! (name, type). Groups keep the insertion order of the source list; nothing
//! is deduplicated or sorted inside a group.

use std::collections::BTreeMap;

use crate::codec::ProviderRecord;
use crate::record::Record;

/// (name, type) pair identifying an RRset
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RrsetKey {
    pub name: String,
    pub record_type: String,
}

impl RrsetKey {
    pub fn new(name: impl Into<String>, record_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            record_type: record_type.into(),
        }
    }
}

/// Records grouped by RRset, keys in sorted order
pub type Rrsets<T> = BTreeMap<RrsetKey, Vec<T>>;

/// Anything that belongs to exactly one RRset
pub trait RrsetMember {
    fn rrset_key(&self) -> RrsetKey;
}

impl RrsetMember for Record {
    fn rrset_key(&self) -> RrsetKey {
        let rr = self.rr();
        RrsetKey::new(rr.name, rr.record_type)
    }
}

impl RrsetMember for ProviderRecord {
    fn rrset_key(&self) -> RrsetKey {
        RrsetKey::new(&self.host, &self.record_type)
    }
}

/// Group records by (name, type)
pub fn group<T: RrsetMember>(records: impl IntoIterator<Item = T>) -> Rrsets<T> {
    let mut groups: Rrsets<T> = BTreeMap::new();
    for record in records {
        groups.entry(record.rrset_key()).or_default().push(record);
    }
    groups
}
