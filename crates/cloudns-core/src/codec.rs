//! Record codec
//!
//! Converts between the generic [`Record`] and the provider's flat,
//! string-encoded [`ProviderRecord`]. Pure and stateless.
//!
//! ## TTL quantization
//!
//! The provider only accepts a fixed set of TTLs. [`encode`] rounds every TTL
//! up to the next accepted value (see [`ACCEPTED_TTLS`]); anything above two
//! weeks becomes one month. This is lossy on purpose: a record decoded from
//! the provider and re-encoded is byte-identical only if its TTL was already
//! one of the accepted values.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::record::{self, Address, Caa, Cname, Mx, Ns, Record, Rr, Srv, Txt};

/// TTLs accepted by the provider, in seconds, ascending
pub const ACCEPTED_TTLS: [u32; 13] = [
    60,       // 1 minute
    300,      // 5 minutes
    900,      // 15 minutes
    1800,     // 30 minutes
    3600,     // 1 hour
    21600,    // 6 hours
    43200,    // 12 hours
    86400,    // 1 day
    172800,   // 2 days
    259200,   // 3 days
    604800,   // 1 week
    1209600,  // 2 weeks
    2592000,  // 1 month
];

/// Flat record as stored by the provider
///
/// Only the fields relevant to `record_type` are populated; the rest stay at
/// their zero value. `id` is empty until the provider assigns one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProviderRecord {
    /// Provider-assigned identifier
    pub id: String,
    /// Record type tag
    pub record_type: String,
    /// Owner name
    pub host: String,
    /// Generic record data (address, target, text...)
    pub record: String,
    /// TTL in seconds, string-encoded
    pub ttl: String,
    pub caa_flag: u8,
    pub caa_type: String,
    pub caa_value: String,
    pub priority: u16,
    pub port: u16,
    pub weight: u16,
}

impl ProviderRecord {
    /// Content equality, ignoring the identifier
    ///
    /// This is the unit of change detection during reconciliation.
    pub fn content_eq(&self, other: &ProviderRecord) -> bool {
        self.record_type == other.record_type
            && self.host == other.host
            && self.record == other.record
            && self.ttl == other.ttl
            && self.caa_flag == other.caa_flag
            && self.caa_type == other.caa_type
            && self.caa_value == other.caa_value
            && self.priority == other.priority
            && self.port == other.port
            && self.weight == other.weight
    }

    /// The same record under another identifier
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// Round a TTL up to the next value the provider accepts
///
/// Sub-second precision is truncated first.
pub fn quantize_ttl(ttl: Duration) -> u32 {
    let secs = ttl.as_secs();
    ACCEPTED_TTLS
        .iter()
        .copied()
        .find(|&accepted| secs <= u64::from(accepted))
        .unwrap_or(ACCEPTED_TTLS[ACCEPTED_TTLS.len() - 1])
}

/// Translate a provider record into a generic record
///
/// Unknown types decode to [`Record::Raw`] with type and data preserved.
pub fn decode(flat: &ProviderRecord) -> Result<Record> {
    let secs: u64 = flat
        .ttl
        .parse()
        .map_err(|_| Error::InvalidTtl(flat.ttl.clone()))?;
    let ttl = Duration::from_secs(secs);
    let name = flat.host.clone();

    let record = match flat.record_type.as_str() {
        "A" | "AAAA" => Record::Address(Address {
            name,
            ttl,
            ip: record::parse_ip(&flat.record)?,
        }),
        "CAA" => Record::Caa(Caa {
            name,
            ttl,
            flags: flat.caa_flag,
            tag: flat.caa_type.clone(),
            value: flat.caa_value.clone(),
        }),
        "CNAME" => Record::Cname(Cname {
            name,
            ttl,
            target: flat.record.clone(),
        }),
        "MX" => Record::Mx(Mx {
            name,
            ttl,
            preference: flat.priority,
            target: flat.record.clone(),
        }),
        "NS" => Record::Ns(Ns {
            name,
            ttl,
            target: flat.record.clone(),
        }),
        "SRV" => {
            let (service, transport, name) = record::split_srv_host(&flat.host)?;
            Record::Srv(Srv {
                service,
                transport,
                name,
                ttl,
                priority: flat.priority,
                weight: flat.weight,
                port: flat.port,
                target: flat.record.clone(),
            })
        }
        "TXT" => Record::Txt(Txt {
            name,
            ttl,
            text: flat.record.clone(),
        }),
        _ => Record::Raw(Rr {
            name,
            record_type: flat.record_type.clone(),
            ttl,
            data: flat.record.clone(),
        }),
    };

    Ok(record)
}

/// Translate a generic record into a provider record carrying `id`
///
/// Pass an empty `id` for records the provider has not seen yet.
pub fn encode(generic: &Record, id: &str) -> ProviderRecord {
    let base = ProviderRecord {
        id: id.to_string(),
        record_type: generic.record_type().to_string(),
        ttl: quantize_ttl(generic.ttl()).to_string(),
        ..ProviderRecord::default()
    };

    match generic {
        Record::Address(a) => ProviderRecord {
            host: a.name.clone(),
            record: a.ip.to_string(),
            ..base
        },
        Record::Caa(c) => ProviderRecord {
            host: c.name.clone(),
            caa_flag: c.flags,
            caa_type: c.tag.clone(),
            caa_value: c.value.clone(),
            ..base
        },
        Record::Cname(Cname { name, target, .. }) | Record::Ns(Ns { name, target, .. }) => {
            ProviderRecord {
                host: name.clone(),
                record: target.clone(),
                ..base
            }
        }
        Record::Mx(m) => ProviderRecord {
            host: m.name.clone(),
            priority: m.preference,
            record: m.target.clone(),
            ..base
        },
        Record::Srv(s) => ProviderRecord {
            host: record::srv_host(&s.service, &s.transport, &s.name),
            priority: s.priority,
            weight: s.weight,
            port: s.port,
            record: s.target.clone(),
            ..base
        },
        Record::Txt(t) => ProviderRecord {
            host: t.name.clone(),
            record: t.text.clone(),
            ..base
        },
        Record::Raw(rr) => ProviderRecord {
            host: rr.name.clone(),
            record: rr.data.clone(),
            ..base
        },
    }
}
