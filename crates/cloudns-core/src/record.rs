//! Generic DNS record model
//!
//! [`Record`] is a closed sum type over the record kinds the system
//! understands. Every variant reduces to the canonical [`Rr`] quadruple
//! (name, type, TTL, data) through [`Record::rr`], which is what all
//! codec-unaware logic (grouping, delete matching, logging) works with.
//!
//! Canonical data strings:
//!
//! | Variant | name | data |
//! |---------|------|------|
//! | Address | name | IP text |
//! | CAA | name | `flags tag "value"` |
//! | CNAME, NS | name | target |
//! | MX | name | `preference target` |
//! | SRV | `_service._transport.name` | `priority weight port target` |
//! | TXT | name | text |
//! | Raw | name | data, verbatim |

use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Canonical (name, type, TTL, data) form of a record
///
/// Also the payload of [`Record::Raw`], the fallback for types without a
/// dedicated variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rr {
    /// Owner name, relative to the zone
    pub name: String,
    /// Record type tag (e.g. "A", "SSHFP")
    #[serde(rename = "type", default)]
    pub record_type: String,
    /// Time-to-live
    #[serde(with = "ttl_seconds", default)]
    pub ttl: Duration,
    /// Presentation-format record data
    #[serde(default)]
    pub data: String,
}

impl Rr {
    /// Create a canonical record
    pub fn new(
        name: impl Into<String>,
        record_type: impl Into<String>,
        ttl: Duration,
        data: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            record_type: record_type.into(),
            ttl,
            data: data.into(),
        }
    }
}

mod ttl_seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(ttl: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(ttl.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// A or AAAA record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub name: String,
    pub ttl: Duration,
    pub ip: IpAddr,
}

/// Certification Authority Authorization record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caa {
    pub name: String,
    pub ttl: Duration,
    pub flags: u8,
    pub tag: String,
    pub value: String,
}

/// Canonical name record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cname {
    pub name: String,
    pub ttl: Duration,
    pub target: String,
}

/// Mail exchanger record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mx {
    pub name: String,
    pub ttl: Duration,
    pub preference: u16,
    pub target: String,
}

/// Name server record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ns {
    pub name: String,
    pub ttl: Duration,
    pub target: String,
}

/// Service record
///
/// `name` is the owner name without the `_service._transport.` prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Srv {
    pub service: String,
    pub transport: String,
    pub name: String,
    pub ttl: Duration,
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
    pub target: String,
}

/// Text record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Txt {
    pub name: String,
    pub ttl: Duration,
    pub text: String,
}

/// A generic DNS record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Address(Address),
    Caa(Caa),
    Cname(Cname),
    Mx(Mx),
    Ns(Ns),
    Srv(Srv),
    Txt(Txt),
    /// Any type without a dedicated variant, carried verbatim
    Raw(Rr),
}

impl Record {
    /// Reduce the record to its canonical quadruple
    pub fn rr(&self) -> Rr {
        let record_type = self.record_type().to_string();
        match self {
            Record::Address(a) => Rr::new(&a.name, record_type, a.ttl, a.ip.to_string()),
            Record::Caa(c) => Rr::new(
                &c.name,
                record_type,
                c.ttl,
                format!("{} {} {}", c.flags, c.tag, quote(&c.value)),
            ),
            Record::Cname(c) => Rr::new(&c.name, record_type, c.ttl, &c.target),
            Record::Mx(m) => Rr::new(
                &m.name,
                record_type,
                m.ttl,
                format!("{} {}", m.preference, m.target),
            ),
            Record::Ns(n) => Rr::new(&n.name, record_type, n.ttl, &n.target),
            Record::Srv(s) => Rr::new(
                srv_host(&s.service, &s.transport, &s.name),
                record_type,
                s.ttl,
                format!("{} {} {} {}", s.priority, s.weight, s.port, s.target),
            ),
            Record::Txt(t) => Rr::new(&t.name, record_type, t.ttl, &t.text),
            Record::Raw(rr) => rr.clone(),
        }
    }

    /// Record type tag
    ///
    /// Address records report "A" or "AAAA" depending on the IP family.
    pub fn record_type(&self) -> &str {
        match self {
            Record::Address(a) if a.ip.is_ipv4() => "A",
            Record::Address(_) => "AAAA",
            Record::Caa(_) => "CAA",
            Record::Cname(_) => "CNAME",
            Record::Mx(_) => "MX",
            Record::Ns(_) => "NS",
            Record::Srv(_) => "SRV",
            Record::Txt(_) => "TXT",
            Record::Raw(rr) => &rr.record_type,
        }
    }

    /// Time-to-live
    pub fn ttl(&self) -> Duration {
        match self {
            Record::Address(a) => a.ttl,
            Record::Caa(c) => c.ttl,
            Record::Cname(c) => c.ttl,
            Record::Mx(m) => m.ttl,
            Record::Ns(n) => n.ttl,
            Record::Srv(s) => s.ttl,
            Record::Txt(t) => t.ttl,
            Record::Raw(rr) => rr.ttl,
        }
    }

    /// Parse a canonical quadruple into its typed variant
    ///
    /// Types without a dedicated variant become [`Record::Raw`].
    pub fn from_rr(rr: Rr) -> Result<Record> {
        let Rr {
            name,
            record_type,
            ttl,
            data,
        } = rr;
        let record_type = record_type.to_ascii_uppercase();

        let record = match record_type.as_str() {
            "A" | "AAAA" => Record::Address(Address {
                name,
                ttl,
                ip: parse_ip(data.trim())?,
            }),
            "CAA" => {
                let mut fields = data.trim().splitn(3, ' ');
                let (Some(flags), Some(tag), Some(value)) =
                    (fields.next(), fields.next(), fields.next())
                else {
                    return Err(Error::invalid_data("CAA", &data, "expected `flags tag value`"));
                };
                let flags = flags
                    .parse()
                    .map_err(|_| Error::invalid_data("CAA", &data, "flags must be 0-255"))?;
                Record::Caa(Caa {
                    name,
                    ttl,
                    flags,
                    tag: tag.to_string(),
                    value: unquote(value),
                })
            }
            "CNAME" => Record::Cname(Cname {
                name,
                ttl,
                target: data,
            }),
            "MX" => {
                let Some((preference, target)) = data.trim().split_once(' ') else {
                    return Err(Error::invalid_data("MX", &data, "expected `preference target`"));
                };
                let preference = preference
                    .parse()
                    .map_err(|_| Error::invalid_data("MX", &data, "preference must be 0-65535"))?;
                Record::Mx(Mx {
                    name,
                    ttl,
                    preference,
                    target: target.trim().to_string(),
                })
            }
            "NS" => Record::Ns(Ns {
                name,
                ttl,
                target: data,
            }),
            "SRV" => {
                let (service, transport, owner) = split_srv_host(&name)?;
                let fields: Vec<&str> = data.split_whitespace().collect();
                let [priority, weight, port, target] = fields.as_slice() else {
                    return Err(Error::invalid_data(
                        "SRV",
                        &data,
                        "expected `priority weight port target`",
                    ));
                };
                let number = |field: &str| {
                    field
                        .parse::<u16>()
                        .map_err(|_| Error::invalid_data("SRV", &data, format!("{field:?} is not 0-65535")))
                };
                Record::Srv(Srv {
                    service,
                    transport,
                    name: owner,
                    ttl,
                    priority: number(*priority)?,
                    weight: number(*weight)?,
                    port: number(*port)?,
                    target: target.to_string(),
                })
            }
            "TXT" => Record::Txt(Txt {
                name,
                ttl,
                text: data,
            }),
            _ => Record::Raw(Rr {
                name,
                record_type,
                ttl,
                data,
            }),
        };

        Ok(record)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rr = self.rr();
        write!(
            f,
            "{} {} IN {} {}",
            rr.name,
            rr.ttl.as_secs(),
            rr.record_type,
            rr.data
        )
    }
}

pub(crate) fn parse_ip(value: &str) -> Result<IpAddr> {
    value.parse().map_err(|source| Error::InvalidAddress {
        value: value.to_string(),
        source,
    })
}

/// Compose an SRV owner name from its parts
pub(crate) fn srv_host(service: &str, transport: &str, name: &str) -> String {
    format!("_{}._{}.{}", service, transport, name)
}

/// Split `_service._transport.name` into (service, transport, name)
///
/// One leading underscore is stripped from the service and transport labels.
pub(crate) fn split_srv_host(host: &str) -> Result<(String, String, String)> {
    let parts: Vec<&str> = host.splitn(3, '.').collect();
    let [service, transport, name] = parts.as_slice() else {
        return Err(Error::InvalidName {
            name: host.to_string(),
            components: parts.len(),
        });
    };

    Ok((
        service.strip_prefix('_').unwrap_or(*service).to_string(),
        transport.strip_prefix('_').unwrap_or(*transport).to_string(),
        name.to_string(),
    ))
}

fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

fn unquote(value: &str) -> String {
    let Some(inner) = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
    else {
        return value.to_string();
    };

    let mut unquoted = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                unquoted.push(escaped);
            }
        } else {
            unquoted.push(c);
        }
    }
    unquoted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minute() -> Duration {
        Duration::from_secs(60)
    }

    fn one_of_each() -> Vec<Record> {
        vec![
            Record::Address(Address {
                name: "example.com".to_string(),
                ttl: minute(),
                ip: "127.0.0.1".parse().unwrap(),
            }),
            Record::Address(Address {
                name: "example.com".to_string(),
                ttl: minute(),
                ip: "::1".parse().unwrap(),
            }),
            Record::Caa(Caa {
                name: "example.com".to_string(),
                ttl: minute(),
                flags: 0,
                tag: "issue".to_string(),
                value: "letsencrypt.org; \"quoted\"".to_string(),
            }),
            Record::Cname(Cname {
                name: "www".to_string(),
                ttl: minute(),
                target: "example.com".to_string(),
            }),
            Record::Mx(Mx {
                name: "example.com".to_string(),
                ttl: minute(),
                preference: 10,
                target: "mail.example.com".to_string(),
            }),
            Record::Ns(Ns {
                name: "example.com".to_string(),
                ttl: minute(),
                target: "ns1.example.com".to_string(),
            }),
            Record::Srv(Srv {
                service: "http".to_string(),
                transport: "tcp".to_string(),
                name: "foo.example.com".to_string(),
                ttl: minute(),
                priority: 1,
                weight: 5,
                port: 80,
                target: "other.example.com".to_string(),
            }),
            Record::Txt(Txt {
                name: "example.com".to_string(),
                ttl: minute(),
                text: "v=spf1 -all".to_string(),
            }),
            Record::Raw(Rr::new(
                "ssh.example.com",
                "SSHFP",
                minute(),
                "4 1 834B398AFD6CBFD93D06F26D2E23E0BAF6576A9D",
            )),
        ]
    }

    #[test]
    fn test_canonical_form_round_trips_for_every_variant() {
        for record in one_of_each() {
            let parsed = Record::from_rr(record.rr()).unwrap();
            assert_eq!(parsed, record, "round trip of {}", record);
        }
    }

    #[test]
    fn test_srv_canonical_name_carries_service_and_transport() {
        let srv = &one_of_each()[6];
        let rr = srv.rr();
        assert_eq!(rr.name, "_http._tcp.foo.example.com");
        assert_eq!(rr.record_type, "SRV");
        assert_eq!(rr.data, "1 5 80 other.example.com");
    }

    #[test]
    fn test_address_type_follows_ip_family() {
        let records = one_of_each();
        assert_eq!(records[0].record_type(), "A");
        assert_eq!(records[1].record_type(), "AAAA");
    }

    #[test]
    fn test_caa_value_is_quoted() {
        let caa = Record::Caa(Caa {
            name: "example.com".to_string(),
            ttl: minute(),
            flags: 128,
            tag: "iodef".to_string(),
            value: "mailto:a@b.c".to_string(),
        });
        assert_eq!(caa.rr().data, "128 iodef \"mailto:a@b.c\"");
    }

    #[test]
    fn test_srv_name_with_two_components_is_rejected() {
        let err = Record::from_rr(Rr::new("_http._tcp", "SRV", minute(), "1 5 80 target"))
            .unwrap_err();
        assert!(err.to_string().contains("expected >3, got 2"));
    }

    #[test]
    fn test_type_tags_are_case_insensitive() {
        let address = Record::from_rr(Rr::new("www", "a", minute(), "192.0.2.1")).unwrap();
        assert_eq!(address.record_type(), "A");
        assert!(matches!(address, Record::Address(_)));

        let raw = Record::from_rr(Rr::new("ssh", "sshfp", minute(), "4 1 abcd")).unwrap();
        assert_eq!(raw, Record::Raw(Rr::new("ssh", "SSHFP", minute(), "4 1 abcd")));
    }

    #[test]
    fn test_malformed_mx_data_is_rejected() {
        let err = Record::from_rr(Rr::new("example.com", "MX", minute(), "mail.example.com"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRecordData { .. }));
    }

    #[test]
    fn test_rr_deserializes_from_json_with_ttl_seconds() {
        let rr: Rr = serde_json::from_str(
            r#"{"name": "www", "type": "CNAME", "ttl": 300, "data": "example.com"}"#,
        )
        .unwrap();
        assert_eq!(rr.ttl, Duration::from_secs(300));
        assert_eq!(rr.record_type, "CNAME");

        let missing: Rr = serde_json::from_str(r#"{"name": "www"}"#).unwrap();
        assert_eq!(missing.ttl, Duration::ZERO);
        assert!(missing.data.is_empty());
    }
}
