//! ClouDNS API type definitions

use std::fmt::Display;
use std::str::FromStr;

use cloudns_core::{Error, ProviderRecord, Result};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;

// ============ Response envelope ============

/// Status envelope returned by every mutating endpoint
///
/// Also returned by `records.json` when the request itself is rejected.
#[derive(Debug, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(rename = "statusDescription", default)]
    pub status_description: String,
    #[serde(default)]
    pub data: Option<ResponseData>,
}

impl StatusResponse {
    pub fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case("success")
    }

    /// Record id assigned by `add-record.json`
    pub fn record_id(&self) -> Option<&str> {
        self.data
            .as_ref()
            .map(|data| data.id.as_str())
            .filter(|id| !id.is_empty())
    }
}

/// `data` member of the status envelope
#[derive(Debug, Deserialize)]
pub struct ResponseData {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
}

// ============ Records ============

/// A record as listed by `records.json`
///
/// Numeric fields arrive as strings or numbers depending on the record;
/// both are accepted, as is `null` for absent values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(rename = "type", default, deserialize_with = "lenient_string")]
    pub record_type: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub host: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub record: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub ttl: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub caa_flag: u8,
    #[serde(default, deserialize_with = "lenient_string")]
    pub caa_type: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub caa_value: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub priority: u16,
    #[serde(default, deserialize_with = "lenient_number")]
    pub port: u16,
    #[serde(default, deserialize_with = "lenient_number")]
    pub weight: u16,
}

impl From<WireRecord> for ProviderRecord {
    fn from(wire: WireRecord) -> Self {
        ProviderRecord {
            id: wire.id,
            record_type: wire.record_type,
            host: wire.host,
            record: wire.record,
            ttl: wire.ttl,
            caa_flag: wire.caa_flag,
            caa_type: wire.caa_type,
            caa_value: wire.caa_value,
            priority: wire.priority,
            port: wire.port,
            weight: wire.weight,
        }
    }
}

/// Parse the body of `records.json`
///
/// The endpoint answers with an object keyed by record id, an empty array
/// for a zone without records, or a status envelope when the request is
/// rejected. Records are returned in ascending numeric id order, which
/// follows creation order on the provider.
pub fn parse_listing(body: Value) -> Result<Vec<ProviderRecord>> {
    let wire: Vec<WireRecord> = match body {
        Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<_, _>>()?,
        Value::Object(map) if map.get("status").is_some_and(Value::is_string) => {
            let status: StatusResponse = serde_json::from_value(Value::Object(map))?;
            return Err(Error::provider("cloudns", status.status_description));
        }
        Value::Object(map) => map
            .into_iter()
            .map(|(key, value)| -> Result<WireRecord> {
                let mut record: WireRecord = serde_json::from_value(value)?;
                if record.id.is_empty() {
                    record.id = key;
                }
                Ok(record)
            })
            .collect::<Result<_>>()?,
        other => {
            return Err(Error::provider(
                "cloudns",
                format!("unexpected records listing: {}", other),
            ));
        }
    };

    let mut records: Vec<ProviderRecord> = wire.into_iter().map(ProviderRecord::from).collect();
    records.sort_by_key(|record| (record.id.parse::<u64>().unwrap_or(u64::MAX), record.id.clone()));
    Ok(records)
}

// ============ Request parameters ============

/// Query parameters for `add-record.json` and `mod-record.json`
///
/// Only non-zero fields are sent, except that a CAA record always carries
/// its flag.
pub fn record_params(record: &ProviderRecord) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    let mut push = |name: &'static str, value: &str| {
        if !value.is_empty() {
            params.push((name, value.to_string()));
        }
    };

    push("record-id", &record.id);
    push("record-type", &record.record_type);
    push("host", &record.host);
    push("record", &record.record);
    push("ttl", &record.ttl);

    if record.caa_flag != 0 || record.record_type == "CAA" {
        params.push(("caa_flag", record.caa_flag.to_string()));
    }
    if !record.caa_type.is_empty() {
        params.push(("caa_type", record.caa_type.clone()));
    }
    if !record.caa_value.is_empty() {
        params.push(("caa_value", record.caa_value.clone()));
    }
    for (name, value) in [
        ("priority", record.priority),
        ("port", record.port),
        ("weight", record.weight),
    ] {
        if value != 0 {
            params.push((name, value.to_string()));
        }
    }

    params
}

// ============ Lenient field decoding ============

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

fn lenient_number<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Default,
    T::Err: Display,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(T::default()),
        Value::String(s) if s.trim().is_empty() => Ok(T::default()),
        Value::String(s) => s.trim().parse().map_err(de::Error::custom),
        Value::Number(n) => n.to_string().parse().map_err(de::Error::custom),
        other => Err(de::Error::custom(format!("expected a number, got {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_listing_keyed_by_id() {
        let body = json!({
            "12": {"id": "12", "type": "MX", "host": "", "record": "mail.example.com",
                   "ttl": "3600", "priority": "10", "status": 1},
            "3": {"id": 3, "type": "SRV", "host": "_sip._udp", "record": "sip.example.com",
                  "ttl": 60, "priority": 1, "weight": "5", "port": "5060"},
            "7": {"id": "7", "type": "CAA", "host": "", "record": null, "ttl": "300",
                  "caa_flag": "128", "caa_type": "issue", "caa_value": "letsencrypt.org"}
        });

        let records = parse_listing(body).unwrap();

        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["3", "7", "12"]);
        assert_eq!(records[0].port, 5060);
        assert_eq!(records[0].weight, 5);
        assert_eq!(records[0].ttl, "60");
        assert_eq!(records[1].caa_flag, 128);
        assert_eq!(records[1].record, "");
        assert_eq!(records[2].priority, 10);
    }

    #[test]
    fn test_empty_zone_is_an_empty_array() {
        assert!(parse_listing(json!([])).unwrap().is_empty());
    }

    #[test]
    fn test_missing_id_falls_back_to_key() {
        let body = json!({"42": {"type": "A", "host": "www", "record": "192.0.2.1", "ttl": "60"}});
        let records = parse_listing(body).unwrap();
        assert_eq!(records[0].id, "42");
    }

    #[test]
    fn test_rejected_listing_is_a_provider_error() {
        let body = json!({"status": "Failed", "statusDescription": "Invalid authentication, incorrect auth-id or auth-password."});
        let err = parse_listing(body).unwrap_err();
        assert!(matches!(err, Error::Provider { .. }));
        assert!(err.to_string().contains("Invalid authentication"));
    }

    #[test]
    fn test_bad_number_is_a_json_error() {
        let body = json!([{"id": "1", "type": "MX", "priority": "high"}]);
        assert!(matches!(parse_listing(body), Err(Error::Json(_))));
    }

    #[test]
    fn test_status_envelope() {
        let ok: StatusResponse = serde_json::from_value(json!({
            "status": "Success",
            "statusDescription": "The record was added successfully.",
            "data": {"id": 123456}
        }))
        .unwrap();
        assert!(ok.is_success());
        assert_eq!(ok.record_id(), Some("123456"));

        let failed: StatusResponse =
            serde_json::from_value(json!({"status": "Failed", "statusDescription": "nope"})).unwrap();
        assert!(!failed.is_success());
        assert_eq!(failed.record_id(), None);
    }

    #[test]
    fn test_params_skip_zero_fields() {
        let record = ProviderRecord {
            record_type: "MX".to_string(),
            host: "".to_string(),
            record: "mail.example.com".to_string(),
            ttl: "3600".to_string(),
            priority: 10,
            ..ProviderRecord::default()
        };

        assert_eq!(
            record_params(&record),
            vec![
                ("record-type", "MX".to_string()),
                ("record", "mail.example.com".to_string()),
                ("ttl", "3600".to_string()),
                ("priority", "10".to_string()),
            ]
        );
    }

    #[test]
    fn test_params_keep_zero_caa_flag() {
        let record = ProviderRecord {
            id: "9".to_string(),
            record_type: "CAA".to_string(),
            host: "www".to_string(),
            ttl: "60".to_string(),
            caa_type: "issue".to_string(),
            caa_value: "ca.example.net".to_string(),
            ..ProviderRecord::default()
        };

        let params = record_params(&record);
        assert_eq!(params[0], ("record-id", "9".to_string()));
        assert!(params.contains(&("caa_flag", "0".to_string())));
        assert!(params.contains(&("caa_value", "ca.example.net".to_string())));
    }
}
