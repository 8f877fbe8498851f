//! Field coercion for raw upstream values. Every helper is a pure
//! transformation: it either produces a typed value or a `ValidationError`
//! naming the offending field, and never touches the store.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use data_encoding::HEXLOWER_PERMISSIVE;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("field '{field}': {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self { field, reason: reason.into() }
    }
}

/// Decode a hash field into raw bytes. Accepts a hex string (upper or lower
/// case) or an already-raw byte array; anything else is a type error.
pub fn hash_bytes(field: &'static str, value: Option<&Value>) -> Result<Option<Vec<u8>>, ValidationError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            if s.is_empty() {
                return Ok(None);
            }
            HEXLOWER_PERMISSIVE
                .decode(s.as_bytes())
                .map(Some)
                .map_err(|_| ValidationError::new(field, format!("invalid hex: {:?}", s)))
        }
        Some(Value::Array(items)) => {
            let mut bytes = Vec::with_capacity(items.len());
            for item in items {
                let b = item
                    .as_u64()
                    .filter(|&b| b <= 255)
                    .ok_or_else(|| ValidationError::new(field, "byte array element out of range"))?;
                bytes.push(b as u8);
            }
            Ok(Some(bytes))
        }
        Some(other) => Err(ValidationError::new(
            field,
            format!("expected hex string or bytes, got {}", json_type_name(other)),
        )),
    }
}

/// Re-encode stored hash bytes as lowercase hex.
pub fn hex_lower(bytes: &[u8]) -> String {
    HEXLOWER_PERMISSIVE.encode(bytes)
}

/// An identity field must be a strictly positive integer.
pub fn positive_id(field: &'static str, value: i64) -> Result<i64, ValidationError> {
    if value > 0 {
        Ok(value)
    } else {
        Err(ValidationError::new(field, format!("must be positive, got {}", value)))
    }
}

pub fn non_negative(field: &'static str, value: i64) -> Result<i64, ValidationError> {
    if value >= 0 {
        Ok(value)
    } else {
        Err(ValidationError::new(field, format!("must be >= 0, got {}", value)))
    }
}

pub fn non_empty(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::new(field, "must not be empty"))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Parse a required timestamp into an absolute instant.
pub fn timestamp(field: &'static str, value: &str) -> Result<DateTime<Utc>, ValidationError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ValidationError::new(field, format!("invalid timestamp {:?}: {}", value, e)))
}

pub fn optional_timestamp(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<DateTime<Utc>>, ValidationError> {
    match value {
        None => Ok(None),
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => timestamp(field, s).map(Some),
    }
}

pub fn agent_uuid(field: &'static str, value: &str) -> Result<Uuid, ValidationError> {
    Uuid::parse_str(value)
        .map_err(|e| ValidationError::new(field, format!("invalid UUID {:?}: {}", value, e)))
}

/// Normalize an IP address to its canonical textual form, checking the
/// address family against the field it came from.
pub fn normalize_ip(
    field: &'static str,
    value: Option<&str>,
    want_v6: bool,
) -> Result<Option<String>, ValidationError> {
    let Some(raw) = value.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let addr: IpAddr = raw
        .parse()
        .map_err(|_| ValidationError::new(field, format!("invalid IP address {:?}", raw)))?;
    match (addr, want_v6) {
        (IpAddr::V4(_), true) => Err(ValidationError::new(field, "expected an IPv6 address")),
        (IpAddr::V6(_), false) => Err(ValidationError::new(field, "expected an IPv4 address")),
        _ => Ok(Some(addr.to_string())),
    }
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hash_bytes_lowercase_hex() {
        let v = json!("deadbeef");
        let out = hash_bytes("sha1", Some(&v)).unwrap().unwrap();
        assert_eq!(out, vec![0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn test_hash_bytes_uppercase_hex() {
        let v = json!("DEADBEEF");
        let out = hash_bytes("sha1", Some(&v)).unwrap().unwrap();
        assert_eq!(out, vec![0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn test_hash_bytes_round_trip_case_insensitive() {
        let v = json!("A1B2C3D4E5F6");
        let out = hash_bytes("md5", Some(&v)).unwrap().unwrap();
        assert_eq!(hex_lower(&out), "a1b2c3d4e5f6");
    }

    #[test]
    fn test_hash_bytes_invalid_hex_is_hard_failure() {
        let v = json!("not-hex");
        let err = hash_bytes("sha256", Some(&v)).unwrap_err();
        assert_eq!(err.field, "sha256");
        assert!(err.reason.contains("invalid hex"));
    }

    #[test]
    fn test_hash_bytes_absent_and_null_are_none() {
        assert_eq!(hash_bytes("md5", None).unwrap(), None);
        assert_eq!(hash_bytes("md5", Some(&Value::Null)).unwrap(), None);
        assert_eq!(hash_bytes("md5", Some(&json!(""))).unwrap(), None);
    }

    #[test]
    fn test_hash_bytes_raw_passthrough() {
        let v = json!([222, 173, 190, 239]);
        let out = hash_bytes("sha1", Some(&v)).unwrap().unwrap();
        assert_eq!(out, vec![0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn test_hash_bytes_wrong_type() {
        let v = json!(42);
        let err = hash_bytes("sha1", Some(&v)).unwrap_err();
        assert!(err.reason.contains("number"));
    }

    #[test]
    fn test_positive_id_rejects_zero_and_negative() {
        assert!(positive_id("threat_id", 0).is_err());
        assert!(positive_id("threat_id", -5).is_err());
        assert_eq!(positive_id("threat_id", 9).unwrap(), 9);
    }

    #[test]
    fn test_timestamp_parses_rfc3339() {
        let dt = timestamp("created_at", "2025-06-01T12:30:00Z").unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-06-01T12:30:00+00:00");
    }

    #[test]
    fn test_timestamp_with_fraction_and_offset() {
        assert!(timestamp("created_at", "2025-06-01T12:30:00.123456Z").is_ok());
        assert!(timestamp("created_at", "2025-06-01T14:30:00+02:00").is_ok());
        assert!(timestamp("created_at", "yesterday").is_err());
    }

    #[test]
    fn test_optional_timestamp_absent() {
        assert_eq!(optional_timestamp("scan_started_at", None).unwrap(), None);
        assert_eq!(optional_timestamp("scan_started_at", Some("")).unwrap(), None);
    }

    #[test]
    fn test_normalize_ip_v4() {
        let out = normalize_ip("ip_v4", Some("10.0.0.1"), false).unwrap();
        assert_eq!(out.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn test_normalize_ip_v6_canonical_form() {
        let out = normalize_ip("ip_v6", Some("2001:0db8:0000:0000:0000:0000:0000:0001"), true).unwrap();
        assert_eq!(out.as_deref(), Some("2001:db8::1"));
    }

    #[test]
    fn test_normalize_ip_family_mismatch() {
        assert!(normalize_ip("ip_v4", Some("::1"), false).is_err());
        assert!(normalize_ip("ip_v6", Some("10.0.0.1"), true).is_err());
    }

    #[test]
    fn test_normalize_ip_garbage() {
        assert!(normalize_ip("ip_v4", Some("999.1.1.1"), false).is_err());
    }

    #[test]
    fn test_non_empty_trims() {
        assert_eq!(non_empty("name", "  Acme  ").unwrap(), "Acme");
        assert!(non_empty("name", "   ").is_err());
    }
}
