//! Common types and helpers shared across models.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// An identifier as it arrives over the wire.
///
/// Clients and legacy records send ids either as JSON strings or as JSON
/// integers. Both are accepted and normalized to the same trimmed string so
/// that `"42"` and `42` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(normalize_id(raw.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RecordIdVisitor;

        impl<'de> serde::de::Visitor<'de> for RecordIdVisitor {
            type Value = RecordId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string or integer id")
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(RecordId::new(v))
            }

            fn visit_string<E: serde::de::Error>(self, v: String) -> Result<Self::Value, E> {
                Ok(RecordId::new(v))
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(RecordId(v.to_string()))
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(RecordId(v.to_string()))
            }
        }

        deserializer.deserialize_any(RecordIdVisitor)
    }
}

/// Canonical string form of an id, used on both sides of every comparison.
pub fn normalize_id(raw: &str) -> String {
    raw.trim().to_string()
}

/// Canonical form of an email address for matching.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Compare two optional emails after normalization. Empty values never match.
pub fn emails_match(a: Option<&str>, b: Option<&str>) -> bool {
    match (a.map(normalize_email), b.map(normalize_email)) {
        (Some(a), Some(b)) => !a.is_empty() && a == b,
        _ => false,
    }
}

/// Distinguish an absent field from an explicit `null` in PATCH-style payloads.
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`.
pub fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Current time as an RFC 3339 string.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_accepts_string_and_integer() {
        let from_str: RecordId = serde_json::from_str("\" 42 \"").unwrap();
        let from_int: RecordId = serde_json::from_str("42").unwrap();
        assert_eq!(from_str, from_int);
        assert_eq!(from_int.as_str(), "42");
    }

    #[test]
    fn test_record_id_serializes_as_string() {
        let id = RecordId::new("e1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"e1\"");
    }

    #[test]
    fn test_emails_match_is_case_insensitive() {
        assert!(emails_match(Some("X@Y.com "), Some("x@y.com")));
        assert!(!emails_match(Some("x@y.com"), Some("z@y.com")));
        assert!(!emails_match(None, Some("x@y.com")));
        assert!(!emails_match(Some(""), Some("")));
    }

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        field: Option<Option<String>>,
    }

    #[test]
    fn test_double_option_distinguishes_null_from_absent() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        let null: Patch = serde_json::from_str(r#"{"field": null}"#).unwrap();
        let set: Patch = serde_json::from_str(r#"{"field": "x"}"#).unwrap();
        assert_eq!(absent.field, None);
        assert_eq!(null.field, Some(None));
        assert_eq!(set.field, Some(Some("x".to_string())));
    }
}
