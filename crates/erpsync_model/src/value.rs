//! Field values and remote identifiers.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier assigned to a record by the external system.
///
/// Remote ids are opaque: the external system assigns them and the engine
/// only stores and echoes them back. Numeric ids are kept in their string
/// form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RemoteId(String);

impl RemoteId {
    /// Creates a remote id from its string form.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RemoteId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RemoteId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl From<i64> for RemoteId {
    fn from(id: i64) -> Self {
        Self::new(id.to_string())
    }
}

/// A value attached to a remote field.
///
/// This is the vocabulary the engine moves between the local record and the
/// remote representation. `Reference` is the payload pushed for a
/// relationship-mapped field; `Map` holds the sub-keys of a serialized
/// (blob) attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Explicit null. Pushing null clears the remote field.
    Null,
    /// Text value.
    Text(String),
    /// Integer value.
    Integer(i64),
    /// Floating-point value.
    Float(f64),
    /// Boolean value.
    Boolean(bool),
    /// Calendar date (no time component).
    Date(NaiveDate),
    /// Instant with a fixed UTC offset.
    DateTime(DateTime<FixedOffset>),
    /// Reference to another remote record by its internal id.
    Reference(RemoteId),
    /// String-keyed sub-structure (serialized blob contents).
    Map(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    /// Returns true if the value carries something to transform or compare.
    ///
    /// Null and empty text are absent; transforms are skipped for absent
    /// values and they pass through unchanged.
    #[must_use]
    pub fn is_present(&self) -> bool {
        match self {
            FieldValue::Null => false,
            FieldValue::Text(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Returns the text content, if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer content, if this is an integer value.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the referenced remote id, if this is a reference value.
    #[must_use]
    pub fn as_reference(&self) -> Option<&RemoteId> {
        match self {
            FieldValue::Reference(id) => Some(id),
            _ => None,
        }
    }

    /// Returns the sub-key map, if this is a map value.
    #[must_use]
    pub fn as_map(&self) -> Option<&BTreeMap<String, FieldValue>> {
        match self {
            FieldValue::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.into())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Integer(i)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Boolean(b)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(d: NaiveDate) -> Self {
        FieldValue::Date(d)
    }
}

impl From<DateTime<FixedOffset>> for FieldValue {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        FieldValue::DateTime(dt)
    }
}

impl From<RemoteId> for FieldValue {
    fn from(id: RemoteId) -> Self {
        FieldValue::Reference(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_id_display() {
        let id = RemoteId::from(234);
        assert_eq!(id.as_str(), "234");
        assert_eq!(format!("{id}"), "234");
    }

    #[test]
    fn presence() {
        assert!(!FieldValue::Null.is_present());
        assert!(!FieldValue::Text(String::new()).is_present());
        assert!(FieldValue::Text("x".into()).is_present());
        assert!(FieldValue::Integer(0).is_present());
        assert!(FieldValue::Boolean(false).is_present());
        assert!(FieldValue::Reference(RemoteId::from(1)).is_present());
    }

    #[test]
    fn accessors() {
        let v = FieldValue::from("hello");
        assert_eq!(v.as_text(), Some("hello"));
        assert_eq!(v.as_integer(), None);

        let r = FieldValue::Reference(RemoteId::from(9));
        assert_eq!(r.as_reference().map(RemoteId::as_str), Some("9"));
    }

    #[test]
    fn serde_round_trip() {
        let mut m = BTreeMap::new();
        m.insert("color".to_string(), FieldValue::from("red"));
        let values = vec![
            FieldValue::Null,
            FieldValue::from("text"),
            FieldValue::from(42i64),
            FieldValue::from(true),
            FieldValue::Reference(RemoteId::from(7)),
            FieldValue::Map(m),
        ];
        for v in values {
            let json = serde_json::to_string(&v).unwrap();
            let back: FieldValue = serde_json::from_str(&json).unwrap();
            assert_eq!(back, v);
        }
    }
}
