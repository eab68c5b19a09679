//! The in-memory remote record representation and update payloads.

use crate::value::{FieldValue, RemoteId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// In-memory representation of the external record being built.
///
/// A ref is constructed fresh per push and discarded after. It carries the
/// record identity (internal id or external id, mutually exclusive), the
/// remote record-type tag, the custom-record type discriminator when the
/// type is a custom record, and the pending field values split into
/// top-level fields and the nested custom-field container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecordRef {
    record_type: String,
    internal_id: Option<RemoteId>,
    external_id: Option<String>,
    custom_type: Option<RemoteId>,
    fields: BTreeMap<String, FieldValue>,
    custom_fields: BTreeMap<String, FieldValue>,
}

impl RemoteRecordRef {
    /// Creates an empty ref for the given remote record type.
    pub fn new(record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            internal_id: None,
            external_id: None,
            custom_type: None,
            fields: BTreeMap::new(),
            custom_fields: BTreeMap::new(),
        }
    }

    /// Returns the remote record-type tag.
    #[must_use]
    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    /// Sets the internal id, clearing any external id.
    ///
    /// `None` is meaningful: a record never pushed before has no internal
    /// id, which signals create semantics downstream.
    pub fn set_internal_id(&mut self, id: Option<RemoteId>) {
        self.internal_id = id;
        self.external_id = None;
    }

    /// Sets the external id, clearing any internal id.
    pub fn set_external_id(&mut self, id: Option<String>) {
        self.external_id = id;
        self.internal_id = None;
    }

    /// Returns the internal id, if addressed by internal id.
    #[must_use]
    pub fn internal_id(&self) -> Option<&RemoteId> {
        self.internal_id.as_ref()
    }

    /// Returns the external id, if addressed by external id.
    #[must_use]
    pub fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref()
    }

    /// Attaches the custom-record type discriminator.
    pub fn set_custom_type(&mut self, type_id: RemoteId) {
        self.custom_type = Some(type_id);
    }

    /// Returns the custom-record type discriminator, if any.
    #[must_use]
    pub fn custom_type(&self) -> Option<&RemoteId> {
        self.custom_type.as_ref()
    }

    /// Sets a top-level field value.
    pub fn set_field(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }

    /// Returns a top-level field value, if set.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Returns all top-level field values.
    #[must_use]
    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    /// Sets a value inside the nested custom-field container.
    pub fn set_custom_field(&mut self, name: impl Into<String>, value: FieldValue) {
        self.custom_fields.insert(name.into(), value);
    }

    /// Returns a custom-field value, if set.
    #[must_use]
    pub fn custom_field(&self, name: &str) -> Option<&FieldValue> {
        self.custom_fields.get(name)
    }

    /// Returns the entire custom-field container.
    #[must_use]
    pub fn custom_fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.custom_fields
    }
}

/// Minimal body for a remote update.
///
/// Only changed top-level fields appear in `fields`. When any custom
/// sub-field changed, `custom_fields` carries the *entire* container (the
/// remote API replaces it atomically). `custom_type` is attached for
/// custom-record types and does not count toward emptiness.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdatePayload {
    /// Changed top-level fields.
    pub fields: BTreeMap<String, FieldValue>,
    /// The full custom-field container, when any custom field changed.
    pub custom_fields: Option<BTreeMap<String, FieldValue>>,
    /// Custom-record type discriminator, for custom-record types.
    pub custom_type: Option<RemoteId>,
}

impl UpdatePayload {
    /// Returns true if the payload would write nothing.
    ///
    /// An empty payload means the remote update is skipped entirely. The
    /// discriminator alone never justifies a write.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.custom_fields.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_exclusivity() {
        let mut r = RemoteRecordRef::new("customer");
        r.set_internal_id(Some(RemoteId::from(10)));
        assert_eq!(r.internal_id().map(RemoteId::as_str), Some("10"));
        assert_eq!(r.external_id(), None);

        r.set_external_id(Some("EXT-1".into()));
        assert_eq!(r.external_id(), Some("EXT-1"));
        assert_eq!(r.internal_id(), None);

        r.set_internal_id(None);
        assert_eq!(r.internal_id(), None);
        assert_eq!(r.external_id(), None);
    }

    #[test]
    fn field_routing() {
        let mut r = RemoteRecordRef::new("customer");
        r.set_field("phone", FieldValue::from("5551234567"));
        r.set_custom_field("custentity_color", FieldValue::from("red"));

        assert_eq!(r.field("phone"), Some(&FieldValue::from("5551234567")));
        assert_eq!(r.field("custentity_color"), None);
        assert_eq!(
            r.custom_field("custentity_color"),
            Some(&FieldValue::from("red"))
        );
        assert_eq!(r.fields().len(), 1);
        assert_eq!(r.custom_fields().len(), 1);
    }

    #[test]
    fn empty_payload() {
        let mut payload = UpdatePayload::default();
        assert!(payload.is_empty());

        // The discriminator alone does not make a payload worth writing.
        payload.custom_type = Some(RemoteId::from(123));
        assert!(payload.is_empty());

        payload.fields.insert("phone".into(), FieldValue::Null);
        assert!(!payload.is_empty());
    }

    #[test]
    fn custom_container_counts() {
        let mut payload = UpdatePayload::default();
        payload.custom_fields = Some(BTreeMap::new());
        assert!(!payload.is_empty());
    }

    #[test]
    fn serde_round_trip() {
        let mut r = RemoteRecordRef::new("customer");
        r.set_internal_id(Some(RemoteId::from(5)));
        r.set_field("email", FieldValue::from("a@b.c"));

        let json = serde_json::to_string(&r).unwrap();
        let back: RemoteRecordRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }
}
