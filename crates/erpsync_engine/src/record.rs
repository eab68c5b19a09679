//! Local record capability interface.
//!
//! The engine never depends on a specific persistence framework. Instead,
//! the caller's record type implements [`LocalRecord`], exposing exactly
//! the capabilities change detection and record building need: attribute
//! access, dirty tracking, structured-attribute keys, relationship
//! descriptors, and remote-id persistence.

use erpsync_model::{FieldValue, RemoteId};
use std::collections::{BTreeMap, BTreeSet};

/// A named relationship declared on a record type.
///
/// Only non-collection (at-most-one) relationships participate in
/// change-key folding and reference building. A relationship whose foreign
/// key could not be resolved (e.g. a broken `through` association) carries
/// `foreign_key: None` and is skipped with a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// Logical relationship name, as the field map names it.
    pub name: String,
    /// Underlying foreign-key attribute name; `None` if resolution failed.
    pub foreign_key: Option<String>,
    /// True for to-many relationships.
    pub is_collection: bool,
}

impl Relationship {
    /// Declares an at-most-one relationship.
    pub fn to_one(name: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            foreign_key: Some(foreign_key.into()),
            is_collection: false,
        }
    }

    /// Declares a to-many relationship.
    pub fn to_many(name: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            foreign_key: Some(foreign_key.into()),
            is_collection: true,
        }
    }

    /// Declares a relationship whose foreign key failed to resolve.
    pub fn broken(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            foreign_key: None,
            is_collection: false,
        }
    }
}

/// Capability interface the caller's record type implements.
///
/// `attribute` must resolve logical sub-keys of structured (serialized
/// blob) attributes in addition to plain attribute names, since folded
/// change detection reports sub-keys individually.
pub trait LocalRecord {
    /// The local record-type name the mapping registry is keyed by.
    fn record_type(&self) -> &str;

    /// The remote id assigned by the external system, if ever pushed.
    fn remote_id(&self) -> Option<RemoteId>;

    /// The caller-supplied stable external id, if any.
    fn external_id(&self) -> Option<String> {
        None
    }

    /// Reads an attribute (or structured sub-key) by name.
    fn attribute(&self, name: &str) -> Option<FieldValue>;

    /// Attribute names whose values differ from their last-persisted state.
    fn dirty_attributes(&self) -> BTreeSet<String>;

    /// Storage keys of structured (serialized blob) attributes.
    fn structured_attributes(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    /// Relationship descriptors declared on the type.
    fn relationships(&self) -> Vec<Relationship> {
        Vec::new()
    }

    /// The remote id of the record a relationship currently points at.
    ///
    /// Returns `None` when nothing is related or the related record has
    /// not been pushed yet; the field is then omitted rather than pushed
    /// as a dangling reference.
    fn related_remote_id(&self, _name: &str) -> Option<RemoteId> {
        None
    }

    /// Whether the backing store can persist the remote id.
    fn is_persistable(&self) -> bool {
        true
    }

    /// Stores the remote id after a successful create.
    ///
    /// Implementations must write directly, without re-entering their own
    /// change tracking (no dirty flag, no save callbacks).
    fn persist_remote_id(&mut self, id: RemoteId);

    /// True when the record has never been pushed.
    fn is_new(&self) -> bool {
        self.remote_id().is_none()
    }
}

/// An in-memory [`LocalRecord`] for tests and lightweight embedders.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecord {
    record_type: String,
    remote_id: Option<RemoteId>,
    external_id: Option<String>,
    attributes: BTreeMap<String, FieldValue>,
    structured: BTreeSet<String>,
    relationships: Vec<Relationship>,
    related: BTreeMap<String, RemoteId>,
    dirty: BTreeSet<String>,
    persistable: bool,
}

impl MemoryRecord {
    /// Creates an empty record of the given local type.
    pub fn new(record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            persistable: true,
            ..Self::default()
        }
    }

    /// Seeds an attribute without marking it dirty.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Seeds the remote id.
    pub fn with_remote_id(mut self, id: impl Into<RemoteId>) -> Self {
        self.remote_id = Some(id.into());
        self
    }

    /// Seeds the external id.
    pub fn with_external_id(mut self, id: impl Into<String>) -> Self {
        self.external_id = Some(id.into());
        self
    }

    /// Marks an attribute name as a structured (serialized blob) storage key.
    pub fn with_structured(mut self, name: impl Into<String>) -> Self {
        self.structured.insert(name.into());
        self
    }

    /// Declares a relationship.
    pub fn with_relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// Points a relationship at a record with the given remote id.
    pub fn with_related(mut self, name: impl Into<String>, id: impl Into<RemoteId>) -> Self {
        self.related.insert(name.into(), id.into());
        self
    }

    /// Marks the record as not persistable.
    pub fn without_persistence(mut self) -> Self {
        self.persistable = false;
        self
    }

    /// Writes an attribute and marks it dirty.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        let name = name.into();
        self.attributes.insert(name.clone(), value.into());
        self.dirty.insert(name);
    }

    /// Marks an attribute name dirty without changing its value.
    pub fn mark_dirty(&mut self, name: impl Into<String>) {
        self.dirty.insert(name.into());
    }

    /// Clears all dirty flags, as a save in the backing store would.
    pub fn mark_clean(&mut self) {
        self.dirty.clear();
    }
}

impl LocalRecord for MemoryRecord {
    fn record_type(&self) -> &str {
        &self.record_type
    }

    fn remote_id(&self) -> Option<RemoteId> {
        self.remote_id.clone()
    }

    fn external_id(&self) -> Option<String> {
        self.external_id.clone()
    }

    fn attribute(&self, name: &str) -> Option<FieldValue> {
        if let Some(value) = self.attributes.get(name) {
            return Some(value.clone());
        }
        // Resolve logical sub-keys of structured attributes.
        for key in &self.structured {
            if let Some(FieldValue::Map(map)) = self.attributes.get(key) {
                if let Some(value) = map.get(name) {
                    return Some(value.clone());
                }
            }
        }
        None
    }

    fn dirty_attributes(&self) -> BTreeSet<String> {
        self.dirty.clone()
    }

    fn structured_attributes(&self) -> BTreeSet<String> {
        self.structured.clone()
    }

    fn relationships(&self) -> Vec<Relationship> {
        self.relationships.clone()
    }

    fn related_remote_id(&self, name: &str) -> Option<RemoteId> {
        self.related.get(name).cloned()
    }

    fn is_persistable(&self) -> bool {
        self.persistable
    }

    fn persist_remote_id(&mut self, id: RemoteId) {
        // Direct write: no dirty flag, mirroring an update_column-style
        // store that bypasses change tracking.
        self.remote_id = Some(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn dirty_tracking() {
        let mut record = MemoryRecord::new("customer").with_attribute("phone", "555");
        assert!(record.dirty_attributes().is_empty());

        record.set_attribute("phone", "556");
        assert!(record.dirty_attributes().contains("phone"));

        record.mark_clean();
        assert!(record.dirty_attributes().is_empty());
    }

    #[test]
    fn structured_sub_key_resolution() {
        let mut settings = BTreeMap::new();
        settings.insert("newsletter".to_string(), FieldValue::Boolean(true));

        let record = MemoryRecord::new("customer")
            .with_structured("settings")
            .with_attribute("settings", FieldValue::Map(settings));

        assert_eq!(
            record.attribute("newsletter"),
            Some(FieldValue::Boolean(true))
        );
        assert!(record.attribute("missing").is_none());
    }

    #[test]
    fn persist_remote_id_stays_clean() {
        let mut record = MemoryRecord::new("customer");
        assert!(record.is_new());

        record.persist_remote_id(RemoteId::from(42));
        assert!(!record.is_new());
        assert!(record.dirty_attributes().is_empty());
    }

    #[test]
    fn related_lookup() {
        let record = MemoryRecord::new("order")
            .with_relationship(Relationship::to_one("customer", "customer_id"))
            .with_related("customer", 77);

        assert_eq!(record.related_remote_id("customer"), Some(RemoteId::from(77)));
        assert_eq!(record.related_remote_id("vendor"), None);
    }
}
