//! Change detection: which local fields a push must carry.
//!
//! For new records the answer is always the full mapped domain; for
//! existing records the raw dirty-attribute set is folded (serialized
//! sub-keys, relationship foreign keys) and intersected with the field
//! map's domain.

use crate::record::LocalRecord;
use crate::registry::RecordTypeSpec;
use std::collections::BTreeSet;
use std::fmt;

/// A declared relationship skipped during folding because its foreign key
/// could not be resolved. Recovered, never fatal; surfaced so callers and
/// tests can assert on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipIssue {
    /// Logical relationship name.
    pub relationship: String,
    /// Local record type the relationship is declared on.
    pub record_type: String,
}

impl fmt::Display for RelationshipIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "could not resolve foreign key for relationship `{}` on `{}`",
            self.relationship, self.record_type
        )
    }
}

/// The set of local fields a push must carry, plus folding diagnostics.
///
/// Derived fresh per push and discarded after; never persisted. The field
/// set is always a subset of the field map's domain; for new records it
/// equals the full domain.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    fields: BTreeSet<String>,
    issues: Vec<RelationshipIssue>,
}

impl ChangeSet {
    /// Local field names to push.
    #[must_use]
    pub fn fields(&self) -> &BTreeSet<String> {
        &self.fields
    }

    /// Relationships skipped during folding.
    #[must_use]
    pub fn issues(&self) -> &[RelationshipIssue] {
        &self.issues
    }

    /// True if the field name is in the set.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains(field)
    }

    /// Number of fields to push.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if nothing needs pushing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Resolves the field set for one push.
///
/// `requested` is the caller's explicit field subset; it is honored only
/// for existing records. A create always pushes the full mapped domain,
/// since change tracking is meaningless before the record exists remotely.
pub fn resolve_push_fields(
    record: &dyn LocalRecord,
    spec: &RecordTypeSpec,
    requested: Option<&[String]>,
) -> ChangeSet {
    let domain = spec.field_map().local_fields();

    if record.is_new() {
        return ChangeSet {
            fields: domain,
            issues: Vec::new(),
        };
    }

    if let Some(requested) = requested {
        let fields = requested
            .iter()
            .filter(|f| domain.contains(*f))
            .cloned()
            .collect();
        return ChangeSet {
            fields,
            issues: Vec::new(),
        };
    }

    let mut changed = record.dirty_attributes();

    // A dirty serialized storage key means the tracker cannot see which
    // sub-key changed; treat them all as dirty.
    for key in record.structured_attributes() {
        if !changed.contains(&key) {
            continue;
        }
        if let Some(value) = record.attribute(&key) {
            if let Some(map) = value.as_map() {
                changed.extend(map.keys().cloned());
            }
        }
    }

    // Fold foreign-key attribute names into the logical relationship names
    // the field map uses.
    let mut issues = Vec::new();
    for relationship in record.relationships() {
        if relationship.is_collection {
            continue;
        }
        match &relationship.foreign_key {
            Some(foreign_key) => {
                if changed.remove(foreign_key) {
                    changed.insert(relationship.name.clone());
                }
            }
            None => {
                tracing::warn!(
                    relationship = %relationship.name,
                    record_type = record.record_type(),
                    "skipping relationship with unresolvable foreign key"
                );
                issues.push(RelationshipIssue {
                    relationship: relationship.name.clone(),
                    record_type: record.record_type().to_string(),
                });
            }
        }
    }

    let fields = changed.intersection(&domain).cloned().collect();
    ChangeSet { fields, issues }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{MemoryRecord, Relationship};
    use crate::registry::FieldMap;
    use erpsync_model::FieldValue;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn customer_spec() -> RecordTypeSpec {
        RecordTypeSpec::new("customer", "customer").with_field_map(
            FieldMap::new()
                .with_standard("phone", "phone")
                .with_standard("email", "email")
                .with_standard("sales_rep", "sales_rep")
                .with_custom("color", "custentity_color"),
        )
    }

    #[test]
    fn new_record_gets_full_domain() {
        let record = MemoryRecord::new("customer");
        let changes = resolve_push_fields(&record, &customer_spec(), None);
        assert_eq!(changes.len(), 4);
        assert!(changes.contains("phone"));
        assert!(changes.contains("color"));
    }

    #[test]
    fn create_wins_over_explicit_subset() {
        let record = MemoryRecord::new("customer");
        let requested = vec!["phone".to_string()];
        let changes = resolve_push_fields(&record, &customer_spec(), Some(&requested));
        assert_eq!(changes.len(), 4);
    }

    #[test]
    fn explicit_subset_is_intersected() {
        let record = MemoryRecord::new("customer").with_remote_id(1);
        let requested = vec!["phone".to_string(), "unmapped".to_string()];
        let changes = resolve_push_fields(&record, &customer_spec(), Some(&requested));
        assert_eq!(changes.fields().len(), 1);
        assert!(changes.contains("phone"));
    }

    #[test]
    fn update_uses_dirty_set() {
        let mut record = MemoryRecord::new("customer").with_remote_id(1);
        record.set_attribute("phone", "555");
        record.mark_dirty("untracked_column");

        let changes = resolve_push_fields(&record, &customer_spec(), None);
        assert_eq!(changes.fields().len(), 1);
        assert!(changes.contains("phone"));
    }

    #[test]
    fn foreign_key_folds_to_relationship_name() {
        let mut record = MemoryRecord::new("customer")
            .with_remote_id(1)
            .with_relationship(Relationship::to_one("sales_rep", "sales_rep_id"));
        record.mark_dirty("sales_rep_id");

        let changes = resolve_push_fields(&record, &customer_spec(), None);
        assert!(changes.contains("sales_rep"));
        assert!(!changes.contains("sales_rep_id"));
    }

    #[test]
    fn collection_relationships_are_ignored() {
        let mut record = MemoryRecord::new("customer")
            .with_remote_id(1)
            .with_relationship(Relationship::to_many("orders", "order_id"));
        record.mark_dirty("order_id");

        let changes = resolve_push_fields(&record, &customer_spec(), None);
        assert!(changes.is_empty());
    }

    #[test]
    fn broken_relationship_yields_diagnostic() {
        let mut record = MemoryRecord::new("customer")
            .with_remote_id(1)
            .with_relationship(Relationship::broken("parent"));
        record.set_attribute("phone", "555");

        let changes = resolve_push_fields(&record, &customer_spec(), None);
        assert!(changes.contains("phone"));
        assert_eq!(changes.issues().len(), 1);
        assert_eq!(changes.issues()[0].relationship, "parent");
    }

    #[test]
    fn dirty_structured_key_folds_sub_keys() {
        let mut prefs = BTreeMap::new();
        prefs.insert("color".to_string(), FieldValue::from("red"));
        prefs.insert("email".to_string(), FieldValue::from("a@b.c"));

        let mut record = MemoryRecord::new("customer")
            .with_remote_id(1)
            .with_structured("prefs")
            .with_attribute("prefs", FieldValue::Map(prefs));
        record.mark_dirty("prefs");

        let changes = resolve_push_fields(&record, &customer_spec(), None);
        assert!(changes.contains("color"));
        assert!(changes.contains("email"));
        // The storage key itself is unmapped and drops out.
        assert!(!changes.contains("prefs"));
    }

    #[test]
    fn clean_structured_key_folds_nothing() {
        let mut prefs = BTreeMap::new();
        prefs.insert("color".to_string(), FieldValue::from("red"));

        let record = MemoryRecord::new("customer")
            .with_remote_id(1)
            .with_structured("prefs")
            .with_attribute("prefs", FieldValue::Map(prefs));

        let changes = resolve_push_fields(&record, &customer_spec(), None);
        assert!(changes.is_empty());
    }

    proptest! {
        #[test]
        fn result_is_subset_of_domain(dirty in proptest::collection::btree_set("[a-e]", 0..6)) {
            let mut record = MemoryRecord::new("customer").with_remote_id(1);
            for name in &dirty {
                record.mark_dirty(name.clone());
            }
            let spec = RecordTypeSpec::new("customer", "customer").with_field_map(
                FieldMap::new()
                    .with_standard("a", "ra")
                    .with_custom("c", "rc"),
            );
            let changes = resolve_push_fields(&record, &spec, None);
            let domain = spec.field_map().local_fields();
            prop_assert!(changes.fields().is_subset(&domain));
        }
    }
}
