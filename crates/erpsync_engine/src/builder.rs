//! Builds the remote record representation from a local record.

use crate::error::{PushError, PushResult};
use crate::record::LocalRecord;
use crate::registry::{FieldMapping, RecordTypeSpec};
use crate::transform::{apply_transform, TransformContext};
use erpsync_model::{AddressingMode, Direction, FieldValue, RemoteRecordRef};
use std::collections::BTreeSet;

/// Constructs a [`RemoteRecordRef`] for one push, applying the field map,
/// transform hints, and relationship resolution.
pub struct RecordBuilder<'a> {
    spec: &'a RecordTypeSpec,
    ctx: TransformContext,
}

impl<'a> RecordBuilder<'a> {
    /// Creates a builder for one record-type spec.
    #[must_use]
    pub fn new(spec: &'a RecordTypeSpec, ctx: TransformContext) -> Self {
        Self { spec, ctx }
    }

    /// Builds the initial reference: identity per addressing mode, plus the
    /// custom-record discriminator when the type is a custom record.
    ///
    /// Internal-id addressing on a never-pushed record leaves the identity
    /// unset, which signals create semantics downstream.
    pub fn build_reference(
        &self,
        record: &dyn LocalRecord,
        addressing: AddressingMode,
    ) -> RemoteRecordRef {
        let mut remote = RemoteRecordRef::new(self.spec.remote_type());
        match addressing {
            AddressingMode::ExternalId => remote.set_external_id(record.external_id()),
            AddressingMode::InternalId => remote.set_internal_id(record.remote_id()),
        }
        if let Some(type_id) = self.spec.custom_record_type_id() {
            remote.set_custom_type(type_id.clone());
        }
        remote
    }

    /// Builds the populated ref for the given local field set.
    pub fn build(
        &self,
        record: &dyn LocalRecord,
        fields: &BTreeSet<String>,
        addressing: AddressingMode,
    ) -> PushResult<RemoteRecordRef> {
        let mut remote = self.build_reference(record, addressing);

        let reference_fields: BTreeSet<String> = record
            .relationships()
            .into_iter()
            .filter(|r| !r.is_collection)
            .map(|r| r.name)
            .collect();

        for field in fields {
            let Some(mapping) = self.spec.field_map().mapping(field) else {
                continue;
            };
            match mapping {
                FieldMapping::Computed(f) => (f.as_ref())(record, &mut remote, Direction::Push),
                FieldMapping::Standard(remote_name) => {
                    if let Some(value) = self.resolve(record, field, &reference_fields)? {
                        remote.set_field(remote_name.clone(), value);
                    }
                }
                FieldMapping::Custom(remote_name) => {
                    if let Some(value) = self.resolve(record, field, &reference_fields)? {
                        remote.set_custom_field(remote_name.clone(), value);
                    }
                }
            }
        }

        Ok(remote)
    }

    /// Resolves and transforms one field's value.
    ///
    /// Returns `None` only for a dangling relationship reference; a plain
    /// attribute the record cannot provide becomes an explicit null so
    /// updates can clear remote fields.
    fn resolve(
        &self,
        record: &dyn LocalRecord,
        field: &str,
        reference_fields: &BTreeSet<String>,
    ) -> PushResult<Option<FieldValue>> {
        let value = if reference_fields.contains(field) {
            match record.related_remote_id(field) {
                Some(id) => FieldValue::Reference(id),
                None => return Ok(None),
            }
        } else {
            record.attribute(field).unwrap_or(FieldValue::Null)
        };

        let value = match self.spec.hint(field) {
            Some(kind) if value.is_present() => {
                apply_transform(kind, &value, Direction::Push, &self.ctx).map_err(|source| {
                    PushError::Transformation {
                        field: field.to_string(),
                        source,
                    }
                })?
            }
            _ => value,
        };

        Ok(Some(value))
    }
}
