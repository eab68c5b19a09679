//! Declarative field maps and the per-type mapping registry.
//!
//! A [`RecordTypeSpec`] describes how one local record type corresponds to
//! its remote counterpart: the three-partition field map, transform hints,
//! manual fields, the custom-record discriminator, and push hooks. Specs
//! are registered once into an immutable [`MappingRegistry`] before any
//! push runs (initialize-once, read-many).

use crate::error::{PushError, PushResult};
use crate::record::LocalRecord;
use crate::transform::TransformKind;
use erpsync_model::{Direction, RemoteId, RemoteRecordRef};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// A computed field mapping: a side-effecting function invoked with the
/// local record, the ref under construction, and the sync direction. It
/// bypasses the declarative value pipeline and update-payload assembly.
pub type ComputedFn = Arc<dyn Fn(&dyn LocalRecord, &mut RemoteRecordRef, Direction) + Send + Sync>;

/// A before/after push callback. Callbacks may mutate the ref (manual
/// fields) and may fail, aborting the push at that state.
pub type HookFn =
    Arc<dyn Fn(&dyn LocalRecord, &mut RemoteRecordRef) -> PushResult<()> + Send + Sync>;

/// How one local field maps to the remote record.
#[derive(Clone)]
pub enum FieldMapping {
    /// Top-level remote field, addressed by its remote name.
    Standard(String),
    /// Remote custom field, routed into the nested custom-field container.
    Custom(String),
    /// Computed mapping; sets whatever it needs directly on the ref.
    Computed(ComputedFn),
}

impl fmt::Debug for FieldMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldMapping::Standard(name) => f.debug_tuple("Standard").field(name).finish(),
            FieldMapping::Custom(name) => f.debug_tuple("Custom").field(name).finish(),
            FieldMapping::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// The declarative local-field → remote-field map for one record type.
///
/// A local field name appears in at most one partition; declaring it again
/// replaces the previous mapping.
#[derive(Debug, Clone, Default)]
pub struct FieldMap {
    entries: BTreeMap<String, FieldMapping>,
}

impl FieldMap {
    /// Creates an empty field map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps a local field to a top-level remote field.
    #[must_use]
    pub fn with_standard(mut self, local: impl Into<String>, remote: impl Into<String>) -> Self {
        self.entries
            .insert(local.into(), FieldMapping::Standard(remote.into()));
        self
    }

    /// Maps a local field to a remote custom field.
    #[must_use]
    pub fn with_custom(mut self, local: impl Into<String>, remote: impl Into<String>) -> Self {
        self.entries
            .insert(local.into(), FieldMapping::Custom(remote.into()));
        self
    }

    /// Maps a local field to a computed function.
    #[must_use]
    pub fn with_computed(
        mut self,
        local: impl Into<String>,
        f: impl Fn(&dyn LocalRecord, &mut RemoteRecordRef, Direction) + Send + Sync + 'static,
    ) -> Self {
        self.entries
            .insert(local.into(), FieldMapping::Computed(Arc::new(f)));
        self
    }

    /// Looks up the mapping for a local field.
    #[must_use]
    pub fn mapping(&self, local: &str) -> Option<&FieldMapping> {
        self.entries.get(local)
    }

    /// Returns true if the local field is mapped in any partition.
    #[must_use]
    pub fn contains(&self, local: &str) -> bool {
        self.entries.contains_key(local)
    }

    /// The full set of mapped local field names, across all partitions.
    #[must_use]
    pub fn local_fields(&self) -> BTreeSet<String> {
        self.entries.keys().cloned().collect()
    }

    /// Local field names mapped into the custom partition.
    #[must_use]
    pub fn custom_local_fields(&self) -> BTreeSet<String> {
        self.entries
            .iter()
            .filter(|(_, mapping)| matches!(mapping, FieldMapping::Custom(_)))
            .map(|(local, _)| local.clone())
            .collect()
    }

    /// Number of mapped fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no field is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A remote field the caller populates outside the declarative map,
/// always included in update payloads regardless of the diff result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManualField {
    /// A top-level remote field, by remote name.
    Field(String),
    /// The whole custom-field container.
    CustomContainer,
}

impl ManualField {
    /// Declares a top-level manual field.
    pub fn field(name: impl Into<String>) -> Self {
        ManualField::Field(name.into())
    }
}

/// Everything the engine knows about one local record type.
#[derive(Clone)]
pub struct RecordTypeSpec {
    local_type: String,
    remote_type: String,
    field_map: FieldMap,
    hints: BTreeMap<String, TransformKind>,
    manual_fields: Vec<ManualField>,
    custom_record_type_id: Option<RemoteId>,
    before_push: Vec<HookFn>,
    after_push: Vec<HookFn>,
}

impl fmt::Debug for RecordTypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordTypeSpec")
            .field("local_type", &self.local_type)
            .field("remote_type", &self.remote_type)
            .field("field_map", &self.field_map)
            .field("hints", &self.hints)
            .field("manual_fields", &self.manual_fields)
            .field("custom_record_type_id", &self.custom_record_type_id)
            .field("before_push", &format_args!("[{} hooks]", self.before_push.len()))
            .field("after_push", &format_args!("[{} hooks]", self.after_push.len()))
            .finish()
    }
}

impl RecordTypeSpec {
    /// Creates a spec mapping a local type name to a remote record type.
    pub fn new(local_type: impl Into<String>, remote_type: impl Into<String>) -> Self {
        Self {
            local_type: local_type.into(),
            remote_type: remote_type.into(),
            field_map: FieldMap::new(),
            hints: BTreeMap::new(),
            manual_fields: Vec::new(),
            custom_record_type_id: None,
            before_push: Vec::new(),
            after_push: Vec::new(),
        }
    }

    /// Sets the field map.
    #[must_use]
    pub fn with_field_map(mut self, field_map: FieldMap) -> Self {
        self.field_map = field_map;
        self
    }

    /// Declares a transform hint for a local field.
    #[must_use]
    pub fn with_hint(mut self, local: impl Into<String>, kind: TransformKind) -> Self {
        self.hints.insert(local.into(), kind);
        self
    }

    /// Declares a manual field.
    #[must_use]
    pub fn with_manual_field(mut self, field: ManualField) -> Self {
        self.manual_fields.push(field);
        self
    }

    /// Marks the type as a custom record with the given type id.
    #[must_use]
    pub fn with_custom_record_type(mut self, type_id: impl Into<RemoteId>) -> Self {
        self.custom_record_type_id = Some(type_id.into());
        self
    }

    /// Appends a before-push callback. Callbacks run in registration order.
    #[must_use]
    pub fn with_before_push(
        mut self,
        hook: impl Fn(&dyn LocalRecord, &mut RemoteRecordRef) -> PushResult<()>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.before_push.push(Arc::new(hook));
        self
    }

    /// Appends an after-push callback. Callbacks run in registration order.
    #[must_use]
    pub fn with_after_push(
        mut self,
        hook: impl Fn(&dyn LocalRecord, &mut RemoteRecordRef) -> PushResult<()>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.after_push.push(Arc::new(hook));
        self
    }

    /// The local record-type name this spec is keyed by.
    #[must_use]
    pub fn local_type(&self) -> &str {
        &self.local_type
    }

    /// The remote record-type tag.
    #[must_use]
    pub fn remote_type(&self) -> &str {
        &self.remote_type
    }

    /// The field map.
    #[must_use]
    pub fn field_map(&self) -> &FieldMap {
        &self.field_map
    }

    /// The transform hint declared for a local field, if any.
    #[must_use]
    pub fn hint(&self, local: &str) -> Option<TransformKind> {
        self.hints.get(local).copied()
    }

    /// The manual field list.
    #[must_use]
    pub fn manual_fields(&self) -> &[ManualField] {
        &self.manual_fields
    }

    /// True if the type is a custom record.
    #[must_use]
    pub fn is_custom_record(&self) -> bool {
        self.custom_record_type_id.is_some()
    }

    /// The registered custom-record type id, if the type is a custom record.
    #[must_use]
    pub fn custom_record_type_id(&self) -> Option<&RemoteId> {
        self.custom_record_type_id.as_ref()
    }

    /// Before-push callbacks, in registration order.
    #[must_use]
    pub fn before_push(&self) -> &[HookFn] {
        &self.before_push
    }

    /// After-push callbacks, in registration order.
    #[must_use]
    pub fn after_push(&self) -> &[HookFn] {
        &self.after_push
    }
}

/// Immutable lookup of record-type specs, keyed by local type name.
///
/// Populate the registry fully before the first push; it is shared
/// read-only afterwards (wrap in `Arc` to share across threads).
#[derive(Clone, Default)]
pub struct MappingRegistry {
    types: HashMap<String, Arc<RecordTypeSpec>>,
}

impl MappingRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a record-type spec, keyed by its local type name.
    #[must_use]
    pub fn with_type(mut self, spec: RecordTypeSpec) -> Self {
        self.types.insert(spec.local_type.clone(), Arc::new(spec));
        self
    }

    /// Looks up the spec for a local record type.
    pub fn spec(&self, record_type: &str) -> PushResult<&Arc<RecordTypeSpec>> {
        self.types
            .get(record_type)
            .ok_or_else(|| PushError::UnregisteredType(record_type.into()))
    }

    /// The field map for a local record type.
    pub fn field_map(&self, record_type: &str) -> PushResult<&FieldMap> {
        Ok(self.spec(record_type)?.field_map())
    }

    /// The manual field list for a local record type.
    pub fn manual_fields(&self, record_type: &str) -> PushResult<&[ManualField]> {
        Ok(self.spec(record_type)?.manual_fields())
    }

    /// True if the local record type is a custom record.
    pub fn is_custom_record(&self, record_type: &str) -> PushResult<bool> {
        Ok(self.spec(record_type)?.is_custom_record())
    }

    /// The custom-record type id for a local record type, if any.
    pub fn custom_record_type_id(&self, record_type: &str) -> PushResult<Option<&RemoteId>> {
        Ok(self.spec(record_type)?.custom_record_type_id())
    }

    /// True if the type has been registered.
    #[must_use]
    pub fn contains(&self, record_type: &str) -> bool {
        self.types.contains_key(record_type)
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true if no type is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
