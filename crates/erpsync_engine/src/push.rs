//! Push orchestration state machine.
//!
//! One [`PushEngine::push`] call synchronizes exactly one local record:
//! resolve what changed, build the remote representation, run pre-push
//! hooks, create or update remotely, run post-push hooks. The engine holds
//! no per-record lock; callers guarantee at most one in-flight push per
//! record identity.

use crate::builder::RecordBuilder;
use crate::detect::{resolve_push_fields, ChangeSet, RelationshipIssue};
use crate::error::{PushError, PushResult};
use crate::record::LocalRecord;
use crate::registry::{FieldMapping, HookFn, ManualField, MappingRegistry, RecordTypeSpec};
use crate::remote::{RemoteStore, WriteAck, WriteAction};
use crate::transform::TransformContext;
use erpsync_model::{
    AddressingMode, FieldValue, RemoteId, RemoteRecordRef, UpdatePayload, WriteMode,
};
use parking_lot::RwLock;
use std::sync::Arc;

/// The current stage of a push call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushState {
    /// No push is running.
    Idle,
    /// Resolving the field set to push.
    Resolving,
    /// Building the remote record representation.
    Building,
    /// Running before-push callbacks.
    PreHook,
    /// Writing to the remote system.
    Writing,
    /// Running after-push callbacks.
    PostHook,
    /// Last push completed.
    Done,
    /// Last push failed.
    Failed,
}

impl PushState {
    /// Returns true while a push is in flight.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            PushState::Resolving
                | PushState::Building
                | PushState::PreHook
                | PushState::Writing
                | PushState::PostHook
        )
    }
}

/// Cumulative counters across push calls.
#[derive(Debug, Clone, Default)]
pub struct PushStats {
    /// Pushes that completed, including no-op skips.
    pub pushes_completed: u64,
    /// Remote creates/upserts performed.
    pub creates: u64,
    /// Remote updates performed.
    pub updates: u64,
    /// Updates skipped because nothing needed writing.
    pub no_op_skips: u64,
    /// Pushes that failed.
    pub failures: u64,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Engine-wide configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct PushConfig {
    /// UTC offset of the remote instance's configured timezone, in hours.
    /// Consulted by date/datetime transforms.
    pub remote_utc_offset_hours: i32,
}

impl PushConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the remote instance's UTC offset in hours.
    #[must_use]
    pub fn with_remote_utc_offset_hours(mut self, hours: i32) -> Self {
        self.remote_utc_offset_hours = hours;
        self
    }

    fn transform_context(&self) -> TransformContext {
        TransformContext::new(self.remote_utc_offset_hours)
    }
}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct PushOptions {
    /// Write operation for the create path.
    pub write_mode: WriteMode,
    /// How the remote record reference is addressed.
    pub addressing: AddressingMode,
    /// Explicit field subset; honored only for existing records.
    pub modified_fields: Option<Vec<String>>,
}

impl PushOptions {
    /// Creates default options: add semantics, internal-id addressing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses upsert semantics for the write.
    #[must_use]
    pub fn with_upsert(mut self) -> Self {
        self.write_mode = WriteMode::Upsert;
        self
    }

    /// Addresses the remote record by external id.
    #[must_use]
    pub fn with_external_id_addressing(mut self) -> Self {
        self.addressing = AddressingMode::ExternalId;
        self
    }

    /// Restricts an update push to the given local fields.
    #[must_use]
    pub fn with_modified_fields(
        mut self,
        fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.modified_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }
}

/// What a completed push did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushAction {
    /// A remote record was created (or upserted).
    Created,
    /// The existing remote record was updated.
    Updated,
    /// Nothing needed writing; the remote call was skipped.
    Skipped,
}

/// Result of a completed push.
#[derive(Debug, Clone)]
pub struct PushReport {
    /// What the push did.
    pub action: PushAction,
    /// Remote id of the record after the push, when known.
    pub remote_id: Option<RemoteId>,
    /// Number of remote fields carried by the write.
    pub pushed_fields: usize,
    /// Relationships skipped during change folding.
    pub issues: Vec<RelationshipIssue>,
}

/// The push orchestrator.
///
/// Owns the immutable mapping registry and the remote store; tracks the
/// current state and cumulative stats for observability. Construct once,
/// share via `Arc`, push many records.
pub struct PushEngine<R: RemoteStore> {
    config: PushConfig,
    registry: Arc<MappingRegistry>,
    remote: Arc<R>,
    state: RwLock<PushState>,
    stats: RwLock<PushStats>,
}

impl<R: RemoteStore> PushEngine<R> {
    /// Creates a new push engine.
    pub fn new(config: PushConfig, registry: MappingRegistry, remote: R) -> Self {
        Self {
            config,
            registry: Arc::new(registry),
            remote: Arc::new(remote),
            state: RwLock::new(PushState::Idle),
            stats: RwLock::new(PushStats::default()),
        }
    }

    /// The mapping registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<MappingRegistry> {
        &self.registry
    }

    /// The remote store.
    #[must_use]
    pub fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> PushState {
        *self.state.read()
    }

    /// The cumulative stats.
    #[must_use]
    pub fn stats(&self) -> PushStats {
        self.stats.read().clone()
    }

    fn set_state(&self, state: PushState) {
        *self.state.write() = state;
    }

    /// Pushes one record with default options.
    pub fn push(&self, record: &mut dyn LocalRecord) -> PushResult<PushReport> {
        self.push_with(record, &PushOptions::default())
    }

    /// Pushes one record.
    ///
    /// Create semantics apply when the record has no remote id yet or the
    /// options request upsert; otherwise the minimal update is computed
    /// and an empty update is skipped without a remote call.
    pub fn push_with(
        &self,
        record: &mut dyn LocalRecord,
        options: &PushOptions,
    ) -> PushResult<PushReport> {
        match self.run_push(record, options) {
            Ok(report) => {
                self.set_state(PushState::Done);
                let mut stats = self.stats.write();
                stats.pushes_completed += 1;
                match report.action {
                    PushAction::Created => stats.creates += 1,
                    PushAction::Updated => stats.updates += 1,
                    PushAction::Skipped => stats.no_op_skips += 1,
                }
                stats.last_error = None;
                Ok(report)
            }
            Err(err) => {
                self.set_state(PushState::Failed);
                let mut stats = self.stats.write();
                stats.failures += 1;
                stats.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    fn run_push(
        &self,
        record: &mut dyn LocalRecord,
        options: &PushOptions,
    ) -> PushResult<PushReport> {
        self.set_state(PushState::Resolving);
        let spec = Arc::clone(self.registry.spec(record.record_type())?);
        let changes = resolve_push_fields(record, &spec, options.modified_fields.as_deref());
        let create_path = options.write_mode == WriteMode::Upsert || record.is_new();

        self.set_state(PushState::Building);
        // When an update will carry the custom container, every mapped
        // custom field must be built into it, dirty or not: the remote API
        // replaces the container atomically.
        let mut build_fields = changes.fields().clone();
        if !create_path && custom_container_included(&spec, &changes) {
            build_fields.extend(spec.field_map().custom_local_fields());
        }
        let builder = RecordBuilder::new(&spec, self.config.transform_context());
        let mut remote_ref = builder.build(record, &build_fields, options.addressing)?;

        self.set_state(PushState::PreHook);
        run_hooks(spec.before_push(), record, &mut remote_ref)?;

        self.set_state(PushState::Writing);
        let report = if create_path {
            self.write_create(record, &remote_ref, options.write_mode, &changes)?
        } else {
            self.write_update(record, &remote_ref, &spec, &changes)?
        };

        self.set_state(PushState::PostHook);
        run_hooks(spec.after_push(), record, &mut remote_ref)?;

        Ok(report)
    }

    fn write_create(
        &self,
        record: &mut dyn LocalRecord,
        remote_ref: &RemoteRecordRef,
        write_mode: WriteMode,
        changes: &ChangeSet,
    ) -> PushResult<PushReport> {
        let action = match write_mode {
            WriteMode::Upsert => WriteAction::Upsert,
            WriteMode::Add => WriteAction::Create,
        };
        let ack = match action {
            WriteAction::Upsert => self.remote.upsert(remote_ref)?,
            _ => self.remote.create(remote_ref)?,
        };
        self.check_ack(&ack, action, remote_ref)?;

        tracing::info!(
            action = %action,
            record_type = record.record_type(),
            remote_type = remote_ref.record_type(),
            remote_id = ack.remote_id.as_ref().map(|id| id.as_str()),
            "pushed record"
        );

        if let Some(id) = &ack.remote_id {
            if record.is_persistable() {
                record.persist_remote_id(id.clone());
            }
        }

        Ok(PushReport {
            action: PushAction::Created,
            remote_id: ack.remote_id,
            pushed_fields: remote_ref.fields().len() + remote_ref.custom_fields().len(),
            issues: changes.issues().to_vec(),
        })
    }

    fn write_update(
        &self,
        record: &mut dyn LocalRecord,
        remote_ref: &RemoteRecordRef,
        spec: &RecordTypeSpec,
        changes: &ChangeSet,
    ) -> PushResult<PushReport> {
        let payload = assemble_update_payload(remote_ref, spec, changes);

        if payload.is_empty() {
            tracing::debug!(
                record_type = record.record_type(),
                "no mapped changes; skipping remote update"
            );
            return Ok(PushReport {
                action: PushAction::Skipped,
                remote_id: record.remote_id(),
                pushed_fields: 0,
                issues: changes.issues().to_vec(),
            });
        }

        tracing::info!(
            record_type = record.record_type(),
            remote_type = remote_ref.record_type(),
            remote_id = remote_ref.internal_id().map(|id| id.as_str()),
            fields = ?payload.fields.keys().collect::<Vec<_>>(),
            custom = payload.custom_fields.is_some(),
            "updating record"
        );

        let ack = self.remote.update(remote_ref, &payload)?;
        self.check_ack(&ack, WriteAction::Update, remote_ref)?;

        let pushed_fields = payload.fields.len()
            + payload.custom_fields.as_ref().map_or(0, |c| c.len());
        Ok(PushReport {
            action: PushAction::Updated,
            remote_id: record.remote_id().or(ack.remote_id),
            pushed_fields,
            issues: changes.issues().to_vec(),
        })
    }

    fn check_ack(
        &self,
        ack: &WriteAck,
        action: WriteAction,
        remote_ref: &RemoteRecordRef,
    ) -> PushResult<()> {
        if ack.success {
            Ok(())
        } else {
            Err(PushError::RemoteWrite {
                action,
                record_type: remote_ref.record_type().to_string(),
                detail: ack.error_detail(),
            })
        }
    }
}

/// True when an update for this change set will carry the custom-field
/// container: some changed field routes to the custom partition, or the
/// manual field list names the container.
fn custom_container_included(spec: &RecordTypeSpec, changes: &ChangeSet) -> bool {
    changes
        .fields()
        .iter()
        .any(|f| matches!(spec.field_map().mapping(f), Some(FieldMapping::Custom(_))))
        || spec.manual_fields().contains(&ManualField::CustomContainer)
}

/// Assembles the minimal update body from the built ref.
///
/// Standard-mapped changed fields copy their current ref value (a field
/// the builder omitted, i.e. a dangling reference, stays out). Any changed
/// custom-mapped field pulls in the entire custom container. Computed
/// entries have no declarative remote target and are skipped. Manual
/// fields are always included.
fn assemble_update_payload(
    remote_ref: &RemoteRecordRef,
    spec: &RecordTypeSpec,
    changes: &ChangeSet,
) -> UpdatePayload {
    let mut payload = UpdatePayload::default();

    for field in changes.fields() {
        if let Some(FieldMapping::Standard(remote_name)) = spec.field_map().mapping(field) {
            if let Some(value) = remote_ref.field(remote_name) {
                payload.fields.insert(remote_name.clone(), value.clone());
            }
        }
    }

    for manual in spec.manual_fields() {
        if let ManualField::Field(remote_name) = manual {
            let value = remote_ref
                .field(remote_name)
                .cloned()
                .unwrap_or(FieldValue::Null);
            payload.fields.insert(remote_name.clone(), value);
        }
    }

    if custom_container_included(spec, changes) {
        payload.custom_fields = Some(remote_ref.custom_fields().clone());
    }
    if spec.is_custom_record() {
        payload.custom_type = spec.custom_record_type_id().cloned();
    }

    payload
}

fn run_hooks(
    hooks: &[HookFn],
    record: &dyn LocalRecord,
    remote_ref: &mut RemoteRecordRef,
) -> PushResult<()> {
    for hook in hooks {
        (hook.as_ref())(record, remote_ref)?;
    }
    Ok(())
}
