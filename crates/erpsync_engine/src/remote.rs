//! Remote store abstraction.
//!
//! The engine never talks to the external system directly; it drives a
//! [`RemoteStore`] implementation. This keeps the wire protocol, session
//! handling, and retry policy in the transport collaborator, and lets
//! tests script every write with [`MockRemote`].

use crate::error::{PushError, PushResult};
use erpsync_model::{RemoteId, RemoteRecordRef, UpdatePayload};
use std::fmt;
use std::sync::Mutex;

/// The write operation attempted against the remote system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAction {
    /// Plain create of a new remote record.
    Create,
    /// Create-or-replace by identity.
    Upsert,
    /// Partial update of an existing remote record.
    Update,
}

impl fmt::Display for WriteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WriteAction::Create => "create",
            WriteAction::Upsert => "upsert",
            WriteAction::Update => "update",
        };
        f.write_str(name)
    }
}

/// Outcome of a remote write.
///
/// `success: false` means the remote system processed the call and
/// rejected it (validation failure); transport-level failures are returned
/// as errors by the [`RemoteStore`] methods instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteAck {
    /// Whether the remote system accepted the write.
    pub success: bool,
    /// Remote id assigned or confirmed by the write.
    pub remote_id: Option<RemoteId>,
    /// Remote-side error detail when rejected.
    pub errors: Vec<String>,
}

impl WriteAck {
    /// Acknowledges a successful write that assigned or confirmed an id.
    #[must_use]
    pub fn accepted(remote_id: impl Into<RemoteId>) -> Self {
        Self {
            success: true,
            remote_id: Some(remote_id.into()),
            errors: Vec::new(),
        }
    }

    /// Acknowledges a successful write with no id in the response.
    #[must_use]
    pub fn accepted_without_id() -> Self {
        Self {
            success: true,
            remote_id: None,
            errors: Vec::new(),
        }
    }

    /// A rejected write with remote-side error detail.
    #[must_use]
    pub fn rejected(errors: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            success: false,
            remote_id: None,
            errors: errors.into_iter().map(Into::into).collect(),
        }
    }

    /// Joins the remote-side errors into one detail string.
    #[must_use]
    pub fn error_detail(&self) -> String {
        if self.errors.is_empty() {
            "remote rejected the write".to_string()
        } else {
            self.errors.join("; ")
        }
    }
}

/// A remote store handles the writes against the external system.
///
/// Implementations own connection handling, encoding, and retry policy.
/// Each method blocks until the remote call completes; it is the only
/// suspension point of a push.
pub trait RemoteStore: Send + Sync {
    /// Creates a new remote record from the built ref.
    fn create(&self, record: &RemoteRecordRef) -> PushResult<WriteAck>;

    /// Creates or replaces the remote record addressed by the ref.
    fn upsert(&self, record: &RemoteRecordRef) -> PushResult<WriteAck>;

    /// Applies the minimal update payload to the record addressed by the ref.
    fn update(&self, record: &RemoteRecordRef, payload: &UpdatePayload) -> PushResult<WriteAck>;
}

/// A scriptable remote store for testing.
///
/// Every attempted write is recorded so tests can assert on exactly what
/// would have gone over the wire. An unscripted call fails, like a
/// transport with nothing listening.
#[derive(Debug, Default)]
pub struct MockRemote {
    create_ack: Mutex<Option<WriteAck>>,
    upsert_ack: Mutex<Option<WriteAck>>,
    update_ack: Mutex<Option<WriteAck>>,
    creates: Mutex<Vec<RemoteRecordRef>>,
    upserts: Mutex<Vec<RemoteRecordRef>>,
    updates: Mutex<Vec<(RemoteRecordRef, UpdatePayload)>>,
}

impl MockRemote {
    /// Creates a mock with no scripted responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the response for `create` calls.
    pub fn set_create_ack(&self, ack: WriteAck) {
        *self.create_ack.lock().unwrap() = Some(ack);
    }

    /// Scripts the response for `upsert` calls.
    pub fn set_upsert_ack(&self, ack: WriteAck) {
        *self.upsert_ack.lock().unwrap() = Some(ack);
    }

    /// Scripts the response for `update` calls.
    pub fn set_update_ack(&self, ack: WriteAck) {
        *self.update_ack.lock().unwrap() = Some(ack);
    }

    /// Refs passed to `create`.
    #[must_use]
    pub fn creates(&self) -> Vec<RemoteRecordRef> {
        self.creates.lock().unwrap().clone()
    }

    /// Refs passed to `upsert`.
    #[must_use]
    pub fn upserts(&self) -> Vec<RemoteRecordRef> {
        self.upserts.lock().unwrap().clone()
    }

    /// Ref/payload pairs passed to `update`.
    #[must_use]
    pub fn updates(&self) -> Vec<(RemoteRecordRef, UpdatePayload)> {
        self.updates.lock().unwrap().clone()
    }

    /// Total number of writes attempted.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.creates.lock().unwrap().len()
            + self.upserts.lock().unwrap().len()
            + self.updates.lock().unwrap().len()
    }

    fn scripted(slot: &Mutex<Option<WriteAck>>, action: WriteAction) -> PushResult<WriteAck> {
        slot.lock()
            .unwrap()
            .clone()
            .ok_or_else(|| PushError::Transport(format!("no mock {action} response set")))
    }
}

impl RemoteStore for MockRemote {
    fn create(&self, record: &RemoteRecordRef) -> PushResult<WriteAck> {
        self.creates.lock().unwrap().push(record.clone());
        Self::scripted(&self.create_ack, WriteAction::Create)
    }

    fn upsert(&self, record: &RemoteRecordRef) -> PushResult<WriteAck> {
        self.upserts.lock().unwrap().push(record.clone());
        Self::scripted(&self.upsert_ack, WriteAction::Upsert)
    }

    fn update(&self, record: &RemoteRecordRef, payload: &UpdatePayload) -> PushResult<WriteAck> {
        self.updates
            .lock()
            .unwrap()
            .push((record.clone(), payload.clone()));
        Self::scripted(&self.update_ack, WriteAction::Update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unscripted_call_is_transport_error() {
        let remote = MockRemote::new();
        let record = RemoteRecordRef::new("customer");

        let err = remote.create(&record).unwrap_err();
        assert!(matches!(err, PushError::Transport(_)));
        // The attempt is still recorded.
        assert_eq!(remote.creates().len(), 1);
    }

    #[test]
    fn scripted_acks_are_returned() {
        let remote = MockRemote::new();
        remote.set_create_ack(WriteAck::accepted(42));

        let ack = remote.create(&RemoteRecordRef::new("customer")).unwrap();
        assert!(ack.success);
        assert_eq!(ack.remote_id, Some(RemoteId::from(42)));
    }

    #[test]
    fn rejected_ack_detail() {
        let ack = WriteAck::rejected(["phone too long", "email invalid"]);
        assert!(!ack.success);
        assert_eq!(ack.error_detail(), "phone too long; email invalid");

        let ack = WriteAck::rejected(Vec::<String>::new());
        assert_eq!(ack.error_detail(), "remote rejected the write");
    }

    #[test]
    fn updates_record_payloads() {
        let remote = MockRemote::new();
        remote.set_update_ack(WriteAck::accepted_without_id());

        let record = RemoteRecordRef::new("customer");
        let payload = UpdatePayload::default();
        remote.update(&record, &payload).unwrap();

        assert_eq!(remote.updates().len(), 1);
        assert_eq!(remote.write_count(), 1);
    }
}
