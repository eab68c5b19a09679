//! Error types for the push engine.

use crate::remote::WriteAction;
use crate::transform::TransformError;
use thiserror::Error;

/// Result type for push operations.
pub type PushResult<T> = Result<T, PushError>;

/// Errors that abort a push.
///
/// Relationship-resolution failures are deliberately absent: they are
/// recovered during change detection and reported as diagnostics on the
/// [`ChangeSet`](crate::ChangeSet), never as an error.
#[derive(Error, Debug)]
pub enum PushError {
    /// The record type was never registered with the mapping registry.
    #[error("no field map registered for record type `{0}`")]
    UnregisteredType(String),

    /// A value failed its declared transform. Aborts before any remote
    /// write; a malformed value is never silently dropped.
    #[error("transform failed for field `{field}`: {source}")]
    Transformation {
        /// Local field whose value failed.
        field: String,
        /// The underlying transform failure.
        #[source]
        source: TransformError,
    },

    /// The remote system reported a write failure.
    #[error("remote {action} failed for `{record_type}`: {detail}")]
    RemoteWrite {
        /// The write operation that was attempted.
        action: WriteAction,
        /// Remote record type the write targeted.
        record_type: String,
        /// Remote-side validation detail.
        detail: String,
    },

    /// The remote collaborator could not complete the call at all.
    #[error("remote transport error: {0}")]
    Transport(String),

    /// A before/after push callback failed.
    #[error("push callback failed: {0}")]
    Callback(String),
}
