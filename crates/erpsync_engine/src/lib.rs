//! # erpsync Engine
//!
//! Change-detection and field-mapping push engine.
//!
//! This crate provides:
//! - Per-type declarative field maps (standard, custom, computed)
//! - Change detection with relationship and serialized-attribute folding
//! - Value transforms (phone, email, name, timezone-shifted dates)
//! - Remote record building with reference resolution
//! - A push state machine deciding create vs minimal update
//!
//! ## Architecture
//!
//! The engine reconciles one local record per push:
//! 1. Resolve which mapped fields changed (full domain for creates)
//! 2. Build the remote representation through the field map
//! 3. Run before-push hooks
//! 4. Create, upsert, or minimally update the remote record
//! 5. Run after-push hooks
//!
//! Persistence and the remote transport stay behind the [`LocalRecord`]
//! and [`RemoteStore`] traits; the engine owns diffing and mapping, never
//! I/O policy.
//!
//! ## Key Invariants
//!
//! - A create pushes the full mapped field set
//! - An update pushes only folded, mapped changes
//! - An empty update is skipped without a remote call
//! - A dirty custom field pulls in the whole custom container
//! - Dangling relationship references are never pushed
//! - The remote id is persisted only after a successful create

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod builder;
mod detect;
mod error;
mod push;
mod record;
mod registry;
mod remote;
mod transform;

pub use builder::RecordBuilder;
pub use detect::{resolve_push_fields, ChangeSet, RelationshipIssue};
pub use error::{PushError, PushResult};
pub use push::{
    PushAction, PushConfig, PushEngine, PushOptions, PushReport, PushState, PushStats,
};
pub use record::{LocalRecord, MemoryRecord, Relationship};
pub use registry::{
    ComputedFn, FieldMap, FieldMapping, HookFn, ManualField, MappingRegistry, RecordTypeSpec,
};
pub use remote::{MockRemote, RemoteStore, WriteAck, WriteAction};
pub use transform::{apply_transform, TransformContext, TransformError, TransformKind};
