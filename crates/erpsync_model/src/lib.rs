//! # erpsync Model
//!
//! Shared data model for the erpsync push engine.
//!
//! This crate provides:
//! - Field values moved between local and remote representations
//! - Remote record identifiers
//! - The in-memory remote record representation built per push
//! - Minimal update payloads
//! - Push modes (direction, addressing, write mode)
//!
//! It is a pure data crate: no I/O, no collaborator traits. The engine
//! crate (`erpsync_engine`) consumes these types; callers use them when
//! writing computed field mappings and push hooks.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod mode;
mod record_ref;
mod value;

pub use mode::{AddressingMode, Direction, WriteMode};
pub use record_ref::{RemoteRecordRef, UpdatePayload};
pub use value::{FieldValue, RemoteId};
