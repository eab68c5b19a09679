//! Push modes: direction, addressing, and write mode.

/// Direction of a synchronization pass.
///
/// Transforms and computed mappings receive the direction so a single
/// declaration can serve both sides of the mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Local state is propagated to the remote record.
    Push,
    /// Remote state is folded back into the local record.
    Pull,
}

/// How the remote record is addressed when building its reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressingMode {
    /// Address by the internal id the remote system assigned.
    #[default]
    InternalId,
    /// Address by the caller-supplied stable external id.
    ExternalId,
}

/// Which remote write operation a create-path push uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Plain create; fails if the record already exists remotely.
    #[default]
    Add,
    /// Upsert; the remote system creates or replaces by identity.
    Upsert,
}
