use thiserror::Error;

/// Errors [`TinyFrame::send`](crate::TinyFrame::send) and
/// [`TinyFrame::respond`](crate::TinyFrame::respond) can return.
///
/// There is no "configuration error" variant: field widths and checksum
/// kind are enforced by the type system at compile time, so the only
/// failures left are ones that depend on the message being sent and on
/// runtime listener-table occupancy.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// The payload does not fit in `MAX_PAYLOAD_TX` bytes.
    #[error("payload of {len} bytes exceeds MAX_PAYLOAD_TX of {max}")]
    PayloadTooLarge { len: usize, max: usize },

    /// A listener was requested for this send, but the ID listener table is
    /// already full. No bytes are sent in this case.
    #[error("ID listener table is full")]
    ListenerTableFull,
}

/// Errors from registering or looking up listeners.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerError {
    /// The relevant table has no free slot.
    #[error("listener table is full")]
    TableFull,
    /// No active listener matched the lookup key.
    #[error("no matching listener found")]
    NotFound,
    /// A type or generic listener already exists for this key/callback.
    #[error("listener already registered")]
    Duplicate,
}
