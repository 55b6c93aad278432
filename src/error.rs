//! Error types for hubwire.

use bytes::Bytes;
use thiserror::Error;

/// Main error type for all hubwire operations.
#[derive(Debug, Error)]
pub enum HubwireError {
    /// I/O error surfaced by the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport reported a failed write for a reason of its own
    /// (disconnect, GATT error, timeout inside the transport).
    #[error("transport write failed: {0}")]
    Transport(String),

    /// The transport refused a write because one was already pending.
    ///
    /// The engine serializes writes, so this normally indicates some other
    /// party is writing to the same characteristic.
    #[error("transport busy")]
    Busy,

    /// Malformed or unrecognized wire data.
    #[error("protocol error: {0}")]
    Protocol(#[from] DecodeError),

    /// The session has shut down and no longer accepts input.
    #[error("session closed")]
    Closed,
}

/// Result type alias using [`HubwireError`].
pub type Result<T> = std::result::Result<T, HubwireError>;

/// Failure to classify or decode an inbound notification buffer.
///
/// Carries the offending buffer verbatim so integrators can log or inspect
/// exactly what the hub sent. Cloneable so it can travel inside
/// [`Event::ProtocolError`](crate::protocol::Event) without losing the
/// original bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[error("{message}")]
pub struct DecodeError {
    /// Human-readable description of what failed.
    pub message: String,
    /// The raw buffer exactly as received.
    pub raw: Bytes,
}

impl DecodeError {
    /// Create a decode error for the given buffer.
    pub fn new(message: impl Into<String>, raw: impl Into<Bytes>) -> Self {
        Self {
            message: message.into(),
            raw: raw.into(),
        }
    }
}
