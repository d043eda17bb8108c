//! Error types for the protocol layer.
//!
//! Each crate in Tandem defines its own error enum. A `ProtocolError`
//! always means "the bytes/values on the wire do not follow the grammar",
//! never "the channel broke" or "the remote function failed".

/// Errors that can occur while parsing or building wire messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The message array doesn't match either the Invocation or the
    /// Response shape.
    ///
    /// Examples: an empty array, a non-integer id, an invocation whose
    /// target is neither a string nor a positive integer.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A value looked like an envelope (it has a `"$"` tag) but its fields
    /// don't match what that kind requires, e.g. an `Error` envelope
    /// without a string `message`.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),
}
