//! Errors of the peer engine.
//!
//! Two types live here:
//!
//! - [`PeerError`]: everything that can go wrong on *this* side: bad
//!   configuration, malformed traffic, a dead channel, misuse of the lazy
//!   receipt, or a failure relayed from the remote side.
//! - [`RemoteError`]: the error *value* that functions fail with and that
//!   crosses the channel inside an `Error` envelope.

use std::fmt;

use tandem_channel::ChannelError;
use tandem_protocol::{FunctionHandle, ProtocolError, RequestId, WrappedError};

// ---------------------------------------------------------------------------
// PeerError
// ---------------------------------------------------------------------------

/// Errors produced by a [`Peer`](crate::Peer).
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Two codecs share a name, or a codec tried to take a reserved name.
    #[error("a codec named `{0}` is already registered")]
    DuplicateCodec(String),

    /// The exposed API is malformed (empty or duplicate method names).
    #[error("invalid local api: {0}")]
    InvalidApi(String),

    /// The remote side called a method, but this peer exposes no API.
    #[error("this peer exposes no api")]
    NoLocalApi,

    /// The peer was used outside a single-threaded Tokio runtime. The
    /// receipt window counts scheduler turns, which only exist there.
    #[error("peers need a current_thread Tokio runtime: {0}")]
    UnsupportedRuntime(String),

    /// A message or envelope doesn't follow the wire grammar.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A response arrived for a request that is not pending (never
    /// receipted, or already settled).
    #[error("response for unknown request {0}")]
    UnknownRequest(RequestId),

    /// An envelope names a codec this peer doesn't have.
    #[error("no codec registered for `{0}` envelopes")]
    UnregisteredCodec(String),

    /// The remote side called a method the local API doesn't have.
    #[error("method `{0}` is not exposed")]
    UnknownMethod(String),

    /// The remote side called an anonymous function handle this peer
    /// never issued.
    #[error("no function registered under {0}")]
    UnknownFunction(FunctionHandle),

    /// A value has no JSON form and no codec claims it.
    #[error("cannot encode value: {0}")]
    EncodeFailed(String),

    /// The remote function failed.
    #[error("remote error: {0}")]
    Remote(RemoteError),

    /// The invocation was first awaited after it had already been sent
    /// without a receipt. The call still happened; its result is lost.
    #[error(
        "no delivery receipt was requested before the invocation was sent; \
         await the invocation right away to receive its result"
    )]
    ReceiptNotRequested,

    /// The peer was disposed.
    #[error("peer is disposed")]
    Disposed,

    /// The channel failed.
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Coarse classification of a [`PeerError`].
///
/// Also used as the `name` of the [`RemoteError`] a local failure turns
/// into when it has to be reported to the remote side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Returned at the offending call: fix the code.
    Configuration,
    /// Something on the wire didn't make sense.
    Protocol,
    /// The remote function failed.
    Remote,
    /// The lazy receipt was misused.
    Usage,
    /// The channel or the peer's lifecycle got in the way.
    Transport,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Configuration => "ConfigurationError",
            ErrorCategory::Protocol => "ProtocolError",
            ErrorCategory::Remote => "RemoteError",
            ErrorCategory::Usage => "UsageError",
            ErrorCategory::Transport => "TransportError",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PeerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            PeerError::DuplicateCodec(_)
            | PeerError::InvalidApi(_)
            | PeerError::NoLocalApi
            | PeerError::UnsupportedRuntime(_) => ErrorCategory::Configuration,
            PeerError::Protocol(_)
            | PeerError::UnknownRequest(_)
            | PeerError::UnregisteredCodec(_)
            | PeerError::UnknownMethod(_)
            | PeerError::UnknownFunction(_)
            | PeerError::EncodeFailed(_) => ErrorCategory::Protocol,
            PeerError::Remote(_) => ErrorCategory::Remote,
            PeerError::ReceiptNotRequested => ErrorCategory::Usage,
            PeerError::Disposed | PeerError::Channel(_) => ErrorCategory::Transport,
        }
    }

    /// The relayed remote error, if this is one.
    pub fn as_remote(&self) -> Option<&RemoteError> {
        match self {
            PeerError::Remote(e) => Some(e),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// RemoteError
// ---------------------------------------------------------------------------

/// An error value that can cross the channel.
///
/// Functions fail with this type, and a failed invocation resolves to
/// [`PeerError::Remote`] carrying it. `name` and `stack` survive the
/// trip when the failing side provided them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RemoteError {
    pub message: String,
    pub name: Option<String>,
    pub stack: Option<String>,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            name: None,
            stack: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

/// Lets exposed functions use `?` on nested invocations.
///
/// A relayed remote error passes through untouched, so a failure three
/// hops away reaches the original caller as it was raised. Any other
/// failure is described by its message and named after its category.
impl From<PeerError> for RemoteError {
    fn from(error: PeerError) -> Self {
        match error {
            PeerError::Remote(remote) => remote,
            other => RemoteError::new(other.to_string()).with_name(other.category().as_str()),
        }
    }
}

impl From<WrappedError> for RemoteError {
    fn from(wrapped: WrappedError) -> Self {
        Self {
            message: wrapped.message,
            name: wrapped.name,
            stack: wrapped.stack,
        }
    }
}

impl From<RemoteError> for WrappedError {
    fn from(error: RemoteError) -> Self {
        Self {
            message: error.message,
            name: error.name,
            stack: error.stack,
        }
    }
}
