//! Channel abstraction layer for Tandem.
//!
//! A peer never touches sockets directly. It talks to something that
//! implements [`Channel`]: an ordered, duplex pipe of messages, where a
//! message is an array of JSON values.
//!
//! Provided channels:
//!
//! - [`MemoryChannel`]: two in-process ends joined by queues. Used for
//!   tests and for peers living in the same program.
//! - [`WebSocketChannel`] / [`WebSocketListener`]: one message per text
//!   frame over a WebSocket.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket channel via `tokio-tungstenite`

mod error;
mod memory;
mod signal;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::ChannelError;
pub use memory::MemoryChannel;
#[cfg(feature = "websocket")]
pub use websocket::{ClientChannel, ServerChannel, WebSocketChannel, WebSocketListener};

use std::future::Future;

use serde_json::Value as JsonValue;

/// An ordered, duplex message pipe between two peers.
///
/// ## Contract
///
/// - `send` hands a message to the channel. It does not wait for the
///   other side to read it.
/// - `recv` yields messages in the order the other side sent them, and
///   `Ok(None)` once the channel is closed (by either side).
/// - `dispose` closes this end. It is idempotent and never blocks; a
///   pending `recv` on this end returns `Ok(None)`.
///
/// ## Why `impl Future + Send` instead of `async fn`?
///
/// The peer spawns its inbound pump with `tokio::spawn`, which needs the
/// future returned by `recv` to be `Send`. A plain `async fn` in a trait
/// can't promise that to generic callers; spelling out the return type
/// can. Implementations are still free to write `async fn`.
pub trait Channel: Send + Sync + 'static {
    /// Sends one message to the other end.
    ///
    /// # Errors
    /// [`ChannelError::Closed`] after [`dispose`](Channel::dispose), or a
    /// transport-specific failure.
    fn send(
        &self,
        message: Vec<JsonValue>,
    ) -> impl Future<Output = Result<(), ChannelError>> + Send;

    /// Receives the next message. `Ok(None)` means the channel is closed.
    fn recv(&self) -> impl Future<Output = Result<Option<Vec<JsonValue>>, ChannelError>> + Send;

    /// Closes this end of the channel.
    fn dispose(&self);
}
