//! Peer protocol engine for Tandem.
//!
//! A [`Peer`] sits on one end of a [`Channel`](tandem_channel::Channel)
//! and lets the program on that end call functions exposed by the program
//! on the other end, and vice versa.
//!
//! # Core concepts
//!
//! - **[`Value`]**: what crosses the channel as an argument or result.
//!   Primitives travel as plain JSON; functions, errors and custom types
//!   go through a [`Codec`].
//! - **[`Function`]**: a cloneable async callable. Passing one to the
//!   remote side registers it under a handle; the remote side receives a
//!   proxy that calls back through the channel.
//! - **[`LocalApi`]**: the named functions this peer exposes.
//! - **[`Invocation`]**: the future returned by [`Peer::invoke`]. Polling
//!   it right away asks for a delivery receipt (the remote's result);
//!   dropping it unpolled sends the call fire-and-forget.
//!
//! # Lazy delivery receipts
//!
//! ```text
//! peer.invoke("add", args)          send deferred two scheduler turns
//!        │
//!        ├─ polled before send ───► [id, "add", ...]  ──► [-id, null, 3]
//!        │
//!        ├─ never polled ─────────► [0, "add", ...]       (no response)
//!        │
//!        └─ polled after send ────► Err(ReceiptNotRequested)
//! ```

mod api;
mod codec;
mod config;
mod encoding;
mod error;
mod fault;
mod functions;
mod invocation;
mod peer;
mod pending;
mod value;

pub use api::{LocalApi, LocalApiBuilder};
pub use codec::{Codec, CodecRegistry, DecodeContext, ErrorCodec, FunctionCodec, Invoker};
pub use config::PeerConfig;
pub use encoding::{Decoder, Encoder};
pub use error::{ErrorCategory, PeerError, RemoteError};
pub use functions::FunctionRegistry;
pub use invocation::{Invocation, RECEIPT_WINDOW_TURNS};
pub use peer::{Peer, PeerBuilder};
pub use value::{CustomValue, Function, FunctionFuture, Value};

use std::sync::{Mutex, MutexGuard};

/// Locks a mutex, recovering the data if a panicking task poisoned it.
///
/// None of the tables guarded this way can be left half-updated by a
/// panic, so the poison flag carries no information here.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
