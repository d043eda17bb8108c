//! # Tandem
//!
//! Bidirectional RPC between two peers over an ordered message channel.
//!
//! Each side may expose a set of named functions and call the other
//! side's. Arguments and results may themselves be functions: they are
//! marshaled as handles, and calling one on the far side calls back into
//! the side that owns it. Errors thrown remotely come back as
//! [`PeerError::Remote`](tandem_peer::PeerError::Remote).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tandem::prelude::*;
//!
//! # async fn run() -> Result<(), TandemError> {
//! let (server_end, client_end) = MemoryChannel::pair();
//!
//! let api = LocalApi::builder()
//!     .method_fn("ping", |args| Ok(args.first().cloned().unwrap_or_default()))
//!     .build()?;
//! let _server = tandem::expose(api).connect(server_end)?;
//! let client = tandem::connect(client_end)?;
//!
//! let pong = client.invoke("ping", vec![Value::from("pong")]).await?;
//! assert_eq!(pong.as_str(), Some("pong"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Crates
//!
//! - `tandem-protocol`: the wire grammar.
//! - `tandem-channel`: the [`Channel`](tandem_channel::Channel) trait and
//!   its in-memory and WebSocket implementations.
//! - `tandem-peer`: the protocol engine.

mod error;

pub use error::TandemError;

use tandem_channel::Channel;
use tandem_peer::{LocalApi, Peer, PeerBuilder, PeerError};

/// Starts building a peer that exposes `api`.
pub fn expose(api: LocalApi) -> PeerBuilder {
    PeerBuilder::new().api(api)
}

/// Connects a peer that exposes nothing and only calls the other side.
///
/// Must be called from inside a `current_thread` Tokio runtime; see
/// [`PeerBuilder::connect`].
pub fn connect<C: Channel>(channel: C) -> Result<Peer<C>, PeerError> {
    PeerBuilder::new().connect(channel)
}

/// Installs a `fmt` subscriber filtered by `RUST_LOG` (default `info`).
///
/// Does nothing if a global subscriber is already installed.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
    {
        tracing::debug!("tracing initialized");
    }
}

pub mod prelude {
    pub use crate::TandemError;
    pub use tandem_channel::{Channel, ChannelError, MemoryChannel};
    #[cfg(feature = "websocket")]
    pub use tandem_channel::{WebSocketChannel, WebSocketListener};
    pub use tandem_peer::{
        Codec, CustomValue, DecodeContext, ErrorCategory, Function, Invocation, LocalApi, Peer,
        PeerBuilder, PeerConfig, PeerError, RemoteError, Value,
    };
    pub use tandem_protocol::{ProtocolError, WrappedValue};
}
