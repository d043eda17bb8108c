//! WebSocket channel implementation using `tokio-tungstenite`.
//!
//! Each message travels as one text frame holding a JSON array. The
//! stream is split so the peer's inbound pump can sit in `recv` while
//! other tasks keep sending.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value as JsonValue;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::signal::CloseSignal;
use crate::{Channel, ChannelError};

/// Server-side channel produced by [`WebSocketListener::accept`].
pub type ServerChannel = WebSocketChannel<TcpStream>;

/// Client-side channel produced by [`WebSocketChannel::connect`].
pub type ClientChannel = WebSocketChannel<MaybeTlsStream<TcpStream>>;

// ---------------------------------------------------------------------------
// WebSocketListener
// ---------------------------------------------------------------------------

/// Accepts incoming WebSocket connections, one channel per connection.
pub struct WebSocketListener {
    listener: TcpListener,
}

impl WebSocketListener {
    /// Binds to the given address. Use port `0` to let the OS pick one,
    /// then read it back with [`local_addr`](Self::local_addr).
    pub async fn bind(addr: &str) -> Result<Self, ChannelError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(ChannelError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket listener bound");
        Ok(Self { listener })
    }

    /// The address actually bound.
    pub fn local_addr(&self) -> Result<SocketAddr, ChannelError> {
        self.listener.local_addr().map_err(ChannelError::AcceptFailed)
    }

    /// Waits for the next connection and completes the WebSocket handshake.
    pub async fn accept(&self) -> Result<ServerChannel, ChannelError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(ChannelError::AcceptFailed)?;

        let ws = tokio_tungstenite::accept_async(stream).await.map_err(|e| {
            ChannelError::AcceptFailed(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                e,
            ))
        })?;

        tracing::debug!(%addr, "accepted WebSocket connection");
        Ok(WebSocketChannel::from_stream(ws, Some(addr)))
    }
}

// ---------------------------------------------------------------------------
// WebSocketChannel
// ---------------------------------------------------------------------------

/// A [`Channel`] over one WebSocket connection.
pub struct WebSocketChannel<S> {
    sink: Arc<Mutex<SplitSink<WebSocketStream<S>, WsMessage>>>,
    stream: Mutex<SplitStream<WebSocketStream<S>>>,
    closed: CloseSignal,
    peer_addr: Option<SocketAddr>,
}

impl WebSocketChannel<MaybeTlsStream<TcpStream>> {
    /// Connects to a `ws://` URL.
    pub async fn connect(url: &str) -> Result<ClientChannel, ChannelError> {
        let (ws, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| ChannelError::ConnectFailed(e.to_string()))?;
        tracing::debug!(url, "connected WebSocket channel");
        Ok(Self::from_stream(ws, None))
    }
}

impl<S> WebSocketChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wraps an already-established WebSocket stream.
    pub fn from_stream(ws: WebSocketStream<S>, peer_addr: Option<SocketAddr>) -> Self {
        let (sink, stream) = ws.split();
        Self {
            sink: Arc::new(Mutex::new(sink)),
            stream: Mutex::new(stream),
            closed: CloseSignal::new(),
            peer_addr,
        }
    }

    /// Remote address, known for server-side channels.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Reads frames until one carries a message, the socket closes, or
    /// reading fails.
    async fn next_message(&self) -> Result<Option<Vec<JsonValue>>, ChannelError> {
        let mut stream = self.stream.lock().await;
        loop {
            let frame = match stream.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => return Err(ChannelError::ReceiveFailed(e.to_string())),
                None => return Ok(None),
            };
            let parsed = match frame {
                WsMessage::Text(text) => serde_json::from_str::<JsonValue>(text.as_str()),
                WsMessage::Binary(data) => serde_json::from_slice::<JsonValue>(&data),
                WsMessage::Close(_) => return Ok(None),
                // ping/pong/raw frames carry no messages
                _ => continue,
            };
            match parsed {
                Ok(JsonValue::Array(message)) => return Ok(Some(message)),
                Ok(other) => {
                    tracing::debug!(payload = %other, "skipping non-array frame");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "skipping frame that is not JSON");
                }
            }
        }
    }
}

impl<S> Channel for WebSocketChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn send(&self, message: Vec<JsonValue>) -> Result<(), ChannelError> {
        if self.closed.is_closed() {
            return Err(ChannelError::Closed);
        }
        let text = JsonValue::Array(message).to_string();
        self.sink
            .lock()
            .await
            .send(WsMessage::Text(text.into()))
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))
    }

    async fn recv(&self) -> Result<Option<Vec<JsonValue>>, ChannelError> {
        if self.closed.is_closed() {
            return Ok(None);
        }
        tokio::select! {
            result = self.next_message() => result,
            () = self.closed.closed() => Ok(None),
        }
    }

    fn dispose(&self) {
        if !self.closed.close() {
            return;
        }
        tracing::debug!(peer_addr = ?self.peer_addr, "WebSocket channel disposed");

        // Closing the socket is async; hand it to the runtime if there is one.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let sink = self.sink.clone();
            handle.spawn(async move {
                if let Err(e) = sink.lock().await.close().await {
                    tracing::debug!(error = %e, "WebSocket close handshake failed");
                }
            });
        }
    }
}
