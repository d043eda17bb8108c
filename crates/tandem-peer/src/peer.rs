//! The peer: one end of a bidirectional RPC link.
//!
//! A peer owns its channel, its codec registry, its anonymous-function
//! registry and its table of pending operations. It runs one background
//! task, the inbound pump, which reads messages off the channel and
//! spawns one dispatch task per message, so a slow function never holds
//! up the responses other callers are waiting for.
//!
//! ```text
//!             invoke()                                 pump
//!  caller ──► encode args ──► send task ──► Channel ──► dispatch task
//!     ▲         (now)       (2 turns later)            │
//!     │                                                ├─ Invocation ─► run ─► respond
//!     └──────────── pending table ◄────────────────────┴─ Response ──► settle
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde_json::Value as JsonValue;
use tandem_channel::{Channel, ChannelError};
use tandem_protocol::{FunctionHandle, Message, Response, Target};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::task::JoinHandle;

use crate::codec::{Codec, CodecRegistry, DecodeContext, Invoker};
use crate::encoding::{Decoder, Encoder};
use crate::fault::{FaultCallback, FaultSink};
use crate::functions::{FunctionRegistry, proxy};
use crate::invocation::{Invocation, RECEIPT_WINDOW_TURNS, ReceiptSlot};
use crate::pending::PendingOperations;
use crate::{Function, LocalApi, PeerConfig, PeerError, RemoteError, Value, lock};

// ---------------------------------------------------------------------------
// PeerBuilder
// ---------------------------------------------------------------------------

/// Configures and connects a [`Peer`].
///
/// ```rust,no_run
/// use tandem_channel::MemoryChannel;
/// use tandem_peer::{LocalApi, PeerBuilder, Value};
///
/// # async fn run() -> Result<(), tandem_peer::PeerError> {
/// let (left, _right) = MemoryChannel::pair();
/// let api = LocalApi::builder()
///     .method("ping", |_| async { Ok(Value::from("pong")) })
///     .build()?;
/// let peer = PeerBuilder::new().name("left").api(api).connect(left)?;
/// # drop(peer);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
#[must_use]
pub struct PeerBuilder {
    config: PeerConfig,
    api: Option<LocalApi>,
    codecs: Vec<Arc<dyn Codec>>,
    on_fault: Option<FaultCallback>,
}

impl PeerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the name used in log lines.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: PeerConfig) -> Self {
        self.config = config;
        self
    }

    /// The functions the remote side may call.
    pub fn api(mut self, api: LocalApi) -> Self {
        self.api = Some(api);
        self
    }

    /// Adds a codec after the built-in ones. Repeatable; order matters.
    pub fn codec(mut self, codec: impl Codec) -> Self {
        self.codecs.push(Arc::new(codec));
        self
    }

    /// Called with every fault no caller is waiting for, in addition to
    /// the `error` log line.
    pub fn on_fault<F>(mut self, callback: F) -> Self
    where
        F: Fn(&PeerError) + Send + Sync + 'static,
    {
        self.on_fault = Some(Arc::new(callback));
        self
    }

    /// Builds the peer on `channel` and starts its inbound pump.
    ///
    /// Must be called from inside a `current_thread` Tokio runtime
    /// (`#[tokio::main(flavor = "current_thread")]`, or the default
    /// `#[tokio::test]`). On a multi-threaded runtime another worker could
    /// send an invocation while its caller is still on the way to awaiting
    /// it.
    ///
    /// # Errors
    /// [`PeerError::UnsupportedRuntime`] outside a `current_thread`
    /// runtime, [`PeerError::DuplicateCodec`] if two codecs share a name.
    pub fn connect<C: Channel>(self, channel: C) -> Result<Peer<C>, PeerError> {
        require_current_thread()?;
        let functions = Arc::new(FunctionRegistry::new());
        let codecs = CodecRegistry::with_builtins(functions.clone());
        for codec in self.codecs {
            codecs.register(codec)?;
        }

        let name: Arc<str> = Arc::from(self.config.name.as_str());
        let channel = Arc::new(channel);
        let faults = FaultSink::new(name.clone(), self.on_fault);
        let outbox = Outbox {
            channel: channel.clone(),
            faults: faults.clone(),
            peer: name.clone(),
            trace: self.config.trace_messages,
        };

        let inner = Arc::new(PeerInner {
            name: name.clone(),
            api: self.api,
            codecs,
            functions,
            pending: Arc::new(PendingOperations::new()),
            outbox,
            faults,
            disposed: AtomicBool::new(false),
            pump: Mutex::new(None),
        });

        let handle = tokio::spawn(pump(channel, Arc::downgrade(&inner)));
        *lock(&inner.pump) = Some(handle);

        tracing::info!(
            peer = %name,
            methods = inner.api.as_ref().map_or(0, LocalApi::len),
            codecs = ?inner.codecs.names(),
            "peer connected"
        );
        Ok(Peer { inner })
    }
}

// ---------------------------------------------------------------------------
// Peer
// ---------------------------------------------------------------------------

/// One end of a bidirectional RPC link over a [`Channel`].
///
/// Dropping a `Peer` disposes it.
pub struct Peer<C: Channel> {
    inner: Arc<PeerInner<C>>,
}

impl<C: Channel> Peer<C> {
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Calls `method` on the remote side.
    ///
    /// The arguments are encoded now; the message is sent after
    /// [`RECEIPT_WINDOW_TURNS`] scheduler turns. Await the returned
    /// [`Invocation`] right away to get the result; drop it to fire and
    /// forget.
    ///
    /// Must be called from inside a `current_thread` Tokio runtime;
    /// anywhere else the invocation fails with
    /// [`PeerError::UnsupportedRuntime`].
    pub fn invoke(&self, method: impl Into<String>, args: Vec<Value>) -> Invocation {
        self.inner.invoke_target(Target::Method(method.into()), args)
    }

    /// A [`Function`] that calls `method` on the remote side.
    ///
    /// The function holds the peer weakly; once the peer is gone, calls
    /// fail with a disposed error.
    pub fn remote_function(&self, method: impl Into<String>) -> Function {
        let weak: Weak<PeerInner<C>> = Arc::downgrade(&self.inner);
        let invoker: Weak<dyn Invoker> = weak;
        proxy(invoker, Target::Method(method.into()))
    }

    /// Registers another codec.
    ///
    /// # Errors
    /// [`PeerError::DuplicateCodec`] if the name is taken,
    /// [`PeerError::Disposed`] after dispose.
    pub fn add_codec(&self, codec: impl Codec) -> Result<(), PeerError> {
        self.inner.codecs.register(Arc::new(codec))
    }

    /// Tears the peer down. Idempotent.
    ///
    /// Pending invocations are abandoned (they never resolve), the
    /// function registry is emptied, every codec and the channel are
    /// disposed, and the inbound pump stops. Invocations created after
    /// this fail with [`PeerError::Disposed`].
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Number of invocations waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    /// Number of local functions the remote side holds handles to.
    pub fn function_count(&self) -> usize {
        self.inner.functions.len()
    }
}

impl<C: Channel> Drop for Peer<C> {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}

impl<C: Channel> std::fmt::Debug for Peer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("name", &self.inner.name)
            .field("disposed", &self.is_disposed())
            .field("pending", &self.pending_count())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Outbox
// ---------------------------------------------------------------------------

/// The sending side of the channel plus what every send needs for logging.
struct Outbox<C> {
    channel: Arc<C>,
    faults: FaultSink,
    peer: Arc<str>,
    trace: bool,
}

impl<C> Clone for Outbox<C> {
    fn clone(&self) -> Self {
        Self {
            channel: self.channel.clone(),
            faults: self.faults.clone(),
            peer: self.peer.clone(),
            trace: self.trace,
        }
    }
}

impl<C: Channel> Outbox<C> {
    async fn send(&self, message: Message) -> Result<(), ChannelError> {
        let wire = message.into_wire();
        if self.trace {
            tracing::trace!(peer = %self.peer, message = ?wire, "sending message");
        }
        self.channel.send(wire).await
    }
}

// ---------------------------------------------------------------------------
// PeerInner
// ---------------------------------------------------------------------------

struct PeerInner<C: Channel> {
    name: Arc<str>,
    api: Option<LocalApi>,
    codecs: CodecRegistry,
    functions: Arc<FunctionRegistry>,
    pending: Arc<PendingOperations>,
    outbox: Outbox<C>,
    faults: FaultSink,
    disposed: AtomicBool,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl<C: Channel> Invoker for PeerInner<C> {
    fn invoke_target(&self, target: Target, args: Vec<Value>) -> Invocation {
        if let Err(e) = require_current_thread() {
            return Invocation::failed(e);
        }
        if self.is_disposed() {
            return Invocation::failed(PeerError::Disposed);
        }
        let args = match Encoder::new(&self.codecs).encode_all(&args) {
            Ok(args) => args,
            Err(e) => return Invocation::failed(e),
        };

        let slot = Arc::new(ReceiptSlot::new());
        tokio::spawn(deferred_send(
            self.outbox.clone(),
            self.pending.clone(),
            slot.clone(),
            target,
            args,
        ));
        Invocation::lazy(slot, self.pending.clone(), self.name.clone())
    }
}

impl<C: Channel> PeerInner<C> {
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.pending.dispose();
        self.codecs.dispose();
        self.functions.clear();
        self.outbox.channel.dispose();
        if let Some(pump) = lock(&self.pump).take() {
            pump.abort();
        }
        tracing::info!(peer = %self.name, "peer disposed");
    }

    fn decode_context(self: &Arc<Self>) -> DecodeContext {
        let weak: Weak<PeerInner<C>> = Arc::downgrade(self);
        DecodeContext::new(weak)
    }

    /// Handles one inbound message. Runs in its own task.
    async fn dispatch(self: Arc<Self>, raw: Vec<JsonValue>) {
        if self.outbox.trace {
            tracing::trace!(peer = %self.name, message = ?raw, "received message");
        }
        let answers = Message::response_id(&raw);
        match Message::parse(raw) {
            Ok(Message::Invocation(invocation)) => self.handle_invocation(invocation).await,
            Ok(Message::Response(response)) => self.handle_response(response),
            Err(e) => match answers {
                // A broken response still answers its request; don't leave
                // the caller waiting for one that will never come.
                Some(id) => {
                    if let Err(unknown) = self.pending.settle(id, Err(e.into())) {
                        self.faults.report(unknown);
                    }
                }
                None => self.faults.report(e.into()),
            },
        }
    }

    async fn handle_invocation(self: &Arc<Self>, invocation: tandem_protocol::Invocation) {
        let request = invocation.request_id();
        let target = invocation.target;
        let outcome = self.run(&target, &invocation.args).await;

        let Some(id) = request else {
            match outcome {
                Ok(_) => tracing::debug!(peer = %self.name, %target, "fire-and-forget call completed"),
                Err(e) => self.faults.report(e),
            }
            return;
        };

        let encoded = outcome.and_then(|value| Encoder::new(&self.codecs).encode(&value));
        let response = match encoded {
            Ok(result) => Response::success(id, result),
            Err(e) => {
                tracing::debug!(peer = %self.name, request = %id, %target, error = %e, "call failed");
                Response::failure(id, RemoteError::from(e).into())
            }
        };
        if let Err(e) = self.outbox.send(response.into()).await {
            self.faults.report(e.into());
        }
    }

    /// Resolves the target, decodes the arguments and calls the function.
    async fn run(self: &Arc<Self>, target: &Target, args: &[JsonValue]) -> Result<Value, PeerError> {
        let function = self.resolve(target)?;
        let context = self.decode_context();
        let args = Decoder::new(&self.codecs, &context).decode_all(args)?;
        function.call(args).await.map_err(PeerError::Remote)
    }

    fn resolve(&self, target: &Target) -> Result<Function, PeerError> {
        match target {
            Target::Function(handle) => self.function(*handle),
            Target::Method(name) => {
                let api = self.api.as_ref().ok_or(PeerError::NoLocalApi)?;
                api.get(name)
                    .cloned()
                    .ok_or_else(|| PeerError::UnknownMethod(name.clone()))
            }
        }
    }

    fn function(&self, handle: FunctionHandle) -> Result<Function, PeerError> {
        self.functions
            .get(handle)
            .ok_or(PeerError::UnknownFunction(handle))
    }

    fn handle_response(self: &Arc<Self>, response: Response) {
        let id = response.id;
        let context = self.decode_context();
        let decoder = Decoder::new(&self.codecs, &context);
        let outcome = match response.error {
            Some(error) => Err(rejection(&decoder, &error)),
            None => decoder.decode(&response.result),
        };
        match self.pending.settle(id, outcome) {
            Ok(()) => tracing::debug!(peer = %self.name, request = %id, "response matched"),
            Err(e) => self.faults.report(e),
        }
    }
}

/// Turns the error slot of a failed response into the caller's error.
///
/// Any value is a valid rejection. An `Error` envelope keeps its fields;
/// anything else becomes a [`RemoteError`] described by its JSON text.
fn rejection(decoder: &Decoder<'_>, error: &JsonValue) -> PeerError {
    match decoder.decode(error) {
        Ok(Value::Error(remote)) => PeerError::Remote(remote),
        Ok(_) => PeerError::Remote(RemoteError::new(match error {
            JsonValue::String(message) => message.clone(),
            other => other.to_string(),
        })),
        Err(e) => e,
    }
}

/// The receipt window is counted in turns of the caller's scheduler, so
/// the send task must never run beside the caller on another worker.
fn require_current_thread() -> Result<(), PeerError> {
    let handle = Handle::try_current()
        .map_err(|_| PeerError::UnsupportedRuntime("no runtime is running".into()))?;
    match handle.runtime_flavor() {
        RuntimeFlavor::CurrentThread => Ok(()),
        other => Err(PeerError::UnsupportedRuntime(format!("found {other:?}"))),
    }
}

// ---------------------------------------------------------------------------
// Background tasks
// ---------------------------------------------------------------------------

/// Waits out the receipt window, then sends the invocation with whatever
/// id the window ended with.
async fn deferred_send<C: Channel>(
    outbox: Outbox<C>,
    pending: Arc<PendingOperations>,
    slot: Arc<ReceiptSlot>,
    target: Target,
    args: Vec<JsonValue>,
) {
    for _ in 0..RECEIPT_WINDOW_TURNS {
        tokio::task::yield_now().await;
    }
    if pending.is_disposed() {
        return;
    }

    let request = slot.close_window();
    match request {
        Some(id) => tracing::debug!(peer = %outbox.peer, request = %id, %target, "sending invocation"),
        None => tracing::debug!(peer = %outbox.peer, %target, "sending invocation fire-and-forget"),
    }

    let message = Message::Invocation(tandem_protocol::Invocation {
        id: request.map_or(0, |id| id.0),
        target,
        args,
    });
    if let Err(e) = outbox.send(message).await {
        match request {
            Some(id) => {
                // The caller is waiting on this id; tell it instead of
                // leaving it hanging.
                let _ = pending.settle(id, Err(e.into()));
            }
            None => outbox.faults.report(e.into()),
        }
    }
}

/// Reads the channel until it closes, spawning one dispatch per message.
///
/// Holds the peer weakly so that an idle pump doesn't keep a dropped
/// peer's state alive.
async fn pump<C: Channel>(channel: Arc<C>, peer: Weak<PeerInner<C>>) {
    loop {
        let received = channel.recv().await;
        let Some(inner) = peer.upgrade() else {
            return;
        };
        if inner.is_disposed() {
            return;
        }
        match received {
            Ok(Some(message)) => {
                tokio::spawn(inner.dispatch(message));
            }
            Ok(None) => {
                tracing::info!(peer = %inner.name, "channel closed");
                return;
            }
            Err(e) => {
                inner.faults.report(e.into());
                return;
            }
        }
    }
}
