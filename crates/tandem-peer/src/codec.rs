//! Codecs: named, reversible transformations for values that can't cross
//! the channel as plain JSON.
//!
//! A codec turns a [`Value`] into a [`WrappedValue`] envelope on the way
//! out and turns an envelope carrying its name back into a `Value` on the
//! way in. Every peer starts with two built-ins, in this order:
//!
//! 1. [`ErrorCodec`] (`"Error"`): [`RemoteError`] values.
//! 2. [`FunctionCodec`] (`"Function"`): [`Function`](crate::Function) values, by handle.
//!
//! Hosts add their own with [`PeerBuilder::codec`](crate::PeerBuilder::codec)
//! or [`Peer::add_codec`](crate::Peer::add_codec). Both sides of a channel
//! must register the same codecs: decoding an envelope whose codec is
//! missing fails with [`PeerError::UnregisteredCodec`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};

use tandem_protocol::{Target, UNDEFINED_KIND, WrappedError, WrappedFunction, WrappedValue};

use crate::functions::{FunctionRegistry, proxy};
use crate::{Invocation, PeerError, RemoteError, Value};

// ---------------------------------------------------------------------------
// Codec trait
// ---------------------------------------------------------------------------

/// A bidirectional value transformer.
///
/// ## Contract
///
/// - `name` is unique per peer and is the envelope kind this codec
///   produces and consumes.
/// - `can_encode` is asked in registration order; the first codec that
///   says yes encodes the value.
/// - `decode` only ever sees envelopes whose kind equals `name`.
/// - `dispose` runs once, when the owning peer is disposed.
pub trait Codec: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn can_encode(&self, value: &Value) -> bool;

    /// Wraps a value this codec claimed.
    fn encode(&self, value: &Value) -> Result<WrappedValue, PeerError>;

    /// Rebuilds a value from its envelope.
    fn decode(&self, wrapped: WrappedValue, context: &DecodeContext) -> Result<Value, PeerError>;

    /// Releases whatever the codec holds. The default does nothing.
    fn dispose(&self) {}
}

// ---------------------------------------------------------------------------
// Invoker / DecodeContext
// ---------------------------------------------------------------------------

/// Something that can send an invocation to the remote side.
///
/// Implemented by the peer; handed to codecs (through [`DecodeContext`])
/// so that decoded values like function proxies can call back.
pub trait Invoker: Send + Sync + 'static {
    fn invoke_target(&self, target: Target, args: Vec<Value>) -> Invocation;
}

/// What a codec gets to see while decoding.
#[derive(Clone)]
pub struct DecodeContext {
    invoker: Weak<dyn Invoker>,
}

impl DecodeContext {
    pub fn new(invoker: Weak<dyn Invoker>) -> Self {
        Self { invoker }
    }

    /// The reply capability of the decoding peer, held weakly.
    pub fn invoker(&self) -> Weak<dyn Invoker> {
        self.invoker.clone()
    }
}

impl fmt::Debug for DecodeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeContext")
            .field("peer_alive", &(self.invoker.strong_count() > 0))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ErrorCodec
// ---------------------------------------------------------------------------

/// Carries [`RemoteError`] values as `{"$": "Error", "message", "name"?, "stack"?}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorCodec;

impl Codec for ErrorCodec {
    fn name(&self) -> &str {
        WrappedError::KIND
    }

    fn can_encode(&self, value: &Value) -> bool {
        matches!(value, Value::Error(_))
    }

    fn encode(&self, value: &Value) -> Result<WrappedValue, PeerError> {
        match value {
            Value::Error(error) => Ok(WrappedError::from(error.clone()).into_wrapped()),
            other => Err(PeerError::EncodeFailed(format!(
                "Error codec cannot encode a {}",
                other.type_name()
            ))),
        }
    }

    fn decode(&self, wrapped: WrappedValue, _context: &DecodeContext) -> Result<Value, PeerError> {
        let error = WrappedError::from_wrapped(&wrapped)?;
        Ok(Value::Error(RemoteError::from(error)))
    }
}

// ---------------------------------------------------------------------------
// FunctionCodec
// ---------------------------------------------------------------------------

/// Carries [`Function`](crate::Function) values as `{"$": "Function", "id": handle}`.
///
/// Encoding stores the function in the peer's [`FunctionRegistry`].
/// Decoding produces a proxy that invokes the handle through the decoding
/// peer. Disposing the codec empties the registry.
#[derive(Debug, Clone)]
pub struct FunctionCodec {
    registry: Arc<FunctionRegistry>,
}

impl FunctionCodec {
    pub fn new(registry: Arc<FunctionRegistry>) -> Self {
        Self { registry }
    }
}

impl Codec for FunctionCodec {
    fn name(&self) -> &str {
        WrappedFunction::KIND
    }

    fn can_encode(&self, value: &Value) -> bool {
        matches!(value, Value::Function(_))
    }

    fn encode(&self, value: &Value) -> Result<WrappedValue, PeerError> {
        match value {
            Value::Function(function) => {
                let id = self.registry.register(function.clone());
                tracing::trace!(handle = %id, "function registered");
                Ok(WrappedFunction { id }.into_wrapped())
            }
            other => Err(PeerError::EncodeFailed(format!(
                "Function codec cannot encode a {}",
                other.type_name()
            ))),
        }
    }

    fn decode(&self, wrapped: WrappedValue, context: &DecodeContext) -> Result<Value, PeerError> {
        let WrappedFunction { id } = WrappedFunction::from_wrapped(&wrapped)?;
        Ok(Value::Function(proxy(context.invoker(), Target::Function(id))))
    }

    fn dispose(&self) {
        self.registry.clear();
    }
}

// ---------------------------------------------------------------------------
// CodecRegistry
// ---------------------------------------------------------------------------

/// The ordered set of codecs a peer uses.
///
/// Lookups clone the `Arc` out of the lock, so no codec code ever runs
/// while the lock is held.
pub struct CodecRegistry {
    codecs: RwLock<Vec<Arc<dyn Codec>>>,
    disposed: AtomicBool,
}

impl CodecRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            codecs: RwLock::new(Vec::new()),
            disposed: AtomicBool::new(false),
        }
    }

    /// A registry seeded with [`ErrorCodec`] and a [`FunctionCodec`] over
    /// `functions`.
    pub fn with_builtins(functions: Arc<FunctionRegistry>) -> Self {
        Self {
            codecs: RwLock::new(vec![
                Arc::new(ErrorCodec) as Arc<dyn Codec>,
                Arc::new(FunctionCodec::new(functions)),
            ]),
            disposed: AtomicBool::new(false),
        }
    }

    /// Adds a codec after the existing ones.
    ///
    /// # Errors
    /// - [`PeerError::DuplicateCodec`] if the name is taken, or is the
    ///   reserved `"Undefined"`.
    /// - [`PeerError::Disposed`] after [`dispose`](Self::dispose).
    pub fn register(&self, codec: Arc<dyn Codec>) -> Result<(), PeerError> {
        let name = codec.name();
        if name == UNDEFINED_KIND {
            return Err(PeerError::DuplicateCodec(name.to_string()));
        }
        let mut codecs = self
            .codecs
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if self.disposed.load(Ordering::Acquire) {
            return Err(PeerError::Disposed);
        }
        if codecs.iter().any(|existing| existing.name() == name) {
            return Err(PeerError::DuplicateCodec(name.to_string()));
        }
        codecs.push(codec);
        Ok(())
    }

    /// The codec registered under `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Codec>> {
        self.read().iter().find(|codec| codec.name() == name).cloned()
    }

    /// The first codec, in registration order, that claims `value`.
    pub fn find_encoder(&self, value: &Value) -> Option<Arc<dyn Codec>> {
        self.read()
            .iter()
            .find(|codec| codec.can_encode(value))
            .cloned()
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.read().iter().map(|codec| codec.name().to_string()).collect()
    }

    /// Disposes every codec once and empties the registry. Later calls do
    /// nothing.
    pub fn dispose(&self) {
        let drained: Vec<Arc<dyn Codec>> = {
            let mut codecs = self
                .codecs
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if self.disposed.swap(true, Ordering::AcqRel) {
                return;
            }
            codecs.drain(..).collect()
        };
        for codec in drained {
            codec.dispose();
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Arc<dyn Codec>>> {
        self.codecs
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("codecs", &self.names())
            .finish()
    }
}
