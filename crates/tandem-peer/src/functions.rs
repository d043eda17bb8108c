//! Anonymous function marshaling.
//!
//! When a [`Function`] is encoded it is stored here under a fresh handle,
//! and the handle is what travels. When the remote side invokes that
//! handle, the peer looks the function up here.
//!
//! The opposite direction (a handle received from the remote side) is a
//! proxy built by [`proxy`]: a `Function` whose body is an invocation
//! sent back through the decoding peer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, Weak};

use futures_util::TryFutureExt;
use tandem_protocol::{FunctionHandle, Target};

use crate::{Function, Invocation, Invoker, PeerError, RemoteError, lock};

/// Handle → locally owned function.
///
/// Handles start at 1 and only grow. Entries live until the owning peer
/// is disposed; the remote side may hold a handle for as long as it
/// likes, so there is no earlier point at which removal would be safe.
#[derive(Debug)]
pub struct FunctionRegistry {
    next_handle: AtomicU64,
    functions: Mutex<HashMap<FunctionHandle, Function>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self {
            next_handle: AtomicU64::new(1),
            functions: Mutex::new(HashMap::new()),
        }
    }

    /// Stores `function` under the next handle.
    pub fn register(&self, function: Function) -> FunctionHandle {
        let handle = FunctionHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        lock(&self.functions).insert(handle, function);
        handle
    }

    pub fn get(&self, handle: FunctionHandle) -> Option<Function> {
        lock(&self.functions).get(&handle).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.functions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forgets every function. Handles are still never reused.
    pub fn clear(&self) {
        lock(&self.functions).clear();
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds a `Function` that invokes `target` through `invoker`.
///
/// The proxy holds the invoker weakly: once the peer is gone, calls fail
/// with [`PeerError::Disposed`] instead of keeping the peer alive.
pub(crate) fn proxy(invoker: Weak<dyn Invoker>, target: Target) -> Function {
    Function::new(move |args| {
        let invocation = match invoker.upgrade() {
            Some(invoker) => invoker.invoke_target(target.clone(), args),
            None => Invocation::failed(PeerError::Disposed),
        };
        invocation.map_err(RemoteError::from)
    })
}
