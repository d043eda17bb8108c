//! The lazy invocation handle.
//!
//! [`Peer::invoke`](crate::Peer::invoke) doesn't send anything itself. It
//! encodes the arguments, spawns a task that waits
//! [`RECEIPT_WINDOW_TURNS`] scheduler turns and then sends, and returns an
//! [`Invocation`]. Whether the message asks for a response depends on
//! what the caller does with that handle during the window:
//!
//! ```text
//!                   ┌──────────── receipt slot ────────────┐
//!   first poll ───► │ Unclaimed ──► Requested(id)          │ ──► send [id, ...]
//!                   │     │                                │
//!   window ends ──► │     └───────► Sent                   │ ──► send [0, ...]
//!                   └──────────────────────────────────────┘
//! ```
//!
//! Both transitions happen under the same mutex, so every invocation ends
//! up in exactly one of the two outcomes even on a multi-threaded runtime.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tandem_protocol::RequestId;
use tokio::sync::oneshot;

use crate::pending::{Outcome, PendingOperations};
use crate::{PeerError, Value, lock};

/// How many times the send task yields to the scheduler before it sends.
///
/// A caller that awaits an invocation in the same turn it created it is
/// always inside this window.
pub const RECEIPT_WINDOW_TURNS: usize = 2;

// ---------------------------------------------------------------------------
// ReceiptSlot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Receipt {
    Unclaimed,
    Requested(RequestId),
    Sent,
}

/// Shared between an [`Invocation`] and its send task.
#[derive(Debug)]
pub(crate) struct ReceiptSlot(Mutex<Receipt>);

impl ReceiptSlot {
    pub(crate) fn new() -> Self {
        Self(Mutex::new(Receipt::Unclaimed))
    }

    /// Called by the send task when the window ends. Returns the request
    /// id to put on the wire, or `None` for fire-and-forget.
    pub(crate) fn close_window(&self) -> Option<RequestId> {
        let mut receipt = lock(&self.0);
        match *receipt {
            Receipt::Requested(id) => Some(id),
            Receipt::Unclaimed | Receipt::Sent => {
                *receipt = Receipt::Sent;
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Invocation
// ---------------------------------------------------------------------------

/// A call to a remote function, resolving to its result.
///
/// The first poll is the subscription:
///
/// - polled before the message goes out: the message carries a fresh
///   request id and this future resolves with the remote result (or the
///   remote failure as [`PeerError::Remote`]);
/// - never polled: the message goes out fire-and-forget and the remote
///   side never answers. Dropping an `Invocation` unpolled is how you
///   fire and forget;
/// - first polled after the message went out: resolves to
///   [`PeerError::ReceiptNotRequested`] right away.
///
/// If the peer is disposed while a receipted invocation is outstanding,
/// the future never resolves.
#[must_use = "an invocation that is never awaited is sent without a delivery receipt"]
pub struct Invocation {
    state: State,
}

enum State {
    Lazy {
        slot: Arc<ReceiptSlot>,
        pending: Arc<PendingOperations>,
        peer: Arc<str>,
    },
    Waiting(oneshot::Receiver<Outcome>),
    Failed(PeerError),
    Abandoned,
    Done,
}

impl Invocation {
    pub(crate) fn lazy(
        slot: Arc<ReceiptSlot>,
        pending: Arc<PendingOperations>,
        peer: Arc<str>,
    ) -> Self {
        Self {
            state: State::Lazy {
                slot,
                pending,
                peer,
            },
        }
    }

    /// An invocation that resolves to `error` on first poll.
    pub(crate) fn failed(error: PeerError) -> Self {
        Self {
            state: State::Failed(error),
        }
    }
}

fn subscribe(slot: &ReceiptSlot, pending: &PendingOperations, peer: &str) -> State {
    let mut receipt = lock(&slot.0);
    match *receipt {
        Receipt::Unclaimed => match pending.register() {
            Ok((id, rx)) => {
                *receipt = Receipt::Requested(id);
                tracing::debug!(peer, request = %id, "delivery receipt requested");
                State::Waiting(rx)
            }
            Err(e) => State::Failed(e),
        },
        // Only this future ever moves the slot to `Requested`, and it
        // polls the slot once, so this arm is `Sent`.
        Receipt::Requested(_) | Receipt::Sent => State::Failed(PeerError::ReceiptNotRequested),
    }
}

impl Future for Invocation {
    type Output = Result<Value, PeerError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // Every field is `Unpin`, so the pin can be dropped.
        let this = self.get_mut();
        loop {
            match std::mem::replace(&mut this.state, State::Done) {
                State::Lazy {
                    slot,
                    pending,
                    peer,
                } => {
                    this.state = subscribe(&slot, &pending, &peer);
                }
                State::Waiting(mut rx) => {
                    return match Pin::new(&mut rx).poll(cx) {
                        Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
                        Poll::Ready(Err(_)) => {
                            // Sender dropped unsettled: the peer was disposed.
                            this.state = State::Abandoned;
                            Poll::Pending
                        }
                        Poll::Pending => {
                            this.state = State::Waiting(rx);
                            Poll::Pending
                        }
                    };
                }
                State::Failed(error) => return Poll::Ready(Err(error)),
                State::Abandoned => {
                    this.state = State::Abandoned;
                    return Poll::Pending;
                }
                State::Done => panic!("`Invocation` polled after completion"),
            }
        }
    }
}

impl std::fmt::Debug for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            State::Lazy { .. } => "lazy",
            State::Waiting(_) => "waiting",
            State::Failed(_) => "failed",
            State::Abandoned => "abandoned",
            State::Done => "done",
        };
        f.debug_struct("Invocation").field("state", &state).finish()
    }
}
