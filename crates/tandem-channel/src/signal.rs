//! A one-way "this end is closed" flag that tasks can wait on.

use tokio::sync::watch;

/// Flips from open to closed exactly once.
///
/// Backed by a `watch` channel so any number of pending `recv` calls can
/// wait for the flip, and a flag set before anyone waits is still seen.
#[derive(Debug)]
pub(crate) struct CloseSignal {
    tx: watch::Sender<bool>,
}

impl CloseSignal {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Marks the signal closed. Returns `true` only for the call that
    /// actually flipped it.
    pub(crate) fn close(&self) -> bool {
        self.tx.send_if_modified(|closed| {
            if *closed {
                false
            } else {
                *closed = true;
                true
            }
        })
    }

    pub(crate) fn is_closed(&self) -> bool {
        *self.tx.borrow()
    }

    /// Completes once the signal is closed.
    pub(crate) async fn closed(&self) {
        let mut rx = self.tx.subscribe();
        loop {
            let closed = *rx.borrow_and_update();
            if closed {
                return;
            }
            // The sender lives as long as `self`, so this only errors if
            // the signal itself is being torn down.
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}
