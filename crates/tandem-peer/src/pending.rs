//! Pending operations: invocations still waiting for their response.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tandem_protocol::RequestId;
use tokio::sync::oneshot;

use crate::{PeerError, Value, lock};

pub(crate) type Outcome = Result<Value, PeerError>;

/// Request id → the sender half of the waiting caller's oneshot.
///
/// Ids come from a per-peer counter starting at 1 and are never reused.
/// An entry is removed before it is settled, so it settles at most once.
/// [`dispose`](Self::dispose) drops every sender without sending: the
/// waiting futures are abandoned and never resolve.
#[derive(Debug)]
pub(crate) struct PendingOperations {
    next_id: AtomicU64,
    table: Mutex<HashMap<RequestId, oneshot::Sender<Outcome>>>,
    disposed: AtomicBool,
}

impl PendingOperations {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            table: Mutex::new(HashMap::new()),
            disposed: AtomicBool::new(false),
        }
    }

    /// Allocates the next request id and registers a waiter for it.
    pub(crate) fn register(&self) -> Result<(RequestId, oneshot::Receiver<Outcome>), PeerError> {
        let mut table = lock(&self.table);
        // Checked under the lock so a concurrent dispose can't leave a
        // fresh entry behind.
        if self.disposed.load(Ordering::Acquire) {
            return Err(PeerError::Disposed);
        }
        let id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = oneshot::channel();
        table.insert(id, tx);
        Ok((id, rx))
    }

    /// Removes the entry for `id` and delivers `outcome` to its waiter.
    ///
    /// # Errors
    /// [`PeerError::UnknownRequest`] if nothing is pending under `id`.
    pub(crate) fn settle(&self, id: RequestId, outcome: Outcome) -> Result<(), PeerError> {
        let sender = lock(&self.table)
            .remove(&id)
            .ok_or(PeerError::UnknownRequest(id))?;
        // The caller may have dropped its future after subscribing; the
        // outcome then has nowhere to go, which is fine.
        let _ = sender.send(outcome);
        Ok(())
    }

    /// Drops every waiter without settling it.
    pub(crate) fn dispose(&self) {
        let mut table = lock(&self.table);
        self.disposed.store(true, Ordering::Release);
        table.clear();
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.table).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_allocates_increasing_ids_from_one() {
        let pending = PendingOperations::new();
        let (a, _ra) = pending.register().unwrap();
        let (b, _rb) = pending.register().unwrap();
        let (c, _rc) = pending.register().unwrap();
        assert_eq!(a, RequestId(1));
        assert!(a < b && b < c);
        assert_eq!(pending.len(), 3);
    }

    #[tokio::test]
    async fn test_settle_delivers_once_then_unknown() {
        let pending = PendingOperations::new();
        let (id, rx) = pending.register().unwrap();

        pending.settle(id, Ok(Value::from("done"))).unwrap();
        let outcome = rx.await.unwrap().unwrap();
        assert_eq!(outcome.as_str(), Some("done"));

        assert!(matches!(
            pending.settle(id, Ok(Value::Unit)),
            Err(PeerError::UnknownRequest(r)) if r == id
        ));
        assert_eq!(pending.len(), 0);
    }

    #[test]
    fn test_settle_after_waiter_dropped_is_ok() {
        let pending = PendingOperations::new();
        let (id, rx) = pending.register().unwrap();
        drop(rx);
        assert!(pending.settle(id, Ok(Value::Unit)).is_ok());
    }

    #[tokio::test]
    async fn test_dispose_abandons_waiters() {
        let pending = PendingOperations::new();
        let (_id, rx) = pending.register().unwrap();

        pending.dispose();
        assert!(pending.is_disposed());
        assert_eq!(pending.len(), 0);
        // The sender is gone without a value.
        assert!(rx.await.is_err());
        assert!(matches!(pending.register(), Err(PeerError::Disposed)));
    }

    #[test]
    fn test_ids_are_not_reused_after_settle() {
        let pending = PendingOperations::new();
        let (first, _rx) = pending.register().unwrap();
        pending.settle(first, Ok(Value::Unit)).unwrap();
        let (second, _rx) = pending.register().unwrap();
        assert!(second > first);
    }
}
