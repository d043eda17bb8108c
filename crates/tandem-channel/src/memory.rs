//! In-process channel: two ends joined by unbounded queues.

use std::sync::Mutex as StdMutex;

use serde_json::Value as JsonValue;
use tokio::sync::{Mutex, mpsc};

use crate::signal::CloseSignal;
use crate::{Channel, ChannelError};

/// One end of an in-process bridge created by [`MemoryChannel::pair`].
///
/// Each end owns the sending half of the queue that feeds the other end
/// and the receiving half of the queue fed by the other end:
///
/// ```text
///   left.send ──► queue A ──► right.recv
///   left.recv ◄── queue B ◄── right.send
/// ```
///
/// Disposing an end drops its sender (the other end's `recv` returns
/// `None` once it has drained what was already queued) and makes its own
/// `recv` return `None` right away.
#[derive(Debug)]
pub struct MemoryChannel {
    // `None` once disposed. A std mutex is enough: it is never held
    // across an `.await`.
    tx: StdMutex<Option<mpsc::UnboundedSender<Vec<JsonValue>>>>,
    // Tokio mutex: held across `rx.recv().await` so that concurrent
    // `recv` calls queue up instead of racing.
    rx: Mutex<mpsc::UnboundedReceiver<Vec<JsonValue>>>,
    closed: CloseSignal,
}

impl MemoryChannel {
    /// Creates two connected ends.
    pub fn pair() -> (MemoryChannel, MemoryChannel) {
        let (left_tx, right_rx) = mpsc::unbounded_channel();
        let (right_tx, left_rx) = mpsc::unbounded_channel();
        (Self::new(left_tx, left_rx), Self::new(right_tx, right_rx))
    }

    fn new(
        tx: mpsc::UnboundedSender<Vec<JsonValue>>,
        rx: mpsc::UnboundedReceiver<Vec<JsonValue>>,
    ) -> Self {
        Self {
            tx: StdMutex::new(Some(tx)),
            rx: Mutex::new(rx),
            closed: CloseSignal::new(),
        }
    }

    /// Returns `true` once [`dispose`](Channel::dispose) has been called
    /// on this end.
    pub fn is_disposed(&self) -> bool {
        self.closed.is_closed()
    }

    fn sender(&self) -> Option<mpsc::UnboundedSender<Vec<JsonValue>>> {
        self.tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Channel for MemoryChannel {
    async fn send(&self, message: Vec<JsonValue>) -> Result<(), ChannelError> {
        let tx = self.sender().ok_or(ChannelError::Closed)?;
        tx.send(message).map_err(|_| ChannelError::Closed)
    }

    async fn recv(&self) -> Result<Option<Vec<JsonValue>>, ChannelError> {
        if self.closed.is_closed() {
            return Ok(None);
        }
        let mut rx = self.rx.lock().await;
        tokio::select! {
            message = rx.recv() => Ok(message),
            () = self.closed.closed() => Ok(None),
        }
    }

    fn dispose(&self) {
        if self.closed.close() {
            self.tx
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .take();
            tracing::debug!("memory channel disposed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_pair_delivers_in_both_directions() {
        let (left, right) = MemoryChannel::pair();

        left.send(vec![json!(1), json!("ping")]).await.unwrap();
        right.send(vec![json!(-1), json!(null), json!("pong")]).await.unwrap();

        assert_eq!(right.recv().await.unwrap(), Some(vec![json!(1), json!("ping")]));
        assert_eq!(
            left.recv().await.unwrap(),
            Some(vec![json!(-1), json!(null), json!("pong")])
        );
    }

    #[tokio::test]
    async fn test_pair_preserves_order() {
        let (left, right) = MemoryChannel::pair();
        for i in 0..5 {
            left.send(vec![json!(i)]).await.unwrap();
        }
        for i in 0..5 {
            assert_eq!(right.recv().await.unwrap(), Some(vec![json!(i)]));
        }
    }

    #[tokio::test]
    async fn test_dispose_makes_send_fail_with_closed() {
        let (left, _right) = MemoryChannel::pair();
        left.dispose();
        assert!(left.is_disposed());
        assert!(matches!(
            left.send(vec![json!(0)]).await,
            Err(ChannelError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_dispose_wakes_pending_local_recv() {
        let (left, _right) = MemoryChannel::pair();
        let left = std::sync::Arc::new(left);

        let pending = {
            let left = left.clone();
            tokio::spawn(async move { left.recv().await })
        };
        tokio::task::yield_now().await;
        left.dispose();

        let result = tokio::time::timeout(Duration::from_millis(500), pending)
            .await
            .expect("recv should wake on dispose")
            .unwrap();
        assert_eq!(result.unwrap(), None);
    }

    #[tokio::test]
    async fn test_remote_end_drains_then_sees_close() {
        let (left, right) = MemoryChannel::pair();
        left.send(vec![json!("last")]).await.unwrap();
        left.dispose();

        assert_eq!(right.recv().await.unwrap(), Some(vec![json!("last")]));
        assert_eq!(right.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent() {
        let (left, right) = MemoryChannel::pair();
        left.dispose();
        left.dispose();
        assert_eq!(left.recv().await.unwrap(), None);
        assert!(right.send(vec![json!(1)]).await.is_ok());
    }

    #[tokio::test]
    async fn test_send_to_dropped_end_fails() {
        let (left, right) = MemoryChannel::pair();
        drop(right);
        assert!(matches!(
            left.send(vec![json!(1)]).await,
            Err(ChannelError::Closed)
        ));
    }
}
