//! Where failures nobody is waiting for end up.
//!
//! A fire-and-forget invocation that fails on this side, a response for a
//! request that isn't pending, a malformed message: there is no caller to
//! hand these to. They are logged at `error` level and passed to the
//! `on_fault` callback when the host installed one.

use std::fmt;
use std::sync::Arc;

use crate::PeerError;

/// Callback installed with [`PeerBuilder::on_fault`](crate::PeerBuilder::on_fault).
pub(crate) type FaultCallback = Arc<dyn Fn(&PeerError) + Send + Sync>;

#[derive(Clone)]
pub(crate) struct FaultSink {
    peer: Arc<str>,
    callback: Option<FaultCallback>,
}

impl FaultSink {
    pub(crate) fn new(peer: Arc<str>, callback: Option<FaultCallback>) -> Self {
        Self { peer, callback }
    }

    pub(crate) fn report(&self, error: PeerError) {
        tracing::error!(
            peer = %self.peer,
            category = %error.category(),
            error = %error,
            "unhandled peer fault"
        );
        if let Some(callback) = &self.callback {
            callback(&error);
        }
    }
}

impl fmt::Debug for FaultSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaultSink")
            .field("peer", &self.peer)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn test_report_invokes_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = seen.clone();
            FaultSink::new(
                Arc::from("test"),
                Some(Arc::new(move |e: &PeerError| {
                    seen.lock().unwrap().push(e.to_string());
                })),
            )
        };

        sink.report(PeerError::NoLocalApi);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_report_without_callback_only_logs() {
        let sink = FaultSink::new(Arc::from("test"), None);
        sink.report(PeerError::Disposed);
    }
}
