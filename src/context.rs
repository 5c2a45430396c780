//! Request Context Module
//!
//! Carries the request id and a cancellation signal through every storage
//! operation. Cancellation is a `watch` channel flipped to `true`.

use std::future;

use tokio::sync::watch;

/// Request id used when no id was propagated by the caller.
pub const UNKNOWN_REQUEST_ID: &str = "-";

// == Context ==
/// Per-request context handed to the storage layer.
#[derive(Debug, Clone)]
pub struct Context {
    request_id: String,
    cancel: watch::Receiver<bool>,
}

impl Context {
    /// Creates a context that is never cancelled.
    pub fn background() -> Self {
        // Dropping the sender leaves the receiver without a writer, so it can
        // never observe `true`.
        let (_, cancel) = watch::channel(false);
        Self {
            request_id: UNKNOWN_REQUEST_ID.to_string(),
            cancel,
        }
    }

    /// Creates a context observing an externally owned cancellation signal.
    pub fn new(request_id: impl Into<String>, cancel: watch::Receiver<bool>) -> Self {
        Self {
            request_id: request_id.into(),
            cancel,
        }
    }

    /// Creates a cancellable context together with the handle that cancels it.
    pub fn with_cancel(request_id: impl Into<String>) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (Self::new(request_id, rx), CancelHandle { tx })
    }

    /// Returns the request id.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Returns true once cancellation has been signalled.
    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Resolves once cancellation has been signalled.
    ///
    /// Never resolves for a context whose signal can no longer change.
    pub async fn cancelled(&self) {
        let mut cancel = self.cancel.clone();
        loop {
            if *cancel.borrow_and_update() {
                return;
            }
            if cancel.changed().await.is_err() {
                future::pending::<()>().await;
            }
        }
    }
}

// == Cancel Handle ==
/// Cancels the context it was created with.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_background_is_not_cancelled() {
        let ctx = Context::background();
        assert!(!ctx.is_cancelled());
        assert_eq!(ctx.request_id(), UNKNOWN_REQUEST_ID);
    }

    #[tokio::test]
    async fn test_background_never_resolves() {
        let ctx = Context::background();
        let result = tokio::time::timeout(Duration::from_millis(50), ctx.cancelled()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_cancel_wakes_waiter() {
        let (ctx, handle) = Context::with_cancel("req-1");
        let waiter = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.cancelled().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.cancel();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
        assert!(ctx.is_cancelled());
        assert_eq!(ctx.request_id(), "req-1");
    }

    #[tokio::test]
    async fn test_already_cancelled_resolves_immediately() {
        let (ctx, handle) = Context::with_cancel("req-2");
        handle.cancel();
        drop(handle);

        tokio::time::timeout(Duration::from_millis(50), ctx.cancelled())
            .await
            .expect("cancelled context should resolve");
    }
}
