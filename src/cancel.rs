//! Per-call cancellation.
//!
//! A [`CancelHandle`] / [`CancelSignal`] pair wraps a `tokio::sync::watch`
//! channel. Repositories race every store round trip against their signal;
//! when it fires the store future is dropped (aborting the driver call) and
//! the operation resolves to [`RepositoryError::Cancelled`].

use std::future::Future;

use tokio::sync::watch;

use crate::error::RepositoryError;

/// Fires the paired [`CancelSignal`]s.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Returns a new signal observing this handle.
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: Some(self.tx.subscribe()),
        }
    }
}

/// Observes a [`CancelHandle`]. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
}

/// Creates a connected handle/signal pair.
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx: Some(rx) })
}

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once cancellation is requested. Pends forever if the handle
    /// is dropped without cancelling.
    pub async fn cancelled(&self) {
        let Some(rx) = &self.rx else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return std::future::pending().await;
            }
        }
    }

    /// Runs a store call, resolving to `Cancelled` if the signal fires first.
    pub(crate) async fn guard<T, E, F>(&self, call: F) -> Result<T, RepositoryError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<RepositoryError>,
    {
        if self.is_cancelled() {
            return Err(RepositoryError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(RepositoryError::Cancelled),
            result = call => result.map_err(Into::into),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use std::time::Duration;

    #[tokio::test]
    async fn test_guard_passes_result_through() {
        let signal = CancelSignal::never();
        let result = signal.guard(async { Ok::<_, StoreError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_guard_keeps_store_error_kind() {
        let signal = CancelSignal::never();
        let result: Result<(), _> = signal
            .guard(async { Err(StoreError::Unavailable("down".into())) })
            .await;
        assert_eq!(
            result.unwrap_err().kind(),
            crate::error::ErrorKind::StoreUnavailable
        );
    }

    #[tokio::test]
    async fn test_guard_returns_cancelled_when_already_fired() {
        let (handle, signal) = cancel_pair();
        handle.cancel();

        let result = signal.guard(async { Ok::<_, StoreError>(1) }).await;
        assert!(result.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_guard_interrupts_pending_call() {
        let (handle, signal) = cancel_pair();

        let task = tokio::spawn(async move {
            signal
                .guard(async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok::<_, StoreError>(())
                })
                .await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.cancel();

        let result = task.await.unwrap();
        assert!(result.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_dropped_handle_never_cancels() {
        let (handle, signal) = cancel_pair();
        drop(handle);

        assert!(!signal.is_cancelled());
        let result = signal.guard(async { Ok::<_, StoreError>("done") }).await;
        assert_eq!(result.unwrap(), "done");
    }
}
