//! Cooperative cancellation
//!
//! A [`CancelHandle`] flips a shared flag; every [`CancelSignal`] cloned from
//! the pair observes it. Waiting code checks the signal before each remote
//! call and races it against every sleep and in-flight call.

use std::future::Future;
use tokio::sync::watch;

/// Caller side: fires the cancellation
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Worker side: observes the cancellation
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation fires; pends forever if it never can
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Handle dropped without cancelling.
                std::future::pending::<()>().await;
            }
        }
    }

    /// Drive `fut` unless cancellation fires first
    pub async fn run<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancelled() => None,
            out = fut => Some(out),
        }
    }
}

/// Create a connected handle/signal pair
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

/// Drive `fut`, racing it against `signal` when one is given
pub(crate) async fn race<F: Future>(signal: Option<&CancelSignal>, fut: F) -> Option<F::Output> {
    match signal {
        Some(signal) => signal.run(fut).await,
        None => Some(fut.await),
    }
}

pub(crate) fn is_cancelled(signal: Option<&CancelSignal>) -> bool {
    signal.map(CancelSignal::is_cancelled).unwrap_or(false)
}
