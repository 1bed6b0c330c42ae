//! Process-wide fatal stop signal.

use std::sync::Arc;

use tokio::sync::watch;

/// One-shot, process-wide stop request.
///
/// The first reason raised is kept; later calls are ignored.
#[derive(Debug, Clone)]
pub struct FatalSignal {
    tx: Arc<watch::Sender<Option<String>>>,
}

impl Default for FatalSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl FatalSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Raise the signal with `reason`.
    pub fn raise(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
    }

    /// Reason of the raised signal, if any.
    pub fn raised(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    /// Wait until the signal is raised and return its reason.
    pub async fn triggered(&self) -> String {
        let mut rx = self.tx.subscribe();
        let reason = rx
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|reason| reason.clone());
        match reason {
            Some(reason) => reason,
            // The sender lives as long as `self`.
            None => std::future::pending().await,
        }
    }
}
