//! Short-lived cache of the last collection cycle.
//!
//! Scrapes arriving within the TTL of a completed cycle are answered from the
//! snapshot instead of querying the API again. Concurrent scrapes on a stale
//! snapshot wait for a single refresh.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::sink::Sample;

/// Default time a snapshot is served for (30 seconds).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

#[derive(Debug, Default)]
struct CachedSnapshot {
    samples: Vec<Sample>,
    /// Set once the cycle that produced `samples` has completed.
    completed_at: Option<Instant>,
}

/// Result cache with single-flight refresh.
#[derive(Debug)]
pub struct ResultCache {
    ttl: Duration,
    snapshot: Arc<RwLock<CachedSnapshot>>,
    refresh: Mutex<()>,
}

impl ResultCache {
    /// Create a cache; a zero `ttl` disables it.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            snapshot: Arc::new(RwLock::new(CachedSnapshot::default())),
            refresh: Mutex::new(()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    /// Samples of the last completed cycle, if it is fresh and not empty.
    pub fn maybe_serve(&self) -> Option<Vec<Sample>> {
        if !self.is_enabled() {
            return None;
        }

        let snapshot = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        let completed_at = snapshot.completed_at?;
        if completed_at.elapsed() >= self.ttl || snapshot.samples.is_empty() {
            return None;
        }
        Some(snapshot.samples.clone())
    }

    /// Serialize refreshes; held by the scrape running the real cycle.
    pub async fn lock_refresh(&self) -> MutexGuard<'_, ()> {
        self.refresh.lock().await
    }

    /// Start recording a new cycle.
    ///
    /// Clears the snapshot and returns a sink that records every sample and
    /// forwards it to `downstream`.
    pub fn begin_cycle(&self, downstream: UnboundedSender<Sample>) -> InterceptingSink {
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = CachedSnapshot::default();

        let (sender, mut rx) = mpsc::unbounded_channel::<Sample>();
        let snapshot = Arc::clone(&self.snapshot);
        let forwarder = tokio::spawn({
            let snapshot = Arc::clone(&snapshot);
            async move {
                while let Some(sample) = rx.recv().await {
                    snapshot
                        .write()
                        .unwrap_or_else(PoisonError::into_inner)
                        .samples
                        .push(sample.clone());
                    // Keep recording even if the scrape went away.
                    let _ = downstream.send(sample);
                }
            }
        });

        InterceptingSink {
            sender,
            forwarder,
            snapshot,
        }
    }
}

/// Sink of a cycle being recorded by [`ResultCache::begin_cycle`].
#[derive(Debug)]
pub struct InterceptingSink {
    sender: UnboundedSender<Sample>,
    forwarder: JoinHandle<()>,
    snapshot: Arc<RwLock<CachedSnapshot>>,
}

impl InterceptingSink {
    pub fn sender(&self) -> UnboundedSender<Sample> {
        self.sender.clone()
    }

    /// Wait for every sample to be forwarded, then mark the snapshot complete.
    ///
    /// Every clone returned by [`sender`](Self::sender) must be dropped first.
    pub async fn finish(self) {
        drop(self.sender);
        if let Err(e) = self.forwarder.await {
            tracing::error!(error = %e, "Cache forwarder failed");
        }
        self.snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .completed_at = Some(Instant::now());
    }
}
