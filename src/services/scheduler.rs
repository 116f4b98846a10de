//! Scheduler
//!
//! Timer and yield primitives used by the reconnect loop and the scan loop.
//! Production code runs on tokio; tests inject [`RecordingScheduler`] so no
//! real clock is involved.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Wait for `duration` before continuing.
    async fn sleep(&self, duration: Duration);

    /// Give other tasks (and any renderer polling the cache) a turn.
    async fn yield_now(&self);
}

/// Scheduler backed by the tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

#[async_trait]
impl Scheduler for TokioScheduler {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn yield_now(&self) {
        tokio::task::yield_now().await;
    }
}

/// Scheduler that never waits.
///
/// Records every requested sleep and counts yields, then hands control back
/// to the runtime once so spawned tasks still make progress.
#[derive(Debug, Default)]
pub struct RecordingScheduler {
    sleeps: Mutex<Vec<Duration>>,
    yields: AtomicUsize,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn yield_count(&self) -> usize {
        self.yields.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Scheduler for RecordingScheduler {
    async fn sleep(&self, duration: Duration) {
        self.sleeps
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(duration);
        tokio::task::yield_now().await;
    }

    async fn yield_now(&self) {
        self.yields.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
    }
}
