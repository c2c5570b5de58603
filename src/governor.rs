//! Admission control for concurrent conversions.
//!
//! [`Governor::spawn`] waits for a free slot before starting a task, so the
//! caller (the dispatch loop) stalls while the limit is reached instead of
//! piling up work. Every task runs inside a fault boundary: a panic is
//! logged and turned into `None`, it never reaches the runtime or a sibling
//! task.

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, Instrument, Span};

/// Largest slot count a governor accepts. [`Governor::drain`] takes every
/// permit in one request, which is limited to `u32::MAX`.
pub const MAX_LIMIT: usize = if Semaphore::MAX_PERMITS < u32::MAX as usize {
    Semaphore::MAX_PERMITS
} else {
    u32::MAX as usize
};

/// Bounds the number of simultaneously running tasks.
#[derive(Debug, Clone)]
pub struct Governor {
    permits: Arc<Semaphore>,
    limit: usize,
}

impl Governor {
    /// `limit` is clamped to `1..=MAX_LIMIT`.
    pub fn new(limit: usize) -> Self {
        let limit = limit.clamp(1, MAX_LIMIT);
        Self {
            permits: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Wait for a slot, then run `task` on the runtime.
    ///
    /// The handle resolves to `Some(output)`, or `None` if the task
    /// panicked. Returns `None` without running anything once the governor
    /// is closed.
    pub async fn spawn<F, T>(&self, task: F) -> Option<JoinHandle<Option<T>>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits).acquire_owned().await.ok()?;
        let span = Span::current();

        Some(tokio::spawn(
            async move {
                let _permit = permit;
                match AssertUnwindSafe(task).catch_unwind().await {
                    Ok(output) => Some(output),
                    Err(panic) => {
                        error!("Conversion task panicked: {}", panic_message(panic));
                        None
                    }
                }
            }
            .instrument(span),
        ))
    }

    /// Stop admitting tasks and wait for the running ones to finish.
    pub async fn drain(&self) {
        // Holding every permit means nothing is running any more.
        if let Ok(all) = self.permits.acquire_many(self.limit as u32).await {
            drop(all);
        }
        self.permits.close();
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
