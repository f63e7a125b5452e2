//! Cooperative stop signal shared by the pool and one worker

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Stop request shared between the reconcile loop and a single worker
///
/// Either side may set it; nothing ever clears it. A self-looping worker
/// reads it only between iterations, so setting it never interrupts a call
/// that is already in progress.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    requested: Arc<AtomicBool>,
}

impl StopSignal {
    /// Create a signal that has not been requested
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the worker to stop at its next checkpoint
    pub fn request_stop(&self) {
        self.requested.store(true, Ordering::Release);
    }

    /// Check whether a stop was requested
    pub fn is_stop_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}
