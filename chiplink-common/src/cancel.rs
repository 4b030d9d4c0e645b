//! Cooperative cancellation
//!
//! Long-lived tasks (the shared-memory receive poller) check a
//! [`CancelToken`] at each wake boundary instead of being killed.

use core::sync::atomic::{AtomicBool, Ordering};

/// A one-way stop flag shared between a task and its owner.
///
/// The owner calls [`cancel`](Self::cancel) once; the task observes the flag
/// on its next wake and exits its loop. The flag never resets.
#[derive(Debug, Default)]
pub struct CancelToken {
    cancelled: AtomicBool,
}

impl CancelToken {
    /// Create a token in the running (not cancelled) state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
        }
    }

    /// Request cancellation. Idempotent.
    #[inline]
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
