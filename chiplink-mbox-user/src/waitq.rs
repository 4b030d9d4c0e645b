//! Wait queue
//!
//! Wakes pollers when a device's readable/writable state changes. Built on
//! a generation counter: waiters re-check their condition whenever the
//! generation advances, so a waker never needs to know who is waiting.
//!
//! Note: Spurious wakeups are possible. Conditions are always re-checked.

use core::sync::atomic::{AtomicU64, Ordering};

/// A condition wait queue.
///
/// # Example
///
/// ```ignore
/// static WQ: WaitQueue = WaitQueue::new();
///
/// // Waiter: block until the flag observer returns a value
/// let value = WQ.wait_until(|| flag_set().then_some(42));
///
/// // Waker: change the state, then notify
/// set_flag();
/// WQ.notify_all();
/// ```
pub struct WaitQueue {
    /// Incremented on each notify; used to detect missed wakeups.
    generation: AtomicU64,
}

impl WaitQueue {
    /// Creates an empty wait queue.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            generation: AtomicU64::new(0),
        }
    }

    /// Block until `cond` yields a value.
    ///
    /// The condition is evaluated immediately, then re-evaluated after
    /// every notification. The condition must take any lock it needs
    /// itself; no lock is held across the wait.
    pub fn wait_until<T, F>(&self, mut cond: F) -> T
    where
        F: FnMut() -> Option<T>,
    {
        loop {
            let generation = self.generation.load(Ordering::Acquire);
            if let Some(value) = cond() {
                return value;
            }
            // Wait for a notify (generation change) before re-checking
            while self.generation.load(Ordering::Acquire) == generation {
                core::hint::spin_loop();
            }
        }
    }

    /// Wake all current waiters.
    ///
    /// If no threads are waiting, this is a no-op.
    #[inline]
    pub fn notify_all(&self) {
        self.generation.fetch_add(1, Ordering::Release);
    }
}

impl Default for WaitQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for WaitQueue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WaitQueue").finish_non_exhaustive()
    }
}
