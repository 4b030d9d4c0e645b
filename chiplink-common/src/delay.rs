//! Bounded delay capability
//!
//! The retry loop in the message send helper sleeps between attempts. The
//! delay source is platform-specific (a timer peripheral on bare metal, a
//! thread sleep under test), so it is injected as a capability.

/// Provider of short bounded delays.
pub trait DelayUs: Send + Sync {
    /// Delay for at least `us` microseconds.
    ///
    /// Implementations may overshoot but must not return early. Callers
    /// only use this outside interrupt context.
    fn delay_us(&self, us: u32);
}

/// Delay provider that returns immediately.
///
/// Useful where the caller wants a retry loop without inter-attempt pauses.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDelay;

impl DelayUs for NoDelay {
    #[inline]
    fn delay_us(&self, _us: u32) {}
}
