//! Retrying send helper.
//!
//! The notification bus never retries internally; this helper owns the
//! caller-side retry loop and the composition of outbound messages.

use alloc::sync::Arc;

use chiplink_common::error::Result;
use chiplink_common::{DelayUs, Error};
use chiplink_notif::NotifBus;

use crate::envelope::Envelope;
use crate::payload::{self, LifecycleStatus};

/// Caller-side retry knobs for transient transport refusals.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Retry attempts after the first try.
    pub retries: u32,
    /// Pause between attempts, microseconds.
    pub retry_delay_us: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 10,
            retry_delay_us: 100,
        }
    }
}

/// Sends system messages through the bus, absorbing transient refusals.
pub struct Messenger {
    bus: Arc<NotifBus>,
    policy: RetryPolicy,
    delay: Arc<dyn DelayUs>,
}

impl Messenger {
    #[must_use]
    pub fn new(bus: Arc<NotifBus>, policy: RetryPolicy, delay: Arc<dyn DelayUs>) -> Self {
        Self { bus, policy, delay }
    }

    /// Send an envelope, retrying `TryAgain` per the policy.
    ///
    /// # Errors
    ///
    /// `TryAgain` once retries are exhausted; any non-transient transport
    /// error immediately.
    pub fn send(&self, env: &Envelope) -> Result<()> {
        let mut attempt = 0;
        loop {
            match self.bus.send(env.as_raw()) {
                Ok(()) => return Ok(()),
                Err(Error::TryAgain) if attempt < self.policy.retries => {
                    attempt += 1;
                    log::info!(
                        "msg: send: retry {} in {} us...",
                        attempt,
                        self.policy.retry_delay_us
                    );
                    self.delay.delay_us(self.policy.retry_delay_us);
                }
                Err(Error::TryAgain) => {
                    log::error!("msg: send: retries exhausted");
                    return Err(Error::TryAgain);
                }
                Err(e) => {
                    log::error!("msg: send: failed: {}", e);
                    return Err(e);
                }
            }
        }
    }

    /// Report a lifecycle transition, with optional context text.
    pub fn lifecycle(&self, status: LifecycleStatus, info: &[u8]) -> Result<()> {
        self.send(&payload::lifecycle(status, info))
    }

    /// Report that a CPU's watchdog soft-expired.
    pub fn watchdog_timeout(&self, cpu: u32) -> Result<()> {
        self.send(&payload::watchdog_timeout(cpu))
    }

    /// Send a PING carrying a caller-chosen identifier.
    pub fn ping(&self, id: u32) -> Result<()> {
        self.send(&payload::ping(id))
    }
}
