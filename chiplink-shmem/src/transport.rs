//! The shared-memory transport proper.

use alloc::sync::Arc;

use chiplink_common::error::Result;
use chiplink_common::{CancelToken, Error, RawMsg};
use chiplink_notif::{NotifBus, Transport};

use crate::region::ShmemRegion;

/// Shared-memory transport instance: one region per direction plus the
/// receive poll state.
///
/// Send runs in atomic context. Receive is driven by a platform task
/// calling [`run`](Self::run) (or [`poll_once`](Self::poll_once) directly)
/// until the stop token fires.
pub struct ShmemTransport {
    bus: Arc<NotifBus>,
    lock: spin::Mutex<()>,
    out: ShmemRegion,
    inbound: ShmemRegion,
    poll_interval_ms: u32,
    stop: CancelToken,
}

impl ShmemTransport {
    /// Wrap a mapped region pair.
    ///
    /// The transport must be registered with the bus before the receive
    /// task starts: processing an inbound message can produce a synchronous
    /// reply, and the registration is what gives that reply a path out.
    #[must_use]
    pub fn new(
        out: ShmemRegion,
        inbound: ShmemRegion,
        poll_interval_ms: u32,
        bus: Arc<NotifBus>,
    ) -> Self {
        Self {
            bus,
            lock: spin::Mutex::new(()),
            out,
            inbound,
            poll_interval_ms,
            stop: CancelToken::new(),
        }
    }

    /// Configured receive poll interval.
    #[inline]
    #[must_use]
    pub fn poll_interval_ms(&self) -> u32 {
        self.poll_interval_ms
    }

    /// Ask the receive task to exit at its next wake.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Check the inbound region once; deliver and consume if a message is
    /// waiting. Returns whether a message was handled.
    pub fn poll_once(&self) -> bool {
        if !self.inbound.is_new() {
            return false;
        }
        log::debug!("shmem: recv");
        let msg = self.inbound.read_msg();
        // Processing failures are the dispatcher's problem; the slot must
        // be released either way or the remote stalls forever.
        if let Err(e) = self.bus.recv(&msg) {
            log::warn!("shmem: recv: processing failed: {}", e);
        }
        self.inbound.complete_rx();
        true
    }

    /// Receive loop: poll, sleep, repeat until stopped.
    ///
    /// `sleep_ms` is the platform's bounded sleep; it is the only blocking
    /// call in the transport. The stop token is checked at every wake.
    pub fn run<F>(&self, mut sleep_ms: F)
    where
        F: FnMut(u32),
    {
        log::info!(
            "shmem: receive task running, poll interval {} ms",
            self.poll_interval_ms
        );
        while !self.stop.is_cancelled() {
            self.poll_once();
            sleep_ms(self.poll_interval_ms);
        }
        log::info!("shmem: receive task stopped");
    }
}

impl Transport for ShmemTransport {
    fn name(&self) -> &'static str {
        "shmem"
    }

    /// Publish into the out region, or report busy if the remote has not
    /// consumed the previous message.
    fn send(&self, msg: &RawMsg) -> Result<()> {
        let _guard = self.lock.lock();
        if self.out.is_new() {
            // a message is still waiting to be processed
            return Err(Error::TryAgain);
        }
        log::debug!("shmem: send");
        self.out.publish(msg);
        Ok(())
    }
}
