//! Channel handles.
//!
//! A [`Channel`] is the runtime binding of one mailbox instance to one
//! client. It is returned by [`Mbox::open`](crate::bank::Mbox::open) and
//! releases the instance when closed or dropped.

use alloc::sync::Arc;

use chiplink_common::error::Result;

use crate::bank::Mbox;
use crate::client::SendRequest;

/// Exclusive handle to an opened mailbox instance.
///
/// Dropping the handle detaches the client and quiesces the instance, so a
/// lost handle can never leave interrupts routed at a dead client.
pub struct Channel {
    bank: Arc<Mbox>,
    instance: usize,
}

impl Channel {
    pub(crate) fn new(bank: Arc<Mbox>, instance: usize) -> Self {
        Self { bank, instance }
    }

    /// Instance index this channel is bound to.
    #[inline]
    #[must_use]
    pub fn instance(&self) -> usize {
        self.instance
    }

    /// Send a payload, or nack the last received message.
    ///
    /// Non-blocking. For payloads, completion is reported through the
    /// client's tx-done capability; callers must not submit another payload
    /// until that up-call arrives.
    pub fn send(&self, req: SendRequest<'_>) -> Result<()> {
        self.bank.send(self.instance, req)
    }

    /// Report that the last received message has been consumed.
    ///
    /// Until this is called the remote sender is not permitted to transmit
    /// again; call it exactly once per `received` up-call.
    pub fn drain_rx_complete(&self) {
        self.bank.drain_rx_complete(self.instance);
    }

    /// Query whether a message is pending delivery on this instance.
    ///
    /// Pure query; does not acknowledge anything.
    #[must_use]
    pub fn peek_rx(&self) -> bool {
        self.bank.peek_rx(self.instance)
    }

    /// Close the channel, detaching the client.
    ///
    /// Equivalent to dropping the handle; provided for call sites where the
    /// teardown should be explicit.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.bank.shutdown(self.instance);
    }
}

impl core::fmt::Debug for Channel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Channel")
            .field("instance", &self.instance)
            .finish_non_exhaustive()
    }
}
