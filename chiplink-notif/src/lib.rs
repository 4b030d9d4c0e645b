//! # chiplink-notif
//!
//! The notification bus: a priority-ordered registry of transports able to
//! exchange system messages with the management cluster.
//!
//! Transports register themselves into a fixed slot table; sending walks
//! the table from the highest priority down until a transport accepts the
//! message. Receiving is an up-call from whichever transport a message
//! arrived on, delegated to a single injected sink (the system-message
//! dispatcher). The bus holds no lock across handler invocations, so a
//! message handler may originate outbound messages synchronously.
//!
//! This lets delivery mechanisms be added, removed, or reconfigured in a
//! fault-tolerant manner while the bus API stays available throughout.
//! Sending and receiving run in atomic contexts; the bus never blocks and
//! never retries internally (callers own the retry policy).
//!
//! The bus holds only non-owning references; registrants keep their
//! transports alive for at least the registration interval.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

use alloc::sync::{Arc, Weak};

use chiplink_common::error::Result;
use chiplink_common::{Error, RawMsg};

/// Transport priorities; lower value is tried first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum Priority {
    /// Shared-memory transport.
    Shmem = 0,
    /// Mailbox transport.
    Mailbox = 1,
}

impl Priority {
    /// Number of priority slots.
    pub const COUNT: usize = 2;

    /// All priorities, in walk order.
    pub const ALL: [Self; Self::COUNT] = [Self::Shmem, Self::Mailbox];

    #[inline]
    const fn index(self) -> usize {
        self as usize
    }
}

/// A registered delivery mechanism.
///
/// `send` runs in atomic context and must not block. Its result steers the
/// bus walk:
/// - `Ok(())`: accepted and done, stop walking
/// - `Err(TryAgain)`: transport busy with a previous message; stop walking
///   so the caller can retry the *same* transport rather than silently
///   reordering onto a lower-priority one
/// - any other error: try the next slot
pub trait Transport: Send + Sync {
    fn name(&self) -> &'static str;
    fn send(&self, msg: &RawMsg) -> Result<()>;
}

/// Consumer of inbound messages (the system-message dispatcher).
///
/// Runs in atomic context, possibly from an interrupt handler.
pub trait RecvSink: Send + Sync {
    fn recv(&self, msg: &RawMsg) -> Result<()>;
}

/// The transport registry.
///
/// One per cluster, created at bring-up and passed explicitly to every
/// component that sends or carries messages.
pub struct NotifBus {
    slots: spin::Mutex<[Option<Weak<dyn Transport>>; Priority::COUNT]>,
    sink: spin::Mutex<Option<Weak<dyn RecvSink>>>,
}

impl NotifBus {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: spin::Mutex::new([None, None]),
            sink: spin::Mutex::new(None),
        }
    }

    /// Install the inbound message sink.
    ///
    /// Must happen before any transport can deliver; transports registered
    /// first would drop inbound messages with `NoDevice`.
    pub fn set_sink(&self, sink: &Arc<dyn RecvSink>) {
        *self.sink.lock() = Some(Arc::downgrade(sink));
    }

    /// Register a transport in its priority slot.
    ///
    /// # Errors
    ///
    /// `Busy` if the slot is already occupied by a live transport.
    pub fn register(&self, priority: Priority, transport: &Arc<dyn Transport>) -> Result<()> {
        let mut slots = self.slots.lock();
        let slot = &mut slots[priority.index()];
        if slot.as_ref().is_some_and(|w| w.strong_count() > 0) {
            return Err(Error::Busy);
        }
        log::info!(
            "notif: registering handler '{}' priority {:?}",
            transport.name(),
            priority
        );
        *slot = Some(Arc::downgrade(transport));
        Ok(())
    }

    /// Clear a priority slot.
    pub fn unregister(&self, priority: Priority) {
        log::info!("notif: unregistering handler priority {:?}", priority);
        self.slots.lock()[priority.index()] = None;
    }

    /// Send a message towards the management cluster.
    ///
    /// Walks occupied slots in priority order; see [`Transport::send`] for
    /// the walk semantics. The registry lock is dropped before any
    /// transport is invoked.
    ///
    /// # Errors
    ///
    /// - `NoDevice` if no transport is registered
    /// - `TryAgain` if the accepting transport is momentarily full
    /// - otherwise, the error of the last transport tried
    pub fn send(&self, msg: &RawMsg) -> Result<()> {
        let slots = {
            let guard = self.slots.lock();
            guard.clone()
        };

        let mut last_err = None;
        for slot in slots.iter() {
            let Some(transport) = slot.as_ref().and_then(Weak::upgrade) else {
                continue;
            };
            match transport.send(msg) {
                Ok(()) => return Ok(()),
                Err(Error::TryAgain) => {
                    log::debug!("notif: send: '{}' busy", transport.name());
                    return Err(Error::TryAgain);
                }
                Err(e) => {
                    log::error!("notif: send: '{}' failed: {}", transport.name(), e);
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            Some(e) => Err(e),
            None => {
                log::error!("notif: send: no handlers available");
                Err(Error::NoDevice)
            }
        }
    }

    /// Deliver an inbound message to the sink.
    ///
    /// Called by transports from their receive paths. No lock is held
    /// across the sink call, so processing may send a response before
    /// returning here.
    pub fn recv(&self, msg: &RawMsg) -> Result<()> {
        let sink = self.sink.lock().as_ref().and_then(Weak::upgrade);
        match sink {
            Some(sink) => sink.recv(msg),
            None => {
                log::error!("notif: recv: no sink installed, dropping message");
                Err(Error::NoDevice)
            }
        }
    }
}

impl Default for NotifBus {
    fn default() -> Self {
        Self::new()
    }
}
