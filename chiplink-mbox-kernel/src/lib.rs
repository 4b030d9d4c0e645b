//! # chiplink-mbox-kernel
//!
//! In-cluster mailbox client for exchanging system messages with the
//! management cluster. Exactly two mailbox instances are reserved for this
//! transport: the first outbound, the second inbound. Together they appear
//! on the notification bus as a single bidirectional transport at mailbox
//! priority.
//!
//! One message may be outstanding per direction. Outbound sends are
//! refused with `TryAgain` until the previous message's ack arrives;
//! inbound messages are handed to the bus and the drain pulse is issued as
//! soon as dispatch returns, so the remote's send window reopens
//! immediately.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

use alloc::sync::Arc;

use chiplink_common::error::Result;
use chiplink_common::{Error, RawMsg};
use chiplink_mbox::{
    Channel, ChannelSpec, Direction, Mbox, RxClient, SendRequest, TxClient, TxStatus,
};
use chiplink_notif::{NotifBus, Priority, Transport};

/// Outbound channel plus the single-outstanding-message gate.
struct OutState {
    chan: Option<Channel>,
    /// Set by the ack ISR; a send is only legal while this holds.
    send_ack: bool,
    /// Status code the controller reported with the last ack.
    send_rc: i32,
}

/// The paired-channel transport.
///
/// Constructed with [`attach`](Self::attach), which encodes the required
/// bring-up order: outbound channel, bus registration, inbound channel. An
/// inbound message can arrive the moment the inbound channel opens and its
/// handler may synthesize a reply synchronously; both the registration and
/// the outbound path must already exist at that point.
pub struct KernelTransport {
    bus: Arc<NotifBus>,
    out: spin::Mutex<OutState>,
    inbound: spin::Mutex<Option<Channel>>,
}

impl core::fmt::Debug for KernelTransport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KernelTransport").finish_non_exhaustive()
    }
}

impl KernelTransport {
    /// Open the channel pair and register on the bus.
    ///
    /// `specs` must be ordered {outgoing, incoming}; the direction cells
    /// are validated against that order.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if the direction cells are miordered
    /// - any channel-open error; `Busy` if the bus slot is taken
    pub fn attach(
        bank: &Arc<Mbox>,
        specs: &[ChannelSpec; 2],
        bus: &Arc<NotifBus>,
    ) -> Result<Arc<Self>> {
        if specs[0].direction != Direction::Outgoing
            || specs[1].direction != Direction::Incoming
        {
            log::error!("mbox-kernel: first channel must be outbound, second inbound");
            return Err(Error::InvalidArgument);
        }

        let transport = Arc::new(Self {
            bus: Arc::clone(bus),
            out: spin::Mutex::new(OutState {
                chan: None,
                send_ack: true,
                send_rc: 0,
            }),
            inbound: spin::Mutex::new(None),
        });

        // Outbound first: a synchronous reply to an early inbound message
        // needs a viable path out.
        let tx_cap: Arc<dyn TxClient> = transport.clone();
        let out_chan = bank.open(specs[0].config, None, Some(tx_cap))?;
        transport.out.lock().chan = Some(out_chan);

        let as_transport: Arc<dyn Transport> = transport.clone();
        if let Err(e) = bus.register(Priority::Mailbox, &as_transport) {
            transport.out.lock().chan = None;
            return Err(e);
        }

        // Hold the inbound slot across the open: a message delivered
        // mid-open spins on this lock in the rx up-call until the channel
        // handle is in place for the drain pulse.
        {
            let mut slot = transport.inbound.lock();
            let rx_cap: Arc<dyn RxClient> = transport.clone();
            match bank.open(specs[1].config, Some(rx_cap), None) {
                Ok(chan) => *slot = Some(chan),
                Err(e) => {
                    drop(slot);
                    bus.unregister(Priority::Mailbox);
                    transport.out.lock().chan = None;
                    return Err(e);
                }
            }
        }

        log::info!("mbox-kernel: transport attached");
        Ok(transport)
    }

    /// Unregister from the bus and close both channels.
    pub fn detach(&self) {
        self.bus.unregister(Priority::Mailbox);
        *self.inbound.lock() = None;
        self.out.lock().chan = None;
        log::info!("mbox-kernel: transport detached");
    }
}

impl Transport for KernelTransport {
    fn name(&self) -> &'static str {
        "mbox-kernel"
    }

    fn send(&self, msg: &RawMsg) -> Result<()> {
        let mut out = self.out.lock();
        let Some(chan) = out.chan.as_ref() else {
            return Err(Error::NoDevice);
        };
        if !out.send_ack {
            // previous message not yet ack'd
            return Err(Error::TryAgain);
        }
        if out.send_rc != 0 {
            log::warn!("mbox-kernel: previous send was nacked: {}", out.send_rc);
        }
        chan.send(SendRequest::Payload(msg))?;
        out.send_ack = false;
        out.send_rc = 0;
        Ok(())
    }
}

impl RxClient for KernelTransport {
    /// Inbound message: dispatch synchronously, then reopen the remote's
    /// send window.
    fn received(&self, msg: &RawMsg) {
        log::debug!("mbox-kernel: rx");
        if let Err(e) = self.bus.recv(msg) {
            log::warn!("mbox-kernel: rx processing failed: {}", e);
        }
        if let Some(chan) = self.inbound.lock().as_ref() {
            chan.drain_rx_complete();
        }
    }
}

impl TxClient for KernelTransport {
    fn tx_done(&self, status: TxStatus) {
        let mut out = self.out.lock();
        out.send_ack = true;
        out.send_rc = status.code();
        drop(out);
        match status {
            TxStatus::Acked => log::debug!("mbox-kernel: tx_done: got ACK"),
            TxStatus::Nacked(e) => log::warn!("mbox-kernel: tx_done: got NACK {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use chiplink_common::MSG_SIZE;
    use chiplink_mbox::regs::{EVENT_B, int_a, int_b};
    use chiplink_mbox::testing::{pattern_msg, FakeBank};
    use chiplink_mbox::ChannelConfig;
    use chiplink_notif::RecvSink;
    use std::sync::Mutex;
    use std::vec::Vec;

    const OUT: usize = 0;
    const IN: usize = 1;

    fn specs() -> [ChannelSpec; 2] {
        [
            ChannelSpec {
                config: ChannelConfig {
                    instance: OUT,
                    ..ChannelConfig::default()
                },
                direction: Direction::Outgoing,
            },
            ChannelSpec {
                config: ChannelConfig {
                    instance: IN,
                    ..ChannelConfig::default()
                },
                direction: Direction::Incoming,
            },
        ]
    }

    struct CaptureSink {
        msgs: Mutex<Vec<RawMsg>>,
    }

    impl CaptureSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                msgs: Mutex::new(Vec::new()),
            })
        }
    }

    impl RecvSink for CaptureSink {
        fn recv(&self, msg: &RawMsg) -> Result<()> {
            self.msgs.lock().unwrap().push(*msg);
            Ok(())
        }
    }

    fn harness() -> (FakeBank, Arc<NotifBus>, Arc<CaptureSink>, Arc<KernelTransport>) {
        let fb = FakeBank::new(0, 1);
        let bus = Arc::new(NotifBus::new());
        let sink = CaptureSink::new();
        let as_sink: Arc<dyn RecvSink> = sink.clone();
        bus.set_sink(&as_sink);
        let transport = KernelTransport::attach(&fb.bank, &specs(), &bus).unwrap();
        (fb, bus, sink, transport)
    }

    #[test]
    fn test_attach_validates_ordering() {
        let fb = FakeBank::new(0, 1);
        let bus = Arc::new(NotifBus::new());
        let mut swapped = specs();
        swapped.swap(0, 1);
        assert_eq!(
            KernelTransport::attach(&fb.bank, &swapped, &bus).unwrap_err(),
            Error::InvalidArgument
        );
    }

    #[test]
    fn test_attach_claims_both_instances() {
        let (fb, _bus, _sink, _t) = harness();
        // outbound listens for acks, inbound for messages
        assert_eq!(fb.int_enable(OUT), int_b(1));
        assert_eq!(fb.int_enable(IN), int_a(0));
    }

    #[test]
    fn test_send_gated_on_ack() {
        let (fb, bus, _sink, _t) = harness();
        let msg = pattern_msg();

        bus.send(&msg).unwrap();
        // window closed until the ack interrupt fires
        assert_eq!(bus.send(&msg).unwrap_err(), Error::TryAgain);

        fb.remote_ack(OUT);
        assert_eq!(fb.bank.handle_ack_irq(), 1);
        fb.clear_cause(OUT);
        bus.send(&msg).unwrap();
    }

    #[test]
    fn test_rx_dispatches_and_drains() {
        let (fb, _bus, sink, _t) = harness();
        let msg = pattern_msg();

        fb.remote_deliver(IN, &msg);
        assert_eq!(fb.bank.handle_rcv_irq(), 1);

        let got = sink.msgs.lock().unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0], msg);
        drop(got);

        // the remote's send flow was reopened with a drain pulse
        assert_eq!(fb.event_set(IN), EVENT_B);
    }

    #[test]
    fn test_attach_rolls_back_on_inbound_failure() {
        let fb = FakeBank::new(0, 1);
        let bus = Arc::new(NotifBus::new());

        // another client already holds the inbound instance
        struct Sink;
        impl RxClient for Sink {
            fn received(&self, _msg: &RawMsg) {}
        }
        let holder: Arc<dyn RxClient> = Arc::new(Sink);
        let _held = fb
            .bank
            .open(
                ChannelConfig {
                    instance: IN,
                    ..ChannelConfig::default()
                },
                Some(holder),
                None,
            )
            .unwrap();

        assert_eq!(
            KernelTransport::attach(&fb.bank, &specs(), &bus).unwrap_err(),
            Error::Busy
        );

        // the rollback freed both the bus slot and the outbound instance
        let other = FakeBank::new(0, 1);
        let replacement = KernelTransport::attach(&other.bank, &specs(), &bus).unwrap();
        let reopened = fb
            .bank
            .open(
                ChannelConfig {
                    instance: OUT,
                    ..ChannelConfig::default()
                },
                None,
                Some(replacement.clone()),
            )
            .unwrap();
        drop(reopened);
    }

    #[test]
    fn test_detach_releases_instances() {
        let (fb, bus, _sink, t) = harness();
        t.detach();
        assert_eq!(bus.send(&[0u8; MSG_SIZE]).unwrap_err(), Error::NoDevice);

        // both instances reopenable
        let rec: Arc<dyn RxClient> = t.clone();
        let _a = fb
            .bank
            .open(
                ChannelConfig {
                    instance: OUT,
                    ..ChannelConfig::default()
                },
                Some(rec.clone()),
                None,
            )
            .unwrap();
        let _b = fb
            .bank
            .open(
                ChannelConfig {
                    instance: IN,
                    ..ChannelConfig::default()
                },
                Some(rec),
                None,
            )
            .unwrap();
    }
}
