//! Mailbox bank driver.
//!
//! Owns the bank's MMIO window and the two shared interrupt lines. The
//! block gives no indication of which instance raised a line, so each ISR
//! scans all instances and matches on two criteria: the event is pending in
//! EVENT-CAUSE, and INT-ENABLE routes that event to the interrupt index the
//! line serves.
//!
//! # Interrupt Flow
//!
//! 1. Remote raises event A (message) or B (ack) on an instance
//! 2. The block asserts the interrupt line the event is routed to
//! 3. Platform glue calls [`Mbox::handle_rcv_irq`] / [`Mbox::handle_ack_irq`]
//! 4. The scan finds the instance; event A payloads are word-copied out of
//!    the data window before the client up-call
//! 5. Cause bits are cleared only after the up-call returns; for event A
//!    this means the client's rx-ack pulse cannot race the payload read

use alloc::sync::Arc;

use chiplink_common::error::Result;
use chiplink_common::{Error, RawMsg, MSG_SIZE};
use chiplink_mmio::MmioRegion;

use crate::channel::Channel;
use crate::client::{RxClient, SendRequest, TxClient, TxStatus};
use crate::config::{BankConfig, ChannelConfig};
use crate::regs::{
    int_a, int_b, CONFIG_DEST_MASK, CONFIG_DEST_SHIFT, CONFIG_OWNER_MASK, CONFIG_OWNER_SHIFT,
    CONFIG_SRC_MASK, CONFIG_SRC_SHIFT, CONFIG_UNSECURE, DATA_REGS, EVENT_A, EVENT_B, INSTANCES,
    INSTANCE_STRIDE, REG_CONFIG, REG_DATA, REG_EVENT_CAUSE, REG_EVENT_CLEAR, REG_EVENT_SET,
    REG_EVENT_STATUS, REG_INT_ENABLE,
};

/// Client attachment state of one instance.
///
/// Mutated only under the instance lock. The ISRs take the lock
/// conditionally and treat failure as "no client" so a concurrent close can
/// never deadlock against them.
struct ClientSlots {
    attached: bool,
    config: ChannelConfig,
    rx: Option<Arc<dyn RxClient>>,
    tx: Option<Arc<dyn TxClient>>,
}

impl ClientSlots {
    const fn empty() -> Self {
        Self {
            attached: false,
            config: ChannelConfig {
                instance: 0,
                owner: 0,
                src: 0,
                dst: 0,
            },
            rx: None,
            tx: None,
        }
    }
}

/// One mailbox instance: its register window plus attachment state.
struct Instance {
    index: usize,
    regs: MmioRegion,
    slots: spin::Mutex<ClientSlots>,
}

/// A mailbox bank: 32 instances behind two shared interrupt lines.
///
/// Created once at bank init and never freed; instances are logically
/// claimed and released through [`Mbox::open`] and channel close.
pub struct Mbox {
    rcv_int_idx: u32,
    ack_int_idx: u32,
    instances: [Instance; INSTANCES],
}

impl Mbox {
    /// Map a bank at the configured base address.
    ///
    /// # Safety
    ///
    /// `config.base` must point to a mapped mailbox block register window of
    /// at least 32 instance strides, and no other code may drive those
    /// registers concurrently.
    #[must_use]
    pub unsafe fn new(config: &BankConfig) -> Self {
        // SAFETY: Caller guarantees the window covers all instances
        let regs = unsafe { MmioRegion::new(config.base, INSTANCES * INSTANCE_STRIDE) };
        Self {
            rcv_int_idx: config.rcv_int_idx,
            ack_int_idx: config.ack_int_idx,
            instances: core::array::from_fn(|i| Instance {
                index: i,
                regs: regs.subregion(i * INSTANCE_STRIDE, INSTANCE_STRIDE),
                slots: spin::Mutex::new(ClientSlots::empty()),
            }),
        }
    }

    /// Open a channel on an instance, attaching the client's capabilities.
    ///
    /// At most one of `rx`/`tx` is typically supplied, but both are
    /// allowed. Interrupts are only enabled for the events the client can
    /// handle; an absent capability leaves that event for another entity to
    /// process.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if the instance index is out of range
    /// - `Busy` if the instance already has a client, or the ownership
    ///   claim did not stick
    /// - `ConfigMismatch` if the configured src/dst disagree with the
    ///   hardware
    pub fn open(
        self: &Arc<Self>,
        config: ChannelConfig,
        rx: Option<Arc<dyn RxClient>>,
        tx: Option<Arc<dyn TxClient>>,
    ) -> Result<Channel> {
        if config.instance >= INSTANCES {
            return Err(Error::InvalidArgument);
        }
        let inst = &self.instances[config.instance];
        let mut slots = inst.slots.lock();
        if slots.attached {
            log::info!("mbox: instance {} already claimed", config.instance);
            return Err(Error::Busy);
        }

        self.startup(inst, &config, rx.is_some(), tx.is_some())?;

        slots.attached = true;
        slots.config = config;
        slots.rx = rx;
        slots.tx = tx;
        log::debug!("mbox: opened instance {}", config.instance);
        Ok(Channel::new(Arc::clone(self), config.instance))
    }

    /// Submit a send request on an opened instance.
    ///
    /// Non-blocking: returns once the payload is in the data window and the
    /// event is raised. Completion arrives later through the tx-done
    /// capability.
    pub(crate) fn send(&self, instance: usize, req: SendRequest<'_>) -> Result<()> {
        let inst = &self.instances[instance];
        if !inst.slots.lock().attached {
            return Err(Error::NoDevice);
        }
        match req {
            SendRequest::Payload(msg) => {
                let words = msg_to_words(msg);
                inst.regs.copy_to_words(REG_DATA, &words);
                log::trace!("mbox: instance {} send, set event A", instance);
                inst.regs.write32(REG_EVENT_SET, EVENT_A);
            }
            SendRequest::Nack(reason) => {
                log::warn!("mbox: instance {} nack, reason {}", instance, reason);
                inst.regs.write32(REG_EVENT_SET, EVENT_B);
            }
        }
        Ok(())
    }

    /// Signal that the client has drained the last received message.
    ///
    /// Pulses event B towards the remote sender, permitting its next
    /// transmission. The hardware offers no dedicated event for this, so
    /// the ack event is reused.
    pub(crate) fn drain_rx_complete(&self, instance: usize) {
        log::trace!("mbox: instance {} rx drained, set event B", instance);
        self.instances[instance].regs.write32(REG_EVENT_SET, EVENT_B);
    }

    /// Query whether an undelivered message is pending on an instance.
    pub(crate) fn peek_rx(&self, instance: usize) -> bool {
        self.instances[instance].regs.read32(REG_EVENT_STATUS) & EVENT_A != 0
    }

    /// Detach the client from an instance and quiesce the hardware.
    ///
    /// Safe to call on an already-closed instance.
    pub(crate) fn shutdown(&self, instance: usize) {
        let inst = &self.instances[instance];
        let mut slots = inst.slots.lock();
        if !slots.attached {
            return;
        }

        let mut ie = inst.regs.read32(REG_INT_ENABLE);
        ie &= !int_a(self.rcv_int_idx);
        ie &= !int_b(self.ack_int_idx);
        log::debug!("mbox: instance {} int_enable <- {:#010x}", instance, ie);
        inst.regs.write32(REG_INT_ENABLE, ie);

        // Clearing owner also resets src/dst on this peripheral
        if slots.config.owner != 0 {
            inst.regs.write32(REG_CONFIG, 0);
        }

        slots.attached = false;
        slots.rx = None;
        slots.tx = None;
        log::debug!("mbox: closed instance {}", instance);
    }

    /// Service the receive interrupt line.
    ///
    /// Call from the platform's handler for the line carrying interrupt
    /// index `rcv_int_idx`. Returns the number of instances serviced.
    pub fn handle_rcv_irq(&self) -> usize {
        self.isr(EVENT_A, int_a(self.rcv_int_idx))
    }

    /// Service the ack interrupt line.
    ///
    /// Call from the platform's handler for the line carrying interrupt
    /// index `ack_int_idx`. Returns the number of instances serviced.
    pub fn handle_ack_irq(&self) -> usize {
        self.isr(EVENT_B, int_b(self.ack_int_idx))
    }

    /// Scan all instances for one event routed to one interrupt bit.
    ///
    /// The block could route either event of any instance to any index, so
    /// the pending check and the routing check must both pass before an
    /// instance is serviced.
    fn isr(&self, event: u32, int_bit: u32) -> usize {
        let mut handled = 0;
        for inst in &self.instances {
            let cause = inst.regs.read32(REG_EVENT_CAUSE);
            if cause & event == 0 {
                continue;
            }
            let ie = inst.regs.read32(REG_INT_ENABLE);
            if ie & int_bit == 0 {
                continue;
            }
            handled += 1;
            log::trace!("mbox: isr event {} instance {}", event, inst.index);

            // Either event: the up-call completes before the cause bit is
            // cleared
            match event {
                EVENT_A => self.deliver(inst),
                EVENT_B => {
                    if let Some(tx) = Self::tx_client(inst) {
                        tx.tx_done(TxStatus::Acked);
                    }
                    inst.regs.write32(REG_EVENT_CLEAR, EVENT_B);
                }
                _ => unreachable!("mailbox has exactly two events"),
            }
        }
        handled
    }

    /// Deliver a pending message (event A) on one instance.
    ///
    /// The payload leaves the data window as a word-stride copy before the
    /// up-call, and the cause bit is cleared only after the up-call
    /// returns; the client's drain pulse therefore cannot overtake the
    /// payload read.
    fn deliver(&self, inst: &Instance) {
        let mut words = [0u32; DATA_REGS];
        inst.regs.copy_from_words(REG_DATA, &mut words);
        let msg = words_to_msg(&words);

        match Self::rx_client(inst) {
            Some(rx) => rx.received(&msg),
            None => {
                // Closed concurrently with delivery. Refuse the message so
                // the remote sender does not stall waiting on a drain.
                log::warn!("mbox: instance {} rx with no client, nack", inst.index);
                inst.regs.write32(REG_EVENT_SET, EVENT_B);
            }
        }
        inst.regs.write32(REG_EVENT_CLEAR, EVENT_A);
    }

    /// Fetch the rx capability without blocking.
    ///
    /// A held lock means a close is in flight on another core; that is
    /// treated the same as an already-detached client.
    fn rx_client(inst: &Instance) -> Option<Arc<dyn RxClient>> {
        let slots = inst.slots.try_lock()?;
        if !slots.attached {
            return None;
        }
        slots.rx.clone()
    }

    /// Fetch the tx capability without blocking. See [`Self::rx_client`].
    fn tx_client(inst: &Instance) -> Option<Arc<dyn TxClient>> {
        let slots = inst.slots.try_lock()?;
        if !slots.attached {
            return None;
        }
        slots.tx.clone()
    }

    /// Claim instance ownership, verify the stored routing, and enable the
    /// interrupts this client can handle.
    fn startup(
        &self,
        inst: &Instance,
        config: &ChannelConfig,
        is_recv: bool,
        is_send: bool,
    ) -> Result<()> {
        // Ownership is orthogonal to direction and entirely optional; the
        // hardware does not enforce it, it only serves as a sanity check.
        self.claim_owner(inst, config)?;

        if let Err(e) = Self::verify_config(inst, config, is_recv, is_send) {
            self.release_owner(inst, config);
            return Err(e);
        }

        let mut ie = inst.regs.read32(REG_INT_ENABLE);
        if is_recv {
            ie |= int_a(self.rcv_int_idx);
        }
        if is_send {
            ie |= int_b(self.ack_int_idx);
        }
        log::debug!(
            "mbox: instance {} int_enable <- {:#010x}",
            inst.index,
            ie
        );
        inst.regs.write32(REG_INT_ENABLE, ie);
        Ok(())
    }

    fn claim_owner(&self, inst: &Instance, config: &ChannelConfig) -> Result<()> {
        if config.owner == 0 {
            return Ok(());
        }
        let claim = ((config.owner as u32) << CONFIG_OWNER_SHIFT) & CONFIG_OWNER_MASK
            | ((config.src as u32) << CONFIG_SRC_SHIFT) & CONFIG_SRC_MASK
            | ((config.dst as u32) << CONFIG_DEST_SHIFT) & CONFIG_DEST_MASK
            | CONFIG_UNSECURE;
        inst.regs.write32(REG_CONFIG, claim);
        let claimed = inst.regs.read32(REG_CONFIG);
        if claimed != claim {
            log::error!(
                "mbox: instance {} claim failed: config {:#010x} != {:#010x}",
                inst.index,
                claim,
                claimed
            );
            return Err(Error::Busy);
        }
        Ok(())
    }

    fn release_owner(&self, inst: &Instance, config: &ChannelConfig) {
        if config.owner != 0 {
            inst.regs.write32(REG_CONFIG, 0);
        }
    }

    /// Check the stored src/dst against the client's expectation.
    ///
    /// Applies whether or not we claimed ownership; only the field relevant
    /// to the client's direction is checked.
    fn verify_config(
        inst: &Instance,
        config: &ChannelConfig,
        is_recv: bool,
        is_send: bool,
    ) -> Result<()> {
        if config.src == 0 && config.dst == 0 {
            return Ok(());
        }
        let stored = inst.regs.read32(REG_CONFIG);
        let src = ((stored & CONFIG_SRC_MASK) >> CONFIG_SRC_SHIFT) as u8;
        let dst = ((stored & CONFIG_DEST_MASK) >> CONFIG_DEST_SHIFT) as u8;
        if (is_recv && config.dst != 0 && dst != config.dst)
            || (is_send && config.src != 0 && src != config.src)
        {
            log::error!(
                "mbox: instance {} src/dst mismatch: {:#x}/{:#x} (expected {:#x}/{:#x})",
                inst.index,
                src,
                dst,
                config.src,
                config.dst
            );
            return Err(Error::ConfigMismatch);
        }
        Ok(())
    }
}

/// Reassemble a message from data-window words, little-endian.
fn words_to_msg(words: &[u32; DATA_REGS]) -> RawMsg {
    let mut msg = [0u8; MSG_SIZE];
    for (i, word) in words.iter().enumerate() {
        msg[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
    }
    msg
}

/// Split a message into data-window words, little-endian.
fn msg_to_words(msg: &RawMsg) -> [u32; DATA_REGS] {
    core::array::from_fn(|i| {
        u32::from_le_bytes([msg[i * 4], msg[i * 4 + 1], msg[i * 4 + 2], msg[i * 4 + 3]])
    })
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::testing::{self, FakeBank};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::vec::Vec;

    struct Recorder {
        msgs: Mutex<Vec<RawMsg>>,
        acks: AtomicUsize,
    }

    impl Recorder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                msgs: Mutex::new(Vec::new()),
                acks: AtomicUsize::new(0),
            })
        }
    }

    impl RxClient for Recorder {
        fn received(&self, msg: &RawMsg) {
            self.msgs.lock().unwrap().push(*msg);
        }
    }

    impl TxClient for Recorder {
        fn tx_done(&self, status: TxStatus) {
            assert_eq!(status, TxStatus::Acked);
            self.acks.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn cfg(instance: usize) -> ChannelConfig {
        ChannelConfig {
            instance,
            ..ChannelConfig::default()
        }
    }

    #[test]
    fn test_open_is_exclusive() {
        let fb = FakeBank::new(0, 1);
        let rec = Recorder::new();
        let _chan = fb
            .bank
            .open(cfg(3), Some(rec.clone()), None)
            .expect("first open");
        assert_eq!(
            fb.bank.open(cfg(3), Some(rec.clone()), None).unwrap_err(),
            Error::Busy
        );
        // other instances unaffected
        let _other = fb.bank.open(cfg(4), Some(rec), None).expect("other instance");
    }

    #[test]
    fn test_open_bad_instance() {
        let fb = FakeBank::new(0, 1);
        assert_eq!(
            fb.bank.open(cfg(INSTANCES), None, None).unwrap_err(),
            Error::InvalidArgument
        );
    }

    #[test]
    fn test_open_routes_interrupts_by_capability() {
        let fb = FakeBank::new(2, 5);
        let rec = Recorder::new();

        let _rx = fb.bank.open(cfg(0), Some(rec.clone()), None).unwrap();
        assert_eq!(fb.int_enable(0), int_a(2));

        let _tx = fb.bank.open(cfg(1), None, Some(rec)).unwrap();
        assert_eq!(fb.int_enable(1), int_b(5));
    }

    #[test]
    fn test_claim_and_release_owner() {
        let fb = FakeBank::new(0, 1);
        let config = ChannelConfig {
            instance: 7,
            owner: 0x2a,
            src: 3,
            dst: 4,
        };
        let chan = fb.bank.open(config, None, None).unwrap();
        let stored = fb.config(7);
        assert_eq!((stored & CONFIG_OWNER_MASK) >> CONFIG_OWNER_SHIFT, 0x2a);
        assert_eq!((stored & CONFIG_SRC_MASK) >> CONFIG_SRC_SHIFT, 3);
        assert_eq!((stored & CONFIG_DEST_MASK) >> CONFIG_DEST_SHIFT, 4);
        assert_eq!(stored & CONFIG_UNSECURE, CONFIG_UNSECURE);

        chan.close();
        assert_eq!(fb.config(7), 0);
    }

    #[test]
    fn test_verify_config_mismatch() {
        let fb = FakeBank::new(0, 1);
        // Another entity configured the instance with dst 9
        fb.set_config(6, 0, 0, 9);
        let config = ChannelConfig {
            instance: 6,
            owner: 0,
            src: 0,
            dst: 4,
        };
        let rec = Recorder::new();
        assert_eq!(
            fb.bank.open(config, Some(rec), None).unwrap_err(),
            Error::ConfigMismatch
        );
    }

    #[test]
    fn test_send_payload_and_nack() {
        let fb = FakeBank::new(0, 1);
        let rec = Recorder::new();
        let chan = fb.bank.open(cfg(2), None, Some(rec)).unwrap();

        let msg = testing::pattern_msg();
        chan.send(SendRequest::Payload(&msg)).unwrap();
        assert_eq!(fb.event_set(2), EVENT_A);
        assert_eq!(fb.data_words(2), msg_to_words(&msg));

        chan.send(SendRequest::Nack(Error::Pipe)).unwrap();
        assert_eq!(fb.event_set(2), EVENT_B);
    }

    #[test]
    fn test_rcv_isr_delivers_once() {
        let fb = FakeBank::new(0, 1);
        let rec = Recorder::new();
        let _chan = fb.bank.open(cfg(5), Some(rec.clone()), None).unwrap();

        let msg = testing::pattern_msg();
        fb.remote_deliver(5, &msg);
        assert_eq!(fb.bank.handle_rcv_irq(), 1);

        let got = rec.msgs.lock().unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0], msg);
    }

    #[test]
    fn test_rcv_isr_ignores_unrouted_instances() {
        let fb = FakeBank::new(0, 1);
        let rec = Recorder::new();
        let _chan = fb.bank.open(cfg(5), Some(rec.clone()), None).unwrap();

        // Event pending on an instance nobody opened: routing check fails
        let msg = testing::pattern_msg();
        fb.remote_deliver(9, &msg);
        assert_eq!(fb.bank.handle_rcv_irq(), 0);
        assert!(rec.msgs.lock().unwrap().is_empty());
    }

    #[test]
    fn test_rcv_without_client_nacks() {
        let fb = FakeBank::new(0, 1);
        let rec = Recorder::new();
        let chan = fb.bank.open(cfg(5), Some(rec.clone()), None).unwrap();

        // Keep event A routed after close so the scan still matches, as it
        // would be when delivery races the close
        let ie = fb.int_enable(5);
        chan.close();
        fb.set_int_enable(5, ie);

        fb.remote_deliver(5, &testing::pattern_msg());
        assert_eq!(fb.bank.handle_rcv_irq(), 1);
        assert!(rec.msgs.lock().unwrap().is_empty());
        // remote was un-stalled with a nack pulse
        assert_eq!(fb.event_set(5), EVENT_B);
    }

    #[test]
    fn test_ack_isr_reports_tx_done() {
        let fb = FakeBank::new(0, 1);
        let rec = Recorder::new();
        let chan = fb.bank.open(cfg(2), None, Some(rec.clone())).unwrap();

        chan.send(SendRequest::Payload(&testing::pattern_msg())).unwrap();
        fb.remote_ack(2);
        assert_eq!(fb.bank.handle_ack_irq(), 1);
        assert_eq!(rec.acks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drain_pulses_event_b() {
        let fb = FakeBank::new(0, 1);
        let rec = Recorder::new();
        let chan = fb.bank.open(cfg(4), Some(rec), None).unwrap();
        chan.drain_rx_complete();
        assert_eq!(fb.event_set(4), EVENT_B);
    }

    #[test]
    fn test_peek_rx_is_a_pure_query() {
        let fb = FakeBank::new(0, 1);
        let rec = Recorder::new();
        let chan = fb.bank.open(cfg(6), Some(rec), None).unwrap();
        assert!(!chan.peek_rx());
        fb.raise_status(6, EVENT_A);
        assert!(chan.peek_rx());
        // the query neither clears nor acknowledges anything
        assert!(chan.peek_rx());
    }

    #[test]
    fn test_word_roundtrip() {
        let msg = testing::pattern_msg();
        assert_eq!(words_to_msg(&msg_to_words(&msg)), msg);
    }

    #[test]
    fn test_reopen_after_close() {
        let fb = FakeBank::new(0, 1);
        let rec = Recorder::new();
        let chan = fb.bank.open(cfg(3), Some(rec.clone()), None).unwrap();
        chan.close();
        let _again = fb.bank.open(cfg(3), Some(rec), None).expect("reopen");
    }
}
