//! Per-instance device endpoints.
//!
//! A device is long-lived (one per mailbox instance per bank); a channel
//! is attached only while the device is open. The device lock serializes
//! interrupt up-calls against file operations, so it must be acquired
//! interrupt-safely by the platform integration (it is taken from both
//! contexts).

use alloc::string::String;
use alloc::sync::Arc;

use chiplink_common::error::Result;
use chiplink_common::{Error, RawMsg, MSG_SIZE};
use chiplink_mbox::{
    Channel, ChannelSpec, Mbox, RxClient, SendRequest, TxClient, TxStatus,
};

use crate::poll::PollEvents;
use crate::waitq::WaitQueue;

/// File access mode the device was opened with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl OpenMode {
    #[inline]
    #[must_use]
    pub const fn writable(self) -> bool {
        matches!(self, Self::WriteOnly | Self::ReadWrite)
    }
}

/// Mutable device state, guarded by the device lock.
struct DevState {
    /// Attached channel; present exactly while the device is open.
    chan: Option<Channel>,
    /// One-message receive buffer.
    rx_msg: RawMsg,
    /// A received message is ready to be read.
    rx_pending: bool,
    /// The controller reported completion of the last send.
    send_ack: bool,
    /// Status code the controller gave us for that completion.
    send_rc: i32,
}

/// One user-facing mailbox device.
///
/// Reading an incoming device yields the 64-byte payload; reading an
/// outgoing device yields the 4-byte ack/nack status of the last write.
/// The ack status is readable exactly once.
pub struct MboxDevice {
    name: String,
    spec: ChannelSpec,
    bank: Arc<Mbox>,
    state: spin::Mutex<DevState>,
    wq: WaitQueue,
}

impl MboxDevice {
    #[must_use]
    pub fn new(name: String, spec: ChannelSpec, bank: Arc<Mbox>) -> Arc<Self> {
        Arc::new(Self {
            name,
            spec,
            bank,
            state: spin::Mutex::new(DevState {
                chan: None,
                rx_msg: [0; MSG_SIZE],
                rx_pending: false,
                send_ack: false,
                send_rc: 0,
            }),
            wq: WaitQueue::new(),
        })
    }

    /// Device file name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Instance index this device fronts.
    #[inline]
    #[must_use]
    pub fn instance(&self) -> usize {
        self.spec.config.instance
    }

    /// Whether this device's instance carries management-to-cluster
    /// traffic.
    #[inline]
    #[must_use]
    pub fn is_incoming(&self) -> bool {
        self.spec.is_incoming()
    }

    /// Open the device, claiming the instance.
    ///
    /// Reading an outgoing device (for the ack) is allowed, but writing an
    /// incoming device is not; the direction is fixed by the allocation,
    /// not the open mode.
    ///
    /// # Errors
    ///
    /// - `Busy` if already open
    /// - `InvalidArgument` if a writable mode is requested on an incoming
    ///   instance
    /// - channel-open errors from the bank
    pub fn open(self: &Arc<Self>, mode: OpenMode) -> Result<()> {
        let mut state = self.state.lock();
        if state.chan.is_some() {
            log::info!("mbox-user: {}: already open", self.name);
            return Err(Error::Busy);
        }
        if self.spec.is_incoming() && mode.writable() {
            log::error!(
                "mbox-user: {}: access mode disagrees with channel direction",
                self.name
            );
            return Err(Error::InvalidArgument);
        }

        state.rx_pending = false;
        state.send_ack = false;
        state.send_rc = 0;

        // Attach only the capability subset the direction needs
        let (rx, tx) = if self.spec.is_incoming() {
            (Some(self.clone() as Arc<dyn RxClient>), None)
        } else {
            (None, Some(self.clone() as Arc<dyn TxClient>))
        };
        state.chan = Some(self.bank.open(self.spec.config, rx, tx)?);
        log::debug!("mbox-user: {}: opened", self.name);
        Ok(())
    }

    /// Close the device, releasing the instance.
    ///
    /// An unread received message is refused back to the remote with a
    /// pipe nack before the channel detaches, so the sender is not left
    /// waiting on a drain that will never come.
    pub fn close(&self) {
        let mut state = self.state.lock();
        if let Some(chan) = state.chan.take() {
            if state.rx_pending {
                state.rx_pending = false;
                if chan.send(SendRequest::Nack(Error::Pipe)).is_err() {
                    log::warn!("mbox-user: {}: nack on close failed", self.name);
                }
            }
            drop(chan);
            log::debug!("mbox-user: {}: closed", self.name);
        }
        drop(state);
        // wake any poller with the closed indication
        self.wq.notify_all();
    }

    /// Write a message to an outgoing device.
    ///
    /// Up to 64 bytes; shorter writes are zero-padded on the wire. Returns
    /// the number of bytes consumed without waiting for the remote ack.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for writes over 64 bytes or on an incoming
    ///   device
    /// - `NoDevice` if closed
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        if self.spec.is_incoming() {
            return Err(Error::InvalidArgument);
        }
        if buf.len() > MSG_SIZE {
            log::error!(
                "mbox-user: {}: message too long: {} > {}",
                self.name,
                buf.len(),
                MSG_SIZE
            );
            return Err(Error::InvalidArgument);
        }

        let mut state = self.state.lock();
        let Some(chan) = state.chan.as_ref() else {
            return Err(Error::NoDevice);
        };

        let mut msg = [0u8; MSG_SIZE];
        msg[..buf.len()].copy_from_slice(buf);

        chan.send(SendRequest::Payload(&msg))?;
        state.send_ack = false;
        state.send_rc = 0;
        // Note: a successful return does not mean the other end received
        // the message
        Ok(buf.len())
    }

    /// Read from the device.
    ///
    /// Incoming: copies the pending payload (up to 64 bytes), then signals
    /// the controller to issue the drain ack, guaranteeing the remote an
    /// empty buffer for its next message. Outgoing: copies the 4-byte
    /// ack/nack status of the last write and disarms it.
    ///
    /// # Errors
    ///
    /// - `TryAgain` if nothing is ready
    /// - `InvalidArgument` if `buf` cannot hold the result
    /// - `NoDevice` if closed
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let mut state = self.state.lock();
        if state.chan.is_none() {
            return Err(Error::NoDevice);
        }

        if self.spec.is_incoming() {
            if !state.rx_pending {
                return Err(Error::TryAgain);
            }
            let n = buf.len().min(MSG_SIZE);
            buf[..n].copy_from_slice(&state.rx_msg[..n]);
            state.rx_pending = false;
            // Userspace has taken the message out of the kernel; let the
            // remote sender proceed.
            if let Some(chan) = state.chan.as_ref() {
                chan.drain_rx_complete();
            }
            Ok(n)
        } else {
            if !state.send_ack {
                return Err(Error::TryAgain);
            }
            if buf.len() < 4 {
                return Err(Error::InvalidArgument);
            }
            buf[..4].copy_from_slice(&state.send_rc.to_le_bytes());
            // Clearing here means the status can only be fetched once
            state.send_ack = false;
            state.send_rc = 0;
            Ok(4)
        }
    }

    /// Current readiness, without waiting.
    #[must_use]
    pub fn poll(&self) -> PollEvents {
        let state = self.state.lock();
        let mut events = PollEvents::NONE;
        if state.chan.is_none() {
            return PollEvents::HUP;
        }
        if state.rx_pending || state.send_ack {
            events |= PollEvents::IN;
        }
        if !state.send_ack {
            events |= PollEvents::OUT;
        }
        events
    }

    /// Wait on the device's wait queue until an interesting event (or the
    /// closed indication) is pending, and return the full event set.
    pub fn poll_wait(&self, interest: PollEvents) -> PollEvents {
        self.wq.wait_until(|| {
            let events = self.poll();
            events
                .intersects(interest | PollEvents::HUP)
                .then_some(events)
        })
    }
}

impl RxClient for MboxDevice {
    fn received(&self, msg: &RawMsg) {
        let mut state = self.state.lock();
        if state.rx_pending {
            // One-message buffer; the remote sent without waiting for the
            // drain ack
            log::error!("mbox-user: {}: rx: dropped message: buffer full", self.name);
        } else {
            state.rx_msg = *msg;
            state.rx_pending = true;
        }
        let wake = state.rx_pending;
        drop(state);
        if wake {
            self.wq.notify_all();
        }
    }
}

impl TxClient for MboxDevice {
    fn tx_done(&self, status: TxStatus) {
        let mut state = self.state.lock();
        state.send_rc = status.code();
        state.send_ack = true;
        drop(state);
        match status {
            TxStatus::Acked => log::debug!("mbox-user: {}: sent: got ACK", self.name),
            TxStatus::Nacked(e) => log::warn!("mbox-user: {}: send: got NACK {}", self.name, e),
        }
        self.wq.notify_all();
    }
}

impl core::fmt::Debug for MboxDevice {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MboxDevice")
            .field("name", &self.name)
            .field("instance", &self.spec.config.instance)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use chiplink_mbox::regs::{EVENT_A, EVENT_B};
    use chiplink_mbox::testing::{pattern_msg, FakeBank};
    use chiplink_mbox::{ChannelConfig, Direction};

    fn spec(instance: usize, direction: Direction) -> ChannelSpec {
        ChannelSpec {
            config: ChannelConfig {
                instance,
                ..ChannelConfig::default()
            },
            direction,
        }
    }

    fn outgoing_device() -> (FakeBank, Arc<MboxDevice>) {
        let fb = FakeBank::new(0, 1);
        let dev = MboxDevice::new(
            String::from("mbox0"),
            spec(0, Direction::Outgoing),
            fb.bank.clone(),
        );
        (fb, dev)
    }

    fn incoming_device() -> (FakeBank, Arc<MboxDevice>) {
        let fb = FakeBank::new(0, 1);
        let dev = MboxDevice::new(
            String::from("mbox1"),
            spec(1, Direction::Incoming),
            fb.bank.clone(),
        );
        (fb, dev)
    }

    #[test]
    fn test_open_exclusive_until_closed() {
        let (_fb, dev) = outgoing_device();
        dev.open(OpenMode::WriteOnly).unwrap();
        assert_eq!(dev.open(OpenMode::WriteOnly).unwrap_err(), Error::Busy);
        dev.close();
        dev.open(OpenMode::ReadWrite).unwrap();
    }

    #[test]
    fn test_open_mode_must_match_direction() {
        let (_fb, dev) = incoming_device();
        assert_eq!(
            dev.open(OpenMode::WriteOnly).unwrap_err(),
            Error::InvalidArgument
        );
        assert_eq!(
            dev.open(OpenMode::ReadWrite).unwrap_err(),
            Error::InvalidArgument
        );
        dev.open(OpenMode::ReadOnly).unwrap();
    }

    #[test]
    fn test_write_bounds() {
        let (_fb, dev) = outgoing_device();
        dev.open(OpenMode::WriteOnly).unwrap();
        let too_long = [0u8; MSG_SIZE + 1];
        assert_eq!(dev.write(&too_long).unwrap_err(), Error::InvalidArgument);
        assert_eq!(dev.write(&[1, 2, 3]).unwrap(), 3);
    }

    #[test]
    fn test_write_pads_to_full_message() {
        let (fb, dev) = outgoing_device();
        dev.open(OpenMode::WriteOnly).unwrap();
        dev.write(&[0xaa, 0xbb]).unwrap();
        let words = fb.data_words(0);
        assert_eq!(words[0], 0x0000_bbaa);
        assert!(words[1..].iter().all(|&w| w == 0));
        assert_eq!(fb.event_set(0), EVENT_A);
    }

    #[test]
    fn test_backpressure_ack_readable_once() {
        let (fb, dev) = outgoing_device();
        dev.open(OpenMode::ReadWrite).unwrap();
        dev.write(&pattern_msg()).unwrap();

        let mut buf = [0u8; 8];
        // ack not in yet
        assert_eq!(dev.read(&mut buf).unwrap_err(), Error::TryAgain);

        fb.remote_ack(0);
        assert_eq!(fb.bank.handle_ack_irq(), 1);

        // 4-byte status, integer zero
        assert_eq!(dev.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], &[0, 0, 0, 0]);
        // armed flag cleared on first read
        assert_eq!(dev.read(&mut buf).unwrap_err(), Error::TryAgain);
    }

    #[test]
    fn test_incoming_read_drains_exactly_once() {
        let (fb, dev) = incoming_device();
        dev.open(OpenMode::ReadOnly).unwrap();

        let msg = pattern_msg();
        fb.remote_deliver(1, &msg);
        assert_eq!(fb.bank.handle_rcv_irq(), 1);

        let mut buf = [0u8; MSG_SIZE];
        assert_eq!(dev.read(&mut buf).unwrap(), MSG_SIZE);
        assert_eq!(buf, msg);
        // drain ack pulsed for the controller
        assert_eq!(fb.event_set(1), EVENT_B);

        assert_eq!(dev.read(&mut buf).unwrap_err(), Error::TryAgain);
    }

    #[test]
    fn test_rx_overflow_keeps_first_message() {
        let (fb, dev) = incoming_device();
        dev.open(OpenMode::ReadOnly).unwrap();

        let first = pattern_msg();
        fb.remote_deliver(1, &first);
        fb.bank.handle_rcv_irq();
        fb.clear_cause(1);

        fb.remote_deliver(1, &[0xffu8; MSG_SIZE]);
        fb.bank.handle_rcv_irq();

        let mut buf = [0u8; MSG_SIZE];
        dev.read(&mut buf).unwrap();
        assert_eq!(buf, first);
    }

    #[test]
    fn test_close_nacks_pending_rx() {
        let (fb, dev) = incoming_device();
        dev.open(OpenMode::ReadOnly).unwrap();

        fb.remote_deliver(1, &pattern_msg());
        fb.bank.handle_rcv_irq();

        dev.close();
        // the unread message was refused towards the remote
        assert_eq!(fb.event_set(1), EVENT_B);

        // instance is free again
        dev.open(OpenMode::ReadOnly).unwrap();
    }

    #[test]
    fn test_poll_reflects_state() {
        let (fb, dev) = incoming_device();
        assert_eq!(dev.poll(), PollEvents::HUP);

        dev.open(OpenMode::ReadOnly).unwrap();
        assert_eq!(dev.poll(), PollEvents::OUT);

        fb.remote_deliver(1, &pattern_msg());
        fb.bank.handle_rcv_irq();
        assert!(dev.poll().contains(PollEvents::IN));
    }

    #[test]
    fn test_poll_wait_wakes_on_delivery() {
        let (fb, dev) = incoming_device();
        dev.open(OpenMode::ReadOnly).unwrap();

        let waiter = {
            let dev = dev.clone();
            std::thread::spawn(move || dev.poll_wait(PollEvents::IN))
        };

        std::thread::sleep(std::time::Duration::from_millis(5));
        fb.remote_deliver(1, &pattern_msg());
        fb.bank.handle_rcv_irq();

        let events = waiter.join().unwrap();
        assert!(events.contains(PollEvents::IN));
    }

    #[test]
    fn test_poll_wait_wakes_on_close() {
        let (_fb, dev) = incoming_device();
        dev.open(OpenMode::ReadOnly).unwrap();

        let waiter = {
            let dev = dev.clone();
            std::thread::spawn(move || dev.poll_wait(PollEvents::IN))
        };

        std::thread::sleep(std::time::Duration::from_millis(5));
        dev.close();
        assert_eq!(waiter.join().unwrap(), PollEvents::HUP);
    }
}
