//! Test fixtures: a mailbox bank backed by plain memory.
//!
//! The driver only ever issues 32-bit volatile accesses, so a heap buffer
//! stands in for the register window. The fixture plays the remote side by
//! poking cause bits and the data window directly. Plain memory has no
//! write-1-to-clear behaviour; tests that fire the same event twice must
//! reset the cause word in between via [`FakeBank::clear_cause`].

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec;

use chiplink_common::{RawMsg, MSG_SIZE};
use chiplink_mmio::MmioRegion;

use crate::bank::Mbox;
use crate::config::BankConfig;
use crate::regs::{
    CONFIG_DEST_SHIFT, CONFIG_OWNER_SHIFT, CONFIG_SRC_SHIFT, DATA_REGS, EVENT_A, EVENT_B,
    INSTANCES, INSTANCE_STRIDE, REG_CONFIG, REG_DATA, REG_EVENT_CAUSE, REG_EVENT_SET,
    REG_EVENT_STATUS, REG_INT_ENABLE,
};

/// A bank over fake registers, plus a test-side view of the same memory.
pub struct FakeBank {
    // Keeps the backing memory alive; the bank holds raw addresses into it.
    _mem: Box<[u32]>,
    regs: MmioRegion,
    pub bank: Arc<Mbox>,
}

impl FakeBank {
    /// Create a bank with the given receive/ack interrupt indexes.
    #[must_use]
    pub fn new(rcv_int_idx: u32, ack_int_idx: u32) -> Self {
        let words = INSTANCES * INSTANCE_STRIDE / 4;
        let mem = vec![0u32; words].into_boxed_slice();
        let base = mem.as_ptr() as usize;
        // SAFETY: The boxed slice is valid for the fixture's lifetime and
        // volatile 32-bit accesses to ordinary memory are well-defined
        let regs = unsafe { MmioRegion::new(base, INSTANCES * INSTANCE_STRIDE) };
        let bank = Arc::new(unsafe {
            Mbox::new(&BankConfig {
                base,
                rcv_int_idx,
                ack_int_idx,
            })
        });
        Self {
            _mem: mem,
            regs,
            bank,
        }
    }

    fn inst(&self, instance: usize) -> MmioRegion {
        self.regs
            .subregion(instance * INSTANCE_STRIDE, INSTANCE_STRIDE)
    }

    /// Read an instance's INT-ENABLE routing word.
    #[must_use]
    pub fn int_enable(&self, instance: usize) -> u32 {
        self.inst(instance).read32(REG_INT_ENABLE)
    }

    /// Overwrite an instance's INT-ENABLE routing word.
    pub fn set_int_enable(&self, instance: usize, value: u32) {
        self.inst(instance).write32(REG_INT_ENABLE, value);
    }

    /// Read an instance's CONFIG word.
    #[must_use]
    pub fn config(&self, instance: usize) -> u32 {
        self.inst(instance).read32(REG_CONFIG)
    }

    /// Store an owner/src/dst configuration, as another entity would have.
    pub fn set_config(&self, instance: usize, owner: u8, src: u8, dst: u8) {
        let word = ((owner as u32) << CONFIG_OWNER_SHIFT)
            | ((src as u32) << CONFIG_SRC_SHIFT)
            | ((dst as u32) << CONFIG_DEST_SHIFT);
        self.inst(instance).write32(REG_CONFIG, word);
    }

    /// Last value written to the EVENT-SET register (what the driver pulsed
    /// towards the remote).
    #[must_use]
    pub fn event_set(&self, instance: usize) -> u32 {
        self.inst(instance).read32(REG_EVENT_SET)
    }

    /// Read back the data window.
    #[must_use]
    pub fn data_words(&self, instance: usize) -> [u32; DATA_REGS] {
        let mut words = [0u32; DATA_REGS];
        self.inst(instance).copy_from_words(REG_DATA, &mut words);
        words
    }

    /// Play the remote: place a message in the data window and raise
    /// event A.
    pub fn remote_deliver(&self, instance: usize, msg: &RawMsg) {
        let inst = self.inst(instance);
        let words: [u32; DATA_REGS] = core::array::from_fn(|i| {
            u32::from_le_bytes([msg[i * 4], msg[i * 4 + 1], msg[i * 4 + 2], msg[i * 4 + 3]])
        });
        inst.copy_to_words(REG_DATA, &words);
        inst.set_bits32(REG_EVENT_CAUSE, EVENT_A);
    }

    /// Play the remote: acknowledge the in-flight message (raise event B).
    pub fn remote_ack(&self, instance: usize) {
        self.inst(instance).set_bits32(REG_EVENT_CAUSE, EVENT_B);
    }

    /// Reset an instance's cause word (fake registers are not
    /// write-1-to-clear).
    pub fn clear_cause(&self, instance: usize) {
        self.inst(instance).write32(REG_EVENT_CAUSE, 0);
    }

    /// Raise bits in an instance's raw event status word.
    pub fn raise_status(&self, instance: usize, bits: u32) {
        self.inst(instance).set_bits32(REG_EVENT_STATUS, bits);
    }
}

/// A recognisable non-trivial message: bytes 0, 1, 2, ... 63.
#[must_use]
pub fn pattern_msg() -> RawMsg {
    let mut msg = [0u8; MSG_SIZE];
    for (i, b) in msg.iter_mut().enumerate() {
        *b = i as u8;
    }
    msg
}
