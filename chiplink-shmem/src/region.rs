//! Shared-memory region protocol.
//!
//! Layout: a 64-byte message slot followed by a 32-bit status word. The
//! directions are asymmetric: the writer only ever sets NEW, the reader
//! clears NEW and sets ACK. The regions live on a weakly-ordered
//! interconnect, so flag updates are fenced against the payload accesses
//! they guard.

use chiplink_common::{RawMsg, MSG_SIZE};
use chiplink_mmio::barrier::{read_barrier, write_barrier};
use chiplink_mmio::MmioRegion;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// A message is waiting in the slot.
pub const STATUS_NEW: u32 = 0x1;
/// The last message in the slot was consumed.
pub const STATUS_ACK: u32 = 0x2;

/// On-wire layout of one region. All clusters agree on this.
#[repr(C)]
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct RegionLayout {
    pub data: [u8; MSG_SIZE],
    pub status: u32,
}

/// Minimum size of a reserved region.
pub const REGION_SIZE: usize = core::mem::size_of::<RegionLayout>();

const REG_DATA: usize = 0;
const REG_STATUS: usize = MSG_SIZE;

/// One mapped region, accessed with volatile word operations.
pub struct ShmemRegion {
    regs: MmioRegion,
}

impl ShmemRegion {
    /// Wrap a mapped region.
    ///
    /// # Safety
    ///
    /// `base` must point to at least [`REGION_SIZE`] bytes of mapped,
    /// 4-byte-aligned memory shared with the remote cluster.
    #[must_use]
    pub const unsafe fn new(base: usize) -> Self {
        Self {
            // SAFETY: Caller guarantees the mapping
            regs: unsafe { MmioRegion::new(base, REGION_SIZE) },
        }
    }

    /// Whether an unconsumed message is in the slot.
    #[inline]
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.regs.read32(REG_STATUS) & STATUS_NEW != 0
    }

    /// Publish a message: fill the slot, then raise NEW.
    ///
    /// The caller must have checked [`is_new`](Self::is_new) first; writing
    /// over an unconsumed message loses it.
    pub fn publish(&self, msg: &RawMsg) {
        let words: [u32; MSG_SIZE / 4] = core::array::from_fn(|i| {
            u32::from_le_bytes([msg[i * 4], msg[i * 4 + 1], msg[i * 4 + 2], msg[i * 4 + 3]])
        });
        self.regs.copy_to_words(REG_DATA, &words);
        // Payload must be globally visible before the flag
        write_barrier();
        self.regs.set_bits32(REG_STATUS, STATUS_NEW);
    }

    /// Copy the message out of the slot.
    #[must_use]
    pub fn read_msg(&self) -> RawMsg {
        // Flag observed before the payload reads
        read_barrier();
        let mut words = [0u32; MSG_SIZE / 4];
        self.regs.copy_from_words(REG_DATA, &mut words);
        let mut msg = [0u8; MSG_SIZE];
        for (i, word) in words.iter().enumerate() {
            msg[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
        }
        msg
    }

    /// Consume the current message: clear NEW, set ACK.
    pub fn complete_rx(&self) {
        write_barrier();
        self.regs
            .modify32(REG_STATUS, |s| (s & !STATUS_NEW) | STATUS_ACK);
    }

    /// Raw status word (for diagnostics).
    #[inline]
    #[must_use]
    pub fn status(&self) -> u32 {
        self.regs.read32(REG_STATUS)
    }
}
