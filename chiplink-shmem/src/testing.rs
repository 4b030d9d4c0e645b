//! Test fixtures: shared-memory regions backed by heap allocations.

use alloc::boxed::Box;
use alloc::vec;

use chiplink_common::RawMsg;

use crate::region::{ShmemRegion, REGION_SIZE};

/// Word-aligned backing for one region.
pub struct FakeRegion {
    mem: Box<[u32]>,
}

impl FakeRegion {
    #[must_use]
    pub fn new() -> Self {
        Self {
            mem: vec![0u32; REGION_SIZE.div_ceil(4)].into_boxed_slice(),
        }
    }

    /// A driver-side view of the region.
    #[must_use]
    pub fn region(&self) -> ShmemRegion {
        // SAFETY: The boxed slice outlives the fixture and is word-aligned
        unsafe { ShmemRegion::new(self.mem.as_ptr() as usize) }
    }
}

impl Default for FakeRegion {
    fn default() -> Self {
        Self::new()
    }
}

/// An in/out region pair as a transport instance sees it.
pub struct FakeRegionPair {
    out: FakeRegion,
    inbound: FakeRegion,
}

impl FakeRegionPair {
    #[must_use]
    pub fn new() -> Self {
        Self {
            out: FakeRegion::new(),
            inbound: FakeRegion::new(),
        }
    }

    /// Driver-side view of the out region.
    #[must_use]
    pub fn out_region(&self) -> ShmemRegion {
        self.out.region()
    }

    /// Driver-side view of the in region.
    #[must_use]
    pub fn in_region(&self) -> ShmemRegion {
        self.inbound.region()
    }

    /// Play the remote: publish into the driver's inbound region.
    pub fn remote_publish(&self, msg: &RawMsg) {
        self.inbound.region().publish(msg);
    }

    /// Play the remote: consume whatever the driver published outbound.
    pub fn remote_consume(&self) -> RawMsg {
        let region = self.out.region();
        let msg = region.read_msg();
        region.complete_rx();
        msg
    }
}

impl Default for FakeRegionPair {
    fn default() -> Self {
        Self::new()
    }
}
