//! # chiplink-map
//!
//! Chiplet-wide allocation of mailbox resources.
//!
//! Every cluster's software carries a copy of these tables; they must stay
//! in sync across code bases. The allocations are outside the scope of the
//! mailbox driver itself and are referenced only from top-level bring-up
//! code, which turns them into per-client channel configurations.
//!
//! Interrupt indexes are indexes within one IP block (not global IRQ
//! numbers); each index is dedicated to one cluster. Allocations may
//! overlap for clusters that cannot run concurrently (the realtime cluster
//! pairing modes share indexes).

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

use chiplink_mbox::{ChannelConfig, ChannelSpec, Direction};

/// Processor clusters on the chiplet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cluster {
    /// Trust/management cluster (runs the chiplet manager).
    Management,
    /// Realtime cluster, cores paired in lockstep.
    RealtimeLockstep,
    /// Realtime cluster, split mode, core 0.
    RealtimeSplit0,
    /// Realtime cluster, split mode, core 1.
    RealtimeSplit1,
    /// Realtime cluster, SMP mode.
    RealtimeSmp,
    /// High-performance cluster (runs this stack).
    HighPerf,
}

impl Cluster {
    /// Identifier used in the mailbox CONFIG owner/src/dst fields.
    /// Zero is reserved for "unset".
    #[must_use]
    pub const fn id(self) -> u8 {
        match self {
            Self::Management => 1,
            Self::RealtimeLockstep => 2,
            Self::RealtimeSplit0 => 3,
            Self::RealtimeSplit1 => 4,
            Self::RealtimeSmp => 5,
            Self::HighPerf => 6,
        }
    }
}

/// The interrupt-index pair a cluster drives on one mailbox block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IrqAlloc {
    pub rcv_int_idx: u32,
    pub ack_int_idx: u32,
}

// -- Low-speed I/O block (shared with the realtime clusters)

pub const LSIO_MBOX0_IRQ_MANAGEMENT: IrqAlloc = IrqAlloc {
    rcv_int_idx: 0,
    ack_int_idx: 1,
};
pub const LSIO_MBOX0_IRQ_REALTIME: IrqAlloc = IrqAlloc {
    rcv_int_idx: 2,
    ack_int_idx: 3,
};
pub const LSIO_MBOX0_IRQ_REALTIME_SPLIT_1: IrqAlloc = IrqAlloc {
    rcv_int_idx: 4,
    ack_int_idx: 5,
};
pub const LSIO_MBOX0_IRQ_SECURE_FW: IrqAlloc = IrqAlloc {
    rcv_int_idx: 6,
    ack_int_idx: 7,
};

/// Loopback self-test instance for the realtime system software.
pub const LSIO_MBOX0_CHAN_REALTIME_LOOPBACK: usize = 31;

// -- High-performance block 0 (management link)

pub const HP_MBOX0_IRQ_MANAGEMENT: IrqAlloc = IrqAlloc {
    rcv_int_idx: 0,
    ack_int_idx: 1,
};
pub const HP_MBOX0_IRQ_HIGHPERF: IrqAlloc = IrqAlloc {
    rcv_int_idx: 2,
    ack_int_idx: 3,
};

/// Userspace <-> management: outgoing, incoming.
pub const HP_MBOX0_CHAN_USER_OUT: usize = 0;
pub const HP_MBOX0_CHAN_USER_IN: usize = 1;

/// Management-owned test pair claimed by this cluster: incoming, outgoing.
pub const HP_MBOX0_CHAN_OWN_TEST_IN: usize = 2;
pub const HP_MBOX0_CHAN_OWN_TEST_OUT: usize = 3;

/// Secure firmware <-> management.
pub const HP_MBOX0_CHAN_SECURE_FW_OUT: usize = 28;
pub const HP_MBOX0_CHAN_SECURE_FW_IN: usize = 29;

/// System software <-> management: outgoing, incoming.
pub const HP_MBOX0_CHAN_SYSTEM_OUT: usize = 30;
pub const HP_MBOX0_CHAN_SYSTEM_IN: usize = 31;

/// Compose the config for one direction of a management link.
const fn management_chan(instance: usize, direction: Direction, owner: u8) -> ChannelSpec {
    let (src, dst) = match direction {
        Direction::Outgoing => (Cluster::HighPerf.id(), Cluster::Management.id()),
        Direction::Incoming => (Cluster::Management.id(), Cluster::HighPerf.id()),
    };
    ChannelSpec {
        config: ChannelConfig {
            instance,
            owner,
            src,
            dst,
        },
        direction,
    }
}

/// Channel pair for the in-kernel transport of the high-performance
/// cluster, ordered {outgoing, incoming} as the transport requires.
///
/// The management cluster owns these instances; we only verify routing.
#[must_use]
pub const fn highperf_system_link() -> [ChannelSpec; 2] {
    [
        management_chan(HP_MBOX0_CHAN_SYSTEM_OUT, Direction::Outgoing, 0),
        management_chan(HP_MBOX0_CHAN_SYSTEM_IN, Direction::Incoming, 0),
    ]
}

/// Channel pair exposed to unprivileged user processes, ordered
/// {outgoing, incoming}.
#[must_use]
pub const fn highperf_user_link() -> [ChannelSpec; 2] {
    [
        management_chan(HP_MBOX0_CHAN_USER_OUT, Direction::Outgoing, 0),
        management_chan(HP_MBOX0_CHAN_USER_IN, Direction::Incoming, 0),
    ]
}

/// Test pair owned (claimed) by this cluster rather than the manager,
/// ordered {outgoing, incoming}.
#[must_use]
pub const fn highperf_owned_test_link() -> [ChannelSpec; 2] {
    let owner = Cluster::HighPerf.id();
    [
        management_chan(HP_MBOX0_CHAN_OWN_TEST_OUT, Direction::Outgoing, owner),
        management_chan(HP_MBOX0_CHAN_OWN_TEST_IN, Direction::Incoming, owner),
    ]
}
