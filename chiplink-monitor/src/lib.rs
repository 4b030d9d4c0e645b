//! # chiplink-monitor
//!
//! Liveness and lifecycle monitoring.
//!
//! The monitor listens on four fault-notification chains (die/oops, panic,
//! shutdown/restart, watchdog pretimeout) and translates each event into a
//! system message for the management cluster, so a remote observer can
//! detect this cluster's death even when the cluster itself cannot say
//! much. A watchdog pretimeout additionally initiates an orderly poweroff,
//! once.
//!
//! On install, after all chains are hooked, a LIFECYCLE(UP) announces the
//! cluster.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod fmtbuf;
pub mod monitor;
pub mod notifier;

pub use fmtbuf::InfoBuf;
pub use monitor::{
    DieEvent, FaultChains, Monitor, PanicEvent, PowerControl, PretimeoutEvent, ShutdownEvent,
};
pub use notifier::{Notify, NotifyOutcome, NotifierChain};
