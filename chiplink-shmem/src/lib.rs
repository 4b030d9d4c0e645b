//! # chiplink-shmem
//!
//! Shared-memory transport for system messages.
//!
//! Two reserved physical regions per transport instance, one per
//! direction, each carrying a single message slot and a status word. The
//! writer publishes a message by setting NEW; the reader consumes it,
//! clears NEW, and sets ACK. Both clusters must understand this layout.
//!
//! There is no doorbell: the receive path is a long-lived poll task that
//! wakes on a configured interval and checks the inbound region. The task
//! is cancellable through a cooperative stop token.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod region;
#[cfg(any(test, feature = "fixtures"))]
pub mod testing;
pub mod transport;

pub use region::{ShmemRegion, REGION_SIZE, STATUS_ACK, STATUS_NEW};
pub use transport::ShmemTransport;
