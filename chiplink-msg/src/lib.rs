//! # chiplink-msg
//!
//! The system-message protocol spoken with the management cluster.
//!
//! Messages are fixed 64-byte envelopes: a one-byte type tag, three
//! reserved bytes, and a 60-byte type-specific payload. This crate provides
//! the envelope type, payload encoders for the message types this cluster
//! originates, the inbound dispatcher, and the retrying send helper layered
//! over the notification bus.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod dispatch;
pub mod envelope;
pub mod messenger;
pub mod payload;

pub use dispatch::Dispatcher;
pub use envelope::{Envelope, MsgType, PAYLOAD_SIZE};
pub use messenger::{Messenger, RetryPolicy};
pub use payload::{LifecycleStatus, LIFECYCLE_INFO_SIZE};
