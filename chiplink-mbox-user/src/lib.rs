//! # chiplink-mbox-user
//!
//! Character-style mailbox endpoints for unprivileged user processes.
//!
//! Each mailbox instance handed to this crate becomes one device with
//! `open`/`close`/`read`/`write`/`poll` semantics and a single-message
//! buffer per direction: an incoming device holds at most one undelivered
//! payload, an outgoing device holds at most one unread ack status. The
//! platform's file layer maps file operations onto these calls; everything
//! stateful lives here.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod device;
pub mod poll;
pub mod registry;
pub mod waitq;

pub use device::{MboxDevice, OpenMode};
pub use poll::PollEvents;
pub use registry::{DeviceClass, UserBank};
pub use waitq::WaitQueue;
