//! # chiplink-common
//!
//! Shared types and constants for the chiplink messaging stack.
//!
//! This crate defines the vocabulary the other chiplink crates agree on:
//! - [`Error`](error::Error): the workspace-wide error kinds with stable
//!   numeric codes
//! - [`RawMsg`]: the fixed-size system-message buffer carried by every
//!   transport
//! - [`CancelToken`](cancel::CancelToken): cooperative stop flag for
//!   long-lived tasks
//! - [`DelayUs`](delay::DelayUs): bounded microsecond delay capability
//!
//! # no_std
//!
//! This crate is `#![no_std]` and has zero dependencies, making it suitable
//! as a foundation crate that all other chiplink crates can depend on.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod cancel;
pub mod delay;
pub mod error;

// Re-export commonly used types
pub use cancel::CancelToken;
pub use delay::DelayUs;
pub use error::Error;

/// Size of a system message in bytes.
///
/// Every transport carries messages of exactly this size; it equals the
/// mailbox data window (16 x 32-bit words).
pub const MSG_SIZE: usize = 64;

/// A raw system message as carried on the wire.
///
/// Byte 0 is the type tag, bytes 1-3 are reserved (zero), bytes 4-63 are
/// the type-specific payload. The `chiplink-msg` crate layers structure on
/// top of this; transports treat it as opaque.
pub type RawMsg = [u8; MSG_SIZE];
