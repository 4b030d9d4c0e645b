//! # chiplink-mbox
//!
//! Driver for the cluster mailbox IP block and the channel abstraction
//! layered on top of it.
//!
//! One mailbox bank hosts 32 instances in a contiguous MMIO window, sharing
//! two interrupt lines. Each instance carries one 64-byte message at a time
//! per direction: event A signals "message delivered", event B signals
//! "delivery acknowledged". The block does not report which instance raised
//! an interrupt, so both ISRs scan the bank.
//!
//! Clients do not touch registers. They open a [`Channel`](channel::Channel)
//! on an instance, injecting the capabilities they implement
//! ([`RxClient`](client::RxClient) and/or [`TxClient`](client::TxClient)),
//! and the bank routes the matching event interrupts to them. Word-stride
//! copies between the data window and client buffers are performed by this
//! crate; clients never see the MMIO layout.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod bank;
pub mod channel;
pub mod client;
pub mod config;
pub mod regs;
#[cfg(any(test, feature = "fixtures"))]
pub mod testing;

pub use bank::Mbox;
pub use channel::Channel;
pub use client::{RxClient, SendRequest, TxClient, TxStatus};
pub use config::{BankConfig, ChannelConfig, ChannelSpec, Direction};
