//! Memory Barrier Helpers
//!
//! Provides memory barrier operations for the shared-memory message
//! regions, which are written by one cluster and read by another over a
//! weakly-ordered interconnect.
//!
//! # Usage Patterns
//!
//! ## Sender (writes payload, then flags it)
//!
//! ```ignore
//! region.copy_to_words(0, &payload);
//! write_barrier();              // Payload visible before the flag
//! region.write32(STATUS, NEW);
//! ```
//!
//! ## Receiver (sees flag, then reads payload)
//!
//! ```ignore
//! if region.read32(STATUS) & NEW != 0 {
//!     read_barrier();           // Flag observed before payload reads
//!     region.copy_from_words(0, &mut payload);
//! }
//! ```

use core::sync::atomic::{fence, Ordering};

/// Read barrier (acquire semantics).
///
/// Ensures all loads before this barrier complete before any loads after.
/// Use after observing a status flag and before reading the data it guards.
#[inline]
pub fn read_barrier() {
    fence(Ordering::Acquire);
}

/// Write barrier (release semantics).
///
/// Ensures all stores before this barrier complete before any stores after.
/// Use after writing data and before publishing the flag that guards it.
#[inline]
pub fn write_barrier() {
    fence(Ordering::Release);
}

/// Full memory barrier.
///
/// Ensures all memory operations before this barrier complete before any
/// operations after. Use when both loads and stores must be ordered.
#[inline]
pub fn full_barrier() {
    fence(Ordering::SeqCst);
}
