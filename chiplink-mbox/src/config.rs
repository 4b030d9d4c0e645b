//! Bank and channel configuration.
//!
//! Parsing these out of a platform description (device tree or equivalent)
//! is the integrator's job; this crate consumes the parsed values.

/// Configuration of one mailbox bank.
#[derive(Clone, Copy, Debug)]
pub struct BankConfig {
    /// Physical base of the bank's MMIO window.
    pub base: usize,
    /// Interrupt index within the block carrying receive (event A) IRQs.
    pub rcv_int_idx: u32,
    /// Interrupt index within the block carrying ack (event B) IRQs.
    pub ack_int_idx: u32,
}

/// Per-client configuration of one mailbox instance.
///
/// `owner == 0` means the client does not claim ownership. `src`/`dst` are
/// only sanity-checked against the hardware when non-zero; the peripheral
/// does not enforce them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Instance index within the bank, 0..31.
    pub instance: usize,
    pub owner: u8,
    pub src: u8,
    pub dst: u8,
}

/// Message flow direction, as used by a client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum Direction {
    Outgoing = 0,
    Incoming = 1,
}

/// A channel reference as handed to transport clients: the instance
/// configuration plus the direction cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelSpec {
    pub config: ChannelConfig,
    pub direction: Direction,
}

impl ChannelSpec {
    #[inline]
    #[must_use]
    pub const fn is_incoming(&self) -> bool {
        matches!(self.direction, Direction::Incoming)
    }
}
