//! Client-facing channel contract.
//!
//! A client hands its capabilities to the bank when opening a channel; the
//! bank holds only these capabilities, never a pointer back into the client.
//! Detaching a client replaces the capability slots with the empty state,
//! after which event deliveries fall back to the nack path.

use chiplink_common::{Error, RawMsg};

/// Outcome of a transmission, delivered with the tx-done up-call.
///
/// The hardware has a single "acknowledged" event; the distinction between
/// ack and nack is carried by the transport layer, not by the event itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxStatus {
    /// The remote consumed the message.
    Acked,
    /// The remote refused the message.
    Nacked(Error),
}

impl TxStatus {
    /// Numeric status code: 0 for ack, the error code for nack.
    #[inline]
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Acked => 0,
            Self::Nacked(e) => e.code(),
        }
    }
}

/// What to put on the wire: a message, or a refusal of the last one
/// received.
#[derive(Clone, Copy, Debug)]
pub enum SendRequest<'a> {
    /// Write the payload to the data window and raise event A.
    Payload(&'a RawMsg),
    /// Raise event B towards the remote sender, refusing its message for
    /// the recorded reason.
    Nack(Error),
}

/// Receive capability. Implemented by clients that consume messages.
///
/// `received` runs in interrupt context: no blocking, no long work. The
/// buffer is a word-stride copy out of the data window, valid only for the
/// duration of the call.
pub trait RxClient: Send + Sync {
    fn received(&self, msg: &RawMsg);
}

/// Transmit-completion capability. Implemented by clients that send.
///
/// `tx_done` runs in interrupt context. Exactly one up-call follows each
/// accepted send.
pub trait TxClient: Send + Sync {
    fn tx_done(&self, status: TxStatus);
}
