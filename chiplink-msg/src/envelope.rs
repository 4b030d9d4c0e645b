//! Message envelope.
//!
//! The envelope layout is part of the chiplet-wide protocol; all clusters
//! agree on it. Integers within payloads are little-endian.

use chiplink_common::{Error, RawMsg, MSG_SIZE};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Bytes available for the type-specific payload.
pub const PAYLOAD_SIZE: usize = MSG_SIZE - 4;

/// Message types.
///
/// Value 0 is reserved for NOP so empty messages can be recognized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum MsgType {
    Nop = 0,
    // test messages
    Ping,
    Pong,
    // responses - payload carries the ID of the request being answered
    ReadValue,
    WriteStatus,
    // general operations
    ReadFile,
    WriteFile,
    ReadProp,
    WriteProp,
    ReadAddr,
    WriteAddr,
    // notifications
    WatchdogTimeout,
    Fault,
    Lifecycle,
    // an enumerated/predefined action
    Action,
}

impl MsgType {
    /// Number of defined message types.
    pub const COUNT: usize = 15;

    /// Get the type name for logging.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Nop => "NOP",
            Self::Ping => "PING",
            Self::Pong => "PONG",
            Self::ReadValue => "READ_VALUE",
            Self::WriteStatus => "WRITE_STATUS",
            Self::ReadFile => "READ_FILE",
            Self::WriteFile => "WRITE_FILE",
            Self::ReadProp => "READ_PROP",
            Self::WriteProp => "WRITE_PROP",
            Self::ReadAddr => "READ_ADDR",
            Self::WriteAddr => "WRITE_ADDR",
            Self::WatchdogTimeout => "WATCHDOG_TIMEOUT",
            Self::Fault => "FAULT",
            Self::Lifecycle => "LIFECYCLE",
            Self::Action => "ACTION",
        }
    }
}

impl TryFrom<u8> for MsgType {
    type Error = Error;

    fn try_from(tag: u8) -> Result<Self, Error> {
        Ok(match tag {
            0 => Self::Nop,
            1 => Self::Ping,
            2 => Self::Pong,
            3 => Self::ReadValue,
            4 => Self::WriteStatus,
            5 => Self::ReadFile,
            6 => Self::WriteFile,
            7 => Self::ReadProp,
            8 => Self::WriteProp,
            9 => Self::ReadAddr,
            10 => Self::WriteAddr,
            11 => Self::WatchdogTimeout,
            12 => Self::Fault,
            13 => Self::Lifecycle,
            14 => Self::Action,
            _ => return Err(Error::InvalidArgument),
        })
    }
}

/// A system message: tag byte, three reserved bytes, payload.
///
/// The sender fills the entire 64 bytes; payload bytes not covered by the
/// type-specific encoding are zero.
#[repr(C)]
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct Envelope {
    tag: u8,
    reserved: [u8; 3],
    payload: [u8; PAYLOAD_SIZE],
}

const _: () = assert!(core::mem::size_of::<Envelope>() == MSG_SIZE);

impl Envelope {
    /// Create a zero-filled envelope of the given type.
    #[must_use]
    pub fn new(ty: MsgType) -> Self {
        Self {
            tag: ty as u8,
            reserved: [0; 3],
            payload: [0; PAYLOAD_SIZE],
        }
    }

    /// Raw type tag, which may not name a defined type.
    #[inline]
    #[must_use]
    pub const fn tag(&self) -> u8 {
        self.tag
    }

    /// Decode the type tag.
    pub fn msg_type(&self) -> Result<MsgType, Error> {
        MsgType::try_from(self.tag)
    }

    /// Rewrite the type tag, keeping payload and reserved bytes.
    pub fn set_type(&mut self, ty: MsgType) {
        self.tag = ty as u8;
    }

    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8; PAYLOAD_SIZE] {
        &self.payload
    }

    #[inline]
    pub fn payload_mut(&mut self) -> &mut [u8; PAYLOAD_SIZE] {
        &mut self.payload
    }

    /// View the envelope as the raw bytes a transport carries.
    #[inline]
    #[must_use]
    pub fn as_raw(&self) -> &RawMsg {
        zerocopy::transmute_ref!(self)
    }

    /// View raw transport bytes as an envelope.
    #[inline]
    #[must_use]
    pub fn from_raw(raw: &RawMsg) -> &Self {
        zerocopy::transmute_ref!(raw)
    }
}

impl core::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.msg_type() {
            Ok(t) => write!(f, "Envelope({})", t.name()),
            Err(_) => write!(f, "Envelope(invalid tag {})", self.tag),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_decode() {
        assert_eq!(MsgType::try_from(0).unwrap(), MsgType::Nop);
        assert_eq!(MsgType::try_from(13).unwrap(), MsgType::Lifecycle);
        assert_eq!(MsgType::try_from(14).unwrap(), MsgType::Action);
        assert_eq!(
            MsgType::try_from(MsgType::COUNT as u8).unwrap_err(),
            Error::InvalidArgument
        );
        assert_eq!(MsgType::try_from(0xff).unwrap_err(), Error::InvalidArgument);
    }

    #[test]
    fn test_new_is_zero_filled() {
        let env = Envelope::new(MsgType::Ping);
        assert_eq!(env.tag(), 1);
        assert_eq!(env.reserved, [0; 3]);
        assert!(env.payload().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_raw_views() {
        let mut env = Envelope::new(MsgType::Pong);
        env.payload_mut()[0] = 0xaa;
        let raw = env.as_raw();
        assert_eq!(raw[0], 2);
        assert_eq!(raw[4], 0xaa);

        let view = Envelope::from_raw(raw);
        assert_eq!(view.msg_type().unwrap(), MsgType::Pong);
        assert_eq!(view.payload()[0], 0xaa);
    }

    #[test]
    fn test_set_type_preserves_payload() {
        let mut env = Envelope::new(MsgType::Ping);
        env.payload_mut().copy_from_slice(&[7u8; PAYLOAD_SIZE]);
        env.set_type(MsgType::Pong);
        assert_eq!(env.msg_type().unwrap(), MsgType::Pong);
        assert!(env.payload().iter().all(|&b| b == 7));
    }
}
