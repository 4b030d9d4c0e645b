//! Payload encoders and decoders for the message types this cluster
//! originates or inspects.

use chiplink_common::Error;

use crate::envelope::{Envelope, MsgType, PAYLOAD_SIZE};

/// Bytes available for lifecycle info text after the status word.
pub const LIFECYCLE_INFO_SIZE: usize = PAYLOAD_SIZE - 4;

/// Lifecycle states reported to the management cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum LifecycleStatus {
    Up = 0,
    Down = 1,
}

/// Compose a LIFECYCLE message.
///
/// `info` is free-form context for the operator on the management side;
/// anything past [`LIFECYCLE_INFO_SIZE`] bytes is silently truncated.
#[must_use]
pub fn lifecycle(status: LifecycleStatus, info: &[u8]) -> Envelope {
    let mut env = Envelope::new(MsgType::Lifecycle);
    let payload = env.payload_mut();
    payload[..4].copy_from_slice(&(status as u32).to_le_bytes());
    let n = info.len().min(LIFECYCLE_INFO_SIZE);
    payload[4..4 + n].copy_from_slice(&info[..n]);
    env
}

/// Decode a LIFECYCLE payload into (status, info).
///
/// The info text runs to the first nul byte, or the end of the payload.
pub fn decode_lifecycle(env: &Envelope) -> Result<(LifecycleStatus, &[u8]), Error> {
    if env.msg_type()? != MsgType::Lifecycle {
        return Err(Error::InvalidArgument);
    }
    let payload = env.payload();
    let status = match u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]) {
        0 => LifecycleStatus::Up,
        1 => LifecycleStatus::Down,
        _ => return Err(Error::InvalidArgument),
    };
    let info = &payload[4..];
    let end = info.iter().position(|&b| b == 0).unwrap_or(info.len());
    Ok((status, &info[..end]))
}

/// Compose a WATCHDOG_TIMEOUT message; the payload is the ID of the CPU
/// whose watchdog soft-expired.
#[must_use]
pub fn watchdog_timeout(cpu: u32) -> Envelope {
    let mut env = Envelope::new(MsgType::WatchdogTimeout);
    env.payload_mut()[..4].copy_from_slice(&cpu.to_le_bytes());
    env
}

/// Decode the CPU ID from a WATCHDOG_TIMEOUT payload.
pub fn decode_watchdog_timeout(env: &Envelope) -> Result<u32, Error> {
    if env.msg_type()? != MsgType::WatchdogTimeout {
        return Err(Error::InvalidArgument);
    }
    let p = env.payload();
    Ok(u32::from_le_bytes([p[0], p[1], p[2], p[3]]))
}

/// Compose a PING message; the payload is a caller-chosen identifier echoed
/// back in the PONG.
#[must_use]
pub fn ping(id: u32) -> Envelope {
    let mut env = Envelope::new(MsgType::Ping);
    env.payload_mut()[..4].copy_from_slice(&id.to_le_bytes());
    env
}
