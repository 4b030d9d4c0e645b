//! Inbound message dispatch.
//!
//! Inbound envelopes are routed to a per-type handler through a table
//! indexed by the tag. The table covers every defined type; an undefined
//! tag is rejected before indexing, so a hole can only be a build-time
//! mistake and the array length pins the table to the type count.
//!
//! Handlers run in the context the transport delivered the message in
//! (interrupt or poll task): they must not block. Handlers may send
//! replies synchronously; the bus guarantees no lock is held around this
//! call.

use alloc::sync::Arc;

use chiplink_common::error::Result;
use chiplink_common::{Error, RawMsg};
use chiplink_notif::RecvSink;

use crate::envelope::{Envelope, MsgType};
use crate::messenger::Messenger;

type Handler = fn(&Dispatcher, &Envelope) -> Result<()>;

/// Per-type handlers, indexed by tag.
const HANDLERS: [Handler; MsgType::COUNT] = [
    Dispatcher::handle_nop,  // NOP
    Dispatcher::handle_ping, // PING
    Dispatcher::handle_pong, // PONG
    Dispatcher::handle_drop, // READ_VALUE
    Dispatcher::handle_drop, // WRITE_STATUS
    Dispatcher::handle_drop, // READ_FILE
    Dispatcher::handle_drop, // WRITE_FILE
    Dispatcher::handle_drop, // READ_PROP
    Dispatcher::handle_drop, // WRITE_PROP
    Dispatcher::handle_drop, // READ_ADDR
    Dispatcher::handle_drop, // WRITE_ADDR
    Dispatcher::handle_drop, // WATCHDOG_TIMEOUT
    Dispatcher::handle_drop, // FAULT
    Dispatcher::handle_drop, // LIFECYCLE
    Dispatcher::handle_drop, // ACTION
];

/// Routes inbound system messages to their handlers.
///
/// Installed as the notification bus's receive sink at bring-up.
pub struct Dispatcher {
    messenger: Arc<Messenger>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(messenger: Arc<Messenger>) -> Self {
        Self { messenger }
    }

    /// Validate and dispatch one inbound message.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an undefined type tag; otherwise whatever the
    /// type handler returns.
    pub fn process(&self, msg: &RawMsg) -> Result<()> {
        let env = Envelope::from_raw(msg);
        let tag = env.tag() as usize;
        if tag >= MsgType::COUNT {
            log::error!("msg: invalid message type: {}", tag);
            return Err(Error::InvalidArgument);
        }
        HANDLERS[tag](self, env)
    }

    fn handle_nop(&self, _env: &Envelope) -> Result<()> {
        log::info!("msg: received NOP");
        Ok(())
    }

    /// Reply with a PONG echoing the entire envelope past the tag.
    fn handle_ping(&self, env: &Envelope) -> Result<()> {
        log::info!("msg: received PING, replying with PONG");
        let mut reply = *env;
        reply.set_type(MsgType::Pong);
        self.messenger.send(&reply)
    }

    fn handle_pong(&self, _env: &Envelope) -> Result<()> {
        log::info!("msg: received PONG");
        Ok(())
    }

    /// Reserved for future extension: log and drop.
    fn handle_drop(&self, env: &Envelope) -> Result<()> {
        log::warn!(
            "msg: unsupported/unimplemented type: {}",
            env.tag()
        );
        dump_payload(env);
        Ok(())
    }
}

impl RecvSink for Dispatcher {
    fn recv(&self, msg: &RawMsg) -> Result<()> {
        log::debug!("msg: receive");
        self.process(msg)
    }
}

/// Log an envelope's bytes, 16 per line.
fn dump_payload(env: &Envelope) {
    for (i, chunk) in env.as_raw().chunks(16).enumerate() {
        log::warn!("msg:   {:#06x}: {:02x?}", i * 16, chunk);
    }
}
