//! The monitor proper.

use core::fmt::Write;
use core::sync::atomic::{AtomicBool, Ordering};

use alloc::sync::Arc;

use chiplink_common::error::Result;
use chiplink_msg::{LifecycleStatus, Messenger};

use crate::fmtbuf::InfoBuf;
use crate::notifier::{Notify, NotifyOutcome, NotifierChain};

/// A fatal exception (oops) event.
pub struct DieEvent {
    pub action: u64,
    pub desc: InfoBuf,
    pub err: i64,
    pub trap: u32,
    pub signal: u32,
}

/// A kernel panic; the info is the panic string.
pub struct PanicEvent {
    pub info: InfoBuf,
}

/// An orderly shutdown or restart.
pub struct ShutdownEvent {
    pub action: u64,
}

/// A watchdog soft expiry on one CPU.
pub struct PretimeoutEvent {
    pub cpu: u32,
}

/// The cluster's fault-notification chains.
///
/// Owned by bring-up and shared with the platform glue that feeds events
/// into them (exception vectors, the panic handler, the watchdog driver).
#[derive(Default)]
pub struct FaultChains {
    pub die: NotifierChain<DieEvent>,
    pub panic: NotifierChain<PanicEvent>,
    /// Shutdown and restart share one chain.
    pub shutdown: NotifierChain<ShutdownEvent>,
    pub pretimeout: NotifierChain<PretimeoutEvent>,
}

impl FaultChains {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            die: NotifierChain::new(),
            panic: NotifierChain::new(),
            shutdown: NotifierChain::new(),
            pretimeout: NotifierChain::new(),
        }
    }
}

/// Initiator of the last-resort orderly poweroff.
pub trait PowerControl: Send + Sync {
    fn orderly_poweroff(&self);
}

/// Translates local fault events into system messages.
///
/// Note: Both the die and panic listeners may run for one crash; the
/// management side tolerates a duplicate DOWN.
pub struct Monitor {
    messenger: Arc<Messenger>,
    power: Arc<dyn PowerControl>,
    poweroff_started: AtomicBool,
}

impl Monitor {
    #[must_use]
    pub fn new(messenger: Arc<Messenger>, power: Arc<dyn PowerControl>) -> Arc<Self> {
        Arc::new(Self {
            messenger,
            power,
            poweroff_started: AtomicBool::new(false),
        })
    }

    /// Hook every chain, then announce the cluster as up.
    ///
    /// The UP message goes out only after all listeners are in place, so
    /// no fault window opens between "announced alive" and "watched".
    pub fn install(self: &Arc<Self>, chains: &FaultChains) -> Result<()> {
        log::info!("monitor: init");
        let die: Arc<dyn Notify<DieEvent>> = self.clone();
        chains.die.register(0, &die);
        let panic: Arc<dyn Notify<PanicEvent>> = self.clone();
        chains.panic.register(0, &panic);
        let shutdown: Arc<dyn Notify<ShutdownEvent>> = self.clone();
        chains.shutdown.register(0, &shutdown);
        let pretimeout: Arc<dyn Notify<PretimeoutEvent>> = self.clone();
        chains.pretimeout.register(0, &pretimeout);

        self.messenger.lifecycle(LifecycleStatus::Up, b"")
    }

    fn report_down(&self, info: &InfoBuf) -> NotifyOutcome {
        match self
            .messenger
            .lifecycle(LifecycleStatus::Down, info.as_bytes())
        {
            Ok(()) => NotifyOutcome::Ok,
            Err(e) => {
                log::error!("monitor: lifecycle down failed: {}", e);
                NotifyOutcome::Bad
            }
        }
    }
}

impl Notify<DieEvent> for Monitor {
    fn notify(&self, event: &DieEvent) -> NotifyOutcome {
        let mut info = InfoBuf::new();
        let _ = write!(
            info,
            "{}|{}|{}|{}|{}",
            event.action,
            event.desc.as_str(),
            event.err,
            event.trap,
            event.signal
        );
        self.report_down(&info)
    }
}

impl Notify<PanicEvent> for Monitor {
    fn notify(&self, event: &PanicEvent) -> NotifyOutcome {
        self.report_down(&event.info)
    }
}

impl Notify<ShutdownEvent> for Monitor {
    fn notify(&self, event: &ShutdownEvent) -> NotifyOutcome {
        let mut info = InfoBuf::new();
        let _ = write!(info, "{}", event.action);
        self.report_down(&info)
    }
}

impl Notify<PretimeoutEvent> for Monitor {
    /// Death rattle: report the timed-out CPU, then power down before the
    /// hard reset can hit.
    fn notify(&self, event: &PretimeoutEvent) -> NotifyOutcome {
        if let Err(e) = self.messenger.watchdog_timeout(event.cpu) {
            log::error!("monitor: watchdog timeout report failed: {}", e);
        }
        if self.poweroff_started.swap(true, Ordering::SeqCst) {
            log::warn!("monitor: pretimeout on cpu {}: poweroff already in progress", event.cpu);
        } else {
            log::error!("monitor: pretimeout on cpu {}: initiating poweroff", event.cpu);
            self.power.orderly_poweroff();
        }
        NotifyOutcome::Ok
    }
}
