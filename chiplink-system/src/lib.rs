//! # chiplink-system
//!
//! Bring-up wiring for the messaging stack.
//!
//! The components are order-sensitive:
//!
//! 1. bus, send helper, dispatcher (the sink must exist before any
//!    transport can deliver)
//! 2. shared-memory transport, registered before its receive task runs
//! 3. mailbox kernel transport (outbound channel and bus registration
//!    before the inbound channel, so a reply synthesized during
//!    inbound-open has a path out)
//! 4. monitor last; its LIFECYCLE(UP) needs a working send path
//!
//! [`Stack::assemble`] encodes that order over already-mapped hardware;
//! [`bring_up`] is the thin wrapper that does the mapping.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

use alloc::sync::Arc;

use chiplink_common::error::Result;
use chiplink_common::DelayUs;
use chiplink_mbox::{BankConfig, ChannelSpec, Mbox};
use chiplink_mbox_kernel::KernelTransport;
use chiplink_monitor::{FaultChains, Monitor, PowerControl};
use chiplink_msg::{Dispatcher, Messenger, RetryPolicy};
use chiplink_notif::{NotifBus, Priority, RecvSink, Transport};
use chiplink_shmem::{ShmemRegion, ShmemTransport};

/// Shared-memory transport parameters: mapped regions plus the receive
/// poll interval.
pub struct ShmemParams {
    pub out: ShmemRegion,
    pub inbound: ShmemRegion,
    pub poll_interval_ms: u32,
}

/// Everything bring-up produced, in ownership order.
///
/// The platform drives the parts the stack cannot: it calls the bank's IRQ
/// handlers from its interrupt glue, runs the shared-memory receive task
/// on a thread, and feeds fault events into the chains.
pub struct Stack {
    pub bank: Arc<Mbox>,
    pub bus: Arc<NotifBus>,
    pub messenger: Arc<Messenger>,
    pub dispatcher: Arc<Dispatcher>,
    pub shmem: Option<Arc<ShmemTransport>>,
    pub kernel_transport: Arc<KernelTransport>,
    pub chains: Arc<FaultChains>,
    pub monitor: Arc<Monitor>,
}

impl Stack {
    /// Wire the stack over an already-created bank and mapped regions.
    pub fn assemble(
        bank: Arc<Mbox>,
        kernel_link: &[ChannelSpec; 2],
        shmem: Option<ShmemParams>,
        retry: RetryPolicy,
        delay: Arc<dyn DelayUs>,
        power: Arc<dyn PowerControl>,
    ) -> Result<Self> {
        let bus = Arc::new(NotifBus::new());
        let messenger = Arc::new(Messenger::new(bus.clone(), retry, delay));
        let dispatcher = Arc::new(Dispatcher::new(messenger.clone()));
        let as_sink: Arc<dyn RecvSink> = dispatcher.clone();
        bus.set_sink(&as_sink);

        // Higher-priority transport first; registration must precede the
        // receive task, which the platform starts afterwards via run()
        let shmem = match shmem {
            Some(params) => {
                let transport = Arc::new(ShmemTransport::new(
                    params.out,
                    params.inbound,
                    params.poll_interval_ms,
                    bus.clone(),
                ));
                let as_transport: Arc<dyn Transport> = transport.clone();
                bus.register(Priority::Shmem, &as_transport)?;
                Some(transport)
            }
            None => None,
        };

        let kernel_transport = KernelTransport::attach(&bank, kernel_link, &bus)?;

        let chains = Arc::new(FaultChains::new());
        let monitor = Monitor::new(messenger.clone(), power);
        monitor.install(&chains)?;

        log::info!("system: messaging stack up");
        Ok(Self {
            bank,
            bus,
            messenger,
            dispatcher,
            shmem,
            kernel_transport,
            chains,
            monitor,
        })
    }
}

/// Map the bank and regions, then [`Stack::assemble`].
///
/// The kernel link defaults to the chiplet-wide allocation for this
/// cluster when `kernel_link` is `None`.
///
/// # Safety
///
/// `bank_config.base` and any shared-memory bases must be valid mapped
/// windows per [`Mbox::new`] and [`ShmemRegion::new`], not driven by any
/// other code.
pub unsafe fn bring_up(
    bank_config: &BankConfig,
    kernel_link: Option<[ChannelSpec; 2]>,
    shmem_bases: Option<(usize, usize, u32)>,
    retry: RetryPolicy,
    delay: Arc<dyn DelayUs>,
    power: Arc<dyn PowerControl>,
) -> Result<Stack> {
    // SAFETY: Caller guarantees the mappings
    let bank = Arc::new(unsafe { Mbox::new(bank_config) });
    let shmem = shmem_bases.map(|(out, inbound, poll_interval_ms)| ShmemParams {
        // SAFETY: Caller guarantees the mappings
        out: unsafe { ShmemRegion::new(out) },
        inbound: unsafe { ShmemRegion::new(inbound) },
        poll_interval_ms,
    });
    let link = kernel_link.unwrap_or(chiplink_map::highperf_system_link());
    Stack::assemble(bank, &link, shmem, retry, delay, power)
}
