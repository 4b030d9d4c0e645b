//! Device naming and bank-level device creation.
//!
//! A [`DeviceClass`] is the cross-bank coordination point: it owns the
//! name prefix and the device-number space. Each bank then materialises
//! its devices through [`UserBank::create`], pulling names from an
//! explicit per-instance list when the platform provides one and falling
//! back to `<prefix><N>` otherwise.

use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use chiplink_common::error::Result;
use chiplink_common::Error;
use chiplink_mbox::regs::INSTANCES;
use chiplink_mbox::{ChannelSpec, Mbox};

use crate::device::MboxDevice;

/// Shared device class: name prefix plus a monotonically allocated
/// device-number space.
///
/// Create one per system and pass it to every bank's
/// [`UserBank::create`] call; device numbers then stay unique across
/// banks.
pub struct DeviceClass {
    prefix: &'static str,
    next_minor: spin::Mutex<u32>,
}

impl DeviceClass {
    #[must_use]
    pub const fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            next_minor: spin::Mutex::new(0),
        }
    }

    /// Name prefix used for fallback device names.
    #[inline]
    #[must_use]
    pub const fn prefix(&self) -> &'static str {
        self.prefix
    }

    /// Reserve `count` consecutive device numbers.
    fn alloc_minors(&self, count: u32) -> u32 {
        let mut next = self.next_minor.lock();
        let first = *next;
        *next += count;
        first
    }
}

/// All user-facing devices of one bank.
///
/// The device table is sized once at creation and never grows; a bank can
/// never expose more devices than it has instances.
#[derive(Debug)]
pub struct UserBank {
    devices: Vec<Arc<MboxDevice>>,
    first_minor: u32,
}

impl UserBank {
    /// Create one device per channel spec.
    ///
    /// `names` optionally supplies explicit device names; it must cover
    /// every spec. Without it, devices are named `<prefix><minor>`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the spec list exceeds the bank's instance
    /// count, or the name list is shorter than the spec list.
    pub fn create(
        bank: &Arc<Mbox>,
        specs: &[ChannelSpec],
        names: Option<&[&str]>,
        class: &DeviceClass,
    ) -> Result<Self> {
        if specs.len() > INSTANCES {
            log::error!(
                "mbox-user: more channels ({}) than bank instances ({})",
                specs.len(),
                INSTANCES
            );
            return Err(Error::InvalidArgument);
        }
        if let Some(names) = names {
            if names.len() < specs.len() {
                log::error!(
                    "mbox-user: fewer names ({}) than channels ({})",
                    names.len(),
                    specs.len()
                );
                return Err(Error::InvalidArgument);
            }
        }

        let first_minor = class.alloc_minors(specs.len() as u32);
        let devices = specs
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                let name = match names {
                    Some(names) => String::from(names[i]),
                    None => format!("{}{}", class.prefix(), first_minor + i as u32),
                };
                log::info!(
                    "mbox-user: device '{}' -> instance {}",
                    name,
                    spec.config.instance
                );
                MboxDevice::new(name, *spec, Arc::clone(bank))
            })
            .collect();

        Ok(Self {
            devices,
            first_minor,
        })
    }

    /// First device number allocated to this bank.
    #[inline]
    #[must_use]
    pub fn first_minor(&self) -> u32 {
        self.first_minor
    }

    /// Number of devices.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Device by position within this bank.
    #[must_use]
    pub fn device(&self, index: usize) -> Option<&Arc<MboxDevice>> {
        self.devices.get(index)
    }

    /// Device by file name.
    #[must_use]
    pub fn device_by_name(&self, name: &str) -> Option<&Arc<MboxDevice>> {
        self.devices.iter().find(|d| d.name() == name)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use chiplink_mbox::testing::FakeBank;
    use chiplink_mbox::{ChannelConfig, Direction};

    fn specs(instances: &[usize]) -> Vec<ChannelSpec> {
        instances
            .iter()
            .map(|&instance| ChannelSpec {
                config: ChannelConfig {
                    instance,
                    ..ChannelConfig::default()
                },
                direction: if instance % 2 == 0 {
                    Direction::Outgoing
                } else {
                    Direction::Incoming
                },
            })
            .collect()
    }

    #[test]
    fn test_fallback_names() {
        let fb = FakeBank::new(0, 1);
        let class = DeviceClass::new("mbox");
        let bank = UserBank::create(&fb.bank, &specs(&[0, 1]), None, &class).unwrap();
        assert_eq!(bank.device(0).unwrap().name(), "mbox0");
        assert_eq!(bank.device(1).unwrap().name(), "mbox1");
    }

    #[test]
    fn test_explicit_names() {
        let fb = FakeBank::new(0, 1);
        let class = DeviceClass::new("mbox");
        let bank = UserBank::create(
            &fb.bank,
            &specs(&[0, 1]),
            Some(&["mgmt-out", "mgmt-in"]),
            &class,
        )
        .unwrap();
        assert!(bank.device_by_name("mgmt-out").is_some());
        assert!(bank.device_by_name("mgmt-in").is_some());
        assert!(bank.device_by_name("mbox0").is_none());
    }

    #[test]
    fn test_spec_list_capped_at_bank_capacity() {
        let fb = FakeBank::new(0, 1);
        let class = DeviceClass::new("mbox");
        let too_many: Vec<usize> = (0..=INSTANCES).collect();
        assert_eq!(
            UserBank::create(&fb.bank, &specs(&too_many), None, &class).unwrap_err(),
            Error::InvalidArgument
        );
    }

    #[test]
    fn test_short_name_list_rejected() {
        let fb = FakeBank::new(0, 1);
        let class = DeviceClass::new("mbox");
        assert_eq!(
            UserBank::create(&fb.bank, &specs(&[0, 1]), Some(&["only-one"]), &class)
                .unwrap_err(),
            Error::InvalidArgument
        );
    }

    #[test]
    fn test_minors_unique_across_banks() {
        let fb0 = FakeBank::new(0, 1);
        let fb1 = FakeBank::new(0, 1);
        let class = DeviceClass::new("mbox");
        let a = UserBank::create(&fb0.bank, &specs(&[0, 1]), None, &class).unwrap();
        let b = UserBank::create(&fb1.bank, &specs(&[0, 1, 2]), None, &class).unwrap();
        assert_eq!(a.first_minor(), 0);
        assert_eq!(b.first_minor(), 2);
        // names are namespaced by the shared numbering
        assert_eq!(b.device(0).unwrap().name(), "mbox2");
    }
}
