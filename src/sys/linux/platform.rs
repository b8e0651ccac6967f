// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::config::Config;
use crate::platform::ChildSlots;
use crate::platform::DeviceTree;
use crate::platform::DeviceTreeFs;
use crate::platform::Firmware;
use crate::platform::KernelHotplug;
use crate::platform::OsDeviceRegistry;
use crate::platform::Platform;

use super::OfdtDirReader;
use super::SlotControl;
use super::SysfsPciRegistry;

/// A `Platform` whose filesystem backed collaborators read procfs and sysfs.
///
/// The device tree, firmware and hotplug slot backends are supplied by the caller.
pub struct LinuxPlatform<D, F, C> {
    device_tree: D,
    firmware: F,
    child_slots: C,
    ofdt: OfdtDirReader,
    kernel: SlotControl,
    os_devices: SysfsPciRegistry,
}

impl<D, F, C> LinuxPlatform<D, F, C>
where
    D: DeviceTree,
    F: Firmware,
    C: ChildSlots,
{
    pub fn new(config: &Config, device_tree: D, firmware: F, child_slots: C) -> Self {
        LinuxPlatform {
            device_tree,
            firmware,
            child_slots,
            ofdt: OfdtDirReader,
            kernel: SlotControl::new(&config.slot_control_dir),
            os_devices: SysfsPciRegistry::new(&config.pci_devices_dir),
        }
    }
}

impl<D, F, C> Platform for LinuxPlatform<D, F, C>
where
    D: DeviceTree,
    F: Firmware,
    C: ChildSlots,
{
    fn device_tree(&mut self) -> &mut dyn DeviceTree {
        &mut self.device_tree
    }

    fn device_tree_fs(&mut self) -> &mut dyn DeviceTreeFs {
        &mut self.ofdt
    }

    fn firmware(&mut self) -> &mut dyn Firmware {
        &mut self.firmware
    }

    fn kernel(&mut self) -> &mut dyn KernelHotplug {
        &mut self.kernel
    }

    fn child_slots(&mut self) -> &mut dyn ChildSlots {
        &mut self.child_slots
    }

    fn os_devices(&mut self) -> &mut dyn OsDeviceRegistry {
        &mut self.os_devices
    }
}
