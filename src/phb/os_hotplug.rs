// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Hot removal of PCI devices that the OS knows about but the device tree never annotated with
//! connector information.
//!
//! Platforms without full dynamic reconfiguration support leave the devices below a PHB without
//! `ibm,drc-*` properties, so they never show up as hotplug slots. The OS still tracks them in
//! its PCI device registry, keyed by the device tree path they were discovered at (`devspec`).
//! Before a PHB goes away each of those devices is matched against the PHB's device tree
//! directory and removed from the OS.

use std::path::Path;

use anyhow::anyhow;
use dr_node::DrNode;

use super::Error;
use super::PhbManager;
use super::Result;
use crate::platform::DirEntry;
use crate::platform::HotplugDevice;
use crate::platform::Platform;

/// Returns the `devspec` string of the device tree path `path` mounted under `ofdt_base`.
pub fn devspec_of(ofdt_base: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(ofdt_base).ok()?;
    Some(format!("/{}", rel.to_string_lossy()))
}

/// Lists the devices in `devices` that sit beneath the device tree directory whose devspec is
/// `root`, in the order they have to be removed.
///
/// Entries are visited depth first and a directory's own match comes after everything inside
/// it, so a child device is always removed before its parent. An entry with no matching device
/// is skipped; an entry matched by more than one device is an error.
pub fn plan_removals<'d>(
    root: &str,
    entries: &[DirEntry],
    devices: &'d [HotplugDevice],
) -> Result<Vec<&'d HotplugDevice>> {
    let mut plan = Vec::new();
    visit(root, entries, devices, &mut plan)?;
    Ok(plan)
}

fn visit<'d>(
    prefix: &str,
    entries: &[DirEntry],
    devices: &'d [HotplugDevice],
    plan: &mut Vec<&'d HotplugDevice>,
) -> Result<()> {
    for entry in entries {
        let devspec = format!("{}/{}", prefix.trim_end_matches('/'), entry.name());
        if let DirEntry::Dir { entries, .. } = entry {
            visit(&devspec, entries, devices, plan)?;
        }

        let mut matches = devices.iter().filter(|d| d.devspec == devspec);
        if let Some(device) = matches.next() {
            let rest: Vec<_> = matches.collect();
            if !rest.is_empty() {
                let mut paths = vec![device.path.clone()];
                paths.extend(rest.iter().map(|d| d.path.clone()));
                return Err(Error::AmbiguousMatch { devspec, paths });
            }
            plan.push(device);
        }
    }
    Ok(())
}

impl<'a, P: Platform + ?Sized> PhbManager<'a, P> {
    /// Reads every PCI device the OS currently knows about.
    pub fn snapshot_os_devices(&mut self) -> Result<Vec<HotplugDevice>> {
        let devices = match self.platform.os_devices().snapshot() {
            Ok(d) => d,
            Err(e) => {
                self.diag
                    .error(format_args!("Failed to list OS PCI devices: {:#}", e));
                return Err(Error::EnumerationFailed(e));
            }
        };
        for device in &devices {
            self.diag.debug(format_args!(
                "HPDEV: {}\n       {}",
                device.path.display(),
                device.devspec
            ));
        }
        Ok(devices)
    }

    /// Hot removes every device in `devices` found beneath the device tree directory
    /// `ofdt_path`, children first, waiting for the OS to settle after each one.
    ///
    /// Stops at the first device that can not be removed.
    pub fn disable_subtree(&mut self, ofdt_path: &Path, devices: &[HotplugDevice]) -> Result<()> {
        let root = devspec_of(&self.ofdt_base, ofdt_path).ok_or_else(|| Error::TraversalFailed {
            path: ofdt_path.to_owned(),
            source: anyhow!("not below {}", self.ofdt_base.display()),
        })?;
        let entries = self
            .platform
            .device_tree_fs()
            .read_subtree(ofdt_path)
            .map_err(|source| Error::TraversalFailed {
                path: ofdt_path.to_owned(),
                source,
            })?;

        for device in plan_removals(&root, &entries, devices)? {
            self.diag
                .debug(format_args!("Removing {}", device.path.display()));
            if let Err(source) = self.platform.os_devices().remove_device(device) {
                self.diag.error(format_args!(
                    "Failed to hotplug remove {}",
                    device.path.display()
                ));
                return Err(Error::RemovalFailed {
                    path: device.path.clone(),
                    source,
                });
            }
            self.platform.os_devices().settle(self.settle_delay);
        }
        Ok(())
    }

    /// Removes from the OS any device beneath `phb` that is not managed as a hotplug slot.
    pub fn disable_os_hotplug_children(&mut self, phb: &DrNode) -> Result<()> {
        let devices = self.snapshot_os_devices()?;
        self.disable_subtree(&phb.ofdt_path, &devices)
    }
}
