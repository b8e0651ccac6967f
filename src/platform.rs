// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Interfaces to the subsystems a PHB operation has to keep in agreement: the device tree,
//! the firmware resource registry, the kernel's DLPAR slot interface, the generic hotplug slot
//! protocol and the OS PCI device registry.

use std::path::Path;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use dr_node::DevType;
use dr_node::Drc;
use dr_node::DrNode;
use dr_node::NodeDescription;
use dr_node::NodeScope;
use dr_node::NodeTree;

/// Device tree lookups and mutations.
pub trait DeviceTree {
    /// Finds the node named `drc_name` among nodes of class `scope`, with its children.
    fn lookup_node_by_name(&mut self, drc_name: &str, scope: NodeScope) -> Option<NodeTree>;

    /// Returns the connector named `drc_name` and the device tree path new nodes for it are
    /// inserted under.
    fn resolve_drc_by_name(&mut self, drc_name: &str) -> Option<(Drc, PathBuf)>;

    /// Every connector known to the device tree.
    fn drc_list(&mut self) -> Result<Vec<Drc>>;

    fn insert_nodes(&mut self, parent: &Path, description: &NodeDescription) -> Result<()>;

    /// Removes the node at `path` and everything beneath it.
    fn remove_nodes(&mut self, path: &Path) -> Result<()>;

    /// Every hotplug slot node currently present.
    fn live_hotplug_nodes(&mut self) -> Vec<DrNode>;
}

/// One entry of a device tree directory snapshot.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DirEntry {
    Dir { name: String, entries: Vec<DirEntry> },
    File { name: String },
}

impl DirEntry {
    pub fn dir(name: impl Into<String>, entries: Vec<DirEntry>) -> Self {
        DirEntry::Dir {
            name: name.into(),
            entries,
        }
    }

    pub fn file(name: impl Into<String>) -> Self {
        DirEntry::File { name: name.into() }
    }

    pub fn name(&self) -> &str {
        match self {
            DirEntry::Dir { name, .. } | DirEntry::File { name } => name,
        }
    }
}

/// Reads the device tree as a directory hierarchy.
pub trait DeviceTreeFs {
    /// Snapshots the entries beneath the directory at `path`.
    fn read_subtree(&mut self, path: &Path) -> Result<Vec<DirEntry>>;
}

/// The firmware resource registry.
pub trait Firmware {
    /// Takes ownership of the resource behind connector `index` for this partition.
    fn acquire_drc(&mut self, index: u32) -> Result<()>;

    fn release_drc(&mut self, index: u32, dev_type: DevType) -> Result<()>;

    /// Asks firmware to describe the device tree nodes of an owned resource.
    fn configure_connector(&mut self, index: u32) -> Option<NodeDescription>;
}

/// The kernel's DLPAR slot interface.
pub trait KernelHotplug {
    /// True if the running kernel can add and remove PHBs.
    fn dlpar_capable(&self) -> bool;

    fn add_slot(&mut self, drc_name: &str) -> Result<()>;

    fn remove_slot(&mut self, drc_name: &str) -> Result<()>;
}

/// Outcome of releasing the children of a hotplug slot.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChildRelease {
    Released,
    /// The slot had nothing to release.
    NoChildren,
}

/// The generic hotplug slot protocol that manages the slots beneath a PHB.
pub trait ChildSlots {
    /// Acquires the hotplug slots found beneath `ofdt_path`, returning how many there were.
    fn acquire(&mut self, ofdt_path: &Path) -> Result<usize>;

    fn enable(&mut self, drc_name: &str) -> Result<()>;

    fn disable(&mut self, drc_name: &str) -> Result<()>;

    fn release(&mut self, drc_name: &str) -> Result<()>;

    fn release_from_node(&mut self, slot: &DrNode) -> Result<ChildRelease>;
}

/// A PCI device known to the OS, independent of the device tree.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HotplugDevice {
    /// Registry directory of the device.
    pub path: PathBuf,
    /// Device tree path of the device, relative to the device tree root.
    pub devspec: String,
}

/// The OS registry of live PCI devices.
pub trait OsDeviceRegistry {
    fn snapshot(&mut self) -> Result<Vec<HotplugDevice>>;

    /// Asks the OS to hot remove `device`. Teardown continues asynchronously.
    fn remove_device(&mut self, device: &HotplugDevice) -> Result<()>;

    /// Waits `delay` for the teardown started by `remove_device` to finish.
    fn settle(&mut self, delay: Duration) {
        thread::sleep(delay)
    }
}

/// Every collaborator a PHB operation needs.
pub trait Platform {
    fn device_tree(&mut self) -> &mut dyn DeviceTree;
    fn device_tree_fs(&mut self) -> &mut dyn DeviceTreeFs;
    fn firmware(&mut self) -> &mut dyn Firmware;
    fn kernel(&mut self) -> &mut dyn KernelHotplug;
    fn child_slots(&mut self) -> &mut dyn ChildSlots;
    fn os_devices(&mut self) -> &mut dyn OsDeviceRegistry;
}
