// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! In-memory platform for exercising PHB operations without firmware or sysfs.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::anyhow;
use anyhow::bail;
use anyhow::Result;
use dr_node::DevType;
use dr_node::Drc;
use dr_node::DrNode;
use dr_node::NodeDescription;
use dr_node::NodeScope;
use dr_node::NodeTree;

use crate::config::Config;
use crate::platform::ChildRelease;
use crate::platform::ChildSlots;
use crate::platform::DeviceTree;
use crate::platform::DeviceTreeFs;
use crate::platform::DirEntry;
use crate::platform::Firmware;
use crate::platform::HotplugDevice;
use crate::platform::KernelHotplug;
use crate::platform::OsDeviceRegistry;
use crate::platform::Platform;

pub fn test_config() -> Config {
    Config {
        settle_delay_ms: 0,
        ..Default::default()
    }
}

/// A collaborator call made through `FakePlatform`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Call {
    Lookup(String),
    ResolveDrc(String),
    DrcList,
    InsertNodes(PathBuf),
    RemoveNodes(PathBuf),
    LiveHotplugNodes,
    ReadSubtree(PathBuf),
    AcquireDrc(u32),
    ReleaseDrc(u32),
    ConfigureConnector(u32),
    AddSlot(String),
    RemoveSlot(String),
    AcquireChildren(PathBuf),
    EnableChildren(String),
    DisableChildren(String),
    ReleaseChildren(String),
    ReleaseChildrenFromNode(String),
    Snapshot,
    RemoveDevice(PathBuf),
    Settle(Duration),
}

/// Calls that should fail.
#[derive(Debug, Default)]
pub struct Failures {
    pub acquire_drc: bool,
    pub release_drc: bool,
    pub configure_connector: bool,
    pub insert_nodes: bool,
    /// The PHB is inserted but can not be found again.
    pub lookup_after_insert: bool,
    pub remove_nodes: Vec<PathBuf>,
    pub drc_list: bool,
    pub add_slot: bool,
    pub remove_slot: bool,
    pub acquire_children: bool,
    pub enable_children: bool,
    pub disable_children: bool,
    pub release_children: bool,
    pub release_from_node: bool,
    pub snapshot: bool,
    pub remove_device: Option<PathBuf>,
}

pub struct FakePlatform {
    pub calls: Vec<Call>,
    pub fail: Failures,
    pub drcs: Vec<Drc>,
    /// PHBs present in the device tree, by name.
    pub phbs: BTreeMap<String, NodeTree>,
    /// PHB that firmware hands out on configure-connector.
    pub addable: Option<NodeTree>,
    configured: Option<NodeTree>,
    /// Connector indexes owned by this partition.
    pub owned: BTreeSet<u32>,
    pub hotplug_nodes: Vec<DrNode>,
    pub dir_trees: BTreeMap<PathBuf, Vec<DirEntry>>,
    pub os_devices: Vec<HotplugDevice>,
    /// Hotplug slots found beneath a newly added PHB.
    pub children_found: usize,
    pub capable: bool,
    pub release_from_node: ChildRelease,
}

impl FakePlatform {
    pub fn new() -> Self {
        FakePlatform {
            calls: Vec::new(),
            fail: Failures::default(),
            drcs: Vec::new(),
            phbs: BTreeMap::new(),
            addable: None,
            configured: None,
            owned: BTreeSet::new(),
            hotplug_nodes: Vec::new(),
            dir_trees: BTreeMap::new(),
            os_devices: Vec::new(),
            children_found: 0,
            capable: true,
            release_from_node: ChildRelease::Released,
        }
    }

    fn add_drc(&mut self, node: &DrNode) {
        if !self.drcs.iter().any(|d| d.index == node.drc_index) {
            self.drcs.push(Drc {
                name: node.drc_name.clone(),
                index: node.drc_index,
            });
        }
    }

    /// Adds a PHB that is already present and owned.
    pub fn with_phb(mut self, tree: NodeTree) -> Self {
        let root = tree.root().clone();
        self.add_drc(&root);
        if root.is_owned {
            self.owned.insert(root.drc_index);
        }
        self.phbs.insert(root.drc_name, tree);
        self
    }

    /// Adds a PHB that firmware can assign to this partition.
    pub fn with_addable_phb(mut self, tree: NodeTree) -> Self {
        self.add_drc(tree.root());
        self.addable = Some(tree);
        self
    }

    pub fn with_hotplug_nodes(mut self, nodes: Vec<DrNode>) -> Self {
        self.hotplug_nodes = nodes;
        self
    }

    pub fn with_dir(mut self, path: impl Into<PathBuf>, entries: Vec<DirEntry>) -> Self {
        self.dir_trees.insert(path.into(), entries);
        self
    }

    pub fn with_os_devices(mut self, devices: Vec<HotplugDevice>) -> Self {
        self.os_devices = devices;
        self
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }
}

impl DeviceTree for FakePlatform {
    fn lookup_node_by_name(&mut self, drc_name: &str, _scope: NodeScope) -> Option<NodeTree> {
        self.calls.push(Call::Lookup(drc_name.to_owned()));
        self.phbs.get(drc_name).cloned()
    }

    fn resolve_drc_by_name(&mut self, drc_name: &str) -> Option<(Drc, PathBuf)> {
        self.calls.push(Call::ResolveDrc(drc_name.to_owned()));
        let phb = self.addable.as_ref()?.root();
        if phb.drc_name != drc_name {
            return None;
        }
        let parent = phb.ofdt_path.parent()?.to_owned();
        let drc = self.drcs.iter().find(|d| d.name == drc_name)?.clone();
        Some((drc, parent))
    }

    fn drc_list(&mut self) -> Result<Vec<Drc>> {
        self.calls.push(Call::DrcList);
        if self.fail.drc_list {
            bail!("ibm,drc-indexes unreadable");
        }
        Ok(self.drcs.clone())
    }

    fn insert_nodes(&mut self, parent: &Path, _description: &NodeDescription) -> Result<()> {
        self.calls.push(Call::InsertNodes(parent.to_owned()));
        if self.fail.insert_nodes {
            bail!("write to ofdt failed");
        }
        let tree = self
            .configured
            .take()
            .ok_or_else(|| anyhow!("nothing configured"))?;
        if !self.fail.lookup_after_insert {
            self.phbs.insert(tree.root().drc_name.clone(), tree);
        }
        Ok(())
    }

    fn remove_nodes(&mut self, path: &Path) -> Result<()> {
        self.calls.push(Call::RemoveNodes(path.to_owned()));
        if self.fail.remove_nodes.iter().any(|p| p == path) {
            bail!("remove from ofdt failed");
        }
        self.phbs.retain(|_, t| t.root().ofdt_path != path);
        Ok(())
    }

    fn live_hotplug_nodes(&mut self) -> Vec<DrNode> {
        self.calls.push(Call::LiveHotplugNodes);
        self.hotplug_nodes.clone()
    }
}

impl DeviceTreeFs for FakePlatform {
    fn read_subtree(&mut self, path: &Path) -> Result<Vec<DirEntry>> {
        self.calls.push(Call::ReadSubtree(path.to_owned()));
        self.dir_trees
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("{}: no such directory", path.display()))
    }
}

impl Firmware for FakePlatform {
    fn acquire_drc(&mut self, index: u32) -> Result<()> {
        self.calls.push(Call::AcquireDrc(index));
        if self.fail.acquire_drc {
            bail!("drc busy");
        }
        self.owned.insert(index);
        Ok(())
    }

    fn release_drc(&mut self, index: u32, _dev_type: DevType) -> Result<()> {
        self.calls.push(Call::ReleaseDrc(index));
        if self.fail.release_drc {
            bail!("hardware error");
        }
        self.owned.remove(&index);
        Ok(())
    }

    fn configure_connector(&mut self, index: u32) -> Option<NodeDescription> {
        self.calls.push(Call::ConfigureConnector(index));
        if self.fail.configure_connector || !self.owned.contains(&index) {
            return None;
        }
        let tree = self.addable.clone()?;
        let name = tree
            .root()
            .ofdt_path
            .file_name()?
            .to_string_lossy()
            .into_owned();
        self.configured = Some(tree);
        Some(NodeDescription::new(name))
    }
}

impl KernelHotplug for FakePlatform {
    fn dlpar_capable(&self) -> bool {
        self.capable
    }

    fn add_slot(&mut self, drc_name: &str) -> Result<()> {
        self.calls.push(Call::AddSlot(drc_name.to_owned()));
        if self.fail.add_slot {
            bail!("add_slot: Invalid argument");
        }
        Ok(())
    }

    fn remove_slot(&mut self, drc_name: &str) -> Result<()> {
        self.calls.push(Call::RemoveSlot(drc_name.to_owned()));
        if self.fail.remove_slot {
            bail!("remove_slot: Device or resource busy");
        }
        Ok(())
    }
}

impl ChildSlots for FakePlatform {
    fn acquire(&mut self, ofdt_path: &Path) -> Result<usize> {
        self.calls.push(Call::AcquireChildren(ofdt_path.to_owned()));
        if self.fail.acquire_children {
            bail!("slot busy");
        }
        Ok(self.children_found)
    }

    fn enable(&mut self, drc_name: &str) -> Result<()> {
        self.calls.push(Call::EnableChildren(drc_name.to_owned()));
        if self.fail.enable_children {
            bail!("enable failed");
        }
        Ok(())
    }

    fn disable(&mut self, drc_name: &str) -> Result<()> {
        self.calls.push(Call::DisableChildren(drc_name.to_owned()));
        if self.fail.disable_children {
            bail!("disable failed");
        }
        Ok(())
    }

    fn release(&mut self, drc_name: &str) -> Result<()> {
        self.calls.push(Call::ReleaseChildren(drc_name.to_owned()));
        if self.fail.release_children {
            bail!("release failed");
        }
        Ok(())
    }

    fn release_from_node(&mut self, slot: &DrNode) -> Result<ChildRelease> {
        self.calls
            .push(Call::ReleaseChildrenFromNode(slot.drc_name.clone()));
        if self.fail.release_from_node {
            bail!("release failed");
        }
        Ok(self.release_from_node)
    }
}

impl OsDeviceRegistry for FakePlatform {
    fn snapshot(&mut self) -> Result<Vec<HotplugDevice>> {
        self.calls.push(Call::Snapshot);
        if self.fail.snapshot {
            bail!("/sys/bus/pci/devices unreadable");
        }
        Ok(self.os_devices.clone())
    }

    fn remove_device(&mut self, device: &HotplugDevice) -> Result<()> {
        self.calls.push(Call::RemoveDevice(device.path.clone()));
        if self.fail.remove_device.as_ref() == Some(&device.path) {
            bail!("write to {}/remove failed", device.path.display());
        }
        self.os_devices.retain(|d| d.path != device.path);
        Ok(())
    }

    fn settle(&mut self, delay: Duration) {
        self.calls.push(Call::Settle(delay));
    }
}

impl Platform for FakePlatform {
    fn device_tree(&mut self) -> &mut dyn DeviceTree {
        self
    }

    fn device_tree_fs(&mut self) -> &mut dyn DeviceTreeFs {
        self
    }

    fn firmware(&mut self) -> &mut dyn Firmware {
        self
    }

    fn kernel(&mut self) -> &mut dyn KernelHotplug {
        self
    }

    fn child_slots(&mut self) -> &mut dyn ChildSlots {
        self
    }

    fn os_devices(&mut self) -> &mut dyn OsDeviceRegistry {
        self
    }
}
