// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Dynamic reconfiguration resource nodes.
//!
//! A `NodeTree` is the view of a PHB, and the devices beneath it, that the device tree lookup
//! hands back to its caller. Nodes live in an arena owned by the tree and refer to each other
//! through `NodeId` handles, so releasing the tree releases every node it contains.

use std::fmt;
use std::fmt::Display;
use std::path::Path;
use std::path::PathBuf;

use remain::sorted;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

#[sorted]
#[derive(Error, Debug, Eq, PartialEq)]
pub enum Error {
    #[error("node {0} does not exist in this tree")]
    InvalidNodeId(NodeId),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Kind of device a dynamic reconfiguration connector represents.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum DevType {
    /// A PCI host bridge.
    Phb,
    /// A PCI slot that the OS hotplug subsystem can attach and detach on its own.
    PciHotplug,
    /// Anything else, e.g. an adapter that is only removable through firmware.
    Other,
}

impl Display for DevType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::DevType::*;

        let s = match self {
            Phb => "phb",
            PciHotplug => "pci hotplug",
            Other => "other",
        };
        write!(f, "{}", s)
    }
}

/// Restricts a node lookup to one class of nodes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NodeScope {
    Phb,
}

/// A dynamic reconfiguration connector as listed by firmware.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Drc {
    pub name: String,
    pub index: u32,
}

/// Returns the name of the connector with `index` in `drcs`.
pub fn drc_index_to_name(index: u32, drcs: &[Drc]) -> Option<&str> {
    drcs.iter()
        .find(|drc| drc.index == index)
        .map(|drc| drc.name.as_str())
}

/// One device in a device tree subtree.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DrNode {
    pub drc_name: String,
    pub drc_index: u32,
    pub dev_type: DevType,
    /// Set iff firmware currently assigns the resource to this partition.
    pub is_owned: bool,
    pub ofdt_path: PathBuf,
    /// Device tree path of the interrupt controller that belongs to a PHB, if any.
    #[serde(default)]
    pub ic_ofdt_path: Option<PathBuf>,
}

impl DrNode {
    pub fn new(
        drc_name: impl Into<String>,
        drc_index: u32,
        dev_type: DevType,
        ofdt_path: impl Into<PathBuf>,
    ) -> Self {
        DrNode {
            drc_name: drc_name.into(),
            drc_index,
            dev_type,
            is_owned: true,
            ofdt_path: ofdt_path.into(),
            ic_ofdt_path: None,
        }
    }

    pub fn owned(mut self, is_owned: bool) -> Self {
        self.is_owned = is_owned;
        self
    }

    pub fn with_ic_path(mut self, ic_ofdt_path: impl Into<PathBuf>) -> Self {
        self.ic_ofdt_path = Some(ic_ofdt_path.into());
        self
    }

    pub fn ic_path(&self) -> Option<&Path> {
        self.ic_ofdt_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }

    /// True if this node still holds a resource that the OS can not detach on its own.
    pub fn blocks_removal(&self) -> bool {
        self.is_owned && self.dev_type != DevType::PciHotplug
    }
}

/// Stable handle to a node inside a `NodeTree`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct NodeId(usize);

impl Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Slot {
    node: DrNode,
    children: Vec<NodeId>,
}

/// Arena of nodes rooted at a single node, normally a PHB.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeTree {
    slots: Vec<Slot>,
}

impl NodeTree {
    const ROOT: NodeId = NodeId(0);

    pub fn new(root: DrNode) -> Self {
        NodeTree {
            slots: vec![Slot {
                node: root,
                children: Vec::new(),
            }],
        }
    }

    pub fn root_id(&self) -> NodeId {
        Self::ROOT
    }

    pub fn root(&self) -> &DrNode {
        &self.slots[Self::ROOT.0].node
    }

    /// Appends `node` as the last child of `parent`.
    pub fn add_child(&mut self, parent: NodeId, node: DrNode) -> Result<NodeId> {
        if parent.0 >= self.slots.len() {
            return Err(Error::InvalidNodeId(parent));
        }
        let id = NodeId(self.slots.len());
        self.slots.push(Slot {
            node,
            children: Vec::new(),
        });
        self.slots[parent.0].children.push(id);
        Ok(id)
    }

    /// Immediate children of the root node, in order.
    pub fn children(&self) -> impl Iterator<Item = &DrNode> {
        self.slots[Self::ROOT.0]
            .children
            .iter()
            .map(move |id| &self.slots[id.0].node)
    }

    /// Releases every node in the tree.
    pub fn release(self) {}
}

/// Property of a node description produced by configure-connector.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: Vec<u8>,
}

/// Device tree fragment describing a newly owned resource.
///
/// The contents are opaque to the lifecycle code, which only hands them from firmware to the
/// device tree.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct NodeDescription {
    pub name: String,
    pub properties: Vec<Property>,
    pub children: Vec<NodeDescription>,
}

impl NodeDescription {
    pub fn new(name: impl Into<String>) -> Self {
        NodeDescription {
            name: name.into(),
            ..Default::default()
        }
    }
}
