// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Acquiring and releasing the PHB resource itself.

use dr_node::DevType;
use dr_node::DrNode;
use dr_node::NodeScope;
use dr_node::NodeTree;

use super::Error;
use super::PhbManager;
use super::Result;
use crate::platform::Platform;

impl<'a, P: Platform + ?Sized> PhbManager<'a, P> {
    /// Takes ownership of the PHB named `drc_name` from firmware and adds its nodes to the
    /// device tree.
    ///
    /// If a step after the connector was acquired fails, the connector is handed back to
    /// firmware exactly once before returning.
    pub fn acquire(&mut self, drc_name: &str) -> Result<NodeTree> {
        let (drc, path) = match self.platform.device_tree().resolve_drc_by_name(drc_name) {
            Some(found) => found,
            None => {
                self.diag.error(format_args!(
                    "Could not find drc index for {}, unable to add the PHB.",
                    drc_name
                ));
                return Err(Error::NotFound(drc_name.to_owned()));
            }
        };

        self.platform
            .firmware()
            .acquire_drc(drc.index)
            .map_err(|source| Error::RegistryBusy {
                index: drc.index,
                source,
            })?;

        let description = match self.platform.firmware().configure_connector(drc.index) {
            Some(d) => d,
            None => {
                self.diag.error(format_args!(
                    "configure-connector failed for {} ({:#x})",
                    drc_name, drc.index
                ));
                self.return_drc(drc.index);
                return Err(Error::ConfigureFailed(drc.index));
            }
        };

        if let Err(source) = self
            .platform
            .device_tree()
            .insert_nodes(&path, &description)
        {
            self.diag.error(format_args!(
                "add_device_tree_nodes failed at {}",
                path.display()
            ));
            self.return_drc(drc.index);
            return Err(Error::DeviceTreeWriteFailed { path, source });
        }

        // Reading the PHB back also checks that everything above took effect.
        match self
            .platform
            .device_tree()
            .lookup_node_by_name(drc_name, NodeScope::Phb)
        {
            Some(phb) => Ok(phb),
            None => {
                self.diag
                    .error(format_args!("Could not find \"{}\"", drc_name));
                self.return_drc(drc.index);
                Err(Error::NodeMissingAfterInsert(drc_name.to_owned()))
            }
        }
    }

    fn return_drc(&mut self, index: u32) {
        if let Err(e) = self.platform.firmware().release_drc(index, DevType::Phb) {
            self.diag.error(format_args!(
                "failed to release drc {:#x} after a failed add: {:#}",
                index, e
            ));
            self.diag.out_of_sync();
        }
    }

    /// Removes `phb` from the device tree and hands its connector back to firmware.
    ///
    /// The connector is only released once both the PHB and its interrupt controller are gone
    /// from the device tree. A failure leaves everything after the failing step untouched.
    pub fn release(&mut self, phb: &DrNode) -> Result<()> {
        self.platform
            .device_tree()
            .remove_nodes(&phb.ofdt_path)
            .map_err(|source| Error::DeviceTreeRemoveFailed {
                path: phb.ofdt_path.clone(),
                source,
            })?;

        if let Some(ic_path) = phb.ic_path() {
            self.platform
                .device_tree()
                .remove_nodes(ic_path)
                .map_err(|source| Error::DeviceTreeRemoveFailed {
                    path: ic_path.to_owned(),
                    source,
                })?;
        }

        self.platform
            .firmware()
            .release_drc(phb.drc_index, DevType::Phb)
            .map_err(|source| Error::RegistryReleaseFailed {
                index: phb.drc_index,
                source,
            })
    }
}
