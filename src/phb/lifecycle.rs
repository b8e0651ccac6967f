// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The add, remove and query operations.

use dr_node::DevType;
use dr_node::DrNode;
use dr_node::NodeScope;
use dr_node::NodeTree;

use super::unwind::Compensation;
use super::unwind::Unwind;
use super::ChildStep;
use super::Error;
use super::PhbManager;
use super::Result;
use super::SlotAction;
use crate::platform::ChildRelease;
use crate::platform::Platform;

/// Result of asking whether a PHB could be removed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QueryStatus {
    /// The PHB is not present, so removing it would do nothing.
    NotExistent,
    /// The PHB still owns a child that is not hotplug capable.
    InUse,
    RemovableNow,
}

/// Progress of an add.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AddState {
    Idle,
    Acquired,
    ChildrenPrepared,
    KernelNotified,
    ChildrenEnabled,
    Done,
}

/// Progress of a remove.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RemoveState {
    Idle,
    ValidatedOwnership,
    ChildrenDisabled,
    OsHotplugReconciled,
    KernelNotified,
    Released,
    Done,
}

impl<'a, P: Platform + ?Sized> PhbManager<'a, P> {
    fn lookup_phb(&mut self, drc_name: &str) -> Option<NodeTree> {
        self.platform
            .device_tree()
            .lookup_node_by_name(drc_name, NodeScope::Phb)
    }

    fn enter<S: std::fmt::Debug>(&mut self, drc_name: &str, state: S) {
        self.diag.debug(format_args!("{}: {:?}", drc_name, state));
    }

    /// Reports whether the PHB named `drc_name` could be removed right now.
    pub fn query(&mut self, drc_name: &str) -> QueryStatus {
        let phb = match self.lookup_phb(drc_name) {
            Some(phb) => phb,
            None => return QueryStatus::NotExistent,
        };

        let status = if phb.children().any(DrNode::blocks_removal) {
            QueryStatus::InUse
        } else {
            QueryStatus::RemovableNow
        };
        phb.release();
        status
    }

    /// Adds the PHB named `drc_name` to this partition.
    ///
    /// On failure everything done so far is undone. If undoing the PHB acquisition itself
    /// fails, `Error::InconsistentState` is returned instead of the original error.
    pub fn add(&mut self, drc_name: &str) -> Result<()> {
        self.enter(drc_name, AddState::Idle);
        if let Some(existing) = self.lookup_phb(drc_name) {
            let owned = existing.root().is_owned;
            existing.release();
            if owned {
                self.diag
                    .error(format_args!("PHB is already owned by this partition"));
                return Err(Error::AlreadyOwned(drc_name.to_owned()));
            }
        }

        let phb = self.acquire(drc_name)?;
        self.enter(drc_name, AddState::Acquired);
        let result = self.add_acquired(phb.root());
        phb.release();
        result
    }

    fn add_acquired(&mut self, phb: &DrNode) -> Result<()> {
        let mut unwind = Unwind::new();
        unwind.push(Compensation::ReleasePhb);

        let children = match self.platform.child_slots().acquire(&phb.ofdt_path) {
            Ok(n) => n,
            Err(source) => {
                let err = Error::ChildProtocolFailed {
                    step: ChildStep::Acquire,
                    drc_name: phb.drc_name.clone(),
                    source,
                };
                self.diag.error(format_args!("{}", err));
                // Only the PHB itself needs undoing here.
                return match unwind.run(self, phb).pop() {
                    Some(rollback) => Err(Error::InconsistentState {
                        original: Box::new(err),
                        rollback: Box::new(rollback),
                    }),
                    None => Err(err),
                };
            }
        };
        if children > 0 {
            unwind.push(Compensation::ReleaseChildren);
        }
        self.enter(&phb.drc_name, AddState::ChildrenPrepared);

        if let Err(source) = self.platform.kernel().add_slot(&phb.drc_name) {
            let err = Error::KernelNotifyFailed {
                action: SlotAction::Add,
                drc_name: phb.drc_name.clone(),
                source,
            };
            self.diag.error(format_args!("{}", err));
            unwind.run(self, phb);
            return Err(err);
        }
        unwind.push(Compensation::RemoveSlot);
        self.enter(&phb.drc_name, AddState::KernelNotified);

        if children > 0 {
            if let Err(source) = self.platform.child_slots().enable(&phb.drc_name) {
                self.diag.error(format_args!("Adapter configuration failed."));
                unwind.run(self, phb);
                return Err(Error::ChildProtocolFailed {
                    step: ChildStep::Enable,
                    drc_name: phb.drc_name.clone(),
                    source,
                });
            }
            self.enter(&phb.drc_name, AddState::ChildrenEnabled);
        }

        self.enter(&phb.drc_name, AddState::Done);
        Ok(())
    }

    /// Removes the PHB named `drc_name` from this partition.
    ///
    /// Nothing is changed if the PHB still owns a child that is not hotplug capable. Once the
    /// hotplug children have been dealt with there is no way back, so later failures are
    /// returned without any attempt to restore the earlier state.
    pub fn remove(&mut self, drc_name: &str) -> Result<()> {
        self.enter(drc_name, RemoveState::Idle);
        let phb = self
            .lookup_phb(drc_name)
            .ok_or_else(|| Error::NotExistent(drc_name.to_owned()))?;
        let result = self.remove_phb(&phb);
        phb.release();
        result
    }

    fn remove_phb(&mut self, tree: &NodeTree) -> Result<()> {
        let phb = tree.root();
        if let Some(child) = tree.children().find(|c| c.blocks_removal()) {
            let err = Error::PhbInUse {
                phb: phb.drc_name.clone(),
                child: child.drc_name.clone(),
            };
            self.diag.error(format_args!("{}", err));
            return Err(err);
        }
        self.enter(&phb.drc_name, RemoveState::ValidatedOwnership);

        let slots = self.platform.device_tree().live_hotplug_nodes();
        for child in tree
            .children()
            .filter(|c| c.dev_type == DevType::PciHotplug)
        {
            if let Err(e) = self.platform.child_slots().disable(&child.drc_name) {
                self.diag.error(format_args!(
                    "failed to disable hotplug children of {}: {:#}",
                    child.drc_name, e
                ));
            }

            let slot = match slots.iter().find(|s| s.drc_name == child.drc_name) {
                Some(slot) => slot,
                None => {
                    self.diag.debug(format_args!(
                        "no hotplug slot named {}, nothing to release",
                        child.drc_name
                    ));
                    continue;
                }
            };
            match self.platform.child_slots().release_from_node(slot) {
                Ok(ChildRelease::Released) => {}
                Ok(ChildRelease::NoChildren) => self.diag.debug(format_args!(
                    "{} has no hotplug children to release",
                    slot.drc_name
                )),
                Err(source) => {
                    self.diag
                        .error(format_args!("failed to release hotplug children"));
                    return Err(Error::ChildProtocolFailed {
                        step: ChildStep::ReleaseFromNode,
                        drc_name: child.drc_name.clone(),
                        source,
                    });
                }
            }
        }
        self.enter(&phb.drc_name, RemoveState::ChildrenDisabled);

        // Anything left below the PHB is only known to the OS.
        self.disable_os_hotplug_children(phb)?;
        self.enter(&phb.drc_name, RemoveState::OsHotplugReconciled);

        if let Err(source) = self.platform.kernel().remove_slot(&phb.drc_name) {
            self.diag.error(format_args!(
                "kernel remove failed for {}, rc = {:#}",
                phb.drc_name, source
            ));
            return Err(Error::KernelNotifyFailed {
                action: SlotAction::Remove,
                drc_name: phb.drc_name.clone(),
                source,
            });
        }
        self.enter(&phb.drc_name, RemoveState::KernelNotified);

        self.release(phb)?;
        self.enter(&phb.drc_name, RemoveState::Released);
        self.enter(&phb.drc_name, RemoveState::Done);
        Ok(())
    }
}
