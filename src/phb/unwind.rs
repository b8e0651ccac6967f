// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Compensating actions for a partially completed PHB add.

use dr_node::DrNode;

use super::ChildStep;
use super::Error;
use super::PhbManager;
use super::SlotAction;
use crate::platform::Platform;

/// Undoes one completed step of an add.
///
/// Variants are declared in the order they must run: whatever depends on a resource is torn
/// down before the resource itself.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub(super) enum Compensation {
    /// Hand back the hotplug slots acquired beneath the PHB.
    ReleaseChildren,
    /// Tell the kernel the slot is gone.
    RemoveSlot,
    /// Remove the PHB from the device tree and hand its connector back to firmware.
    ReleasePhb,
}

/// Compensations registered as an add makes progress.
#[derive(Debug, Default)]
pub(super) struct Unwind {
    pending: Vec<Compensation>,
}

impl Unwind {
    pub fn new() -> Self {
        Unwind::default()
    }

    pub fn push(&mut self, compensation: Compensation) {
        if !self.pending.contains(&compensation) {
            self.pending.push(compensation);
        }
    }

    /// Runs every registered compensation for `phb`, dependents first.
    ///
    /// A failing compensation does not stop the ones after it. Each failure is logged together
    /// with a warning that the system may be out of sync, and all of them are returned in the
    /// order they happened.
    pub fn run<P: Platform + ?Sized>(
        mut self,
        mgr: &mut PhbManager<P>,
        phb: &DrNode,
    ) -> Vec<Error> {
        self.pending.sort();
        let mut failures = Vec::new();
        for compensation in self.pending {
            if let Err(e) = mgr.compensate(compensation, phb) {
                mgr.diag.error(format_args!("{}", e));
                mgr.diag.out_of_sync();
                failures.push(e);
            }
        }
        failures
    }
}

impl<'a, P: Platform + ?Sized> PhbManager<'a, P> {
    fn compensate(&mut self, compensation: Compensation, phb: &DrNode) -> Result<(), Error> {
        self.diag.debug(format_args!(
            "rolling back {}: {:?}",
            phb.drc_name, compensation
        ));
        match compensation {
            Compensation::ReleaseChildren => self
                .platform
                .child_slots()
                .release(&phb.drc_name)
                .map_err(|source| Error::ChildProtocolFailed {
                    step: ChildStep::Release,
                    drc_name: phb.drc_name.clone(),
                    source,
                }),
            Compensation::RemoveSlot => {
                self.platform
                    .kernel()
                    .remove_slot(&phb.drc_name)
                    .map_err(|source| {
                        self.diag.debug(format_args!(
                            "remove {} from hotplug subsystem failed",
                            phb.drc_name
                        ));
                        Error::KernelNotifyFailed {
                            action: SlotAction::Remove,
                            drc_name: phb.drc_name.clone(),
                            source,
                        }
                    })
            }
            Compensation::ReleasePhb => self.release(phb),
        }
    }
}
