// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Adds, removes and queries PCI host bridges.
//!
//! Each operation walks the firmware registry, the device tree and the OS hotplug subsystem in
//! a fixed order. None of these offer transactions, so when a step fails after something has
//! been changed the operation undoes what it did through `unwind::Unwind`.

mod lifecycle;
mod os_hotplug;
mod resource;
mod unwind;

use std::fmt;
use std::fmt::Display;
use std::path::PathBuf;
use std::time::Duration;

use remain::sorted;
use thiserror::Error;

use crate::config::Config;
use crate::diag::Diag;

pub use lifecycle::AddState;
pub use lifecycle::QueryStatus;
pub use lifecycle::RemoveState;
pub use os_hotplug::devspec_of;
pub use os_hotplug::plan_removals;

/// Step of the hotplug slot protocol that failed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChildStep {
    Acquire,
    Enable,
    Release,
    ReleaseFromNode,
}

impl Display for ChildStep {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::ChildStep::*;

        let s = match self {
            Acquire => "acquire",
            Enable => "enable",
            Release => "release",
            ReleaseFromNode => "release from node",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SlotAction {
    Add,
    Remove,
}

impl Display for SlotAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SlotAction::Add => write!(f, "add"),
            SlotAction::Remove => write!(f, "remove"),
        }
    }
}

#[sorted]
#[derive(Error, Debug)]
pub enum Error {
    #[error("PHB {0} is already owned by this partition")]
    AlreadyOwned(String),
    #[error("{} OS devices claim devspec {devspec}", .paths.len())]
    AmbiguousMatch { devspec: String, paths: Vec<PathBuf> },
    #[error("failed to {step} hotplug children of {drc_name}: {source:#}")]
    ChildProtocolFailed {
        step: ChildStep,
        drc_name: String,
        source: anyhow::Error,
    },
    #[error("configure-connector returned no nodes for drc {0:#x}")]
    ConfigureFailed(u32),
    #[error("failed to remove device tree nodes at {}: {source:#}", .path.display())]
    DeviceTreeRemoveFailed {
        path: PathBuf,
        source: anyhow::Error,
    },
    #[error("failed to add device tree nodes at {}: {source:#}", .path.display())]
    DeviceTreeWriteFailed {
        path: PathBuf,
        source: anyhow::Error,
    },
    #[error("DLPAR PHB operations are not supported on this kernel")]
    DlparUnsupported,
    #[error("failed to list OS PCI devices: {0:#}")]
    EnumerationFailed(anyhow::Error),
    #[error("{original}; rollback also failed: {rollback}")]
    InconsistentState {
        original: Box<Error>,
        rollback: Box<Error>,
    },
    #[error("kernel {action} failed for {drc_name}: {source:#}")]
    KernelNotifyFailed {
        action: SlotAction,
        drc_name: String,
        source: anyhow::Error,
    },
    #[error("PHB {0} missing from the device tree after it was added")]
    NodeMissingAfterInsert(String),
    #[error("PHB {0} does not exist")]
    NotExistent(String),
    #[error("could not find drc index for {0}")]
    NotFound(String),
    #[error("PHB {phb} still owns {child}, which is not hotplug capable")]
    PhbInUse { phb: String, child: String },
    #[error("failed to acquire drc {index:#x}: {source:#}")]
    RegistryBusy { index: u32, source: anyhow::Error },
    #[error("failed to release drc {index:#x}: {source:#}")]
    RegistryReleaseFailed { index: u32, source: anyhow::Error },
    #[error("failed to hotplug remove {}: {source:#}", .path.display())]
    RemovalFailed {
        path: PathBuf,
        source: anyhow::Error,
    },
    #[error("failed to walk device tree at {}: {source:#}", .path.display())]
    TraversalFailed {
        path: PathBuf,
        source: anyhow::Error,
    },
    #[error("could not locate drc name for drc index {0:#x}")]
    UnknownDrcIndex(u32),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True if the system may be left out of sync with firmware.
    pub fn is_inconsistent(&self) -> bool {
        matches!(self, Error::InconsistentState { .. })
    }
}

/// Runs PHB operations against a platform, reporting through `diag`.
pub struct PhbManager<'a, P: ?Sized> {
    platform: &'a mut P,
    diag: &'a mut Diag,
    ofdt_base: PathBuf,
    settle_delay: Duration,
}

impl<'a, P: ?Sized> PhbManager<'a, P> {
    pub fn new(platform: &'a mut P, diag: &'a mut Diag, config: &Config) -> Self {
        PhbManager {
            platform,
            diag,
            ofdt_base: config.ofdt_base.clone(),
            settle_delay: config.settle_delay(),
        }
    }
}
