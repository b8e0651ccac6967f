// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Dynamic addition, removal and removability queries of PCI host bridges (PHBs) on
//! partitioned systems.
//!
//! A PHB is known to three parties at once: the firmware resource registry that assigns it to
//! a partition, the device tree the OS reads its topology from, and the OS hotplug subsystem.
//! `phb::PhbManager` keeps them in agreement, undoing partial work when a step fails.

pub mod cmdline;
pub mod config;
pub mod diag;
pub mod dispatch;
pub mod phb;
pub mod platform;
pub mod sys;
#[cfg(test)]
mod testing;

pub use dispatch::execute;
pub use dispatch::run;
pub use dispatch::ExitStatus;
