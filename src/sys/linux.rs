// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Collaborators backed by procfs and sysfs.

mod ofdt;
mod platform;
mod slot_control;
mod sysfs_pci;

pub use ofdt::read_dir_tree;
pub use ofdt::OfdtDirReader;
pub use platform::LinuxPlatform;
pub use slot_control::SlotControl;
pub use sysfs_pci::SysfsPciRegistry;
