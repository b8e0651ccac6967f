// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;

use crate::platform::KernelHotplug;

const ADD_SLOT: &str = "add_slot";
const REMOVE_SLOT: &str = "remove_slot";

/// The kernel's DLPAR slot control files, normally under `/sys/bus/pci/slots/control`.
#[derive(Debug)]
pub struct SlotControl {
    dir: PathBuf,
}

impl SlotControl {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        SlotControl { dir: dir.into() }
    }

    fn write(&self, file: &str, drc_name: &str) -> Result<()> {
        let path = self.dir.join(file);
        fs::write(&path, drc_name).with_context(|| format!("failed to write {}", path.display()))
    }
}

impl KernelHotplug for SlotControl {
    fn dlpar_capable(&self) -> bool {
        [ADD_SLOT, REMOVE_SLOT]
            .iter()
            .all(|f| self.dir.join(f).exists())
    }

    fn add_slot(&mut self, drc_name: &str) -> Result<()> {
        self.write(ADD_SLOT, drc_name)
    }

    fn remove_slot(&mut self, drc_name: &str) -> Result<()> {
        self.write(REMOVE_SLOT, drc_name)
    }
}
