// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;

use crate::platform::HotplugDevice;
use crate::platform::OsDeviceRegistry;

/// The PCI devices listed in sysfs.
#[derive(Debug)]
pub struct SysfsPciRegistry {
    devices_dir: PathBuf,
}

impl SysfsPciRegistry {
    /// `devices_dir` is normally `/sys/bus/pci/devices`.
    pub fn new(devices_dir: impl Into<PathBuf>) -> Self {
        SysfsPciRegistry {
            devices_dir: devices_dir.into(),
        }
    }

    fn read_devspec(device: &Path) -> Result<String> {
        let path = device.join("devspec");
        let devspec = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(devspec.trim_end_matches(['\n', '\0']).to_owned())
    }
}

impl OsDeviceRegistry for SysfsPciRegistry {
    /// Lists every device with its `devspec` attribute. A device without one fails the whole
    /// snapshot.
    fn snapshot(&mut self) -> Result<Vec<HotplugDevice>> {
        let entries = fs::read_dir(&self.devices_dir)
            .with_context(|| format!("failed to read dir {}", self.devices_dir.display()))?;
        let mut devices = Vec::new();
        for entry in entries {
            let entry = entry
                .with_context(|| format!("failed to read dir {}", self.devices_dir.display()))?;
            let path = entry.path();
            let devspec = Self::read_devspec(&path)?;
            devices.push(HotplugDevice { path, devspec });
        }
        devices.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(devices)
    }

    fn remove_device(&mut self, device: &HotplugDevice) -> Result<()> {
        let remove = device.path.join("remove");
        fs::write(&remove, "1").with_context(|| format!("failed to write {}", remove.display()))
    }
}
