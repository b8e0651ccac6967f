// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fs::File;
use std::io;
use std::io::BufReader;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use remain::sorted;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

pub const OFDT_BASE: &str = "/proc/device-tree";
pub const SYSFS_PCI_DEV_PATH: &str = "/sys/bus/pci/devices";
pub const SLOT_CONTROL_PATH: &str = "/sys/bus/pci/slots/control";
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 5000;

#[sorted]
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to open config file {}: {}", .0.display(), .1)]
    Open(PathBuf, io::Error),
    #[error("failed to parse config file {}: {}", .0.display(), .1)]
    Parse(PathBuf, serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Locations and timing used by the PHB lifecycle operations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    /// Mount point of the live device tree. Stripped from device tree paths to form the
    /// `devspec` keys reported by sysfs.
    pub ofdt_base: PathBuf,
    pub pci_devices_dir: PathBuf,
    pub slot_control_dir: PathBuf,
    /// How long to wait after asking the OS to remove a PCI device.
    pub settle_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            ofdt_base: PathBuf::from(OFDT_BASE),
            pci_devices_dir: PathBuf::from(SYSFS_PCI_DEV_PATH),
            slot_control_dir: PathBuf::from(SLOT_CONTROL_PATH),
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
        }
    }
}

impl Config {
    /// Reads a JSON config file. Fields that are not present keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::Open(path.to_owned(), e))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| Error::Parse(path.to_owned(), e))
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.ofdt_base, Path::new("/proc/device-tree"));
        assert_eq!(cfg.settle_delay(), Duration::from_secs(5));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{ "settle_delay_ms": 0, "ofdt_base": "/tmp/dt" }}"#).unwrap();
        let cfg = Config::load(file.path()).unwrap();
        assert_eq!(cfg.settle_delay(), Duration::ZERO);
        assert_eq!(cfg.ofdt_base, Path::new("/tmp/dt"));
        assert_eq!(cfg.pci_devices_dir, Path::new(SYSFS_PCI_DEV_PATH));
    }

    #[test]
    fn unknown_field_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{ "settle_delay": 3 }}"#).unwrap();
        match Config::load(file.path()) {
            Err(Error::Parse(p, _)) => assert_eq!(p, file.path()),
            r => panic!("unexpected result {:?}", r),
        }
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nope.json");
        assert!(matches!(Config::load(&path), Err(Error::Open(..))));
    }
}
