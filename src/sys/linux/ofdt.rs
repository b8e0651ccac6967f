// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fs;
use std::path::Path;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;

use crate::platform::DeviceTreeFs;
use crate::platform::DirEntry;

/// Snapshots the directory hierarchy beneath `dir`.
///
/// Entries of each directory are sorted by name. Symlinks are listed as files and never
/// followed.
pub fn read_dir_tree(dir: &Path) -> Result<Vec<DirEntry>> {
    if !dir.is_dir() {
        bail!("{} isn't directory", dir.display());
    }
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed to read dir {}", dir.display()))?
    {
        let entry = entry.with_context(|| format!("failed to read dir {}", dir.display()))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let file_type = entry
            .file_type()
            .with_context(|| format!("failed to stat {}", entry.path().display()))?;
        if file_type.is_dir() {
            entries.push(DirEntry::dir(name, read_dir_tree(&entry.path())?));
        } else {
            entries.push(DirEntry::file(name));
        }
    }
    entries.sort_by(|a, b| a.name().cmp(b.name()));
    Ok(entries)
}

/// Reads the device tree straight from its procfs mount.
#[derive(Debug, Default)]
pub struct OfdtDirReader;

impl DeviceTreeFs for OfdtDirReader {
    fn read_subtree(&mut self, path: &Path) -> Result<Vec<DirEntry>> {
        read_dir_tree(path)
    }
}
