// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        pub mod linux;
        pub use linux as platform;
    } else {
        compile_error!("Unsupported platform");
    }
}

pub use platform::read_dir_tree;
pub use platform::LinuxPlatform;
pub use platform::OfdtDirReader;
pub use platform::SlotControl;
pub use platform::SysfsPciRegistry;
