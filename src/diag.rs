// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Diagnostic sink handed through every lifecycle operation.
//!
//! Messages are forwarded to the `log` facade at the same level and kept in order so that the
//! caller can inspect what an operation reported.

use std::fmt;

use log::Level;

const LOG_TARGET: &str = "phb_dlpar";

/// Printed whenever a rollback step fails and the partition may no longer match firmware.
pub const OUT_OF_SYNC: &str =
    "Unknown failure. Data may be out of sync and the system may require a reboot.";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Record {
    pub level: Level,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct Diag {
    records: Vec<Record>,
}

impl Diag {
    pub fn new() -> Self {
        Diag::default()
    }

    pub fn log(&mut self, level: Level, args: fmt::Arguments) {
        let message = args.to_string();
        log::log!(target: LOG_TARGET, level, "{}", message);
        self.records.push(Record { level, message });
    }

    pub fn error(&mut self, args: fmt::Arguments) {
        self.log(Level::Error, args)
    }

    pub fn warn(&mut self, args: fmt::Arguments) {
        self.log(Level::Warn, args)
    }

    pub fn debug(&mut self, args: fmt::Arguments) {
        self.log(Level::Debug, args)
    }

    /// Reports that the system state may now disagree with firmware.
    pub fn out_of_sync(&mut self) {
        self.error(format_args!("{}", OUT_OF_SYNC))
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// True if any message at `level` contains `needle`.
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.records
            .iter()
            .any(|r| r.level == level && r.message.contains(needle))
    }

    pub fn count(&self, level: Level, needle: &str) -> usize {
        self.records
            .iter()
            .filter(|r| r.level == level && r.message.contains(needle))
            .count()
    }
}
