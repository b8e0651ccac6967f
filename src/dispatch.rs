// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Turns a command line into one PHB operation and its exit status.

use argh::FromArgs;
use dr_node::drc_index_to_name;

use crate::cmdline::Action;
use crate::cmdline::OperationRequest;
use crate::cmdline::Options;
use crate::cmdline::Target;
use crate::cmdline::USAGE;
use crate::config::Config;
use crate::diag::Diag;
use crate::phb::Error;
use crate::phb::PhbManager;
use crate::phb::QueryStatus;
use crate::platform::Platform;

/// Process exit status of an operation, using the drmgr return codes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExitStatus {
    Success,
    /// The PHB still hosts resources that can not be removed.
    InUse,
    NonExistent,
    AlreadyOwned,
    /// Nothing prevents the PHB from being removed.
    LinuxSlot,
    Failure,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::InUse => 1,
            ExitStatus::NonExistent => 3,
            ExitStatus::AlreadyOwned => 5,
            ExitStatus::LinuxSlot => 6,
            ExitStatus::Failure => 255,
        }
    }
}

impl From<QueryStatus> for ExitStatus {
    fn from(status: QueryStatus) -> Self {
        match status {
            QueryStatus::NotExistent => ExitStatus::NonExistent,
            QueryStatus::InUse => ExitStatus::InUse,
            QueryStatus::RemovableNow => ExitStatus::LinuxSlot,
        }
    }
}

impl From<&Error> for ExitStatus {
    fn from(err: &Error) -> Self {
        match err {
            Error::AlreadyOwned(_) => ExitStatus::AlreadyOwned,
            Error::NotExistent(_) => ExitStatus::NonExistent,
            Error::PhbInUse { .. } => ExitStatus::InUse,
            _ => ExitStatus::Failure,
        }
    }
}

fn finish(result: crate::phb::Result<()>, diag: &mut Diag) -> ExitStatus {
    match result {
        Ok(()) => ExitStatus::Success,
        // Removing a PHB that is already gone needs no operator attention.
        Err(e @ Error::NotExistent(_)) => {
            diag.debug(format_args!("{}", e));
            ExitStatus::NonExistent
        }
        Err(e) => {
            diag.error(format_args!("{}", e));
            if e.is_inconsistent() {
                diag.warn(format_args!(
                    "the partition may no longer match firmware, a reboot may be required"
                ));
            }
            ExitStatus::from(&e)
        }
    }
}

/// Finds the drc name the request refers to.
fn resolve_name<P: Platform + ?Sized>(
    target: &Target,
    platform: &mut P,
    diag: &mut Diag,
) -> Option<String> {
    let index = match target {
        Target::Name(name) => return Some(name.clone()),
        Target::Index(index) => *index,
    };
    let drcs = match platform.device_tree().drc_list() {
        Ok(drcs) => drcs,
        Err(e) => {
            diag.error(format_args!("failed to read drc list: {:#}", e));
            return None;
        }
    };
    match drc_index_to_name(index, &drcs) {
        Some(name) => Some(name.to_owned()),
        None => {
            diag.error(format_args!("{}", Error::UnknownDrcIndex(index)));
            None
        }
    }
}

/// Runs the operation described by `request`.
pub fn execute<P: Platform + ?Sized>(
    request: &OperationRequest,
    platform: &mut P,
    config: &Config,
    diag: &mut Diag,
) -> ExitStatus {
    if !platform.kernel().dlpar_capable() {
        diag.error(format_args!("{}", Error::DlparUnsupported));
        return ExitStatus::Failure;
    }

    let name = match resolve_name(&request.target, platform, diag) {
        Some(name) => name,
        None => return ExitStatus::Failure,
    };
    diag.debug(format_args!("{} {}", request.action, name));

    match request.action {
        Action::Query => {
            let status = PhbManager::new(platform, diag, config).query(&name);
            diag.debug(format_args!("query {}: {:?}", name, status));
            status.into()
        }
        Action::Add => {
            let result = PhbManager::new(platform, diag, config).add(&name);
            finish(result, diag)
        }
        Action::Remove => {
            let result = PhbManager::new(platform, diag, config).remove(&name);
            finish(result, diag)
        }
    }
}

/// Parses `args` (without the program name), then builds a platform from the resulting config
/// with `build` and runs the requested operation on it.
pub fn run<P, F>(args: &[&str], diag: &mut Diag, build: F) -> ExitStatus
where
    P: Platform,
    F: FnOnce(&Config) -> P,
{
    let options = match Options::from_args(&["drmgr"], args) {
        Ok(options) => options,
        Err(e) => {
            if e.status.is_ok() {
                println!("{}", e.output);
                return ExitStatus::Success;
            }
            diag.error(format_args!("{}", e.output.trim_end()));
            diag.error(format_args!("usage: drmgr {}", USAGE));
            return ExitStatus::Failure;
        }
    };
    log::set_max_level(options.log_level());

    let config = match &options.cfg {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                diag.error(format_args!("{}", e));
                return ExitStatus::Failure;
            }
        },
        None => Config::default(),
    };

    let request = match options.validate() {
        Ok(request) => request,
        Err(e) => {
            diag.error(format_args!("{}", e));
            diag.error(format_args!("usage: drmgr {}", USAGE));
            return ExitStatus::Failure;
        }
    };

    let mut platform = build(&config);
    execute(&request, &mut platform, &config, diag)
}
