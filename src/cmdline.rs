// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fmt;
use std::path::PathBuf;

use argh::FromArgs;
use remain::sorted;
use thiserror::Error;

pub const USAGE: &str = "-c phb [-Q | -r | -a] -s <drc_name | drc_index>";

#[sorted]
#[derive(Error, Debug, Eq, PartialEq)]
pub enum Error {
    #[error("only one of '-r', '-a' or '-Q' may be specified")]
    ConflictingActions,
    #[error("connector type must be phb, not {0}")]
    ConnectorType(String),
    #[error("invalid drc index {0}")]
    InvalidIndex(String),
    #[error("The '-r', '-a', or '-Q' option must be specified for PHB operations.")]
    MissingAction,
    #[error("A drc name or index must be specified")]
    MissingTarget,
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(FromArgs, Debug, Default)]
/// Add, remove or query a PCI host bridge.
pub struct Options {
    /// type of connector to operate on. Only "phb" is supported.
    #[argh(option, short = 'c')]
    pub connector_type: Option<String>,
    /// add the PHB to this partition
    #[argh(switch, short = 'a')]
    pub add: bool,
    /// remove the PHB from this partition
    #[argh(switch, short = 'r')]
    pub remove: bool,
    /// query whether the PHB could be removed
    #[argh(switch, short = 'Q')]
    pub query: bool,
    /// drc name of the PHB, or its drc index as a hexadecimal number starting with 0x
    #[argh(option, short = 's')]
    pub selector: Option<String>,
    /// debug level. 0 only logs errors, 4 and above logs everything. (default: 0)
    #[argh(option, short = 'd', default = "0")]
    pub debug: u8,
    /// path to a JSON file overriding the default device tree and sysfs locations
    #[argh(option, arg_name = "PATH")]
    pub cfg: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Action {
    Add,
    Remove,
    Query,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::Action::*;

        match self {
            Add => write!(f, "add"),
            Remove => write!(f, "remove"),
            Query => write!(f, "query"),
        }
    }
}

/// How the PHB to operate on was named.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Target {
    Name(String),
    Index(u32),
}

/// A validated request for one PHB operation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OperationRequest {
    pub action: Action,
    pub target: Target,
}

fn parse_target(selector: &str) -> Result<Target> {
    match selector.strip_prefix("0x") {
        Some(hex) => {
            let index =
                u32::from_str_radix(hex, 16).map_err(|_| Error::InvalidIndex(selector.to_owned()))?;
            // Index 0 is never a valid connector.
            if index == 0 {
                return Err(Error::MissingTarget);
            }
            Ok(Target::Index(index))
        }
        None if selector.is_empty() => Err(Error::MissingTarget),
        None => Ok(Target::Name(selector.to_owned())),
    }
}

impl Options {
    /// Checks the options describe exactly one operation on one PHB.
    pub fn validate(&self) -> Result<OperationRequest> {
        if let Some(connector_type) = &self.connector_type {
            if connector_type != "phb" {
                return Err(Error::ConnectorType(connector_type.clone()));
            }
        }

        let target = parse_target(self.selector.as_deref().unwrap_or_default())?;

        let action = match (self.add, self.remove, self.query) {
            (true, false, false) => Action::Add,
            (false, true, false) => Action::Remove,
            (false, false, true) => Action::Query,
            (false, false, false) => return Err(Error::MissingAction),
            _ => return Err(Error::ConflictingActions),
        };

        Ok(OperationRequest { action, target })
    }

    /// Maximum log level selected by `-d`.
    pub fn log_level(&self) -> log::LevelFilter {
        match self.debug {
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Warn,
            2 => log::LevelFilter::Info,
            3 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Options {
        Options::from_args(&["drmgr"], args).unwrap()
    }

    #[test]
    fn name_target() {
        let req = parse(&["-c", "phb", "-a", "-s", "PHB 1"]).validate().unwrap();
        assert_eq!(
            req,
            OperationRequest {
                action: Action::Add,
                target: Target::Name("PHB 1".to_owned()),
            }
        );
    }

    #[test]
    fn hex_index_target() {
        let req = parse(&["-Q", "-s", "0x20000001"]).validate().unwrap();
        assert_eq!(req.action, Action::Query);
        assert_eq!(req.target, Target::Index(0x2000_0001));
    }

    #[test]
    fn zero_index_is_no_target() {
        assert_eq!(
            parse(&["-r", "-s", "0x0"]).validate(),
            Err(Error::MissingTarget)
        );
    }

    #[test]
    fn bad_index() {
        assert_eq!(
            parse(&["-r", "-s", "0xzz"]).validate(),
            Err(Error::InvalidIndex("0xzz".to_owned()))
        );
    }

    #[test]
    fn target_required() {
        assert_eq!(parse(&["-r"]).validate(), Err(Error::MissingTarget));
    }

    #[test]
    fn action_required() {
        assert_eq!(
            parse(&["-s", "PHB 1"]).validate(),
            Err(Error::MissingAction)
        );
        assert_eq!(
            Error::MissingAction.to_string(),
            "The '-r', '-a', or '-Q' option must be specified for PHB operations."
        );
    }

    #[test]
    fn one_action_only() {
        assert_eq!(
            parse(&["-a", "-r", "-s", "PHB 1"]).validate(),
            Err(Error::ConflictingActions)
        );
    }

    #[test]
    fn only_phb_connectors() {
        assert_eq!(
            parse(&["-c", "slot", "-a", "-s", "PHB 1"]).validate(),
            Err(Error::ConnectorType("slot".to_owned()))
        );
    }

    #[test]
    fn debug_level() {
        assert_eq!(parse(&[]).log_level(), log::LevelFilter::Error);
        assert_eq!(parse(&["-d", "3"]).log_level(), log::LevelFilter::Debug);
        assert_eq!(parse(&["-d", "9"]).log_level(), log::LevelFilter::Trace);
    }
}
